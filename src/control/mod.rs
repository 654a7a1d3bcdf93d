//! Control Resolver - signals → bounded actuator commands
//!
//! Starts from the configured default commands, folds the ordered rule list
//! (deltas accumulate, the last firing rule owns the reason), clamps each
//! command to its bounds and derives the state fields from the clamped
//! values. Stateless across samples.

mod rules;

pub use rules::{CommandAccumulator, ControlRule};

use tracing::debug;

use crate::config::{ActuatorBounds, ActuatorCommands, ControlConfig, ControlSignal};
use crate::types::{
    CompressorState, ControlRecord, EevState, FanState, FeatureRow, Sample,
};

// ============================================================================
// Inputs
// ============================================================================

/// Signals the rules read. Missing or NaN values evaluate as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControlInputs {
    pub power_watts: Option<f64>,
    pub superheat: Option<f64>,
    pub temp_delta: Option<f64>,
    pub vibration: Option<f64>,
}

impl ControlInputs {
    pub fn value(&self, signal: ControlSignal) -> f64 {
        let v = match signal {
            ControlSignal::PowerWatts => self.power_watts,
            ControlSignal::Superheat => self.superheat,
            ControlSignal::TempDelta => self.temp_delta,
            ControlSignal::Vibration => self.vibration,
        };
        v.filter(|x| !x.is_nan()).unwrap_or(0.0)
    }

    pub fn from_row(row: &FeatureRow) -> Self {
        Self {
            power_watts: Some(row.raw.power_watts),
            superheat: Some(row.features.superheat),
            temp_delta: Some(row.features.temp_delta),
            vibration: Some(row.raw.vibration),
        }
    }

    /// Best-effort inputs for a sample the feature engineer dropped.
    pub fn from_sample(sample: &Sample, previous: Option<&Sample>) -> Self {
        let superheat = sample
            .temperature
            .zip(sample.evap_temp)
            .map(|(t, e)| t - e);
        let temp_delta = sample
            .temperature
            .zip(previous.and_then(|p| p.temperature))
            .map(|(t, p)| t - p);
        Self {
            power_watts: sample.power_watts,
            superheat,
            temp_delta,
            vibration: sample.vibration,
        }
    }
}

// ============================================================================
// Resolver
// ============================================================================

#[derive(Debug, Clone)]
pub struct ControlResolver {
    defaults: ActuatorCommands,
    bounds: ActuatorBounds,
    normal_reason: String,
    rules: Vec<ControlRule>,
}

impl Default for ControlResolver {
    fn default() -> Self {
        Self::new(&ControlConfig::default())
    }
}

impl ControlResolver {
    pub fn new(config: &ControlConfig) -> Self {
        Self {
            defaults: config.defaults,
            bounds: config.bounds,
            normal_reason: config.normal_reason.clone(),
            rules: config.rules.iter().map(ControlRule::from).collect(),
        }
    }

    pub fn rules(&self) -> &[ControlRule] {
        &self.rules
    }

    pub fn resolve(&self, inputs: &ControlInputs) -> ControlRecord {
        let start = CommandAccumulator {
            eev_step: self.defaults.eev_step,
            fan_rpm: self.defaults.fan_rpm,
            compressor_rpm: self.defaults.compressor_rpm,
            reason: self.normal_reason.clone(),
        };
        let acc = self
            .rules
            .iter()
            .fold(start, |acc, rule| rule.apply(inputs, acc));

        let eev_step_cmd = self.bounds.eev_step.clamp(acc.eev_step);
        let fan_rpm_cmd = self.bounds.fan_rpm.clamp(acc.fan_rpm);
        let compressor_rpm_cmd = self.bounds.compressor_rpm.clamp(acc.compressor_rpm);

        debug!(
            eev = eev_step_cmd,
            fan = fan_rpm_cmd,
            compressor = compressor_rpm_cmd,
            reason = %acc.reason,
            "Control resolved"
        );

        ControlRecord {
            eev_step_cmd,
            fan_rpm_cmd,
            compressor_rpm_cmd,
            eev_state: if eev_step_cmd > self.defaults.eev_step {
                EevState::Open
            } else {
                EevState::Hold
            },
            fan_state: if fan_rpm_cmd > self.defaults.fan_rpm {
                FanState::High
            } else {
                FanState::Normal
            },
            compressor_state: if compressor_rpm_cmd < self.defaults.compressor_rpm {
                CompressorState::Reduced
            } else {
                CompressorState::Normal
            },
            control_reason: acc.reason,
        }
    }

    pub fn resolve_row(&self, row: &FeatureRow) -> ControlRecord {
        self.resolve(&ControlInputs::from_row(row))
    }
}
