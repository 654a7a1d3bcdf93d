//! Unit Configuration - detector, subsystem, risk and control settings as TOML values
//!
//! Each struct implements `Default` with the baseline constants from
//! `config::defaults`, so an empty or absent config file reproduces the
//! reference behaviour exactly.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;
use crate::types::{FeatureColumn, GLOBAL_SUBSYSTEM};

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one refrigeration unit deployment.
///
/// Load with `UnitConfig::load()` which searches:
/// 1. `$FROSTGUARD_CONFIG` env var
/// 2. `./unit_config.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitConfig {
    /// Unit identification
    #[serde(default)]
    pub unit: UnitInfo,

    /// Feature engineering parameters
    #[serde(default)]
    pub features: FeatureConfig,

    /// Isolation forest parameters shared by all subsystems
    #[serde(default)]
    pub detector: DetectorConfig,

    /// Version of the subsystem list below. Bump when the list changes so
    /// cached models fitted against the old list are rejected.
    #[serde(default = "default_subsystems_version")]
    pub subsystems_version: u32,

    /// Closed, ordered set of monitored subsystems
    #[serde(default = "default_subsystems")]
    pub subsystems: Vec<SubsystemConfig>,

    /// Health score → risk tier mapping
    #[serde(default)]
    pub risk: RiskConfig,

    /// Actuator defaults, bounds and rules
    #[serde(default)]
    pub control: ControlConfig,
}

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            unit: UnitInfo::default(),
            features: FeatureConfig::default(),
            detector: DetectorConfig::default(),
            subsystems_version: default_subsystems_version(),
            subsystems: default_subsystems(),
            risk: RiskConfig::default(),
            control: ControlConfig::default(),
        }
    }
}

impl UnitConfig {
    /// Load configuration using the standard search order:
    /// 1. `$FROSTGUARD_CONFIG` environment variable
    /// 2. `./unit_config.toml` in the current working directory
    /// 3. Built-in defaults
    ///
    /// A file that exists but fails to parse or validate is a fatal error.
    pub fn load() -> Result<Self, ConfigError> {
        // 1. Check env var
        if let Ok(path) = std::env::var(defaults::CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                let config = Self::load_from_file(&p)?;
                info!(path = %p.display(), unit = %config.unit.name, "Loaded unit config from FROSTGUARD_CONFIG");
                return Ok(config);
            }
            warn!(path = %path, "FROSTGUARD_CONFIG points to non-existent file, falling back");
        }

        // 2. Check ./unit_config.toml
        let local = PathBuf::from(defaults::CONFIG_FILE_NAME);
        if local.exists() {
            let config = Self::load_from_file(&local)?;
            info!(unit = %config.unit.name, "Loaded unit config from ./unit_config.toml");
            return Ok(config);
        }

        // 3. Defaults
        info!("No unit_config.toml found, using built-in defaults");
        Ok(Self::default())
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, err) => ConfigError::Parse(path.to_path_buf(), err),
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        // Two-pass: check for unknown keys first (warnings only)
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Save config to a file.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Unit config saved");
        Ok(())
    }

    /// Ids of the configured subsystems, in order.
    pub fn subsystem_ids(&self) -> Vec<String> {
        self.subsystems.iter().map(|s| s.id.clone()).collect()
    }

    /// Validate all settings for internal consistency.
    ///
    /// Rules:
    /// - Every command bound must have min <= max, defaults inside bounds
    /// - Contamination in (0, 0.5], estimator and sample counts > 0
    /// - Risk tiers ordered: 0 <= warning_min <= normal_min <= 100
    /// - Subsystem ids and label columns unique, each with >= 1 feature
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        // Detector
        let d = &self.detector;
        if d.n_estimators == 0 {
            errors.push("detector.n_estimators must be > 0".to_string());
        }
        if d.max_samples == 0 {
            errors.push("detector.max_samples must be > 0".to_string());
        }
        if !(d.contamination > 0.0 && d.contamination <= 0.5) {
            errors.push(format!(
                "detector.contamination ({}) must be in (0, 0.5]",
                d.contamination
            ));
        }

        // Subsystems
        if self.subsystems.is_empty() {
            errors.push("subsystems must list at least one subsystem".to_string());
        }
        let mut ids = HashSet::new();
        let mut columns = HashSet::new();
        for s in &self.subsystems {
            if s.id.trim().is_empty() {
                errors.push("subsystems: id must not be empty".to_string());
            }
            if !ids.insert(s.id.as_str()) {
                errors.push(format!("subsystems: duplicate id '{}'", s.id));
            }
            if !columns.insert(s.label_column.as_str()) {
                errors.push(format!(
                    "subsystems: duplicate label_column '{}'",
                    s.label_column
                ));
            }
            if s.features.is_empty() {
                errors.push(format!("subsystems.{}: features must not be empty", s.id));
            }
        }

        // Risk
        let r = &self.risk;
        if !r.normal_min.is_finite() || !r.warning_min.is_finite() {
            errors.push("risk: tier thresholds must be finite".to_string());
        } else {
            if r.warning_min > r.normal_min {
                errors.push(format!(
                    "risk.warning_min ({:.2}) must be <= normal_min ({:.2})",
                    r.warning_min, r.normal_min
                ));
            }
            if r.warning_min < 0.0 || r.normal_min > 100.0 {
                errors.push("risk: tier thresholds must lie within [0, 100]".to_string());
            }
        }

        // Control
        let c = &self.control;
        Self::check_bounds("control.bounds.eev_step", c.bounds.eev_step, c.defaults.eev_step, &mut errors);
        Self::check_bounds("control.bounds.fan_rpm", c.bounds.fan_rpm, c.defaults.fan_rpm, &mut errors);
        Self::check_bounds(
            "control.bounds.compressor_rpm",
            c.bounds.compressor_rpm,
            c.defaults.compressor_rpm,
            &mut errors,
        );
        for rule in &c.rules {
            if !rule.threshold.is_finite() {
                errors.push(format!(
                    "control.rules.{}: threshold must be finite (got {})",
                    rule.name, rule.threshold
                ));
            }
        }

        let (range_errors, range_warnings) = super::validation::validate_physical_ranges(self);
        errors.extend(range_errors);
        for w in range_warnings {
            warn!("{}", w);
        }

        // Unknown feature names are not fatal: the detector for that
        // subsystem fails closed at fit time.
        for w in super::validation::validate_subsystem_columns(self) {
            warn!("{}", w);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_bounds(name: &str, bounds: CommandBounds, default: i32, errors: &mut Vec<String>) {
        if bounds.min > bounds.max {
            errors.push(format!(
                "{name}: min ({}) must be <= max ({})",
                bounds.min, bounds.max
            ));
            return;
        }
        if !bounds.contains(default) {
            errors.push(format!(
                "{name}: default command {default} lies outside [{}, {}]",
                bounds.min, bounds.max
            ));
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Unit Info
// ============================================================================

/// Identification metadata. Not used for logic; appears in logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitInfo {
    /// Unit name / asset tag
    #[serde(default = "default_unit_name")]
    pub name: String,

    /// Site or store where the unit is installed
    #[serde(default)]
    pub site: String,
}

fn default_unit_name() -> String {
    "FREEZER-01".to_string()
}

impl Default for UnitInfo {
    fn default() -> Self {
        Self {
            name: default_unit_name(),
            site: String::new(),
        }
    }
}

// ============================================================================
// Feature Engineering
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Vibration strictly above this sets `vibration_flag`
    #[serde(default = "default_vibration_flag_threshold")]
    pub vibration_flag_threshold: f64,
}

fn default_vibration_flag_threshold() -> f64 { defaults::VIBRATION_FLAG_THRESHOLD }

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            vibration_flag_threshold: default_vibration_flag_threshold(),
        }
    }
}

// ============================================================================
// Detector
// ============================================================================

/// Isolation forest parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Trees per subsystem forest
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,

    /// Expected outlier fraction; sets the decision offset
    #[serde(default = "default_contamination")]
    pub contamination: f64,

    /// Subsample size per tree (capped at the batch size)
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,

    /// RNG seed; identical seed + identical batch = identical labels
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Batches with this many rows or fewer fail closed
    #[serde(default = "default_min_fit_rows")]
    pub min_fit_rows: usize,
}

fn default_n_estimators() -> usize { defaults::N_ESTIMATORS }
fn default_contamination() -> f64 { defaults::CONTAMINATION }
fn default_max_samples() -> usize { defaults::MAX_SAMPLES }
fn default_seed() -> u64 { defaults::DETECTOR_SEED }
fn default_min_fit_rows() -> usize { defaults::MIN_FIT_ROWS }

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            n_estimators: default_n_estimators(),
            contamination: default_contamination(),
            max_samples: default_max_samples(),
            seed: default_seed(),
            min_fit_rows: default_min_fit_rows(),
        }
    }
}

// ============================================================================
// Subsystems
// ============================================================================

/// One monitored subsystem and the feature columns its detector sees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubsystemConfig {
    /// Stable identifier (e.g. "temperature")
    pub id: String,

    /// Output column holding this subsystem's label (e.g. "temp_anomaly")
    pub label_column: String,

    /// Feature column names, resolved against `FeatureColumn` at fit time
    pub features: Vec<String>,
}

impl SubsystemConfig {
    fn new(id: &str, label_column: &str, features: &[FeatureColumn]) -> Self {
        Self {
            id: id.to_string(),
            label_column: label_column.to_string(),
            features: features.iter().map(|c| c.as_str().to_string()).collect(),
        }
    }
}

fn default_subsystems_version() -> u32 { defaults::SUBSYSTEMS_VERSION }

/// The five baseline subsystems: global plus four components.
pub fn default_subsystems() -> Vec<SubsystemConfig> {
    use FeatureColumn::*;
    vec![
        SubsystemConfig::new(
            GLOBAL_SUBSYSTEM,
            "anomaly_label",
            &[
                Temperature,
                EvapTemp,
                Superheat,
                PowerWatts,
                FanRpm,
                CompressorRpm,
                Vibration,
                PowerPerRpm,
                FanEfficiency,
            ],
        ),
        SubsystemConfig::new("temperature", "temp_anomaly", &[Temperature, EvapTemp, Superheat]),
        SubsystemConfig::new("power", "power_anomaly", &[PowerWatts, PowerPerRpm]),
        SubsystemConfig::new("rpm", "rpm_anomaly", &[FanRpm, CompressorRpm]),
        SubsystemConfig::new("vibration", "vibration_anomaly", &[Vibration]),
    ]
}

// ============================================================================
// Risk
// ============================================================================

/// Health score thresholds (lower bound inclusive) and per-tier actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    #[serde(default = "default_normal_min")]
    pub normal_min: f64,

    #[serde(default = "default_warning_min")]
    pub warning_min: f64,

    #[serde(default = "default_normal_action")]
    pub normal_action: String,

    #[serde(default = "default_warning_action")]
    pub warning_action: String,

    #[serde(default = "default_critical_action")]
    pub critical_action: String,
}

fn default_normal_min() -> f64 { defaults::RISK_NORMAL_MIN }
fn default_warning_min() -> f64 { defaults::RISK_WARNING_MIN }
fn default_normal_action() -> String { defaults::ACTION_NORMAL.to_string() }
fn default_warning_action() -> String { defaults::ACTION_WARNING.to_string() }
fn default_critical_action() -> String { defaults::ACTION_CRITICAL.to_string() }

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            normal_min: default_normal_min(),
            warning_min: default_warning_min(),
            normal_action: default_normal_action(),
            warning_action: default_warning_action(),
            critical_action: default_critical_action(),
        }
    }
}

// ============================================================================
// Control
// ============================================================================

/// Actuator defaults, clamp bounds and the ordered rule list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    #[serde(default)]
    pub defaults: ActuatorCommands,

    #[serde(default)]
    pub bounds: ActuatorBounds,

    /// Reason reported when no rule fires
    #[serde(default = "default_normal_reason")]
    pub normal_reason: String,

    /// Evaluated in order; later matches win the reason field
    #[serde(default = "default_control_rules")]
    pub rules: Vec<ControlRuleConfig>,
}

fn default_normal_reason() -> String { defaults::NORMAL_OPERATION_REASON.to_string() }

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            defaults: ActuatorCommands::default(),
            bounds: ActuatorBounds::default(),
            normal_reason: default_normal_reason(),
            rules: default_control_rules(),
        }
    }
}

/// Resting command set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuatorCommands {
    #[serde(default = "default_eev_step")]
    pub eev_step: i32,
    #[serde(default = "default_fan_rpm")]
    pub fan_rpm: i32,
    #[serde(default = "default_compressor_rpm")]
    pub compressor_rpm: i32,
}

fn default_eev_step() -> i32 { defaults::DEFAULT_EEV_STEP }
fn default_fan_rpm() -> i32 { defaults::DEFAULT_FAN_RPM }
fn default_compressor_rpm() -> i32 { defaults::DEFAULT_COMPRESSOR_RPM }

impl Default for ActuatorCommands {
    fn default() -> Self {
        Self {
            eev_step: default_eev_step(),
            fan_rpm: default_fan_rpm(),
            compressor_rpm: default_compressor_rpm(),
        }
    }
}

/// Inclusive command range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandBounds {
    pub min: i32,
    pub max: i32,
}

impl CommandBounds {
    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    /// Clamp into range. Callers guarantee `min <= max` via `validate()`.
    pub fn clamp(self, value: i32) -> i32 {
        value.max(self.min).min(self.max)
    }

    pub fn contains(self, value: i32) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuatorBounds {
    #[serde(default = "default_eev_bounds")]
    pub eev_step: CommandBounds,
    #[serde(default = "default_fan_bounds")]
    pub fan_rpm: CommandBounds,
    #[serde(default = "default_compressor_bounds")]
    pub compressor_rpm: CommandBounds,
}

fn default_eev_bounds() -> CommandBounds {
    CommandBounds::new(defaults::EEV_STEP_MIN, defaults::EEV_STEP_MAX)
}
fn default_fan_bounds() -> CommandBounds {
    CommandBounds::new(defaults::FAN_RPM_MIN, defaults::FAN_RPM_MAX)
}
fn default_compressor_bounds() -> CommandBounds {
    CommandBounds::new(defaults::COMPRESSOR_RPM_MIN, defaults::COMPRESSOR_RPM_MAX)
}

impl Default for ActuatorBounds {
    fn default() -> Self {
        Self {
            eev_step: default_eev_bounds(),
            fan_rpm: default_fan_bounds(),
            compressor_rpm: default_compressor_bounds(),
        }
    }
}

/// Signal a control rule compares against its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlSignal {
    PowerWatts,
    Superheat,
    TempDelta,
    Vibration,
}

impl std::fmt::Display for ControlSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlSignal::PowerWatts => write!(f, "power_watts"),
            ControlSignal::Superheat => write!(f, "superheat"),
            ControlSignal::TempDelta => write!(f, "temp_delta"),
            ControlSignal::Vibration => write!(f, "vibration"),
        }
    }
}

/// One `signal > threshold` rule with cumulative command deltas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlRuleConfig {
    pub name: String,
    pub signal: ControlSignal,
    pub threshold: f64,
    #[serde(default)]
    pub eev_delta: i32,
    #[serde(default)]
    pub fan_delta: i32,
    #[serde(default)]
    pub compressor_delta: i32,
    pub reason: String,
}

/// The four baseline rules, in evaluation order.
pub fn default_control_rules() -> Vec<ControlRuleConfig> {
    vec![
        ControlRuleConfig {
            name: "high_power".to_string(),
            signal: ControlSignal::PowerWatts,
            threshold: defaults::HIGH_POWER_WATTS,
            eev_delta: 0,
            fan_delta: 200,
            compressor_delta: -300,
            reason: "High power detected → reducing compressor load".to_string(),
        },
        ControlRuleConfig {
            name: "high_superheat".to_string(),
            signal: ControlSignal::Superheat,
            threshold: defaults::HIGH_SUPERHEAT,
            eev_delta: 10,
            fan_delta: 100,
            compressor_delta: 0,
            reason: "High superheat → opening EEV".to_string(),
        },
        ControlRuleConfig {
            name: "poor_cooling".to_string(),
            signal: ControlSignal::TempDelta,
            threshold: defaults::POOR_COOLING_TEMP_DELTA,
            eev_delta: 0,
            fan_delta: 200,
            compressor_delta: 200,
            reason: "Poor cooling → increasing RPM".to_string(),
        },
        ControlRuleConfig {
            name: "vibration_throttle".to_string(),
            signal: ControlSignal::Vibration,
            threshold: defaults::VIBRATION_THROTTLE,
            eev_delta: 0,
            fan_delta: -200,
            compressor_delta: -500,
            reason: "Vibration anomaly → safety throttle".to_string(),
        },
    ]
}
