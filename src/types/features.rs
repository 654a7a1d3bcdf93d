//! Engineered feature types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::RawReadings;

/// Diagnostic features derived from one sample and its predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    /// temperature − evap_temp (°C)
    pub superheat: f64,
    /// temperature(t) − temperature(t−1) (°C)
    pub temp_delta: f64,
    /// power_watts / compressor_rpm (W per RPM)
    pub power_per_rpm: f64,
    /// fan_rpm / power_watts (RPM per W)
    pub fan_efficiency: f64,
    /// 1 when vibration is above the flag threshold, else 0
    pub vibration_flag: u8,
}

/// A sample that produced a complete feature set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    /// Position of the sample in the sorted input batch
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub raw: RawReadings,
    pub features: FeatureSet,
}

impl FeatureRow {
    /// Numeric value of a column, raw or derived.
    pub fn value(&self, column: FeatureColumn) -> f64 {
        match column {
            FeatureColumn::Temperature => self.raw.temperature,
            FeatureColumn::EvapTemp => self.raw.evap_temp,
            FeatureColumn::PowerWatts => self.raw.power_watts,
            FeatureColumn::FanRpm => self.raw.fan_rpm,
            FeatureColumn::CompressorRpm => self.raw.compressor_rpm,
            FeatureColumn::Vibration => self.raw.vibration,
            FeatureColumn::Superheat => self.features.superheat,
            FeatureColumn::TempDelta => self.features.temp_delta,
            FeatureColumn::PowerPerRpm => self.features.power_per_rpm,
            FeatureColumn::FanEfficiency => self.features.fan_efficiency,
            FeatureColumn::VibrationFlag => f64::from(self.features.vibration_flag),
        }
    }
}

/// Every numeric column a detector can be configured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureColumn {
    Temperature,
    EvapTemp,
    PowerWatts,
    FanRpm,
    CompressorRpm,
    Vibration,
    Superheat,
    TempDelta,
    PowerPerRpm,
    FanEfficiency,
    VibrationFlag,
}

impl FeatureColumn {
    pub const ALL: [FeatureColumn; 11] = [
        FeatureColumn::Temperature,
        FeatureColumn::EvapTemp,
        FeatureColumn::PowerWatts,
        FeatureColumn::FanRpm,
        FeatureColumn::CompressorRpm,
        FeatureColumn::Vibration,
        FeatureColumn::Superheat,
        FeatureColumn::TempDelta,
        FeatureColumn::PowerPerRpm,
        FeatureColumn::FanEfficiency,
        FeatureColumn::VibrationFlag,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FeatureColumn::Temperature => "temperature",
            FeatureColumn::EvapTemp => "evap_temp",
            FeatureColumn::PowerWatts => "power_watts",
            FeatureColumn::FanRpm => "fan_rpm",
            FeatureColumn::CompressorRpm => "compressor_rpm",
            FeatureColumn::Vibration => "vibration",
            FeatureColumn::Superheat => "superheat",
            FeatureColumn::TempDelta => "temp_delta",
            FeatureColumn::PowerPerRpm => "power_per_rpm",
            FeatureColumn::FanEfficiency => "fan_efficiency",
            FeatureColumn::VibrationFlag => "vibration_flag",
        }
    }
}

impl std::fmt::Display for FeatureColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureColumn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == name)
            .ok_or_else(|| format!("unknown feature column '{name}'"))
    }
}

/// Why a sample was excluded from the feature table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "field", rename_all = "snake_case")]
pub enum DropReason {
    /// A raw channel is absent, non-numeric or non-finite
    MissingField(&'static str),
    /// First sample of the batch has no predecessor for temp_delta
    FirstSample,
    /// The preceding sample has no usable temperature
    PreviousTemperatureMissing,
    /// A ratio divisor is zero
    ZeroDivisor(&'static str),
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropReason::MissingField(name) => write!(f, "missing field: {name}"),
            DropReason::FirstSample => write!(f, "first sample (no temp_delta)"),
            DropReason::PreviousTemperatureMissing => {
                write!(f, "previous temperature missing (no temp_delta)")
            }
            DropReason::ZeroDivisor(name) => write!(f, "zero divisor: {name}"),
        }
    }
}

/// A sample excluded by the feature engineer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedSample {
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub reason: DropReason,
}
