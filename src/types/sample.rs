//! Raw telemetry sample types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One telemetry reading from the refrigeration unit.
///
/// Raw channels are optional: a cell that was empty, non-numeric or NaN in the
/// source is `None`. Samples are never mutated after ingestion; every derived
/// value lives in a separate record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Reading time (UTC). Accepts `ts` as the field name for JSON payloads.
    #[serde(alias = "ts")]
    pub timestamp: DateTime<Utc>,
    /// Cabinet temperature (°C)
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Evaporator temperature (°C)
    #[serde(default)]
    pub evap_temp: Option<f64>,
    /// Electrical power draw (W)
    #[serde(default)]
    pub power_watts: Option<f64>,
    /// Condenser/evaporator fan speed (RPM)
    #[serde(default)]
    pub fan_rpm: Option<f64>,
    /// Compressor speed (RPM)
    #[serde(default)]
    pub compressor_rpm: Option<f64>,
    /// Vibration level (g RMS)
    #[serde(default)]
    pub vibration: Option<f64>,
}

impl Sample {
    /// Build a sample with every channel present.
    pub fn complete(
        timestamp: DateTime<Utc>,
        temperature: f64,
        evap_temp: f64,
        power_watts: f64,
        fan_rpm: f64,
        compressor_rpm: f64,
        vibration: f64,
    ) -> Self {
        Self {
            timestamp,
            temperature: Some(temperature),
            evap_temp: Some(evap_temp),
            power_watts: Some(power_watts),
            fan_rpm: Some(fan_rpm),
            compressor_rpm: Some(compressor_rpm),
            vibration: Some(vibration),
        }
    }

    /// Resolve every raw channel, or name the first one that is missing or
    /// non-finite.
    pub fn readings(&self) -> Result<RawReadings, &'static str> {
        fn finite(value: Option<f64>, name: &'static str) -> Result<f64, &'static str> {
            match value {
                Some(v) if v.is_finite() => Ok(v),
                _ => Err(name),
            }
        }

        Ok(RawReadings {
            temperature: finite(self.temperature, "temperature")?,
            evap_temp: finite(self.evap_temp, "evap_temp")?,
            power_watts: finite(self.power_watts, "power_watts")?,
            fan_rpm: finite(self.fan_rpm, "fan_rpm")?,
            compressor_rpm: finite(self.compressor_rpm, "compressor_rpm")?,
            vibration: finite(self.vibration, "vibration")?,
        })
    }
}

/// Raw channels of a sample that passed the completeness check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawReadings {
    pub temperature: f64,
    pub evap_temp: f64,
    pub power_watts: f64,
    pub fan_rpm: f64,
    pub compressor_rpm: f64,
    pub vibration: f64,
}

/// Names of the raw input channels, in input-schema order.
pub const RAW_CHANNELS: [&str; 6] = [
    "temperature",
    "evap_temp",
    "power_watts",
    "fan_rpm",
    "compressor_rpm",
    "vibration",
];

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 10, 8, 0, 0).single().expect("valid timestamp")
    }

    #[test]
    fn test_readings_complete() {
        let s = Sample::complete(ts(), 4.0, -8.0, 600.0, 1200.0, 1800.0, 0.2);
        let r = s.readings().expect("complete sample");
        assert_eq!(r.temperature, 4.0);
        assert_eq!(r.compressor_rpm, 1800.0);
    }

    #[test]
    fn test_readings_reports_first_missing_channel() {
        let mut s = Sample::complete(ts(), 4.0, -8.0, 600.0, 1200.0, 1800.0, 0.2);
        s.power_watts = None;
        s.vibration = Some(f64::NAN);
        assert_eq!(s.readings(), Err("power_watts"));
    }

    #[test]
    fn test_json_accepts_ts_alias_and_missing_fields() {
        let json = r#"{"ts":"2025-01-10T08:00:00Z","temperature":3.5,"power_watts":410.0}"#;
        let s: Sample = serde_json::from_str(json).expect("valid payload");
        assert_eq!(s.timestamp, ts());
        assert_eq!(s.temperature, Some(3.5));
        assert_eq!(s.fan_rpm, None);
    }
}
