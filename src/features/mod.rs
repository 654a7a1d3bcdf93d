//! Feature Engineer - derives diagnostic features from raw telemetry
//!
//! Pure transform over a timestamp-sorted batch of `Sample`s. Each surviving
//! sample yields one `FeatureRow`; samples that cannot produce a complete
//! feature set are listed in `FeatureOutput::dropped` with their reason and
//! never reach the detector.
//!
//! Drop policy (blocking, not imputing):
//! - any raw channel missing or non-finite
//! - first sample of the batch (no temp_delta)
//! - predecessor without a usable temperature
//! - compressor_rpm = 0 or power_watts = 0 (undefined ratio)

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::FeatureConfig;
use crate::types::{DropReason, DroppedSample, FeatureRow, FeatureSet, RawReadings, Sample};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error, PartialEq)]
pub enum FeatureError {
    #[error("Samples not sorted by timestamp: row {index} ({current}) is earlier than the row before it ({previous})")]
    Unsorted {
        index: usize,
        previous: chrono::DateTime<chrono::Utc>,
        current: chrono::DateTime<chrono::Utc>,
    },
}

// ============================================================================
// Output
// ============================================================================

/// Feature table plus the samples excluded from it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureOutput {
    pub rows: Vec<FeatureRow>,
    pub dropped: Vec<DroppedSample>,
}

impl FeatureOutput {
    /// Drop counts keyed by reason, in a stable order.
    pub fn drop_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for d in &self.dropped {
            *counts.entry(d.reason.to_string()).or_insert(0) += 1;
        }
        counts
    }
}

/// Stable sort by timestamp. Callers must sort before `FeatureEngineer::process`.
pub fn sort_by_timestamp(samples: &mut [Sample]) {
    samples.sort_by_key(|s| s.timestamp);
}

// ============================================================================
// Feature Engineer
// ============================================================================

#[derive(Debug, Clone)]
pub struct FeatureEngineer {
    vibration_flag_threshold: f64,
}

impl Default for FeatureEngineer {
    fn default() -> Self {
        Self::new(&FeatureConfig::default())
    }
}

impl FeatureEngineer {
    pub fn new(config: &FeatureConfig) -> Self {
        Self {
            vibration_flag_threshold: config.vibration_flag_threshold,
        }
    }

    /// Derive features for a sorted batch.
    ///
    /// Fails only when the batch is out of order; per-row problems become
    /// drop records.
    pub fn process(&self, samples: &[Sample]) -> Result<FeatureOutput, FeatureError> {
        if let Some(i) = samples
            .windows(2)
            .position(|w| w[1].timestamp < w[0].timestamp)
        {
            return Err(FeatureError::Unsorted {
                index: i + 1,
                previous: samples[i].timestamp,
                current: samples[i + 1].timestamp,
            });
        }

        let mut output = FeatureOutput {
            rows: Vec::with_capacity(samples.len().saturating_sub(1)),
            dropped: Vec::new(),
        };

        for (index, sample) in samples.iter().enumerate() {
            let previous = index.checked_sub(1).map(|p| &samples[p]);
            match self.derive(sample, previous) {
                Ok((raw, features)) => output.rows.push(FeatureRow {
                    index,
                    timestamp: sample.timestamp,
                    raw,
                    features,
                }),
                Err(reason) => {
                    debug!(index, timestamp = %sample.timestamp, %reason, "Sample dropped");
                    output.dropped.push(DroppedSample {
                        index,
                        timestamp: sample.timestamp,
                        reason,
                    });
                }
            }
        }

        for (reason, count) in output.drop_counts() {
            info!(reason = %reason, count, "Feature engineer dropped samples");
        }
        info!(
            input = samples.len(),
            surviving = output.rows.len(),
            "Feature engineering complete"
        );

        Ok(output)
    }

    fn derive(
        &self,
        sample: &Sample,
        previous: Option<&Sample>,
    ) -> Result<(RawReadings, FeatureSet), DropReason> {
        let raw = sample.readings().map_err(DropReason::MissingField)?;

        let previous = previous.ok_or(DropReason::FirstSample)?;
        let prev_temp = previous
            .temperature
            .filter(|t| t.is_finite())
            .ok_or(DropReason::PreviousTemperatureMissing)?;

        if raw.compressor_rpm == 0.0 {
            return Err(DropReason::ZeroDivisor("compressor_rpm"));
        }
        if raw.power_watts == 0.0 {
            return Err(DropReason::ZeroDivisor("power_watts"));
        }

        let features = FeatureSet {
            superheat: finite_or_zero(raw.temperature - raw.evap_temp),
            temp_delta: finite_or_zero(raw.temperature - prev_temp),
            power_per_rpm: finite_or_zero(raw.power_watts / raw.compressor_rpm),
            fan_efficiency: finite_or_zero(raw.fan_rpm / raw.power_watts),
            vibration_flag: u8::from(raw.vibration > self.vibration_flag_threshold),
        };

        Ok((raw, features))
    }
}

/// Overflowing arithmetic yields 0 instead of ±inf.
fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn series(rows: &[(f64, f64, f64, f64, f64, f64)]) -> Vec<Sample> {
        let start = Utc.with_ymd_and_hms(2025, 1, 10, 8, 0, 0).single().expect("valid");
        rows.iter()
            .enumerate()
            .map(|(i, &(t, e, p, f, c, v))| {
                Sample::complete(start + Duration::seconds(i as i64 * 5), t, e, p, f, c, v)
            })
            .collect()
    }

    #[test]
    fn test_first_sample_dropped() {
        let samples = series(&[
            (-18.0, -25.0, 500.0, 1200.0, 1800.0, 0.2),
            (-17.5, -25.0, 520.0, 1200.0, 1800.0, 0.0),
        ]);
        let out = FeatureEngineer::default().process(&samples).expect("sorted");
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.dropped[0].reason, DropReason::FirstSample);

        let row = &out.rows[0];
        assert_eq!(row.index, 1);
        assert_eq!(row.features.superheat, 7.5);
        assert_eq!(row.features.temp_delta, 0.5);
        assert_eq!(row.features.power_per_rpm, 520.0 / 1800.0);
        assert_eq!(row.features.fan_efficiency, 1200.0 / 520.0);
        assert_eq!(row.features.vibration_flag, 0);
    }

    #[test]
    fn test_zero_divisors_dropped() {
        let samples = series(&[
            (-18.0, -25.0, 500.0, 1200.0, 1800.0, 0.2),
            (-18.0, -25.0, 500.0, 1200.0, 0.0, 0.2),
            (-18.0, -25.0, 0.0, 1200.0, 1800.0, 0.2),
            (-18.0, -25.0, 500.0, 1200.0, 1800.0, 0.2),
        ]);
        let out = FeatureEngineer::default().process(&samples).expect("sorted");
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].index, 3);
        assert_eq!(out.dropped[1].reason, DropReason::ZeroDivisor("compressor_rpm"));
        assert_eq!(out.dropped[2].reason, DropReason::ZeroDivisor("power_watts"));
    }

    #[test]
    fn test_missing_field_and_missing_predecessor() {
        let mut samples = series(&[
            (-18.0, -25.0, 500.0, 1200.0, 1800.0, 0.2),
            (-18.0, -25.0, 500.0, 1200.0, 1800.0, 0.2),
            (-18.0, -25.0, 500.0, 1200.0, 1800.0, 0.2),
        ]);
        samples[1].temperature = None;
        let out = FeatureEngineer::default().process(&samples).expect("sorted");
        assert!(out.rows.is_empty());
        assert_eq!(out.dropped[1].reason, DropReason::MissingField("temperature"));
        assert_eq!(out.dropped[2].reason, DropReason::PreviousTemperatureMissing);
    }

    #[test]
    fn test_vibration_flag() {
        let samples = series(&[
            (-18.0, -25.0, 500.0, 1200.0, 1800.0, 0.0),
            (-18.0, -25.0, 500.0, 1200.0, 1800.0, 0.01),
        ]);
        let out = FeatureEngineer::default().process(&samples).expect("sorted");
        assert_eq!(out.rows[0].features.vibration_flag, 1);
    }

    #[test]
    fn test_overflow_replaced_with_zero() {
        let samples = series(&[
            (0.0, 0.0, 1.0, 1.0, 1.0, 0.0),
            (0.0, 0.0, f64::MAX, 1.0, 1e-300, 0.0),
        ]);
        let out = FeatureEngineer::default().process(&samples).expect("sorted");
        assert_eq!(out.rows[0].features.power_per_rpm, 0.0);
    }

    #[test]
    fn test_unsorted_input_rejected() {
        let mut samples = series(&[
            (-18.0, -25.0, 500.0, 1200.0, 1800.0, 0.2),
            (-18.0, -25.0, 500.0, 1200.0, 1800.0, 0.2),
        ]);
        samples.swap(0, 1);
        let err = FeatureEngineer::default().process(&samples).expect_err("should fail");
        assert!(matches!(err, FeatureError::Unsorted { index: 1, .. }));

        sort_by_timestamp(&mut samples);
        assert!(FeatureEngineer::default().process(&samples).is_ok());
    }

    #[test]
    fn test_rerun_is_bit_identical() {
        let samples = series(&[
            (-18.0, -25.1, 503.3, 1210.0, 1795.0, 0.13),
            (-17.7, -24.9, 611.9, 1190.0, 1802.0, 0.21),
            (-17.9, -25.3, 498.2, 1205.0, 1799.0, 0.08),
        ]);
        let engineer = FeatureEngineer::default();
        let a = engineer.process(&samples).expect("sorted");
        let b = engineer.process(&samples).expect("sorted");
        assert_eq!(a.rows.len(), b.rows.len());
        for (x, y) in a.rows.iter().zip(&b.rows) {
            assert_eq!(x.features.superheat.to_bits(), y.features.superheat.to_bits());
            assert_eq!(x.features.temp_delta.to_bits(), y.features.temp_delta.to_bits());
            assert_eq!(x.features.power_per_rpm.to_bits(), y.features.power_per_rpm.to_bits());
            assert_eq!(x.features.fan_efficiency.to_bits(), y.features.fan_efficiency.to_bits());
        }
    }
}
