//! Pipeline Coordinator - runs the five stages over one batch
//!
//! ```text
//! STAGE 1: Feature Engineer   (sorted samples → feature rows + drops)
//! STAGE 2: Anomaly Detector   (fit or reuse model → per-subsystem labels)
//! STAGE 3: Health Aggregator  (labels → 0-100 score)
//! STAGE 4: Risk Classifier    (score → tier + action)
//! STAGE 5: Control Resolver   (signals → bounded commands, every sample)
//! ```
//!
//! Data flows strictly forward; no stage revisits an earlier record.

use tracing::info;

use super::{PipelineError, PipelineSummary};
use crate::anomaly::AnomalyModel;
use crate::config::UnitConfig;
use crate::control::{ControlInputs, ControlResolver};
use crate::features::{sort_by_timestamp, FeatureEngineer};
use crate::health::HealthAggregator;
use crate::risk::RiskClassifier;
use crate::types::{DroppedRow, PipelineRow, Sample};

/// Everything one batch run produces.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// One row per surviving sample, in timestamp order
    pub rows: Vec<PipelineRow>,
    /// Samples excluded before detection, each still with a control command
    pub dropped: Vec<DroppedRow>,
    /// Model used for scoring (freshly fitted or the cached one)
    pub model: AnomalyModel,
    pub summary: PipelineSummary,
}

pub struct Pipeline {
    config: UnitConfig,
    engineer: FeatureEngineer,
    health: HealthAggregator,
    risk: RiskClassifier,
    control: ControlResolver,
}

impl Pipeline {
    pub fn new(config: &UnitConfig) -> Self {
        Self {
            config: config.clone(),
            engineer: FeatureEngineer::new(&config.features),
            health: HealthAggregator::from_config(config),
            risk: RiskClassifier::new(config.risk.clone()),
            control: ControlResolver::new(&config.control),
        }
    }

    pub fn config(&self) -> &UnitConfig {
        &self.config
    }

    /// Fit a fresh model on this batch and score it.
    pub fn run(&self, samples: Vec<Sample>) -> Result<PipelineOutput, PipelineError> {
        self.execute(samples, None)
    }

    /// Score this batch with a previously fitted model.
    pub fn run_with_model(
        &self,
        samples: Vec<Sample>,
        model: &AnomalyModel,
    ) -> Result<PipelineOutput, PipelineError> {
        model.ensure_compatible(&self.config)?;
        self.execute(samples, Some(model))
    }

    fn execute(
        &self,
        mut samples: Vec<Sample>,
        cached: Option<&AnomalyModel>,
    ) -> Result<PipelineOutput, PipelineError> {
        sort_by_timestamp(&mut samples);

        // STAGE 1
        let features = self.engineer.process(&samples)?;

        // STAGE 2
        let model = match cached {
            Some(m) => m.clone(),
            None => AnomalyModel::fit(&self.config, &features.rows),
        };
        let anomalies = model.score(&features.rows);

        // STAGES 3-5
        let rows: Vec<PipelineRow> = features
            .rows
            .into_iter()
            .zip(anomalies)
            .map(|(row, anomaly)| {
                let health = self.health.aggregate(&anomaly);
                let risk = self.risk.classify(health.health_score);
                let control = self.control.resolve_row(&row);
                PipelineRow {
                    row,
                    anomaly,
                    health,
                    risk,
                    control,
                }
            })
            .collect();

        let dropped: Vec<DroppedRow> = features
            .dropped
            .into_iter()
            .map(|d| {
                let previous = d.index.checked_sub(1).map(|p| &samples[p]);
                let inputs = ControlInputs::from_sample(&samples[d.index], previous);
                DroppedRow {
                    index: d.index,
                    timestamp: d.timestamp,
                    reason: d.reason,
                    control: self.control.resolve(&inputs),
                }
            })
            .collect();

        let summary = PipelineSummary::build(&self.config.unit.name, &rows, &dropped, &model);
        info!(
            rows = rows.len(),
            dropped = dropped.len(),
            "Pipeline run complete"
        );

        Ok(PipelineOutput {
            rows,
            dropped,
            model,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DropReason, RiskLevel};
    use chrono::{Duration, TimeZone, Utc};

    fn steady(n: usize) -> Vec<Sample> {
        let start = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).single().expect("valid");
        (0..n)
            .map(|i| {
                let wobble = (i as f64 * 0.37).sin();
                Sample::complete(
                    start + Duration::seconds(i as i64 * 10),
                    -18.0 + 0.2 * wobble,
                    -25.0 - 0.1 * wobble,
                    500.0 + 10.0 * wobble,
                    1200.0 + 5.0 * wobble,
                    1800.0 - 8.0 * wobble,
                    0.2 + 0.01 * wobble,
                )
            })
            .collect()
    }

    #[test]
    fn test_every_sample_gets_a_control_record() {
        let mut samples = steady(40);
        samples[10].compressor_rpm = Some(0.0);
        samples[20].power_watts = None;
        let out = Pipeline::new(&UnitConfig::default()).run(samples).expect("run");
        assert_eq!(out.rows.len() + out.dropped.len(), 40);
        assert_eq!(out.dropped.len(), 3);
        assert_eq!(out.dropped[0].reason, DropReason::FirstSample);
        assert_eq!(out.summary.input_samples, 40);
    }

    #[test]
    fn test_unsorted_batch_is_sorted_first() {
        let mut samples = steady(30);
        samples.reverse();
        let out = Pipeline::new(&UnitConfig::default()).run(samples).expect("run");
        assert_eq!(out.dropped[0].index, 0);
        assert!(out.rows.windows(2).all(|w| w[0].row.timestamp <= w[1].row.timestamp));
    }

    #[test]
    fn test_small_batch_is_all_normal() {
        let out = Pipeline::new(&UnitConfig::default()).run(steady(30)).expect("run");
        for r in &out.rows {
            assert_eq!(r.health.health_score, 100.0);
            assert_eq!(r.risk.risk_level, RiskLevel::Normal);
        }
        assert_eq!(out.summary.risk_distribution[&RiskLevel::Normal], out.rows.len());
        assert_eq!(out.summary.risk_distribution[&RiskLevel::Critical], 0);
    }

    #[test]
    fn test_cached_model_rejected_when_subsystems_change() {
        let config = UnitConfig::default();
        let out = Pipeline::new(&config).run(steady(150)).expect("run");

        let mut changed = config;
        changed.subsystems.remove(2);
        let err = Pipeline::new(&changed)
            .run_with_model(steady(150), &out.model)
            .expect_err("should fail");
        assert!(matches!(err, PipelineError::Model(_)));
    }
}
