//! Batch summary: risk distribution, per-subsystem counts, drops and
//! pseudo-accuracy of the global detector.

use std::collections::BTreeMap;

use serde::Serialize;
use statrs::statistics::Statistics;
use tracing::info;

use crate::anomaly::{linear_quantile, AnomalyModel};
use crate::types::{DroppedRow, PipelineRow, RiskLevel, GLOBAL_SUBSYSTEM};

/// Fraction of lowest global scores treated as pseudo-anomalies.
pub const PSEUDO_LABEL_QUANTILE: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubsystemSummary {
    pub subsystem: String,
    pub label_column: String,
    pub anomalies: usize,
    pub fail_closed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineSummary {
    pub unit: String,
    pub input_samples: usize,
    /// Input records rejected at ingestion (bad timestamp, malformed line)
    pub rejected_at_ingest: usize,
    pub surviving_rows: usize,
    pub dropped_rows: usize,
    /// Drop counts keyed by reason text
    pub drop_reasons: BTreeMap<String, usize>,
    /// Row count per risk tier (every tier present, possibly 0)
    pub risk_distribution: BTreeMap<RiskLevel, usize>,
    pub subsystems: Vec<SubsystemSummary>,
    pub mean_health_score: Option<f64>,
    /// % agreement between the global label and score < 5% quantile
    pub pseudo_accuracy: Option<f64>,
}

impl PipelineSummary {
    pub fn build(
        unit: &str,
        rows: &[PipelineRow],
        dropped: &[DroppedRow],
        model: &AnomalyModel,
    ) -> Self {
        let mut drop_reasons = BTreeMap::new();
        for d in dropped {
            *drop_reasons.entry(d.reason.to_string()).or_insert(0) += 1;
        }

        let mut risk_distribution: BTreeMap<RiskLevel, usize> =
            RiskLevel::ALL.iter().map(|&l| (l, 0)).collect();
        for r in rows {
            *risk_distribution.entry(r.risk.risk_level).or_insert(0) += 1;
        }

        let subsystems = model
            .subsystems
            .iter()
            .map(|s| SubsystemSummary {
                subsystem: s.id.clone(),
                label_column: s.label_column.clone(),
                anomalies: rows
                    .iter()
                    .filter(|r| r.anomaly.label(&s.id).is_some_and(|l| l.is_anomaly()))
                    .count(),
                fail_closed: s.model.is_fail_closed(),
            })
            .collect();

        let mean_health_score = if rows.is_empty() {
            None
        } else {
            Some(rows.iter().map(|r| r.health.health_score).mean())
        };

        Self {
            unit: unit.to_string(),
            input_samples: rows.len() + dropped.len(),
            rejected_at_ingest: 0,
            surviving_rows: rows.len(),
            dropped_rows: dropped.len(),
            drop_reasons,
            risk_distribution,
            subsystems,
            mean_health_score,
            pseudo_accuracy: pseudo_accuracy(rows),
        }
    }

    pub fn log(&self) {
        info!(
            unit = %self.unit,
            input = self.input_samples,
            surviving = self.surviving_rows,
            dropped = self.dropped_rows,
            rejected_at_ingest = self.rejected_at_ingest,
            "Pipeline summary"
        );
        for (reason, count) in &self.drop_reasons {
            info!(reason = %reason, count, "Dropped");
        }
        for (level, count) in &self.risk_distribution {
            info!(risk_level = %level, count, "Risk distribution");
        }
        for s in &self.subsystems {
            info!(
                subsystem = %s.subsystem,
                anomalies = s.anomalies,
                fail_closed = s.fail_closed,
                "Subsystem anomalies"
            );
        }
        if let Some(h) = self.mean_health_score {
            info!(mean_health_score = format!("{h:.2}"), "Health");
        }
        if let Some(acc) = self.pseudo_accuracy {
            info!(pseudo_accuracy = format!("{acc:.2}%"), "Global detector agreement");
        }
    }
}

/// Agreement between the global label and a score-quantile pseudo label.
fn pseudo_accuracy(rows: &[PipelineRow]) -> Option<f64> {
    let scored: Vec<(f64, bool)> = rows
        .iter()
        .filter_map(|r| {
            let score = r.anomaly.anomaly_score?;
            let label = r.anomaly.label(GLOBAL_SUBSYSTEM)?;
            Some((score, label.is_anomaly()))
        })
        .collect();
    if scored.is_empty() {
        return None;
    }

    let threshold = linear_quantile(
        scored.iter().map(|(s, _)| *s).collect(),
        PSEUDO_LABEL_QUANTILE,
    );
    let agree = scored
        .iter()
        .filter(|(score, anomalous)| (*score < threshold) == *anomalous)
        .count();
    Some(100.0 * agree as f64 / scored.len() as f64)
}
