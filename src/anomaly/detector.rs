//! Per-subsystem anomaly model: fit once, score many

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::isolation_forest::{ForestParams, IsolationForest};
use super::AnomalyError;
use crate::config::{DetectorConfig, SubsystemConfig, UnitConfig};
use crate::types::{
    AnomalyLabel, AnomalyRecord, FeatureColumn, FeatureRow, SubsystemLabel, GLOBAL_SUBSYSTEM,
};

/// Schema version for persisted models.
pub const MODEL_SCHEMA_VERSION: u32 = 1;

// ============================================================================
// Fail-Closed Reasons
// ============================================================================

/// Why a subsystem detector labels every row Normal instead of fitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailClosedReason {
    /// A configured column name does not exist
    UnknownColumn { column: String },
    /// A configured column holds non-finite values
    NonFiniteColumn { column: String },
    /// Too few rows for the ensemble to fit meaningfully
    InsufficientRows { rows: usize, required: usize },
    /// contamination × rows rounds down to zero outliers
    ContaminationBelowOneRow { rows: usize, contamination: f64 },
    /// Every configured column is constant
    ZeroVariance,
}

impl std::fmt::Display for FailClosedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailClosedReason::UnknownColumn { column } => write!(f, "unknown column '{column}'"),
            FailClosedReason::NonFiniteColumn { column } => {
                write!(f, "column '{column}' has non-finite values")
            }
            FailClosedReason::InsufficientRows { rows, required } => {
                write!(f, "{rows} rows (need more than {required})")
            }
            FailClosedReason::ContaminationBelowOneRow { rows, contamination } => write!(
                f,
                "contamination {contamination} × {rows} rows expects no outliers"
            ),
            FailClosedReason::ZeroVariance => write!(f, "all columns have zero variance"),
        }
    }
}

// ============================================================================
// Subsystem Model
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SubsystemModel {
    Fitted {
        columns: Vec<FeatureColumn>,
        forest: IsolationForest,
    },
    FailClosed {
        reason: FailClosedReason,
    },
}

impl SubsystemModel {
    fn fit(subsystem: &SubsystemConfig, detector: &DetectorConfig, rows: &[FeatureRow]) -> Self {
        match Self::try_fit(subsystem, detector, rows) {
            Ok(model) => model,
            Err(reason) => {
                warn!(subsystem = %subsystem.id, reason = %reason, "Detector failed closed, all rows Normal");
                SubsystemModel::FailClosed { reason }
            }
        }
    }

    fn try_fit(
        subsystem: &SubsystemConfig,
        detector: &DetectorConfig,
        rows: &[FeatureRow],
    ) -> Result<Self, FailClosedReason> {
        let columns = subsystem
            .features
            .iter()
            .map(|name| {
                name.parse::<FeatureColumn>()
                    .map_err(|_| FailClosedReason::UnknownColumn { column: name.clone() })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let matrix = project(rows, &columns);
        for (i, column) in columns.iter().enumerate() {
            if matrix.iter().any(|x| !x[i].is_finite()) {
                return Err(FailClosedReason::NonFiniteColumn {
                    column: column.to_string(),
                });
            }
        }

        if rows.len() <= detector.min_fit_rows {
            return Err(FailClosedReason::InsufficientRows {
                rows: rows.len(),
                required: detector.min_fit_rows,
            });
        }

        if (detector.contamination * rows.len() as f64).floor() < 1.0 {
            return Err(FailClosedReason::ContaminationBelowOneRow {
                rows: rows.len(),
                contamination: detector.contamination,
            });
        }

        let varying = (0..columns.len()).any(|i| matrix.iter().any(|x| x[i] != matrix[0][i]));
        if !varying {
            return Err(FailClosedReason::ZeroVariance);
        }

        let forest = IsolationForest::fit(
            &matrix,
            ForestParams {
                n_estimators: detector.n_estimators,
                max_samples: detector.max_samples,
                contamination: detector.contamination,
                seed: detector.seed,
            },
        );
        debug!(subsystem = %subsystem.id, offset = forest.offset(), "Subsystem forest fitted");
        Ok(SubsystemModel::Fitted { columns, forest })
    }

    /// Decision values for each row; fail-closed models report 0.0 (Normal).
    fn decisions(&self, rows: &[FeatureRow]) -> Vec<f64> {
        match self {
            SubsystemModel::Fitted { columns, forest } => project(rows, columns)
                .iter()
                .map(|x| forest.decision_function(x))
                .collect(),
            SubsystemModel::FailClosed { .. } => vec![0.0; rows.len()],
        }
    }

    pub fn is_fail_closed(&self) -> bool {
        matches!(self, SubsystemModel::FailClosed { .. })
    }
}

fn project(rows: &[FeatureRow], columns: &[FeatureColumn]) -> Vec<Vec<f64>> {
    rows.iter()
        .map(|r| columns.iter().map(|&c| r.value(c)).collect())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedSubsystem {
    pub id: String,
    pub label_column: String,
    pub model: SubsystemModel,
}

// ============================================================================
// Anomaly Model
// ============================================================================

/// One fitted detector per configured subsystem.
///
/// Two-phase contract: `fit` on a historical batch, then `score` any number
/// of batches without refitting. Persist with `save_to_file` to reuse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyModel {
    pub schema_version: u32,
    pub subsystems_version: u32,
    pub subsystems: Vec<FittedSubsystem>,
}

impl AnomalyModel {
    /// Fit every configured subsystem over the full batch.
    ///
    /// Never fails: degenerate subsystems fall back to all-Normal.
    pub fn fit(config: &UnitConfig, rows: &[FeatureRow]) -> Self {
        let subsystems: Vec<FittedSubsystem> = config
            .subsystems
            .iter()
            .map(|s| FittedSubsystem {
                id: s.id.clone(),
                label_column: s.label_column.clone(),
                model: SubsystemModel::fit(s, &config.detector, rows),
            })
            .collect();

        let fitted = subsystems.iter().filter(|s| !s.model.is_fail_closed()).count();
        info!(
            rows = rows.len(),
            fitted,
            fail_closed = subsystems.len() - fitted,
            "Anomaly model fitted"
        );

        Self {
            schema_version: MODEL_SCHEMA_VERSION,
            subsystems_version: config.subsystems_version,
            subsystems,
        }
    }

    /// Label every row for every subsystem.
    pub fn score(&self, rows: &[FeatureRow]) -> Vec<AnomalyRecord> {
        let decisions: Vec<Vec<f64>> = self.subsystems.iter().map(|s| s.model.decisions(rows)).collect();
        let global = self.subsystems.iter().position(|s| s.id == GLOBAL_SUBSYSTEM);

        (0..rows.len())
            .map(|i| AnomalyRecord {
                labels: self
                    .subsystems
                    .iter()
                    .zip(&decisions)
                    .map(|(s, d)| SubsystemLabel {
                        subsystem: s.id.clone(),
                        label: if d[i] < 0.0 {
                            AnomalyLabel::Anomaly
                        } else {
                            AnomalyLabel::Normal
                        },
                    })
                    .collect(),
                anomaly_score: global.map(|g| decisions[g][i]),
            })
            .collect()
    }

    /// Reject a cached model fitted against a different subsystem list.
    pub fn ensure_compatible(&self, config: &UnitConfig) -> Result<(), AnomalyError> {
        if self.schema_version != MODEL_SCHEMA_VERSION {
            return Err(AnomalyError::SchemaMismatch {
                found: self.schema_version,
                expected: MODEL_SCHEMA_VERSION,
            });
        }
        if self.subsystems_version != config.subsystems_version {
            return Err(AnomalyError::SubsystemsVersionMismatch {
                model: self.subsystems_version,
                config: config.subsystems_version,
            });
        }
        let model_ids: Vec<String> = self.subsystems.iter().map(|s| s.id.clone()).collect();
        let config_ids = config.subsystem_ids();
        if model_ids != config_ids {
            return Err(AnomalyError::SubsystemMismatch {
                model: model_ids,
                config: config_ids,
            });
        }
        Ok(())
    }

    /// Subsystem ids in label order.
    pub fn subsystem_ids(&self) -> Vec<&str> {
        self.subsystems.iter().map(|s| s.id.as_str()).collect()
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Save the fitted model as JSON.
    pub fn save_to_file(&self, path: &Path) -> Result<(), AnomalyError> {
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), subsystems = self.subsystems.len(), "Anomaly model saved");
        Ok(())
    }

    /// Load a model saved by `save_to_file`.
    pub fn load_from_file(path: &Path) -> Result<Self, AnomalyError> {
        let json = std::fs::read_to_string(path)?;
        let model: Self = serde_json::from_str(&json)?;
        if model.schema_version != MODEL_SCHEMA_VERSION {
            return Err(AnomalyError::SchemaMismatch {
                found: model.schema_version,
                expected: MODEL_SCHEMA_VERSION,
            });
        }
        info!(path = %path.display(), subsystems = model.subsystems.len(), "Anomaly model loaded");
        Ok(model)
    }
}
