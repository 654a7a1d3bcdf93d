//! Anomaly detection result types

use serde::{Deserialize, Serialize};

/// Subsystem id whose detector also reports a continuous anomaly score.
pub const GLOBAL_SUBSYSTEM: &str = "global";

/// Binary label assigned by a subsystem detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AnomalyLabel {
    #[default]
    Normal,
    Anomaly,
}

impl AnomalyLabel {
    pub fn is_anomaly(self) -> bool {
        matches!(self, AnomalyLabel::Anomaly)
    }
}

impl std::fmt::Display for AnomalyLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnomalyLabel::Normal => write!(f, "Normal"),
            AnomalyLabel::Anomaly => write!(f, "Anomaly"),
        }
    }
}

/// Label produced by one subsystem for one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubsystemLabel {
    /// Subsystem id (e.g. "global", "temperature")
    pub subsystem: String,
    pub label: AnomalyLabel,
}

/// Per-row output of the anomaly detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    /// One label per configured subsystem, in configuration order
    pub labels: Vec<SubsystemLabel>,
    /// Global decision value; lower = more anomalous. `None` when no global
    /// subsystem is configured.
    pub anomaly_score: Option<f64>,
}

impl AnomalyRecord {
    /// Label for a given subsystem id.
    pub fn label(&self, subsystem: &str) -> Option<AnomalyLabel> {
        self.labels
            .iter()
            .find(|l| l.subsystem == subsystem)
            .map(|l| l.label)
    }
}
