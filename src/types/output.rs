//! Pipeline output rows

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{
    AnomalyRecord, ControlRecord, DropReason, FeatureRow, HealthRecord, RiskRecord,
};

/// One surviving sample with every derived record attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineRow {
    #[serde(flatten)]
    pub row: FeatureRow,
    pub anomaly: AnomalyRecord,
    pub health: HealthRecord,
    pub risk: RiskRecord,
    pub control: ControlRecord,
}

/// A sample excluded before detection. It still carries a control command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedRow {
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub reason: DropReason,
    pub control: ControlRecord,
}
