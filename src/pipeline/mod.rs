//! Batch Processing Pipeline
//!
//! ```text
//! Sample batch → Feature Engineer → Anomaly Detector → Health Aggregator
//!              → Risk Classifier → Control Resolver → PipelineOutput
//! ```
//!
//! Single-threaded batch model: each stage consumes the whole output of the
//! previous one. Per-row problems become drop records; only an out-of-order
//! batch or an incompatible cached model is an error.

mod coordinator;
mod summary;

pub use coordinator::{Pipeline, PipelineOutput};
pub use summary::{PipelineSummary, SubsystemSummary, PSEUDO_LABEL_QUANTILE};

use thiserror::Error;

use crate::anomaly::AnomalyError;
use crate::features::FeatureError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Feature engineering failed: {0}")]
    Feature(#[from] FeatureError),

    #[error("Anomaly model unusable: {0}")]
    Model(#[from] AnomalyError),
}
