//! Anomaly Detector - per-subsystem isolation forests
//!
//! Each configured subsystem (global, temperature, power, rpm, vibration by
//! default) gets its own unsupervised outlier model fitted over the whole
//! batch. A subsystem that cannot be fitted meaningfully fails closed and
//! labels every row Normal; the rest of the pipeline is unaffected.

mod detector;
mod isolation_forest;

pub use detector::*;
pub use isolation_forest::{average_path_length, linear_quantile, ForestParams, IsolationForest};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnomalyError {
    #[error("Model I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Model serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Model schema version {found} does not match expected {expected}")]
    SchemaMismatch { found: u32, expected: u32 },

    #[error("Model fitted for subsystems_version {model}, config has {config}")]
    SubsystemsVersionMismatch { model: u32, config: u32 },

    #[error("Model subsystems {model:?} differ from configured {config:?}")]
    SubsystemMismatch { model: Vec<String>, config: Vec<String> },
}
