//! FrostGuard: Refrigeration Telemetry Intelligence
//!
//! Batch pipeline turning freezer/refrigerator telemetry into diagnostics,
//! health scores and actuator commands.
//!
//! ## Architecture
//!
//! - **Feature Engineer**: superheat, temperature rate, efficiency ratios
//! - **Anomaly Detector**: per-subsystem isolation forests (fit once, score many)
//! - **Health Aggregator**: anomaly labels → 0-100 score over a fixed subsystem set
//! - **Risk Classifier**: score → NORMAL / WARNING / CRITICAL + action
//! - **Control Resolver**: ordered rule fold → clamped EEV / fan / compressor commands

pub mod acquisition;
pub mod anomaly;
pub mod config;
pub mod control;
pub mod export;
pub mod features;
pub mod health;
pub mod pipeline;
pub mod risk;
pub mod types;

// Re-export unit configuration
pub use config::UnitConfig;

// Re-export commonly used types
pub use types::{
    AnomalyLabel, AnomalyRecord, ControlRecord, DropReason, FeatureRow, HealthRecord,
    PipelineRow, RiskLevel, RiskRecord, Sample,
};

// Re-export stages
pub use anomaly::{AnomalyError, AnomalyModel};
pub use control::{ControlInputs, ControlResolver};
pub use features::{FeatureEngineer, FeatureError};
pub use health::HealthAggregator;
pub use pipeline::{Pipeline, PipelineError, PipelineOutput, PipelineSummary};
pub use risk::RiskClassifier;
