//! Shared data structures for the refrigeration telemetry pipeline
//!
//! Stage by stage:
//! - Ingest: `Sample` (raw channels, possibly missing)
//! - Feature Engineer: `FeatureRow` / `FeatureSet`, `DroppedSample`
//! - Anomaly Detector: `AnomalyRecord` (per-subsystem labels + global score)
//! - Health Aggregator / Risk Classifier: `HealthRecord`, `RiskRecord`
//! - Control Resolver: `ControlRecord`
//! - Output: `PipelineRow`, `DroppedRow`

mod sample;
mod features;
mod anomaly;
mod health;
mod control;
mod output;

pub use sample::*;
pub use features::*;
pub use anomaly::*;
pub use health::*;
pub use control::*;
pub use output::*;
