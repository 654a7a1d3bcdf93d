//! System-wide default constants.
//!
//! Centralises the baseline values every config section falls back to.
//! Grouped by pipeline stage for easy discovery.

// ============================================================================
// Feature Engineer
// ============================================================================

/// Vibration above this level sets `vibration_flag`.
pub const VIBRATION_FLAG_THRESHOLD: f64 = 0.0;

// ============================================================================
// Anomaly Detector
// ============================================================================

/// Number of isolation trees per subsystem.
pub const N_ESTIMATORS: usize = 100;

/// Expected outlier fraction.
pub const CONTAMINATION: f64 = 0.05;

/// Rows drawn (without replacement) to grow each tree.
pub const MAX_SAMPLES: usize = 256;

/// Random seed shared by every subsystem detector.
pub const DETECTOR_SEED: u64 = 42;

/// A subsystem detector needs strictly more rows than this to fit.
pub const MIN_FIT_ROWS: usize = N_ESTIMATORS;

/// Version stamp of the default subsystem list.
pub const SUBSYSTEMS_VERSION: u32 = 1;

// ============================================================================
// Risk Classifier
// ============================================================================

/// Health score at or above this is NORMAL.
pub const RISK_NORMAL_MIN: f64 = 80.0;

/// Health score at or above this (and below NORMAL) is WARNING.
pub const RISK_WARNING_MIN: f64 = 50.0;

pub const ACTION_NORMAL: &str = "No action needed";
pub const ACTION_WARNING: &str = "Monitor system & schedule inspection";
pub const ACTION_CRITICAL: &str = "Immediate maintenance required";

// ============================================================================
// Control Resolver
// ============================================================================

pub const DEFAULT_EEV_STEP: i32 = 50;
pub const DEFAULT_FAN_RPM: i32 = 1200;
pub const DEFAULT_COMPRESSOR_RPM: i32 = 1800;

pub const EEV_STEP_MIN: i32 = 20;
pub const EEV_STEP_MAX: i32 = 100;
pub const FAN_RPM_MIN: i32 = 800;
pub const FAN_RPM_MAX: i32 = 2000;
pub const COMPRESSOR_RPM_MIN: i32 = 1000;
pub const COMPRESSOR_RPM_MAX: i32 = 2500;

/// Reason reported when no rule fires.
pub const NORMAL_OPERATION_REASON: &str = "Normal operation";

/// Power draw above this reduces compressor load (W).
pub const HIGH_POWER_WATTS: f64 = 900.0;
/// Superheat above this opens the EEV (°C).
pub const HIGH_SUPERHEAT: f64 = 12.0;
/// Temperature rise per sample above this boosts cooling (°C).
pub const POOR_COOLING_TEMP_DELTA: f64 = 3.0;
/// Vibration above this throttles for safety (g).
pub const VIBRATION_THROTTLE: f64 = 1.5;

// ============================================================================
// Ingestion
// ============================================================================

/// Default config file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "unit_config.toml";

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "FROSTGUARD_CONFIG";
