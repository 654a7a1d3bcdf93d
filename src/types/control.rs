//! Actuator command types

use serde::{Deserialize, Serialize};

/// Electronic expansion valve state relative to its default step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EevState {
    Open,
    Hold,
}

/// Fan state relative to its default speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FanState {
    High,
    Normal,
}

/// Compressor state relative to its default speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CompressorState {
    Reduced,
    Normal,
}

impl std::fmt::Display for EevState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EevState::Open => write!(f, "OPEN"),
            EevState::Hold => write!(f, "HOLD"),
        }
    }
}

impl std::fmt::Display for FanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FanState::High => write!(f, "HIGH"),
            FanState::Normal => write!(f, "NORMAL"),
        }
    }
}

impl std::fmt::Display for CompressorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompressorState::Reduced => write!(f, "REDUCED"),
            CompressorState::Normal => write!(f, "NORMAL"),
        }
    }
}

/// Bounded actuator commands for one sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlRecord {
    /// EEV position (steps)
    pub eev_step_cmd: i32,
    /// Fan speed (RPM)
    pub fan_rpm_cmd: i32,
    /// Compressor speed (RPM)
    pub compressor_rpm_cmd: i32,
    pub eev_state: EevState,
    pub fan_state: FanState,
    pub compressor_state: CompressorState,
    /// Reason text of the last rule that fired
    pub control_reason: String,
}
