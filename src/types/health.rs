//! Health score and risk classification types

use serde::{Deserialize, Serialize};

/// Aggregate equipment health for one row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    /// Subsystem labels marked Anomaly
    pub anomaly_count: usize,
    /// Size of the fixed subsystem set used as denominator
    pub total_subsystems: usize,
    /// 0-100, two decimal places (100 = no anomalies)
    pub health_score: f64,
}

/// Discrete risk tier derived from health score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Normal = 0,
    Warning = 1,
    Critical = 2,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 3] = [RiskLevel::Normal, RiskLevel::Warning, RiskLevel::Critical];
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Normal => write!(f, "NORMAL"),
            RiskLevel::Warning => write!(f, "WARNING"),
            RiskLevel::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl Default for RiskLevel {
    fn default() -> Self {
        RiskLevel::Normal
    }
}

/// Risk tier plus the action recommended for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskRecord {
    pub risk_level: RiskLevel,
    pub recommended_action: String,
}
