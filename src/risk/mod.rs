//! Risk Classifier - health score → risk tier and recommended action
//!
//! Tier lower bounds are inclusive: exactly `normal_min` is NORMAL and
//! exactly `warning_min` is WARNING.

use crate::config::RiskConfig;
use crate::types::{RiskLevel, RiskRecord};

#[derive(Debug, Clone)]
pub struct RiskClassifier {
    config: RiskConfig,
}

impl Default for RiskClassifier {
    fn default() -> Self {
        Self::new(RiskConfig::default())
    }
}

impl RiskClassifier {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn level(&self, health_score: f64) -> RiskLevel {
        if health_score >= self.config.normal_min {
            RiskLevel::Normal
        } else if health_score >= self.config.warning_min {
            RiskLevel::Warning
        } else {
            RiskLevel::Critical
        }
    }

    /// Action text depends on the tier only.
    pub fn action(&self, level: RiskLevel) -> &str {
        match level {
            RiskLevel::Normal => &self.config.normal_action,
            RiskLevel::Warning => &self.config.warning_action,
            RiskLevel::Critical => &self.config.critical_action,
        }
    }

    pub fn classify(&self, health_score: f64) -> RiskRecord {
        let risk_level = self.level(health_score);
        RiskRecord {
            risk_level,
            recommended_action: self.action(risk_level).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        let c = RiskClassifier::default();
        assert_eq!(c.level(100.0), RiskLevel::Normal);
        assert_eq!(c.level(80.0), RiskLevel::Normal);
        assert_eq!(c.level(79.99), RiskLevel::Warning);
        assert_eq!(c.level(50.0), RiskLevel::Warning);
        assert_eq!(c.level(49.99), RiskLevel::Critical);
        assert_eq!(c.level(0.0), RiskLevel::Critical);
    }

    #[test]
    fn test_actions() {
        let c = RiskClassifier::default();
        assert_eq!(c.classify(90.0).recommended_action, "No action needed");
        assert_eq!(
            c.classify(60.0).recommended_action,
            "Monitor system & schedule inspection"
        );
        assert_eq!(
            c.classify(20.0).recommended_action,
            "Immediate maintenance required"
        );
    }

    #[test]
    fn test_custom_thresholds() {
        let c = RiskClassifier::new(RiskConfig {
            normal_min: 90.0,
            warning_min: 70.0,
            ..RiskConfig::default()
        });
        assert_eq!(c.level(80.0), RiskLevel::Warning);
        assert_eq!(c.level(69.0), RiskLevel::Critical);
    }
}
