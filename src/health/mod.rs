//! Health Aggregator - anomaly labels → 0-100 health score
//!
//! The denominator is the closed subsystem list from config, fixed when the
//! aggregator is built. Labels for subsystems outside that list are ignored,
//! so adding unrelated detectors later cannot shift the score.

use std::collections::HashSet;

use crate::config::UnitConfig;
use crate::types::{AnomalyRecord, HealthRecord};

#[derive(Debug, Clone)]
pub struct HealthAggregator {
    subsystems: HashSet<String>,
}

impl HealthAggregator {
    pub fn new<I, S>(subsystems: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            subsystems: subsystems.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &UnitConfig) -> Self {
        Self::new(config.subsystem_ids())
    }

    pub fn total_subsystems(&self) -> usize {
        self.subsystems.len()
    }

    /// health = 100 × (1 − anomalies / total), rounded to 2 dp.
    pub fn aggregate(&self, record: &AnomalyRecord) -> HealthRecord {
        let total = self.subsystems.len();
        let anomaly_count = record
            .labels
            .iter()
            .filter(|l| l.label.is_anomaly() && self.subsystems.contains(&l.subsystem))
            .count();

        let health_score = if total == 0 {
            100.0
        } else {
            round2(100.0 * (1.0 - anomaly_count as f64 / total as f64))
        };

        HealthRecord {
            anomaly_count,
            total_subsystems: total,
            health_score,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AnomalyLabel, SubsystemLabel};

    fn record(flags: &[(&str, bool)]) -> AnomalyRecord {
        AnomalyRecord {
            labels: flags
                .iter()
                .map(|&(id, anomalous)| SubsystemLabel {
                    subsystem: id.to_string(),
                    label: if anomalous {
                        AnomalyLabel::Anomaly
                    } else {
                        AnomalyLabel::Normal
                    },
                })
                .collect(),
            anomaly_score: None,
        }
    }

    #[test]
    fn test_default_denominator_is_five() {
        let agg = HealthAggregator::from_config(&UnitConfig::default());
        assert_eq!(agg.total_subsystems(), 5);
    }

    #[test]
    fn test_scores_for_each_anomaly_count() {
        let agg = HealthAggregator::from_config(&UnitConfig::default());
        let ids = ["global", "temperature", "power", "rpm", "vibration"];
        let expected = [100.0, 80.0, 60.0, 40.0, 20.0, 0.0];
        for (k, want) in expected.iter().enumerate() {
            let flags: Vec<(&str, bool)> = ids.iter().enumerate().map(|(i, id)| (*id, i < k)).collect();
            let h = agg.aggregate(&record(&flags));
            assert_eq!(h.anomaly_count, k);
            assert_eq!(h.health_score, *want);
            assert!((0.0..=100.0).contains(&h.health_score));
            assert_eq!(h.health_score == 100.0, h.anomaly_count == 0);
        }
    }

    #[test]
    fn test_unknown_subsystem_label_ignored() {
        let agg = HealthAggregator::new(["global", "power"]);
        let h = agg.aggregate(&record(&[("global", false), ("power", true), ("door", true)]));
        assert_eq!(h.anomaly_count, 1);
        assert_eq!(h.health_score, 50.0);
    }

    #[test]
    fn test_rounds_to_two_decimals() {
        let agg = HealthAggregator::new(["a", "b", "c"]);
        let h = agg.aggregate(&record(&[("a", true), ("b", false), ("c", false)]));
        assert_eq!(h.health_score, 66.67);
    }
}
