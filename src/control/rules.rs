//! Control rules as pure values
//!
//! A rule is `signal > threshold ⇒ add deltas, set reason`. Rules never
//! mutate shared state; the resolver folds them over a `CommandAccumulator`.

use crate::config::{ControlRuleConfig, ControlSignal};

use super::ControlInputs;

/// Running command totals and reason during the fold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandAccumulator {
    pub eev_step: i32,
    pub fan_rpm: i32,
    pub compressor_rpm: i32,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControlRule {
    pub name: String,
    pub signal: ControlSignal,
    pub threshold: f64,
    pub eev_delta: i32,
    pub fan_delta: i32,
    pub compressor_delta: i32,
    pub reason: String,
}

impl From<&ControlRuleConfig> for ControlRule {
    fn from(c: &ControlRuleConfig) -> Self {
        Self {
            name: c.name.clone(),
            signal: c.signal,
            threshold: c.threshold,
            eev_delta: c.eev_delta,
            fan_delta: c.fan_delta,
            compressor_delta: c.compressor_delta,
            reason: c.reason.clone(),
        }
    }
}

impl ControlRule {
    /// Strict comparison; missing inputs read as 0 and rarely fire.
    pub fn fires(&self, inputs: &ControlInputs) -> bool {
        inputs.value(self.signal) > self.threshold
    }

    /// Apply this rule to the accumulator, returning the next state.
    pub fn apply(&self, inputs: &ControlInputs, acc: CommandAccumulator) -> CommandAccumulator {
        if !self.fires(inputs) {
            return acc;
        }
        CommandAccumulator {
            eev_step: acc.eev_step.saturating_add(self.eev_delta),
            fan_rpm: acc.fan_rpm.saturating_add(self.fan_delta),
            compressor_rpm: acc.compressor_rpm.saturating_add(self.compressor_delta),
            reason: self.reason.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_control_rules;

    fn start() -> CommandAccumulator {
        CommandAccumulator {
            eev_step: 50,
            fan_rpm: 1200,
            compressor_rpm: 1800,
            reason: "Normal operation".to_string(),
        }
    }

    fn only(signal: ControlSignal, value: f64) -> ControlInputs {
        let mut inputs = ControlInputs::default();
        match signal {
            ControlSignal::PowerWatts => inputs.power_watts = Some(value),
            ControlSignal::Superheat => inputs.superheat = Some(value),
            ControlSignal::TempDelta => inputs.temp_delta = Some(value),
            ControlSignal::Vibration => inputs.vibration = Some(value),
        }
        inputs
    }

    #[test]
    fn test_each_rule_in_isolation() {
        let rules: Vec<ControlRule> = default_control_rules().iter().map(ControlRule::from).collect();
        let expected = [(50, 1400, 1500), (60, 1300, 1800), (50, 1400, 2000), (50, 1000, 1300)];
        for (rule, (eev, fan, comp)) in rules.iter().zip(expected) {
            let out = rule.apply(&only(rule.signal, rule.threshold + 1.0), start());
            assert_eq!((out.eev_step, out.fan_rpm, out.compressor_rpm), (eev, fan, comp), "{}", rule.name);
            assert_eq!(out.reason, rule.reason);
        }
    }

    #[test]
    fn test_threshold_is_strict() {
        for rule in default_control_rules().iter().map(ControlRule::from) {
            let out = rule.apply(&only(rule.signal, rule.threshold), start());
            assert_eq!(out, start(), "{} fired at its threshold", rule.name);
        }
    }
}
