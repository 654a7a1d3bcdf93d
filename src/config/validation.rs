//! Config validation: unknown-key detection with Levenshtein suggestions,
//! subsystem column resolution and physical range checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

use crate::types::FeatureColumn;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, ", did you mean '{s}'?")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for UnitConfig.
///
/// Array-of-tables entries (`[[subsystems]]`, `[[control.rules]]`) share the
/// array's prefix. Any new field added to UnitConfig must be added here too.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [unit]
        "unit",
        "unit.name",
        "unit.site",
        // [features]
        "features",
        "features.vibration_flag_threshold",
        // [detector]
        "detector",
        "detector.n_estimators",
        "detector.contamination",
        "detector.max_samples",
        "detector.seed",
        "detector.min_fit_rows",
        // [[subsystems]]
        "subsystems_version",
        "subsystems",
        "subsystems.id",
        "subsystems.label_column",
        "subsystems.features",
        // [risk]
        "risk",
        "risk.normal_min",
        "risk.warning_min",
        "risk.normal_action",
        "risk.warning_action",
        "risk.critical_action",
        // [control]
        "control",
        "control.normal_reason",
        "control.defaults",
        "control.defaults.eev_step",
        "control.defaults.fan_rpm",
        "control.defaults.compressor_rpm",
        "control.bounds",
        "control.bounds.eev_step",
        "control.bounds.eev_step.min",
        "control.bounds.eev_step.max",
        "control.bounds.fan_rpm",
        "control.bounds.fan_rpm.min",
        "control.bounds.fan_rpm.max",
        "control.bounds.compressor_rpm",
        "control.bounds.compressor_rpm.min",
        "control.bounds.compressor_rpm.max",
        // [[control.rules]]
        "control.rules",
        "control.rules.name",
        "control.rules.signal",
        "control.rules.threshold",
        "control.rules.eev_delta",
        "control.rules.fan_delta",
        "control.rules.compressor_delta",
        "control.rules.reason",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`. Tables inside arrays are walked under the
/// array's own path, so `[[a]] b = 1` yields `["a", "a.b"]`.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            } else if let Some(items) = v.as_array() {
                for item in items.iter().filter(|i| i.is_table()) {
                    for nested in walk_toml_keys(item, &path) {
                        if !keys.contains(&nested) {
                            keys.push(nested);
                        }
                    }
                }
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;
    for &k in known {
        let dist = levenshtein(unknown, k);
        if dist > 3 {
            continue;
        }
        // Ties break alphabetically so suggestions are stable across runs
        let better = match best {
            None => true,
            Some((bk, bd)) => dist < bd || (dist == bd && k < bk),
        };
        if better {
            best = Some((k, dist));
        }
    }
    best.map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys; it only warns. Existing configs
/// always continue to work.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| {
            let suggestion = suggest_correction(&key, &known);
            ValidationWarning {
                message: format!("Unknown config key '{key}'"),
                field: key,
                suggestion,
            }
        })
        .collect()
}

// ============================================================================
// Subsystem Column Resolution
// ============================================================================

/// Warn about subsystem feature names that are not known columns.
///
/// The affected subsystem still runs; its detector fails closed and labels
/// every row Normal.
pub fn validate_subsystem_columns(config: &super::UnitConfig) -> Vec<ValidationWarning> {
    let names: HashSet<&str> = FeatureColumn::ALL.iter().map(|c| c.as_str()).collect();
    let mut warnings = Vec::new();

    for subsystem in &config.subsystems {
        for feature in &subsystem.features {
            if feature.parse::<FeatureColumn>().is_ok() {
                continue;
            }
            warnings.push(ValidationWarning {
                field: format!("subsystems.{}.features", subsystem.id),
                message: format!(
                    "Subsystem '{}' references unknown feature column '{}' (detector will fail closed)",
                    subsystem.id, feature
                ),
                suggestion: suggest_correction(feature, &names),
            });
        }
    }

    warnings
}

// ============================================================================
// Physical Range Validation
// ============================================================================

/// Validate physical ranges on a parsed UnitConfig.
///
/// Returns (errors, warnings). Errors are impossible values that must
/// prevent startup; warnings are suspicious but not fatal.
pub fn validate_physical_ranges(
    config: &super::UnitConfig,
) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let vib = config.features.vibration_flag_threshold;
    if !vib.is_finite() {
        errors.push(format!(
            "features.vibration_flag_threshold = {vib} must be finite"
        ));
    } else if vib < 0.0 {
        warnings.push(ValidationWarning {
            field: "features.vibration_flag_threshold".to_string(),
            message: format!(
                "vibration_flag_threshold = {vib:.2} is negative; every sample will be flagged"
            ),
            suggestion: None,
        });
    }

    // Trees need at least two rows to split
    if config.detector.max_samples == 1 {
        warnings.push(ValidationWarning {
            field: "detector.max_samples".to_string(),
            message: "max_samples = 1 grows single-leaf trees; every score will be equal"
                .to_string(),
            suggestion: None,
        });
    }

    let eev = config.control.bounds.eev_step;
    if eev.min < 0 {
        errors.push(format!(
            "control.bounds.eev_step.min = {} cannot be negative",
            eev.min
        ));
    }
    for (name, bounds) in [
        ("fan_rpm", config.control.bounds.fan_rpm),
        ("compressor_rpm", config.control.bounds.compressor_rpm),
    ] {
        if bounds.min < 0 {
            errors.push(format!(
                "control.bounds.{name}.min = {} cannot be negative",
                bounds.min
            ));
        }
    }

    for rule in &config.control.rules {
        if rule.eev_delta == 0 && rule.fan_delta == 0 && rule.compressor_delta == 0 {
            warnings.push(ValidationWarning {
                field: format!("control.rules.{}", rule.name),
                message: format!(
                    "control rule '{}' has no command deltas; it only changes the reason",
                    rule.name
                ),
                suggestion: None,
            });
        }
    }

    (errors, warnings)
}

// ============================================================================
// Tests
// ============================================================================
