//! Pipeline Regression Tests
//!
//! Runs the full five-stage pipeline over a synthetic freezer batch with
//! injected faults. Asserts on row accounting, determinism, fault labelling,
//! control commands and cached-model reuse.

use chrono::{DateTime, Duration, TimeZone, Utc};
use frostguard::anomaly::AnomalyModel;
use frostguard::export::{write_csv, write_json_rows};
use frostguard::types::{CompressorState, DropReason, EevState, FanState, GLOBAL_SUBSYSTEM};
use frostguard::{AnomalyLabel, Pipeline, RiskLevel, Sample, UnitConfig};

const BATCH: usize = 600;
const POWER_SPIKE: usize = 300;
const VIBRATION_SPIKE: usize = 450;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).single().expect("valid timestamp")
}

/// Steady cooling with small periodic wobble, plus two isolated faults.
fn freezer_batch() -> Vec<Sample> {
    let mut samples: Vec<Sample> = (0..BATCH)
        .map(|i| {
            let a = (i as f64 * 0.37).sin();
            let b = (i as f64 * 0.11).cos();
            Sample::complete(
                start() + Duration::seconds(i as i64 * 5),
                -18.0 + 0.2 * a,
                -25.0 - 0.1 * b,
                500.0 + 10.0 * a + 4.0 * b,
                1200.0 + 5.0 * b,
                1800.0 - 8.0 * a,
                0.2 + 0.01 * b,
            )
        })
        .collect();

    samples[POWER_SPIKE].power_watts = Some(3000.0);
    samples[VIBRATION_SPIKE].vibration = Some(4.0);
    samples
}

fn label_columns(config: &UnitConfig) -> Vec<(String, String)> {
    config
        .subsystems
        .iter()
        .map(|s| (s.id.clone(), s.label_column.clone()))
        .collect()
}

#[test]
fn every_sample_is_accounted_for() {
    let mut samples = freezer_batch();
    samples[100].fan_rpm = None;
    samples[200].compressor_rpm = Some(0.0);

    let out = Pipeline::new(&UnitConfig::default()).run(samples).expect("pipeline run");

    assert_eq!(out.rows.len() + out.dropped.len(), BATCH);
    assert_eq!(out.summary.input_samples, BATCH);
    assert_eq!(out.summary.surviving_rows, out.rows.len());

    let reasons: Vec<DropReason> = out.dropped.iter().map(|d| d.reason).collect();
    assert_eq!(
        reasons,
        vec![
            DropReason::FirstSample,
            DropReason::MissingField("fan_rpm"),
            DropReason::ZeroDivisor("compressor_rpm"),
        ]
    );
    let total: usize = out.summary.risk_distribution.values().sum();
    assert_eq!(total, out.rows.len());
}

#[test]
fn reruns_are_bit_identical() {
    let pipeline = Pipeline::new(&UnitConfig::default());
    let a = pipeline.run(freezer_batch()).expect("first run");
    let b = pipeline.run(freezer_batch()).expect("second run");
    assert_eq!(a.rows, b.rows);
    assert_eq!(a.dropped, b.dropped);
}

#[test]
fn power_spike_is_flagged_and_throttled() {
    let out = Pipeline::new(&UnitConfig::default()).run(freezer_batch()).expect("pipeline run");
    let row = out
        .rows
        .iter()
        .find(|r| r.row.index == POWER_SPIKE)
        .expect("spike row survives feature engineering");

    assert_eq!(row.anomaly.label("power"), Some(AnomalyLabel::Anomaly));
    assert!(row.health.anomaly_count >= 1);
    assert!(row.health.health_score <= 80.0);

    assert_eq!(row.control.compressor_rpm_cmd, 1500);
    assert_eq!(row.control.fan_rpm_cmd, 1400);
    assert_eq!(row.control.eev_step_cmd, 50);
    assert_eq!(row.control.compressor_state, CompressorState::Reduced);
    assert_eq!(row.control.fan_state, FanState::High);
    assert_eq!(row.control.eev_state, EevState::Hold);
    assert_eq!(row.control.control_reason, "High power detected → reducing compressor load");
}

#[test]
fn vibration_spike_is_flagged_and_throttled() {
    let out = Pipeline::new(&UnitConfig::default()).run(freezer_batch()).expect("pipeline run");
    let row = out
        .rows
        .iter()
        .find(|r| r.row.index == VIBRATION_SPIKE)
        .expect("spike row survives feature engineering");

    assert_eq!(row.anomaly.label("vibration"), Some(AnomalyLabel::Anomaly));
    assert_eq!(row.control.compressor_rpm_cmd, 1300);
    assert_eq!(row.control.fan_rpm_cmd, 1000);
    assert_eq!(row.control.control_reason, "Vibration anomaly → safety throttle");
}

#[test]
fn quiet_rows_keep_default_commands() {
    let out = Pipeline::new(&UnitConfig::default()).run(freezer_batch()).expect("pipeline run");
    let quiet = out
        .rows
        .iter()
        .find(|r| r.row.index == 50)
        .expect("row 50 survives");

    assert_eq!(quiet.control.eev_step_cmd, 50);
    assert_eq!(quiet.control.fan_rpm_cmd, 1200);
    assert_eq!(quiet.control.compressor_rpm_cmd, 1800);
    assert_eq!(quiet.control.control_reason, "Normal operation");
}

#[test]
fn health_and_risk_are_consistent() {
    let config = UnitConfig::default();
    let out = Pipeline::new(&config).run(freezer_batch()).expect("pipeline run");

    for r in &out.rows {
        assert_eq!(r.health.total_subsystems, config.subsystems.len());
        let expected = 100.0 * (1.0 - r.health.anomaly_count as f64 / 5.0);
        assert!((r.health.health_score - expected).abs() < 1e-9);

        let expected_level = if r.health.health_score >= 80.0 {
            RiskLevel::Normal
        } else if r.health.health_score >= 50.0 {
            RiskLevel::Warning
        } else {
            RiskLevel::Critical
        };
        assert_eq!(r.risk.risk_level, expected_level);
        assert!(r.anomaly.anomaly_score.is_some());
        assert!(r.anomaly.label(GLOBAL_SUBSYSTEM).is_some());
    }
}

#[test]
fn cached_model_reproduces_fresh_fit() {
    let config = UnitConfig::default();
    let pipeline = Pipeline::new(&config);
    let fresh = pipeline.run(freezer_batch()).expect("fresh run");

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("model.json");
    fresh.model.save_to_file(&path).expect("save model");
    let loaded = AnomalyModel::load_from_file(&path).expect("load model");

    let cached = pipeline.run_with_model(freezer_batch(), &loaded).expect("cached run");
    assert_eq!(fresh.rows, cached.rows);
}

#[test]
fn csv_output_has_one_line_per_row() {
    let config = UnitConfig::default();
    let out = Pipeline::new(&config).run(freezer_batch()).expect("pipeline run");

    let mut buf = Vec::new();
    write_csv(&mut buf, &out.rows, &label_columns(&config)).expect("write csv");
    let text = String::from_utf8(buf).expect("utf-8");
    let mut lines = text.lines();

    let header = lines.next().expect("header line");
    assert!(header.starts_with("timestamp,temperature,evap_temp"));
    assert!(header.contains("anomaly_label,temp_anomaly,power_anomaly,rpm_anomaly,vibration_anomaly"));
    assert_eq!(lines.count(), out.rows.len());
}

#[test]
fn json_rows_are_flat_with_csv_keys() {
    let config = UnitConfig::default();
    let out = Pipeline::new(&config).run(freezer_batch()).expect("pipeline run");
    let columns = label_columns(&config);

    let mut buf = Vec::new();
    write_json_rows(&mut buf, &out.rows, &columns).expect("write json");
    let text = String::from_utf8(buf).expect("utf-8");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), out.rows.len());

    let spike = out
        .rows
        .iter()
        .position(|r| r.row.index == POWER_SPIKE)
        .expect("power spike survives");
    let record: serde_json::Value = serde_json::from_str(lines[spike]).expect("valid json");

    assert_eq!(record["power_anomaly"], "Anomaly");
    assert_eq!(record["power_watts"], 3000.0);
    assert!(record["health_score"].is_number());
    assert!(record["risk_level"].is_string());
    assert!(record["control_reason"].as_str().expect("reason").contains("power"));
    assert!(record.get("features").is_none());
    assert!(record.get("labels").is_none());
}
