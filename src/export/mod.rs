//! Output export - CSV table and JSON lines
//!
//! CSV column order: timestamp, raw channels, engineered features, one label
//! column per subsystem (configured order), anomaly_score, health, risk,
//! control. Labels are `Normal`/`Anomaly`; risk is `NORMAL`/`WARNING`/`CRITICAL`.
//!
//! JSON lines carry the same columns as flat objects keyed by the CSV header
//! names, with numbers left numeric.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::info;

use crate::types::{ControlRecord, DroppedRow, PipelineRow, RAW_CHANNELS};

/// Engineered feature columns, in output order.
pub const FEATURE_COLUMNS: [&str; 5] = [
    "superheat",
    "temp_delta",
    "power_per_rpm",
    "fan_efficiency",
    "vibration_flag",
];

const HEALTH_RISK_COLUMNS: [&str; 5] = [
    "anomaly_score",
    "anomaly_count",
    "health_score",
    "risk_level",
    "recommended_action",
];

const CONTROL_COLUMNS: [&str; 7] = [
    "eev_step_cmd",
    "fan_rpm_cmd",
    "compressor_rpm_cmd",
    "eev_state",
    "fan_state",
    "compressor_state",
    "control_reason",
];

/// Output format selectable on the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

/// Quote a CSV field when it contains a delimiter, quote or newline.
pub fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn control_fields(c: &ControlRecord) -> [String; 7] {
    [
        c.eev_step_cmd.to_string(),
        c.fan_rpm_cmd.to_string(),
        c.compressor_rpm_cmd.to_string(),
        c.eev_state.to_string(),
        c.fan_state.to_string(),
        c.compressor_state.to_string(),
        csv_escape(&c.control_reason),
    ]
}

/// Header for the surviving-row table.
pub fn csv_header(label_columns: &[String]) -> Vec<String> {
    std::iter::once("timestamp")
        .chain(RAW_CHANNELS)
        .chain(FEATURE_COLUMNS)
        .map(str::to_string)
        .chain(label_columns.iter().cloned())
        .chain(HEALTH_RISK_COLUMNS.iter().chain(&CONTROL_COLUMNS).map(|s| s.to_string()))
        .collect()
}

/// Write surviving rows as CSV. `subsystems` pairs each subsystem id with its
/// label column name, in output order.
pub fn write_csv<W: Write>(
    mut out: W,
    rows: &[PipelineRow],
    subsystems: &[(String, String)],
) -> std::io::Result<()> {
    let label_columns: Vec<String> = subsystems.iter().map(|(_, c)| c.clone()).collect();
    writeln!(out, "{}", csv_header(&label_columns).join(","))?;

    for r in rows {
        let raw = &r.row.raw;
        let f = &r.row.features;
        let mut fields: Vec<String> = vec![
            format_ts(&r.row.timestamp),
            raw.temperature.to_string(),
            raw.evap_temp.to_string(),
            raw.power_watts.to_string(),
            raw.fan_rpm.to_string(),
            raw.compressor_rpm.to_string(),
            raw.vibration.to_string(),
            f.superheat.to_string(),
            f.temp_delta.to_string(),
            f.power_per_rpm.to_string(),
            f.fan_efficiency.to_string(),
            f.vibration_flag.to_string(),
        ];
        for (id, _) in subsystems {
            fields.push(r.anomaly.label(id).unwrap_or_default().to_string());
        }
        fields.push(r.anomaly.anomaly_score.map(|s| s.to_string()).unwrap_or_default());
        fields.push(r.health.anomaly_count.to_string());
        fields.push(format!("{:.2}", r.health.health_score));
        fields.push(r.risk.risk_level.to_string());
        fields.push(csv_escape(&r.risk.recommended_action));
        fields.extend(control_fields(&r.control));

        writeln!(out, "{}", fields.join(","))?;
    }
    out.flush()
}

/// Write dropped samples with their control commands as CSV.
pub fn write_dropped_csv<W: Write>(mut out: W, dropped: &[DroppedRow]) -> std::io::Result<()> {
    let header: Vec<&str> = ["index", "timestamp", "drop_reason"]
        .into_iter()
        .chain(CONTROL_COLUMNS)
        .collect();
    writeln!(out, "{}", header.join(","))?;

    for d in dropped {
        let mut fields = vec![
            d.index.to_string(),
            format_ts(&d.timestamp),
            csv_escape(&d.reason.to_string()),
        ];
        fields.extend(control_fields(&d.control));
        writeln!(out, "{}", fields.join(","))?;
    }
    out.flush()
}

/// Flat JSON record for one surviving row, keyed like the CSV header.
pub fn row_record(r: &PipelineRow, subsystems: &[(String, String)]) -> Map<String, Value> {
    let raw = &r.row.raw;
    let f = &r.row.features;
    let mut record = Map::new();
    record.insert("timestamp".into(), json!(format_ts(&r.row.timestamp)));
    for (name, value) in RAW_CHANNELS.iter().zip([
        raw.temperature,
        raw.evap_temp,
        raw.power_watts,
        raw.fan_rpm,
        raw.compressor_rpm,
        raw.vibration,
    ]) {
        record.insert((*name).into(), json!(value));
    }
    for (name, value) in FEATURE_COLUMNS.iter().zip([
        f.superheat,
        f.temp_delta,
        f.power_per_rpm,
        f.fan_efficiency,
    ]) {
        record.insert((*name).into(), json!(value));
    }
    record.insert("vibration_flag".into(), json!(f.vibration_flag));
    for (id, column) in subsystems {
        let label = r.anomaly.label(id).unwrap_or_default();
        record.insert(column.clone(), json!(label.to_string()));
    }
    record.insert("anomaly_score".into(), json!(r.anomaly.anomaly_score));
    record.insert("anomaly_count".into(), json!(r.health.anomaly_count));
    record.insert("health_score".into(), json!(r.health.health_score));
    record.insert("risk_level".into(), json!(r.risk.risk_level.to_string()));
    record.insert("recommended_action".into(), json!(r.risk.recommended_action));
    insert_control(&mut record, &r.control);
    record
}

/// Flat JSON record for one dropped sample.
pub fn dropped_record(d: &DroppedRow) -> Map<String, Value> {
    let mut record = Map::new();
    record.insert("index".into(), json!(d.index));
    record.insert("timestamp".into(), json!(format_ts(&d.timestamp)));
    record.insert("drop_reason".into(), json!(d.reason.to_string()));
    insert_control(&mut record, &d.control);
    record
}

fn insert_control(record: &mut Map<String, Value>, c: &ControlRecord) {
    record.insert("eev_step_cmd".into(), json!(c.eev_step_cmd));
    record.insert("fan_rpm_cmd".into(), json!(c.fan_rpm_cmd));
    record.insert("compressor_rpm_cmd".into(), json!(c.compressor_rpm_cmd));
    record.insert("eev_state".into(), json!(c.eev_state.to_string()));
    record.insert("fan_state".into(), json!(c.fan_state.to_string()));
    record.insert("compressor_state".into(), json!(c.compressor_state.to_string()));
    record.insert("control_reason".into(), json!(c.control_reason));
}

/// Write surviving rows as flat JSON lines.
pub fn write_json_rows<W: Write>(
    out: W,
    rows: &[PipelineRow],
    subsystems: &[(String, String)],
) -> std::io::Result<()> {
    let records: Vec<Map<String, Value>> = rows.iter().map(|r| row_record(r, subsystems)).collect();
    write_json_lines(out, &records)
}

/// Write dropped samples as flat JSON lines.
pub fn write_dropped_json<W: Write>(out: W, dropped: &[DroppedRow]) -> std::io::Result<()> {
    let records: Vec<Map<String, Value>> = dropped.iter().map(dropped_record).collect();
    write_json_lines(out, &records)
}

/// Write one JSON object per line.
pub fn write_json_lines<W: Write, T: Serialize>(mut out: W, items: &[T]) -> std::io::Result<()> {
    for item in items {
        serde_json::to_writer(&mut out, item)?;
        out.write_all(b"\n")?;
    }
    out.flush()
}

/// Write rows to `path` in the chosen format.
pub fn export_rows(
    path: &Path,
    format: OutputFormat,
    rows: &[PipelineRow],
    subsystems: &[(String, String)],
) -> std::io::Result<()> {
    let out = BufWriter::new(File::create(path)?);
    match format {
        OutputFormat::Csv => write_csv(out, rows, subsystems)?,
        OutputFormat::Json => write_json_rows(out, rows, subsystems)?,
    }
    info!(path = %path.display(), rows = rows.len(), ?format, "Output written");
    Ok(())
}

/// Write dropped rows to `path` in the chosen format.
pub fn export_dropped(path: &Path, format: OutputFormat, dropped: &[DroppedRow]) -> std::io::Result<()> {
    let out = BufWriter::new(File::create(path)?);
    match format {
        OutputFormat::Csv => write_dropped_csv(out, dropped)?,
        OutputFormat::Json => write_dropped_json(out, dropped)?,
    }
    info!(path = %path.display(), rows = dropped.len(), "Dropped rows written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UnitConfig;
    use crate::pipeline::Pipeline;
    use crate::types::Sample;
    use chrono::{Duration, TimeZone};

    fn subsystems() -> Vec<(String, String)> {
        UnitConfig::default()
            .subsystems
            .iter()
            .map(|s| (s.id.clone(), s.label_column.clone()))
            .collect()
    }

    fn output() -> crate::pipeline::PipelineOutput {
        let t0 = Utc.with_ymd_and_hms(2025, 1, 10, 8, 0, 0).single().expect("valid");
        let samples = (0..5)
            .map(|i| {
                Sample::complete(t0 + Duration::seconds(i * 5), -18.0, -25.0, 950.0, 1200.0, 1800.0, 0.0)
            })
            .collect();
        Pipeline::new(&UnitConfig::default()).run(samples).expect("run")
    }

    #[test]
    fn test_csv_escape() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"x\""), "\"say \"\"x\"\"\"");
    }

    #[test]
    fn test_header_order() {
        let header = csv_header(&["anomaly_label".to_string(), "temp_anomaly".to_string()]);
        assert_eq!(header[0], "timestamp");
        assert_eq!(header[1], "temperature");
        assert_eq!(header[7], "superheat");
        assert_eq!(header[12], "anomaly_label");
        assert_eq!(header[14], "anomaly_score");
        assert_eq!(header.last().map(String::as_str), Some("control_reason"));
    }

    #[test]
    fn test_csv_rows() {
        let out = output();
        let mut buf = Vec::new();
        write_csv(&mut buf, &out.rows, &subsystems()).expect("write");
        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 1 + out.rows.len());

        let header = csv_split_line(lines[0]);
        let first = csv_split_line(lines[1]);
        assert_eq!(header.len(), first.len());
        let col = |name: &str| first[header.iter().position(|h| h == name).expect("column")].clone();
        assert_eq!(col("timestamp"), "2025-01-10T08:00:05Z");
        assert_eq!(col("temp_anomaly"), "Normal");
        assert_eq!(col("health_score"), "100.00");
        assert_eq!(col("risk_level"), "NORMAL");
        assert_eq!(col("compressor_rpm_cmd"), "1500");
        assert_eq!(col("compressor_state"), "REDUCED");
        assert_eq!(col("control_reason"), "High power detected → reducing compressor load");
    }

    #[test]
    fn test_json_rows_use_csv_column_names() {
        let out = output();
        let subsystems = subsystems();
        let mut buf = Vec::new();
        write_json_rows(&mut buf, &out.rows, &subsystems).expect("write");
        let text = String::from_utf8(buf).expect("utf8");
        let first: serde_json::Value =
            serde_json::from_str(text.lines().next().expect("one line")).expect("json");
        let object = first.as_object().expect("flat object");

        let labels: Vec<String> = subsystems.iter().map(|(_, c)| c.clone()).collect();
        let header = csv_header(&labels);
        assert_eq!(object.len(), header.len());
        for column in &header {
            assert!(object.contains_key(column), "missing {column}");
        }
        assert_eq!(first["temperature"], -18.0);
        assert_eq!(first["superheat"], 7.0);
        assert_eq!(first["vibration_flag"], 0);
        assert_eq!(first["temp_anomaly"], "Normal");
        assert_eq!(first["health_score"], 100.0);
        assert_eq!(first["risk_level"], "NORMAL");
        assert_eq!(first["eev_step_cmd"], 50);
        assert_eq!(first["compressor_state"], "REDUCED");
        assert_eq!(first["control_reason"], "High power detected → reducing compressor load");
    }

    #[test]
    fn test_dropped_rows() {
        let out = output();
        let mut buf = Vec::new();
        write_dropped_csv(&mut buf, &out.dropped).expect("write");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.lines().nth(1).expect("dropped row").contains("first sample"));

        let mut buf = Vec::new();
        write_dropped_json(&mut buf, &out.dropped).expect("write");
        let text = String::from_utf8(buf).expect("utf8");
        let first: serde_json::Value =
            serde_json::from_str(text.lines().next().expect("one line")).expect("json");
        assert_eq!(first["index"], 0);
        assert_eq!(first["drop_reason"], "first sample (no temp_delta)");
        assert_eq!(first["fan_rpm_cmd"], 1400);
    }

    fn csv_split_line(line: &str) -> Vec<String> {
        crate::acquisition::csv_split(line)
    }
}
