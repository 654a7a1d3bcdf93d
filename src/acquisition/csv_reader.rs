//! CSV telemetry reader
//!
//! Header-driven: columns may appear in any order and extra columns are
//! ignored. The timestamp column may be named `timestamp` or `ts`.
//!
//! | Cell                          | Result                     |
//! |-------------------------------|----------------------------|
//! | number                        | `Some(value)`              |
//! | empty / nan / null / text     | `None` (never 0)           |
//! | unparseable timestamp         | row rejected and counted   |

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{info, warn};

use super::timestamp::parse_timestamp;
use super::IngestError;
use crate::types::{Sample, RAW_CHANNELS};

/// Accepted names for the timestamp column.
pub const TIMESTAMP_COLUMNS: [&str; 2] = ["timestamp", "ts"];

/// Split a CSV line, honouring double quotes and `""` escapes.
pub fn csv_split(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}

/// Column positions resolved from the header row.
#[derive(Debug, Clone, PartialEq)]
struct ColumnMap {
    timestamp: usize,
    /// Indexed like `RAW_CHANNELS`
    channels: [usize; 6],
}

impl ColumnMap {
    fn from_header(header: &str, source: &str) -> Result<Self, IngestError> {
        let names: Vec<String> = csv_split(header)
            .iter()
            .map(|c| c.trim().trim_start_matches('\u{feff}').to_ascii_lowercase())
            .collect();
        let find = |wanted: &str| names.iter().position(|n| n == wanted);

        let timestamp = TIMESTAMP_COLUMNS
            .iter()
            .find_map(|c| find(*c))
            .ok_or_else(|| IngestError::MissingColumn {
                source_name: source.to_string(),
                column: "timestamp".to_string(),
            })?;

        let mut channels = [0usize; 6];
        for (slot, name) in channels.iter_mut().zip(RAW_CHANNELS) {
            *slot = find(name).ok_or_else(|| IngestError::MissingColumn {
                source_name: source.to_string(),
                column: name.to_string(),
            })?;
        }

        Ok(Self { timestamp, channels })
    }
}

/// Numeric cell, or `None` for anything missing or not a finite number.
fn parse_cell(fields: &[String], idx: usize) -> Option<f64> {
    let s = fields.get(idx)?.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("nan") || s.eq_ignore_ascii_case("null") {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Samples read from one CSV input plus ingestion counters.
#[derive(Debug, Clone, Default)]
pub struct CsvBatch {
    pub samples: Vec<Sample>,
    /// Rows rejected for an unparseable timestamp
    pub rejected_rows: usize,
}

/// Read a CSV file of telemetry samples.
pub fn read_csv_file(path: &Path) -> Result<CsvBatch, IngestError> {
    let file = File::open(path).map_err(|e| IngestError::Io {
        source_name: path.display().to_string(),
        error: e,
    })?;
    read_csv(BufReader::new(file), &path.display().to_string())
}

/// Read CSV telemetry from any buffered reader.
pub fn read_csv<R: BufRead>(reader: R, source: &str) -> Result<CsvBatch, IngestError> {
    let mut lines = reader.lines();

    let header = lines
        .next()
        .ok_or_else(|| IngestError::EmptyInput(source.to_string()))?
        .map_err(|e| IngestError::Io {
            source_name: source.to_string(),
            error: e,
        })?;
    let columns = ColumnMap::from_header(&header, source)?;

    let mut batch = CsvBatch::default();
    for (offset, line) in lines.enumerate() {
        let line_num = offset + 2;
        let line = line.map_err(|e| IngestError::Io {
            source_name: source.to_string(),
            error: e,
        })?;
        if line.trim().is_empty() {
            continue;
        }

        let fields = csv_split(&line);
        let raw_ts = fields.get(columns.timestamp).map(String::as_str).unwrap_or("");
        let Some(timestamp) = parse_timestamp(raw_ts) else {
            if batch.rejected_rows < 10 {
                warn!(line = line_num, timestamp = %raw_ts, "Unparseable timestamp, row rejected");
            }
            batch.rejected_rows += 1;
            continue;
        };

        let [t, e, p, f, c, v] = columns.channels.map(|i| parse_cell(&fields, i));
        batch.samples.push(Sample {
            timestamp,
            temperature: t,
            evap_temp: e,
            power_watts: p,
            fan_rpm: f,
            compressor_rpm: c,
            vibration: v,
        });
    }

    info!(
        source = %source,
        samples = batch.samples.len(),
        rejected = batch.rejected_rows,
        "CSV telemetry loaded"
    );
    Ok(batch)
}
