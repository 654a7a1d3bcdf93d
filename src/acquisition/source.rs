//! Sample source abstraction for telemetry ingestion.
//!
//! Provides a unified trait for reading samples from different producers:
//! pre-loaded CSV files (replay) and JSON lines (stdin / message-bus bridge).

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};
use tracing::warn;

use super::timestamp::parse_json_timestamp;
use super::{CsvBatch, IngestError};
use crate::types::Sample;

/// Events produced by a sample source.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleEvent {
    /// A sample was read.
    Sample(Sample),
    /// Source reached end of data.
    Eof,
}

/// Trait abstracting where telemetry samples come from.
#[async_trait]
pub trait SampleSource: Send {
    /// Read the next sample. Returns `SampleEvent::Eof` when exhausted.
    async fn next_sample(&mut self) -> Result<SampleEvent, IngestError>;

    /// Human-readable name for logging (e.g. "CSV", "stdin").
    fn source_name(&self) -> &str;

    /// Input records discarded before they became samples.
    fn rejected(&self) -> usize {
        0
    }
}

/// Drain a source into a batch.
pub async fn collect_samples(source: &mut dyn SampleSource) -> Result<Vec<Sample>, IngestError> {
    let mut samples = Vec::new();
    while let SampleEvent::Sample(s) = source.next_sample().await? {
        samples.push(s);
    }
    tracing::info!(source = source.source_name(), samples = samples.len(), "Source drained");
    Ok(samples)
}

// ============================================================================
// CSV Source (pre-loaded replay)
// ============================================================================

/// Replays samples already parsed from a CSV file.
pub struct CsvSource {
    samples: std::vec::IntoIter<Sample>,
    rejected_rows: usize,
}

impl CsvSource {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self {
            samples: samples.into_iter(),
            rejected_rows: 0,
        }
    }

    pub fn from_batch(batch: CsvBatch) -> Self {
        Self {
            samples: batch.samples.into_iter(),
            rejected_rows: batch.rejected_rows,
        }
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self, IngestError> {
        Ok(Self::from_batch(super::read_csv_file(path)?))
    }
}

#[async_trait]
impl SampleSource for CsvSource {
    async fn next_sample(&mut self) -> Result<SampleEvent, IngestError> {
        Ok(self.samples.next().map_or(SampleEvent::Eof, SampleEvent::Sample))
    }

    fn source_name(&self) -> &str {
        "CSV"
    }

    fn rejected(&self) -> usize {
        self.rejected_rows
    }
}

// ============================================================================
// JSON Lines Source (stdin / bridge payloads)
// ============================================================================

/// JSON payload: every channel optional, timestamp as string or epoch.
#[derive(Debug, Deserialize)]
struct JsonSample {
    #[serde(alias = "ts")]
    timestamp: serde_json::Value,
    #[serde(default)]
    temperature: Option<f64>,
    #[serde(default)]
    evap_temp: Option<f64>,
    #[serde(default)]
    power_watts: Option<f64>,
    #[serde(default)]
    fan_rpm: Option<f64>,
    #[serde(default)]
    compressor_rpm: Option<f64>,
    #[serde(default)]
    vibration: Option<f64>,
}

/// Reads one JSON sample per line. Malformed lines are skipped with a warning.
pub struct JsonLinesSource<R> {
    reader: R,
    line_buffer: String,
    name: String,
    skipped: usize,
}

/// JSON lines from the process's standard input.
pub type StdinSource = JsonLinesSource<BufReader<Stdin>>;

impl StdinSource {
    pub fn stdin() -> Self {
        JsonLinesSource::new(BufReader::new(tokio::io::stdin()), "stdin")
    }
}

impl<R: AsyncBufRead + Unpin + Send> JsonLinesSource<R> {
    pub fn new(reader: R, name: &str) -> Self {
        Self {
            reader,
            line_buffer: String::with_capacity(512),
            name: name.to_string(),
            skipped: 0,
        }
    }

    /// Lines skipped so far as malformed.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn parse_line(line: &str) -> Result<Sample, String> {
        let raw: JsonSample = serde_json::from_str(line).map_err(|e| e.to_string())?;
        let timestamp = parse_json_timestamp(&raw.timestamp)
            .ok_or_else(|| format!("unparseable timestamp {}", raw.timestamp))?;
        let finite = |v: Option<f64>| v.filter(|x| x.is_finite());
        Ok(Sample {
            timestamp,
            temperature: finite(raw.temperature),
            evap_temp: finite(raw.evap_temp),
            power_watts: finite(raw.power_watts),
            fan_rpm: finite(raw.fan_rpm),
            compressor_rpm: finite(raw.compressor_rpm),
            vibration: finite(raw.vibration),
        })
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> SampleSource for JsonLinesSource<R> {
    async fn next_sample(&mut self) -> Result<SampleEvent, IngestError> {
        loop {
            self.line_buffer.clear();
            let bytes = self
                .reader
                .read_line(&mut self.line_buffer)
                .await
                .map_err(|e| IngestError::Io {
                    source_name: self.name.clone(),
                    error: e,
                })?;
            if bytes == 0 {
                return Ok(SampleEvent::Eof);
            }
            let line = self.line_buffer.trim();
            if line.is_empty() {
                continue;
            }
            match Self::parse_line(line) {
                Ok(sample) => return Ok(SampleEvent::Sample(sample)),
                Err(e) => {
                    self.skipped += 1;
                    warn!(source = %self.name, error = %e, "Failed to parse sample, skipping line");
                }
            }
        }
    }

    fn source_name(&self) -> &str {
        &self.name
    }

    fn rejected(&self) -> usize {
        self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_json_lines_skip_malformed() {
        let input: &'static [u8] = b"{\"ts\":\"2025-01-10 08:00:00\",\"temperature\":-18.0,\"power_watts\":500}\n\
not json\n\
\n\
{\"timestamp\":1736496005,\"temperature\":null,\"vibration\":0.4}\n\
{\"timestamp\":\"soon\"}\n";
        let mut source = JsonLinesSource::new(input, "test");
        let samples = tokio_test::block_on(collect_samples(&mut source)).expect("readable");
        assert_eq!(samples.len(), 2);
        assert_eq!(source.skipped(), 2);
        assert_eq!(
            samples[0].timestamp,
            Utc.with_ymd_and_hms(2025, 1, 10, 8, 0, 0).single().expect("valid")
        );
        assert_eq!(samples[0].power_watts, Some(500.0));
        assert_eq!(samples[0].fan_rpm, None);
        assert_eq!(samples[1].temperature, None);
        assert_eq!(samples[1].vibration, Some(0.4));
    }

    #[tokio::test]
    async fn test_csv_source_replays_in_order() {
        let t0 = Utc.with_ymd_and_hms(2025, 1, 10, 8, 0, 0).single().expect("valid");
        let samples = vec![
            Sample::complete(t0, -18.0, -25.0, 500.0, 1200.0, 1800.0, 0.2),
            Sample::complete(t0 + chrono::Duration::seconds(5), -17.9, -25.0, 505.0, 1200.0, 1800.0, 0.2),
        ];
        let mut source = CsvSource::new(samples.clone());
        assert_eq!(source.next_sample().await.expect("ok"), SampleEvent::Sample(samples[0].clone()));
        assert_eq!(source.next_sample().await.expect("ok"), SampleEvent::Sample(samples[1].clone()));
        assert_eq!(source.next_sample().await.expect("ok"), SampleEvent::Eof);
    }
}
