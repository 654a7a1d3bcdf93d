//! Telemetry acquisition module
//!
//! Handles sample ingestion from CSV files and JSON-lines streams.

mod csv_reader;
mod source;
mod timestamp;

pub use csv_reader::{csv_split, read_csv, read_csv_file, CsvBatch, TIMESTAMP_COLUMNS};
pub use source::{collect_samples, CsvSource, JsonLinesSource, SampleEvent, SampleSource, StdinSource};
pub use timestamp::{parse_json_timestamp, parse_timestamp};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("I/O error reading {source_name}: {error}")]
    Io {
        source_name: String,
        #[source]
        error: std::io::Error,
    },

    #[error("{0} is empty (no header row)")]
    EmptyInput(String),

    #[error("{source_name} is missing required column '{column}'")]
    MissingColumn { source_name: String, column: String },
}
