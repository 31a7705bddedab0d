use shared::models::Bar;
use std::time::Duration;
use thiserror::Error;

/// Failure outcomes of a bar acquisition. Kept apart from `AnalysisError` so a caller can tell
/// "no data arrived" from "data arrived but could not be analysed".
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AcquisitionError {
    /// The producer never signalled completion. `partial` holds whatever had arrived and must not
    /// be treated as a short read.
    #[error("Timeout waiting for bar data after {waited:?} ({} partial bars)", .partial.len())]
    Timeout { waited: Duration, partial: Vec<Bar> },

    #[error("Bar producer reported an error: {reason}")]
    Failed { reason: String },
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("CSV parsing system error: {source}")]
    CsvSystemError {
        #[from]
        source: csv::Error,
    },

    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("CSV data format error: {0}")]
    CsvDataFormatError(String),

    #[error("Serialization error: {source}")]
    SerializationError {
        #[from]
        source: serde_json::Error,
    },

    #[error("Acquisition error: {0}")]
    Acquisition(#[from] AcquisitionError),

    #[error("Session error: {0}")]
    SessionError(String),

    #[error("Internal processing error: {0}")]
    ProcessingError(String),
}

impl EngineError {
    /// Timeouts are worth retrying as a whole request; nothing else is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Acquisition(AcquisitionError::Timeout { .. }))
    }
}
