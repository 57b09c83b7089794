//! Errors raised by the format readers.

use std::io;

use thiserror::Error;

use crate::queue::QueueError;

/// Failure reading one input.
///
/// Every variant except [`ReadError::Cancelled`] and
/// [`ReadError::SinkClosed`] names the input it concerns, so a multi-file run
/// can report which file failed while its siblings carry on.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The input could not be opened.
    #[error("failed to open {input}")]
    Open {
        /// Path or stream label.
        input: String,
        /// Source error from std I/O.
        #[source]
        source: io::Error,
    },
    /// The PBF payload could not be decoded.
    #[error("failed to decode OSM PBF data in {input}")]
    Decode {
        /// Path or stream label.
        input: String,
        /// Source error from `osmpbf`.
        #[source]
        source: osmpbf::Error,
    },
    /// The GeoJSON document was malformed.
    #[error("failed to parse GeoJSON in {input}")]
    ParseJson {
        /// Path or stream label.
        input: String,
        /// Source error from `serde_json`.
        #[source]
        source: serde_json::Error,
    },
    /// The survey text broke the format grammar.
    #[error("{input}:{line}: {message}")]
    Survey {
        /// Path or stream label.
        input: String,
        /// One-based line number.
        line: usize,
        /// What was wrong.
        message: String,
    },
    /// Reading the survey text failed part way through.
    #[error("failed to read survey text from {input}")]
    SurveyIo {
        /// Path or stream label.
        input: String,
        /// Source error from std I/O.
        #[source]
        source: io::Error,
    },
    /// Spooling a compressed or streamed input to a temporary file failed.
    #[error("failed to spool {input} to a temporary file")]
    Spool {
        /// Path or stream label.
        input: String,
        /// Source error from std I/O.
        #[source]
        source: io::Error,
    },
    /// The run was cancelled while the reader was waiting to hand over a record.
    #[error("reading was cancelled")]
    Cancelled,
    /// The consumer stopped receiving records.
    #[error("the record consumer hung up")]
    SinkClosed,
}

impl From<QueueError> for ReadError {
    fn from(error: QueueError) -> Self {
        match error {
            QueueError::Cancelled => Self::Cancelled,
            QueueError::Disconnected => Self::SinkClosed,
        }
    }
}
