//! Error types for recording ingestion and playback

use crate::core::SegmentLabel;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for mindsim operations
#[derive(Error, Debug)]
pub enum ReplayError {
    /// Fewer than a header plus two data rows; no delay can be derived
    #[error("Please select a file with 3+ rows (found {rows})")]
    FileTooShort { rows: usize },

    /// Missing, locked or unreadable recording
    #[error("Cannot read {path:?}: {source}")]
    FileUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Row index {index} out of range (0 - {row_count})")]
    IndexOutOfRange { index: usize, row_count: usize },

    /// A state label outside the known set
    #[error("Unrecognized state {label:?} on row {row}")]
    UnrecognizedState { label: String, row: usize },

    /// The recording still carries rows flagged for manual review
    #[error("Row {row} is marked MANUAL_REVIEW; the recording must be reviewed before playback")]
    ManualReviewRequired { row: usize },

    #[error("A playback session is already running")]
    AlreadyRunning,

    /// Segment playback requested for a state with no rows
    #[error("No rows recorded for state {0}")]
    UnknownState(SegmentLabel),

    /// The OSC destination could not be resolved or bound
    #[error("Cannot reach {destination}: {reason}")]
    TransportUnavailable { destination: String, reason: String },

    /// A timestamp or sensor value that is not a finite number
    #[error("Invalid number {value:?} in row {row}, column {column}")]
    InvalidNumber {
        row: usize,
        column: usize,
        value: String,
    },

    /// Timestamps so far apart that the row delay is not a representable duration
    #[error("Timestamps {first} to {last} give a row delay too long to play back")]
    DelayOutOfRange { first: f64, last: f64 },
}

impl ReplayError {
    /// Short heading used when the error is shown through an alert sink
    pub fn title(&self) -> &'static str {
        match self {
            ReplayError::FileTooShort { .. } => "File Too Short",
            ReplayError::FileUnavailable { .. } => "File Unavailable",
            ReplayError::IndexOutOfRange { .. } => "Internal Error",
            ReplayError::UnrecognizedState { .. } => "Unrecognized State",
            ReplayError::ManualReviewRequired { .. } => "Manual Review Required",
            ReplayError::AlreadyRunning => "Already Running",
            ReplayError::UnknownState(_) => "Unknown State",
            ReplayError::TransportUnavailable { .. } => "Transport Unavailable",
            ReplayError::InvalidNumber { .. } | ReplayError::DelayOutOfRange { .. } => {
                "Invalid Data"
            }
        }
    }
}

/// Result alias for mindsim operations
pub type Result<T> = std::result::Result<T, ReplayError>;
