pub mod engine;

pub use engine::PlaybackEngine;

use crate::core::SegmentLabel;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlaybackState {
    Idle,
    Running,
    /// Session loop has ended; channels are being zeroed
    Stopping,
}

/// What a session iterates over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionKind {
    /// Every data row, in file order
    Full,
    /// Only the rows of one labeled segment
    Segment(SegmentLabel),
}

/// How a session's row loop ended
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SessionOutcome {
    /// All selected rows were sent
    Completed,
    /// Stopped on request
    Cancelled,
    /// A row could not be read or parsed
    Failed(String),
}

/// Result of one playback session, reported after the stop sequence
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub kind: SessionKind,
    pub outcome: SessionOutcome,
    /// Data rows fully transmitted
    pub rows_sent: usize,
    /// Channel values sent for those rows (stop sequence excluded)
    pub messages_sent: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
