//! Plain-text rendering of recording details and session results

use crate::input::{format_hms, Recording};
use crate::playback::{SessionKind, SessionOutcome, SessionSummary};
use std::fmt::Write;

/// Describe a loaded recording
pub fn describe_recording(recording: &Recording) -> String {
    let mut out = String::new();
    let name = recording
        .store()
        .path()
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let _ = writeln!(out, "Filename: {}", name);
    let _ = writeln!(out, "Transmissions: {}", recording.transmissions());
    let _ = writeln!(out, "Delay: {:.4}s", recording.delay_secs());
    let _ = writeln!(out, "Estimated Time: {}", format_hms(recording.estimated_duration()));

    let states = recording.states();
    if states.has_state_column() {
        let _ = writeln!(out, "States:");
        for label in states.available_states() {
            let _ = writeln!(out, "  {:<26}{} rows", label.as_str(), states.rows(label).len());
        }
    } else {
        let _ = writeln!(out, "States: none (no State column)");
    }

    out
}

/// One-line summary of a finished session
pub fn describe_session(summary: &SessionSummary) -> String {
    let what = match summary.kind {
        SessionKind::Full => "Full playback".to_string(),
        SessionKind::Segment(label) => format!("{} playback", label),
    };
    let how = match &summary.outcome {
        SessionOutcome::Completed => "completed".to_string(),
        SessionOutcome::Cancelled => "stopped".to_string(),
        SessionOutcome::Failed(reason) => format!("failed ({})", reason),
    };
    let elapsed = (summary.finished_at - summary.started_at)
        .to_std()
        .unwrap_or_default();

    format!(
        "{} {}: {} rows, {} values in {}",
        what,
        how,
        summary.rows_sent,
        summary.messages_sent,
        format_hms(elapsed)
    )
}
