use crate::core::CHANNEL_COUNT;
use crate::error::{ReplayError, Result};
use crate::input::csv::{parse_number, parse_row, RowStore};
use crate::input::states::StateIndex;
use std::ops::Range;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Nominal over effective sample rate of the headset the recordings come from
pub const SAMPLE_RATE_CORRECTION: f64 = 532.0 / 480.0;

/// Header plus the two data rows needed to derive a delay
pub const MIN_ROWS: usize = 3;

/// A validated recording, ready for playback
///
/// Everything here is computed once when the file is opened and never
/// changes afterwards.
#[derive(Debug, Clone)]
pub struct Recording {
    store: RowStore,
    delay_secs: f64,
    delay: Duration,
    states: StateIndex,
}

impl Recording {
    /// Open and validate a recording
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let store = RowStore::open(path)?;
        if store.row_count() < MIN_ROWS {
            return Err(ReplayError::FileTooShort { rows: store.row_count() });
        }

        let delay_secs = compute_delay(&store)?;
        let delay = Duration::from_secs_f64(delay_secs);
        let states = StateIndex::build(&store)?;

        info!(
            "Loaded {:?}: {} transmissions, {:.4}s apart",
            store.path(),
            store.row_count() - 1,
            delay_secs
        );

        Ok(Self { store, delay_secs, delay, states })
    }

    pub fn store(&self) -> &RowStore {
        &self.store
    }

    /// Total number of rows, header included
    pub fn row_count(&self) -> usize {
        self.store.row_count()
    }

    /// Number of data rows sent by a full playback
    pub fn transmissions(&self) -> usize {
        self.row_count() - 1
    }

    /// Delay between consecutive rows, in seconds
    pub fn delay_secs(&self) -> f64 {
        self.delay_secs
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Expected wall-clock length of a full playback, saturating at `Duration::MAX`
    pub fn estimated_duration(&self) -> Duration {
        u32::try_from(self.transmissions())
            .ok()
            .and_then(|rows| self.delay.checked_mul(rows))
            .unwrap_or(Duration::MAX)
    }

    pub fn states(&self) -> &StateIndex {
        &self.states
    }

    /// Columns of a row with `field_count` fields that carry channel values
    ///
    /// The timestamp is never a channel. The trailing column is skipped when
    /// the recording has a state column, and anything past the last channel
    /// is ignored.
    pub fn data_columns(&self, field_count: usize) -> Range<usize> {
        let end = if self.states.has_state_column() {
            field_count.saturating_sub(1)
        } else {
            field_count
        };
        1..end.min(CHANNEL_COUNT + 1).max(1)
    }
}

/// Average inter-row delay in seconds, corrected for the headset sample rate
///
/// Pacing is regularized to the file-average rate; individual row
/// timestamps are not honored during playback. The result always fits in a
/// `Duration`.
pub fn compute_delay(store: &RowStore) -> Result<f64> {
    let row_count = store.row_count();
    let first = timestamp(store, 1)?;
    let last = timestamp(store, row_count - 1)?;

    let delay = ((last - first) / (row_count - 1) as f64) / SAMPLE_RATE_CORRECTION;
    if delay < 0.0 {
        warn!("Timestamps decrease ({} -> {}); playing without delay", first, last);
        return Ok(0.0);
    }
    if Duration::try_from_secs_f64(delay).is_err() {
        return Err(ReplayError::DelayOutOfRange { first, last });
    }

    Ok(delay)
}

fn timestamp(store: &RowStore, row: usize) -> Result<f64> {
    let fields = parse_row(&store.row(row)?);
    parse_number(&fields[0], row, 0)
}

/// Format a duration as `H:MM:SS`
pub fn format_hms(duration: Duration) -> String {
    let total = duration.as_secs_f64().round() as u64;
    format!("{}:{:02}:{:02}", total / 3600, (total / 60) % 60, total % 60)
}
