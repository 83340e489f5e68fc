use crate::core::{all_addresses, channel_address, SegmentLabel, CHANNEL_COUNT};
use crate::error::{ReplayError, Result};
use crate::input::{parse_number, parse_row, Recording};
use crate::playback::{PlaybackState, SessionKind, SessionOutcome, SessionSummary};
use crate::transport::{InertTransmitter, Transmitter, UdpTransmitter};
use crate::ui::alerts::AlertSink;
use chrono::Utc;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Replays a recording as OSC, one session at a time
///
/// Sessions run on a background tokio task. The stop signal is only checked
/// between rows, so a stop request takes effect up to one row delay later.
/// Every session ends with the stop sequence: all channels are set to zero,
/// one delay apart, whatever ended the session.
pub struct PlaybackEngine {
    recording: Arc<Recording>,
    transmitter: Arc<dyn Transmitter>,
    alerts: Arc<dyn AlertSink>,
    status: Arc<SessionStatus>,
    session: Mutex<Option<ActiveSession>>,
}

/// State shared with the running session task
struct SessionStatus {
    state: Mutex<PlaybackState>,
    position: AtomicUsize,
}

impl SessionStatus {
    fn lock_state(&self) -> MutexGuard<'_, PlaybackState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: PlaybackState) {
        *self.lock_state() = state;
    }
}

/// Handle on the current (or most recent) session
struct ActiveSession {
    stop_signal: Arc<AtomicBool>,
    done: watch::Receiver<Option<SessionSummary>>,
}

/// Rows a session walks through
enum RowPlan {
    /// Cursor from the first data row to end of file
    Sequential,
    /// Explicit row indices, in the given order
    Rows(Vec<usize>),
}

impl PlaybackEngine {
    /// Open a recording and connect to the OSC destination
    ///
    /// Recording errors are fatal. An unreachable destination is reported
    /// once through `alerts` and the engine falls back to an inert
    /// transmitter.
    pub async fn open<P: AsRef<Path>>(
        path: P,
        host: &str,
        port: u16,
        alerts: Arc<dyn AlertSink>,
    ) -> Result<Self> {
        let recording = Recording::open(path)?;

        let transmitter: Arc<dyn Transmitter> = match UdpTransmitter::connect(host, port).await {
            Ok(tx) => Arc::new(tx),
            Err(e) => {
                warn!("{}; playback will not reach any receiver", e);
                alerts.alert(e.title(), &e.to_string());
                Arc::new(InertTransmitter::new(format!("{}:{}", host, port)))
            }
        };

        Ok(Self::new(recording, transmitter, alerts))
    }

    pub fn new(
        recording: Recording,
        transmitter: Arc<dyn Transmitter>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            recording: Arc::new(recording),
            transmitter,
            alerts,
            status: Arc::new(SessionStatus {
                state: Mutex::new(PlaybackState::Idle),
                position: AtomicUsize::new(0),
            }),
            session: Mutex::new(None),
        }
    }

    pub fn recording(&self) -> &Recording {
        &self.recording
    }

    pub fn transmitter(&self) -> &dyn Transmitter {
        self.transmitter.as_ref()
    }

    /// Get current playback state
    pub fn state(&self) -> PlaybackState {
        *self.status.lock_state()
    }

    /// Index of the next row the current session reads
    pub fn position(&self) -> usize {
        self.status.position.load(Ordering::SeqCst)
    }

    /// Play every data row in file order
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_full_playback(&self) -> Result<()> {
        self.launch(SessionKind::Full, RowPlan::Sequential, 1)
    }

    /// Play only the rows labeled `label`
    ///
    /// Must be called from within a tokio runtime.
    pub fn play_segment(&self, label: SegmentLabel) -> Result<()> {
        let rows = self.recording.states().rows(label);
        let Some(&first) = rows.first() else {
            return Err(ReplayError::UnknownState(label));
        };

        self.launch(SessionKind::Segment(label), RowPlan::Rows(rows.to_vec()), first)
    }

    /// Request the current session to stop and wait for its stop sequence
    ///
    /// Idempotent: returns the summary of the most recent session, or `None`
    /// if nothing has been played yet.
    pub async fn stop(&self) -> Option<SessionSummary> {
        let done = {
            let session = self.lock_session();
            let active = session.as_ref()?;
            active.stop_signal.store(true, Ordering::SeqCst);
            active.done.clone()
        };

        if self.state() != PlaybackState::Idle {
            info!("Stop requested; finishing the current row");
        }
        self.await_summary(done).await
    }

    /// Wait for the current session to end on its own
    pub async fn wait(&self) -> Option<SessionSummary> {
        let done = self.lock_session().as_ref()?.done.clone();
        self.await_summary(done).await
    }

    fn launch(&self, kind: SessionKind, plan: RowPlan, start: usize) -> Result<()> {
        let mut session = self.lock_session();

        {
            let mut state = self.status.lock_state();
            if *state != PlaybackState::Idle {
                warn!("Rejected {:?} playback: session already {:?}", kind, *state);
                return Err(ReplayError::AlreadyRunning);
            }
            *state = PlaybackState::Running;
        }
        self.status.position.store(start, Ordering::SeqCst);

        let stop_signal = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = watch::channel(None);

        let worker = SessionWorker {
            recording: Arc::clone(&self.recording),
            transmitter: Arc::clone(&self.transmitter),
            alerts: Arc::clone(&self.alerts),
            status: Arc::clone(&self.status),
            stop_signal: Arc::clone(&stop_signal),
            kind,
        };
        tokio::spawn(worker.run(plan, done_tx));

        *session = Some(ActiveSession { stop_signal, done: done_rx });
        Ok(())
    }

    async fn await_summary(
        &self,
        mut done: watch::Receiver<Option<SessionSummary>>,
    ) -> Option<SessionSummary> {
        match done.wait_for(Option::is_some).await {
            Ok(summary) => (*summary).clone(),
            Err(_) => {
                // Worker dropped its sender without reporting: it panicked
                error!("Playback task ended without finishing its stop sequence");
                self.status.set_state(PlaybackState::Idle);
                None
            }
        }
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<ActiveSession>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Default)]
struct Progress {
    rows: usize,
    messages: usize,
}

/// Everything one session task needs, detached from the engine
struct SessionWorker {
    recording: Arc<Recording>,
    transmitter: Arc<dyn Transmitter>,
    alerts: Arc<dyn AlertSink>,
    status: Arc<SessionStatus>,
    stop_signal: Arc<AtomicBool>,
    kind: SessionKind,
}

impl SessionWorker {
    async fn run(self, plan: RowPlan, done: watch::Sender<Option<SessionSummary>>) {
        let started_at = Utc::now();
        info!(
            "Starting {:?} playback to {} ({:.4}s per row)",
            self.kind,
            self.transmitter.destination(),
            self.recording.delay_secs()
        );

        let mut progress = Progress::default();
        let outcome = match self.stream(&plan, &mut progress).await {
            Ok(true) => SessionOutcome::Completed,
            Ok(false) => SessionOutcome::Cancelled,
            Err(e) => {
                error!("Playback stopped: {}", e);
                self.alerts.alert(e.title(), &e.to_string());
                SessionOutcome::Failed(e.to_string())
            }
        };

        self.status.set_state(PlaybackState::Stopping);
        self.zero_channels().await;

        let summary = SessionSummary {
            kind: self.kind,
            outcome,
            rows_sent: progress.rows,
            messages_sent: progress.messages,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            "Playback ended ({:?}): {} rows, {} values",
            summary.outcome, summary.rows_sent, summary.messages_sent
        );

        self.status.set_state(PlaybackState::Idle);
        done.send_replace(Some(summary));
    }

    /// Send rows until the plan runs out (`Ok(true)`) or a stop is seen (`Ok(false)`)
    async fn stream(&self, plan: &RowPlan, progress: &mut Progress) -> Result<bool> {
        let store = self.recording.store();
        let delay = self.recording.delay();

        match plan {
            RowPlan::Sequential => {
                let mut cursor = store.cursor(1);
                while !self.stop_requested() {
                    let row = cursor.position();
                    let Some(line) = cursor.next_row()? else {
                        return Ok(true);
                    };
                    self.status.position.store(cursor.position(), Ordering::SeqCst);

                    self.send_row(row, &line, progress).await?;
                    tokio::time::sleep(delay).await;
                }
                Ok(false)
            }
            RowPlan::Rows(rows) => {
                for &row in rows {
                    if self.stop_requested() {
                        return Ok(false);
                    }
                    let line = store.row(row)?;
                    self.status.position.store(row + 1, Ordering::SeqCst);

                    self.send_row(row, &line, progress).await?;
                    tokio::time::sleep(delay).await;
                }
                Ok(true)
            }
        }
    }

    async fn send_row(&self, row: usize, line: &str, progress: &mut Progress) -> Result<()> {
        let fields = parse_row(line);

        // Parse the whole row first so a bad value never leaves it half sent
        let values = self
            .recording
            .data_columns(fields.len())
            .map(|column| parse_number::<f32>(&fields[column], row, column).map(|v| (column, v)))
            .collect::<Result<Vec<_>>>()?;

        for &(column, value) in &values {
            self.transmitter.send(&channel_address(column), value).await;
        }

        debug!("Row {}: sent {} values", row, values.len());
        progress.rows += 1;
        progress.messages += values.len();
        Ok(())
    }

    /// Stop sequence: every channel back to zero, one delay apart
    async fn zero_channels(&self) {
        info!("Zeroing {} channels", CHANNEL_COUNT);
        let delay = self.recording.delay();
        for address in all_addresses() {
            self.transmitter.send(&address, 0.0).await;
            tokio::time::sleep(delay).await;
        }
    }

    fn stop_requested(&self) -> bool {
        self.stop_signal.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{RecordingTransmitter, SentMessage};
    use crate::ui::alerts::MemoryAlerts;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn engine_for(
        file: &NamedTempFile,
    ) -> (PlaybackEngine, Arc<RecordingTransmitter>, Arc<MemoryAlerts>) {
        let recording = Recording::open(file.path()).unwrap();
        let tx = Arc::new(RecordingTransmitter::new());
        let alerts = Arc::new(MemoryAlerts::new());
        let engine = PlaybackEngine::new(recording, tx.clone(), alerts.clone());
        (engine, tx, alerts)
    }

    /// Header plus `rows` data rows with one-second timestamps and two channels
    fn long_recording(rows: usize) -> NamedTempFile {
        let mut contents = String::from("Time,A,B\n");
        for i in 0..rows {
            contents.push_str(&format!("{},{},{}\n", i, i + 1, i + 2));
        }
        write_csv(&contents)
    }

    fn assert_zeroed(tail: &[SentMessage]) {
        assert_eq!(tail.len(), CHANNEL_COUNT);
        for (message, address) in tail.iter().zip(all_addresses()) {
            assert_eq!(message.address, address);
            assert_eq!(message.value, 0.0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_playback_then_zero() {
        let file = write_csv("Time,A,B\n0,1.5,2.5\n1,3,4\n2,5,6\n3,7,8\n");
        let (engine, tx, alerts) = engine_for(&file);

        engine.start_full_playback().unwrap();
        assert_eq!(engine.state(), PlaybackState::Running);

        let summary = engine.wait().await.unwrap();
        assert_eq!(summary.kind, SessionKind::Full);
        assert_eq!(summary.outcome, SessionOutcome::Completed);
        assert_eq!(summary.rows_sent, 4);
        assert_eq!(summary.messages_sent, 8);
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert_eq!(engine.position(), 5);

        let sent = tx.sent();
        assert_eq!(sent.len(), 8 + CHANNEL_COUNT);
        assert_eq!(sent[0], SentMessage { address: "/theta/AF3".into(), value: 1.5 });
        assert_eq!(sent[1], SentMessage { address: "/alpha/AF3".into(), value: 2.5 });
        assert_eq!(sent[6].value, 7.0);
        assert_eq!(sent[7].value, 8.0);
        assert_zeroed(&sent[8..]);
        assert!(alerts.alerts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_playback_paces_rows_by_fixed_delay() {
        let file = long_recording(5);
        let (engine, _tx, _alerts) = engine_for(&file);
        let delay = engine.recording().delay();

        let started = tokio::time::Instant::now();
        engine.start_full_playback().unwrap();
        engine.wait().await.unwrap();

        // One delay after each of the 5 rows, then one after each zero
        let expected = delay * (5 + CHANNEL_COUNT as u32);
        assert!(started.elapsed() >= expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_is_rejected() {
        let file = long_recording(20);
        let (engine, tx, _alerts) = engine_for(&file);

        engine.start_full_playback().unwrap();
        assert!(matches!(engine.start_full_playback(), Err(ReplayError::AlreadyRunning)));

        let summary = engine.wait().await.unwrap();
        assert_eq!(summary.outcome, SessionOutcome::Completed);
        assert_eq!(summary.rows_sent, 20);
        assert_eq!(tx.sent().len(), 40 + CHANNEL_COUNT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_takes_effect_at_next_row_boundary() {
        let file = long_recording(20);
        let (engine, tx, _alerts) = engine_for(&file);
        let delay = engine.recording().delay();

        engine.start_full_playback().unwrap();
        tokio::time::sleep(delay.mul_f64(3.5)).await;

        let summary = engine.stop().await.unwrap();
        assert_eq!(summary.outcome, SessionOutcome::Cancelled);
        assert_eq!(summary.rows_sent, 4);
        assert_eq!(engine.state(), PlaybackState::Idle);

        let sent = tx.sent();
        assert_eq!(sent.len(), 8 + CHANNEL_COUNT);
        assert_zeroed(&sent[8..]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let file = long_recording(3);
        let (engine, tx, _alerts) = engine_for(&file);

        assert!(engine.stop().await.is_none());

        engine.start_full_playback().unwrap();
        let first = engine.stop().await.unwrap();
        let second = engine.stop().await.unwrap();
        assert_eq!(first.outcome, second.outcome);
        assert_eq!(first.rows_sent, second.rows_sent);

        // Only one stop sequence was sent
        let zeros = tx.sent().iter().filter(|m| m.value == 0.0).count();
        assert_eq!(zeros, CHANNEL_COUNT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_completion() {
        let file = long_recording(2);
        let (engine, tx, _alerts) = engine_for(&file);

        engine.start_full_playback().unwrap();
        engine.wait().await.unwrap();
        engine.start_full_playback().unwrap();
        engine.wait().await.unwrap();

        assert_eq!(tx.sent().len(), 2 * (4 + CHANNEL_COUNT));
    }

    #[tokio::test(start_paused = true)]
    async fn test_segment_playback() {
        let file = write_csv(
            "Time,A,B,State\n\
             0,1,2,Baseline\n\
             1,3,4,Flow\n\
             2,5,6,Baseline\n\
             3,7,8,Flow\n",
        );
        let (engine, tx, _alerts) = engine_for(&file);

        engine.play_segment(SegmentLabel::Flow).unwrap();
        let summary = engine.wait().await.unwrap();
        assert_eq!(summary.kind, SessionKind::Segment(SegmentLabel::Flow));
        assert_eq!(summary.outcome, SessionOutcome::Completed);
        assert_eq!(summary.rows_sent, 2);
        assert_eq!(engine.position(), 5);

        let sent = tx.sent();
        let values: Vec<f32> = sent[..4].iter().map(|m| m.value).collect();
        assert_eq!(values, vec![3.0, 4.0, 7.0, 8.0]);
        assert_zeroed(&sent[4..]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_segment_mid_run() {
        let mut contents = String::from("Time,A,B,State\n");
        for i in 0..40 {
            let label = if i % 2 == 0 { "Flow" } else { "Baseline" };
            contents.push_str(&format!("{},{},{},{}\n", i, i + 1, i + 2, label));
        }
        let file = write_csv(&contents);
        let (engine, tx, _alerts) = engine_for(&file);
        let delay = engine.recording().delay();

        engine.play_segment(SegmentLabel::Flow).unwrap();
        tokio::time::sleep(delay.mul_f64(3.5)).await;

        let summary = engine.stop().await.unwrap();
        assert_eq!(summary.kind, SessionKind::Segment(SegmentLabel::Flow));
        assert_eq!(summary.outcome, SessionOutcome::Cancelled);
        assert_eq!(summary.rows_sent, 4);
        assert_eq!(engine.state(), PlaybackState::Idle);

        // Flow rows are 1, 3, 5, 7: values i + 1 and i + 2 for i = 0, 2, 4, 6
        let sent = tx.sent();
        assert_eq!(sent.len(), 8 + CHANNEL_COUNT);
        assert_eq!(sent[6].value, 7.0);
        assert_eq!(sent[7].value, 8.0);
        assert_zeroed(&sent[8..]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_is_stopping_while_zeroing() {
        let file = long_recording(2);
        let (engine, tx, _alerts) = engine_for(&file);
        let delay = engine.recording().delay();

        engine.start_full_playback().unwrap();
        // Two rows, then partway into the zero sends
        tokio::time::sleep(delay.mul_f64(5.5)).await;
        assert_eq!(engine.state(), PlaybackState::Stopping);
        assert!(engine.start_full_playback().is_err());

        let sent = tx.sent().len();
        assert!(sent > 4 && sent < 4 + CHANNEL_COUNT);

        engine.wait().await.unwrap();
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert_eq!(tx.sent().len(), 4 + CHANNEL_COUNT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_segment_without_rows() {
        let file = write_csv("Time,A,State\n0,1,Baseline\n1,2,Baseline\n");
        let (engine, tx, _alerts) = engine_for(&file);

        let err = engine.play_segment(SegmentLabel::TransientHypofrontality).unwrap_err();
        assert!(matches!(
            err,
            ReplayError::UnknownState(SegmentLabel::TransientHypofrontality)
        ));
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert!(tx.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_value_ends_session_and_zeroes() {
        let file = write_csv("Time,A,B\n0,1,2\n1,3,oops\n2,5,6\n");
        let (engine, tx, alerts) = engine_for(&file);

        engine.start_full_playback().unwrap();
        let summary = engine.wait().await.unwrap();
        assert!(matches!(summary.outcome, SessionOutcome::Failed(_)));
        assert_eq!(summary.rows_sent, 1);

        // The bad row is not partially sent
        let sent = tx.sent();
        assert_eq!(sent.len(), 2 + CHANNEL_COUNT);
        assert_zeroed(&sent[2..]);

        let alerts = alerts.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].0, "Invalid Data");
    }

    #[tokio::test]
    async fn test_unreachable_destination_degrades_to_inert() {
        let file = long_recording(2);
        let alerts = Arc::new(MemoryAlerts::new());

        let engine = PlaybackEngine::open(file.path(), "host.invalid", 7000, alerts.clone())
            .await
            .unwrap();
        assert!(engine.transmitter().is_inert());

        let alerts = alerts.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].0, "Transport Unavailable");
    }

    #[tokio::test]
    async fn test_manual_review_prevents_engine() {
        let file = write_csv("Time,A,State\n0,1,Baseline\n1,2,MANUAL_REVIEW\n");
        let result =
            PlaybackEngine::open(file.path(), "127.0.0.1", 7000, Arc::new(MemoryAlerts::new()))
                .await;
        assert!(matches!(result, Err(ReplayError::ManualReviewRequired { row: 2 })));
    }
}
