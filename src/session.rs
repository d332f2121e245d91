use crate::clock::{Clock, SystemClock};
use crate::error::{RecorderError, Result};
use crate::ingest::{format_vector_row, SensorChannel, SensorSink};
use crate::keep_alive::{KeepAlive, NoopKeepAlive};
use crate::queue::SampleQueue;
use crate::rate::RateEstimator;
use crate::storage::{
    self, SessionMetadata, ACCEL_FILE, ANNOTATION_FILE, ANNOTATION_HEADER, GYRO_FILE,
    VECTOR_HEADER,
};
use chrono::{Local, TimeZone};
use crossbeam::channel::{self, Receiver, Sender};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Cadence of the periodic queue-to-file flush while recording.
pub const FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Label recorded for a synchronization tap annotation.
pub const SYNC_TAP_LABEL: &str = "sync_tap";

/// Read-only status snapshot for the polling presentation layer.
#[derive(Debug, Clone)]
pub struct Status {
    pub is_recording: bool,
    pub elapsed_seconds: u64,
    pub accel_count: u64,
    pub gyro_count: u64,
    pub accel_rate_hz: f64,
    pub gyro_rate_hz: f64,
    pub last_accel: [f32; 3],
    pub last_gyro: [f32; 3],
    pub last_completed: Option<PathBuf>,
}

/// Most recent sample seen on one channel. `timestamp_ns == 0` means none
/// yet (matches the sensor clock never reading exactly 0 in practice).
#[derive(Debug, Clone, Copy, Default)]
struct LastSample {
    timestamp_ns: i64,
    values: [f32; 3],
}

/// Per-channel live statistics, maintained whether or not a session is
/// active so the preview works before recording starts.
struct LiveChannel {
    estimator: RateEstimator,
    last: Mutex<LastSample>,
    count: AtomicU64,
}

impl LiveChannel {
    fn new() -> Self {
        Self {
            estimator: RateEstimator::new(),
            last: Mutex::new(LastSample::default()),
            count: AtomicU64::new(0),
        }
    }
}

/// One active recording: its directory, clock bookkeeping, and the three
/// channel queues. Exclusively owned by the recorder; the flusher thread
/// holds a clone of the `Arc` for the session's lifetime.
struct ActiveSession {
    dir: PathBuf,
    start_monotonic_ns: i64,
    start_epoch_ms: i64,
    epoch_offset_ns: i64,
    accel_rows: SampleQueue,
    gyro_rows: SampleQueue,
    annotation_rows: SampleQueue,
}

impl ActiveSession {
    fn queue(&self, channel: SensorChannel) -> &SampleQueue {
        match channel {
            SensorChannel::Accelerometer => &self.accel_rows,
            SensorChannel::Gyroscope => &self.gyro_rows,
        }
    }

    /// Drain all three queues to their channel files. Each channel is
    /// attempted even if an earlier one fails; the first failure is
    /// returned after the pass.
    fn flush(&self) -> Result<()> {
        let channels: [(&str, &SampleQueue, &str); 3] = [
            (ACCEL_FILE, &self.accel_rows, VECTOR_HEADER),
            (GYRO_FILE, &self.gyro_rows, VECTOR_HEADER),
            (ANNOTATION_FILE, &self.annotation_rows, ANNOTATION_HEADER),
        ];

        let mut failure: Option<RecorderError> = None;
        for (file, queue, header) in channels {
            if let Err(e) = storage::flush_channel(&self.dir.join(file), queue, header) {
                log::error!("Failed to flush {}: {}", file, e);
                failure.get_or_insert(e);
            }
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// State shared between the recorder handle, the sensor callback, and the
/// flusher thread.
struct Shared {
    recording: AtomicBool,
    accel: LiveChannel,
    gyro: LiveChannel,
    session: Mutex<Option<Arc<ActiveSession>>>,
    last_completed: Mutex<Option<PathBuf>>,
}

struct Flusher {
    stop_tx: Sender<()>,
    handle: thread::JoinHandle<()>,
}

/// IMU recording engine.
///
/// State machine is Idle → Recording → Idle, with at most one active
/// session. Samples arrive through [`SensorSink::on_sample`]; a background
/// thread drains the queues every [`FLUSH_INTERVAL`] while recording, and
/// `stop` performs one final synchronous flush plus the metadata write
/// before the session directory is published for export.
pub struct Recorder {
    base_dir: PathBuf,
    clock: Arc<dyn Clock>,
    keep_alive: Mutex<Box<dyn KeepAlive>>,
    shared: Arc<Shared>,
    flusher: Mutex<Option<Flusher>>,
    // Serializes start/stop so the state check and the transition happen
    // under one lock. Never taken on the sensor or flusher paths.
    control: Mutex<()>,
}

impl Recorder {
    /// Create an idle recorder writing session directories under `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self::with_parts(base_dir, Arc::new(SystemClock), Box::new(NoopKeepAlive))
    }

    /// Create an idle recorder with explicit clock and keep-alive
    /// collaborators.
    pub fn with_parts(
        base_dir: impl Into<PathBuf>,
        clock: Arc<dyn Clock>,
        keep_alive: Box<dyn KeepAlive>,
    ) -> Self {
        Self {
            base_dir: base_dir.into(),
            clock,
            keep_alive: Mutex::new(keep_alive),
            shared: Arc::new(Shared {
                recording: AtomicBool::new(false),
                accel: LiveChannel::new(),
                gyro: LiveChannel::new(),
                session: Mutex::new(None),
                last_completed: Mutex::new(None),
            }),
            flusher: Mutex::new(None),
            control: Mutex::new(()),
        }
    }

    /// Start a new recording session.
    ///
    /// Returns the session directory. `Err(AlreadyRecording)` with no side
    /// effects if a session is active; transitions are serialized, so of
    /// several concurrent starts exactly one admits a session. Keep-alive
    /// acquisition failure is logged and recording proceeds without it.
    pub fn start(&self) -> Result<PathBuf> {
        let _control = self.lock_control()?;
        if self.shared.recording.load(Ordering::SeqCst) {
            return Err(RecorderError::AlreadyRecording);
        }

        if let Err(e) = self.lock_keep_alive()?.acquire() {
            log::warn!("Keep-alive unavailable, recording without it: {}", e);
        }

        let start_epoch_ms = self.clock.epoch_ms();
        let dir = self.base_dir.join(session_dir_name(start_epoch_ms));
        if let Err(e) = fs::create_dir_all(&dir) {
            log::error!("Failed to create session directory {}: {}", dir.display(), e);
            self.lock_keep_alive()?.release();
            return Err(e.into());
        }

        self.shared.accel.estimator.clear()?;
        self.shared.gyro.estimator.clear()?;
        self.shared.accel.count.store(0, Ordering::SeqCst);
        self.shared.gyro.count.store(0, Ordering::SeqCst);

        let start_monotonic_ns = self.clock.monotonic_ns();
        let session = Arc::new(ActiveSession {
            dir: dir.clone(),
            start_monotonic_ns,
            start_epoch_ms,
            epoch_offset_ns: start_epoch_ms * 1_000_000 - start_monotonic_ns,
            accel_rows: SampleQueue::new(),
            gyro_rows: SampleQueue::new(),
            annotation_rows: SampleQueue::new(),
        });

        *self.lock_session()? = Some(Arc::clone(&session));
        self.shared.recording.store(true, Ordering::SeqCst);

        let (stop_tx, stop_rx) = channel::bounded(1);
        let handle = thread::spawn(move || flusher_loop(session, stop_rx));
        *self.lock_flusher()? = Some(Flusher { stop_tx, handle });

        log::info!("Recording started: {}", dir.display());
        Ok(dir)
    }

    /// Stop the active recording session.
    ///
    /// Clears the recording flag, releases the keep-alive, joins the
    /// flusher, then performs the final synchronous flush and writes the
    /// metadata record before publishing the directory as the last
    /// completed recording. `Err(NotRecording)` with no side effects if
    /// idle. A flush or metadata failure is logged, the directory is still
    /// published, and the first failure is returned.
    pub fn stop(&self) -> Result<PathBuf> {
        let _control = self.lock_control()?;
        if !self.shared.recording.swap(false, Ordering::SeqCst) {
            return Err(RecorderError::NotRecording);
        }

        self.lock_keep_alive()?.release();

        if let Some(flusher) = self.lock_flusher()?.take() {
            let _ = flusher.stop_tx.send(());
            if flusher.handle.join().is_err() {
                log::error!("Flusher thread panicked");
            }
        }

        let session = self
            .lock_session()?
            .take()
            .ok_or_else(|| RecorderError::Internal("recording flag set without session".to_string()))?;

        let mut failure: Option<RecorderError> = None;
        if let Err(e) = session.flush() {
            failure.get_or_insert(e);
        }

        let metadata = SessionMetadata {
            recording_start_epoch_ms: session.start_epoch_ms,
            epoch_offset_ns: session.epoch_offset_ns,
            accel_sample_count: self.shared.accel.count.load(Ordering::SeqCst),
            gyro_sample_count: self.shared.gyro.count.load(Ordering::SeqCst),
        };
        if let Err(e) = metadata.write(&session.dir) {
            log::error!("Failed to write metadata: {}", e);
            failure.get_or_insert(e);
        }

        *self.lock_last_completed()? = Some(session.dir.clone());
        log::info!(
            "Recording stopped: {} ({} accel, {} gyro samples)",
            session.dir.display(),
            metadata.accel_sample_count,
            metadata.gyro_sample_count
        );

        match failure {
            Some(e) => Err(e),
            None => Ok(session.dir.clone()),
        }
    }

    /// Record one synchronization tap annotation at the current monotonic
    /// time. `Err(NotRecording)` when idle; no row is ever produced then.
    pub fn sync_tap(&self) -> Result<()> {
        if !self.shared.recording.load(Ordering::SeqCst) {
            return Err(RecorderError::NotRecording);
        }
        let timestamp_ns = self.clock.monotonic_ns();
        match self.lock_session()?.as_ref() {
            Some(session) => {
                session
                    .annotation_rows
                    .push(format!("{},{}", timestamp_ns, SYNC_TAP_LABEL));
                Ok(())
            }
            None => Err(RecorderError::NotRecording),
        }
    }

    /// Whether a session is active.
    pub fn is_recording(&self) -> bool {
        self.shared.recording.load(Ordering::SeqCst)
    }

    /// Directory of the most recently completed session, for the export
    /// collaborator. Packaging and transfer are its concern, not ours.
    pub fn last_completed(&self) -> Option<PathBuf> {
        self.shared
            .last_completed
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
    }

    /// Status snapshot for the polling presentation layer.
    pub fn status(&self) -> Status {
        let is_recording = self.shared.recording.load(Ordering::SeqCst);
        let elapsed_seconds = if is_recording {
            self.active_session()
                .map(|s| {
                    let elapsed_ns = self.clock.monotonic_ns() - s.start_monotonic_ns;
                    (elapsed_ns.max(0) as u64) / 1_000_000_000
                })
                .unwrap_or(0)
        } else {
            0
        };

        Status {
            is_recording,
            elapsed_seconds,
            accel_count: self.shared.accel.count.load(Ordering::SeqCst),
            gyro_count: self.shared.gyro.count.load(Ordering::SeqCst),
            accel_rate_hz: self.shared.accel.estimator.rate_hz(),
            gyro_rate_hz: self.shared.gyro.estimator.rate_hz(),
            last_accel: last_values(&self.shared.accel),
            last_gyro: last_values(&self.shared.gyro),
            last_completed: self.last_completed(),
        }
    }

    fn live(&self, channel: SensorChannel) -> &LiveChannel {
        match channel {
            SensorChannel::Accelerometer => &self.shared.accel,
            SensorChannel::Gyroscope => &self.shared.gyro,
        }
    }

    fn active_session(&self) -> Option<Arc<ActiveSession>> {
        self.shared
            .session
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().cloned())
    }

    fn lock_session(&self) -> Result<std::sync::MutexGuard<'_, Option<Arc<ActiveSession>>>> {
        self.shared
            .session
            .lock()
            .map_err(|_| RecorderError::Internal("session lock poisoned".to_string()))
    }

    fn lock_flusher(&self) -> Result<std::sync::MutexGuard<'_, Option<Flusher>>> {
        self.flusher
            .lock()
            .map_err(|_| RecorderError::Internal("flusher lock poisoned".to_string()))
    }

    fn lock_control(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.control
            .lock()
            .map_err(|_| RecorderError::Internal("control lock poisoned".to_string()))
    }

    fn lock_keep_alive(&self) -> Result<std::sync::MutexGuard<'_, Box<dyn KeepAlive>>> {
        self.keep_alive
            .lock()
            .map_err(|_| RecorderError::Internal("keep-alive lock poisoned".to_string()))
    }

    fn lock_last_completed(&self) -> Result<std::sync::MutexGuard<'_, Option<PathBuf>>> {
        self.shared
            .last_completed
            .lock()
            .map_err(|_| RecorderError::Internal("last-completed lock poisoned".to_string()))
    }
}

impl SensorSink for Recorder {
    /// Sensor-delivery hot path: bounded work, no file I/O. Malformed
    /// samples (fewer than 3 components) are dropped without touching
    /// counters or estimators.
    fn on_sample(&self, channel: SensorChannel, timestamp_ns: i64, values: &[f32]) {
        if values.len() < 3 {
            return;
        }
        let live = self.live(channel);

        // Interval + last-value snapshot, maintained even while idle so the
        // preview works before recording starts. The first sample of a
        // channel has no prior timestamp and records no interval.
        if let Ok(mut last) = live.last.lock() {
            if last.timestamp_ns != 0 {
                let _ = live.estimator.add(timestamp_ns - last.timestamp_ns);
            }
            last.timestamp_ns = timestamp_ns;
            last.values = [values[0], values[1], values[2]];
        }

        if self.shared.recording.load(Ordering::Acquire) {
            // A sample racing stop() may observe the flag set while the
            // session is already gone; it is simply not recorded.
            if let Some(session) = self.active_session() {
                session.queue(channel).push(format_vector_row(timestamp_ns, values));
                live.count.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if self.is_recording() {
            if let Err(e) = self.stop() {
                log::error!("Failed to stop recording on drop: {}", e);
            }
        }
    }
}

fn last_values(channel: &LiveChannel) -> [f32; 3] {
    channel
        .last
        .lock()
        .map(|last| last.values)
        .unwrap_or([0.0; 3])
}

/// Session directory name from the start wall-clock time, at one-second
/// granularity. Two starts within the same second may collide; accepted.
fn session_dir_name(epoch_ms: i64) -> String {
    Local
        .timestamp_millis_opt(epoch_ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d_%H-%M-%S").to_string())
        .unwrap_or_else(|| format!("session_{}", epoch_ms))
}

/// Periodic flusher: drains the queues every [`FLUSH_INTERVAL`] until stop
/// is signalled. The final flush is not done here; stop() performs it
/// synchronously so it happens after the flag is cleared and the thread has
/// been joined.
fn flusher_loop(session: Arc<ActiveSession>, stop_rx: Receiver<()>) {
    let ticker = channel::tick(FLUSH_INTERVAL);
    loop {
        crossbeam::select! {
            recv(ticker) -> _ => {
                if let Err(e) = session.flush() {
                    log::error!("Periodic flush failed: {}", e);
                }
            }
            recv(stop_rx) -> _ => break,
        }
    }
}
