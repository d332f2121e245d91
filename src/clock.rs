use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Source of the two clock domains the recorder reconciles: a monotonic
/// nanosecond clock (sample ordering, stable under wall-clock adjustments)
/// and wall-clock epoch milliseconds (session naming, offset derivation).
pub trait Clock: Send + Sync {
    /// Monotonic nanoseconds. Comparable only within one process run.
    fn monotonic_ns(&self) -> i64;

    /// Milliseconds since the Unix epoch.
    fn epoch_ms(&self) -> i64;
}

/// Production clock: monotonic side anchored to a process-wide `Instant`,
/// wall-clock side read from `SystemTime`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

static MONOTONIC_ANCHOR: OnceLock<Instant> = OnceLock::new();

impl Clock for SystemClock {
    fn monotonic_ns(&self) -> i64 {
        let anchor = MONOTONIC_ANCHOR.get_or_init(Instant::now);
        anchor.elapsed().as_nanos() as i64
    }

    fn epoch_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}
