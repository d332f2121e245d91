use crate::error::Result;

/// Platform wake/keep-alive resource held for the duration of a recording,
/// so long-running background capture is not throttled. The platform side
/// (wake lock, foreground service, ...) implements this; the recorder only
/// brackets acquire/release around the session.
pub trait KeepAlive: Send {
    fn acquire(&mut self) -> Result<()>;
    fn release(&mut self);
}

/// Keep-alive for hosts that need none (tests, desktop simulation).
#[derive(Debug, Default)]
pub struct NoopKeepAlive;

impl KeepAlive for NoopKeepAlive {
    fn acquire(&mut self) -> Result<()> {
        Ok(())
    }

    fn release(&mut self) {}
}
