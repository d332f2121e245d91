// IMU session recorder core
// Buffers high-frequency accel/gyro samples, persists them to append-only
// per-channel logs, and serves live statistics to a polling UI.

pub mod clock;
pub mod error;
pub mod ingest;
pub mod keep_alive;
pub mod queue;
pub mod rate;
pub mod session;
pub mod storage;

pub use clock::{Clock, SystemClock};
pub use error::{RecorderError, Result};
pub use ingest::{SensorChannel, SensorSink};
pub use keep_alive::{KeepAlive, NoopKeepAlive};
pub use queue::SampleQueue;
pub use rate::RateEstimator;
pub use session::{Recorder, Status, FLUSH_INTERVAL};
pub use storage::SessionMetadata;
