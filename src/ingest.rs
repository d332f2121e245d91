/// One of the two continuous sensor streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorChannel {
    Accelerometer,
    Gyroscope,
}

/// Boundary between the platform sensor delivery mechanism and the recorder.
///
/// The platform (or a simulator) registers for hardware sensor events and
/// forwards each one here at sensor-driven cadence. Implementations must
/// complete in bounded, small time: no file I/O, no long-held locks.
pub trait SensorSink {
    /// Deliver one raw sample. `timestamp_ns` is monotonic-clock
    /// nanoseconds; `values` carries at least x, y, z. Samples with fewer
    /// than 3 components are dropped.
    fn on_sample(&self, channel: SensorChannel, timestamp_ns: i64, values: &[f32]);
}

/// Format a vector sample as a channel log row.
pub(crate) fn format_vector_row(timestamp_ns: i64, values: &[f32]) -> String {
    format!(
        "{},{},{},{}",
        timestamp_ns, values[0], values[1], values[2]
    )
}
