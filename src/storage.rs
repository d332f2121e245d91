use crate::error::Result;
use crate::queue::SampleQueue;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Accelerometer log file name within a session directory.
pub const ACCEL_FILE: &str = "Accelerometer.csv";
/// Gyroscope log file name.
pub const GYRO_FILE: &str = "Gyroscope.csv";
/// Annotation log file name.
pub const ANNOTATION_FILE: &str = "Annotation.csv";
/// Metadata file name.
pub const METADATA_FILE: &str = "Metadata.json";

/// Header row for the continuous vector channels.
pub const VECTOR_HEADER: &str = "timestamp_ns,x,y,z";
/// Header row for the annotation channel.
pub const ANNOTATION_HEADER: &str = "timestamp_ns,label";

/// Session metadata, written once when a recording completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub recording_start_epoch_ms: i64,
    pub epoch_offset_ns: i64,
    pub accel_sample_count: u64,
    pub gyro_sample_count: u64,
}

impl SessionMetadata {
    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Write the metadata file into a session directory.
    pub fn write(&self, dir: &Path) -> Result<()> {
        let json = self.to_json()?;
        fs::write(dir.join(METADATA_FILE), json)?;
        Ok(())
    }

    /// Read a metadata file back from a session directory.
    pub fn read(dir: &Path) -> Result<Self> {
        let json = fs::read_to_string(dir.join(METADATA_FILE))?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Drain one channel queue and append its rows to the channel log file.
///
/// No-op when the queue is observed empty, so a channel that never produced
/// a row never creates a file. The header is written exactly once, when the
/// file does not yet exist at first append. Returns the number of rows
/// written.
///
/// On I/O failure the drained rows for this cycle are lost (at-most-once
/// delivery); rows still queued remain for the next cycle.
pub fn flush_channel(path: &Path, queue: &SampleQueue, header: &str) -> Result<usize> {
    if queue.is_empty() {
        return Ok(0);
    }

    let rows = queue.drain();
    let is_new = !path.exists();

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = BufWriter::new(file);

    if is_new {
        writer.write_all(header.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    for row in &rows {
        writer.write_all(row.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;

    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn flush_on_empty_queue_creates_no_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(ACCEL_FILE);
        let queue = SampleQueue::new();

        let written = flush_channel(&path, &queue, VECTOR_HEADER).unwrap();
        assert_eq!(written, 0);
        assert!(!path.exists());
    }

    #[test]
    fn header_is_written_exactly_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(GYRO_FILE);
        let queue = SampleQueue::new();

        queue.push("1,0.1,0.2,0.3".to_string());
        queue.push("2,0.4,0.5,0.6".to_string());
        flush_channel(&path, &queue, VECTOR_HEADER).unwrap();

        queue.push("3,0.7,0.8,0.9".to_string());
        flush_channel(&path, &queue, VECTOR_HEADER).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(
            lines,
            vec![
                VECTOR_HEADER,
                "1,0.1,0.2,0.3",
                "2,0.4,0.5,0.6",
                "3,0.7,0.8,0.9",
            ]
        );
    }

    #[test]
    fn rows_are_appended_in_arrival_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(ANNOTATION_FILE);
        let queue = SampleQueue::new();

        for i in 0..5 {
            queue.push(format!("{},sync_tap", i));
        }
        let written = flush_channel(&path, &queue, ANNOTATION_HEADER).unwrap();
        assert_eq!(written, 5);

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], ANNOTATION_HEADER);
        assert_eq!(lines[3], "2,sync_tap");
    }

    #[test]
    fn metadata_round_trips_through_file() {
        let dir = tempdir().unwrap();
        let meta = SessionMetadata {
            recording_start_epoch_ms: 500_000,
            epoch_offset_ns: 499_999_999_000,
            accel_sample_count: 42,
            gyro_sample_count: 17,
        };
        meta.write(dir.path()).unwrap();

        let loaded = SessionMetadata::read(dir.path()).unwrap();
        assert_eq!(loaded.recording_start_epoch_ms, 500_000);
        assert_eq!(loaded.epoch_offset_ns, 499_999_999_000);
        assert_eq!(loaded.accel_sample_count, 42);
        assert_eq!(loaded.gyro_sample_count, 17);
    }

    #[test]
    fn metadata_json_is_flat_with_expected_keys() {
        let meta = SessionMetadata {
            recording_start_epoch_ms: 1,
            epoch_offset_ns: 2,
            accel_sample_count: 3,
            gyro_sample_count: 4,
        };
        let json = meta.to_json().unwrap();
        assert!(json.contains("\"recording_start_epoch_ms\":1"));
        assert!(json.contains("\"epoch_offset_ns\":2"));
        assert!(json.contains("\"accel_sample_count\":3"));
        assert!(json.contains("\"gyro_sample_count\":4"));
    }
}
