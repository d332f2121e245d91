use crossbeam::queue::SegQueue;

/// Unbounded FIFO of pre-formatted sample rows for one channel.
///
/// Producer is the sensor callback, consumer is the flusher. `push` never
/// blocks and never fails. There is deliberately no back-pressure: the 1 s
/// flush cadence keeps steady-state depth small, and ingest latency wins
/// over bounded memory.
pub struct SampleQueue {
    rows: SegQueue<String>,
}

impl SampleQueue {
    pub fn new() -> Self {
        Self {
            rows: SegQueue::new(),
        }
    }

    /// Append one row. Safe to call from the sensor-delivery context.
    pub fn push(&self, row: String) {
        self.rows.push(row);
    }

    /// Remove and return the rows queued at the moment of the call, in FIFO
    /// order. Rows pushed while the drain runs stay queued for the next
    /// cycle.
    pub fn drain(&self) -> Vec<String> {
        let observed = self.rows.len();
        let mut out = Vec::with_capacity(observed);
        for _ in 0..observed {
            match self.rows.pop() {
                Some(row) => out.push(row),
                None => break,
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Default for SampleQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn drain_preserves_push_order() {
        let queue = SampleQueue::new();
        queue.push("a".to_string());
        queue.push("b".to_string());
        queue.push("c".to_string());
        assert_eq!(queue.drain(), vec!["a", "b", "c"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn drain_on_empty_queue_returns_nothing() {
        let queue = SampleQueue::new();
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn rows_pushed_after_a_drain_land_in_the_next_one() {
        let queue = SampleQueue::new();
        queue.push("1".to_string());
        assert_eq!(queue.drain(), vec!["1"]);
        queue.push("2".to_string());
        queue.push("3".to_string());
        assert_eq!(queue.drain(), vec!["2", "3"]);
    }

    #[test]
    fn concurrent_pushes_are_never_lost_or_duplicated() {
        let queue = Arc::new(SampleQueue::new());
        let total = 10_000usize;

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..total {
                    queue.push(i.to_string());
                }
            })
        };

        // Drain repeatedly while the producer runs.
        let mut seen = Vec::new();
        while seen.len() < total {
            seen.extend(queue.drain());
            if producer.is_finished() {
                seen.extend(queue.drain());
                break;
            }
        }
        producer.join().unwrap();
        seen.extend(queue.drain());

        assert_eq!(seen.len(), total);
        // Single producer, so arrival order must survive across drains.
        for (i, row) in seen.iter().enumerate() {
            assert_eq!(row, &i.to_string());
        }
    }
}
