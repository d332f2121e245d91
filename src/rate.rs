use crate::error::{RecorderError, Result};
use std::sync::Mutex;

/// Number of inter-sample intervals the rolling window holds.
pub const WINDOW_CAPACITY: usize = 50;

/// Fixed-capacity ring of inter-sample intervals with a running sum.
///
/// Invariant: `sum` equals the arithmetic sum of the `count` most recently
/// added values, and `count <= capacity`.
struct IntervalRing {
    slots: [i64; WINDOW_CAPACITY],
    head: usize,
    count: usize,
    sum: i64,
}

impl IntervalRing {
    fn new() -> Self {
        Self {
            slots: [0; WINDOW_CAPACITY],
            head: 0,
            count: 0,
            sum: 0,
        }
    }

    fn add(&mut self, interval_ns: i64) {
        if self.count < WINDOW_CAPACITY {
            self.slots[self.head] = interval_ns;
            self.sum += interval_ns;
            self.count += 1;
        } else {
            self.sum -= self.slots[self.head];
            self.slots[self.head] = interval_ns;
            self.sum += interval_ns;
        }
        self.head = (self.head + 1) % WINDOW_CAPACITY;
    }

    fn clear(&mut self) {
        self.head = 0;
        self.count = 0;
        self.sum = 0;
    }

    fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum as f64 / self.count as f64
        }
    }
}

/// Rolling sample-rate estimator over the last `WINDOW_CAPACITY` intervals.
///
/// Written by the sensor callback, read by status polls on another thread;
/// a short mutex section is plenty at sensor rates.
pub struct RateEstimator {
    ring: Mutex<IntervalRing>,
}

impl RateEstimator {
    pub fn new() -> Self {
        Self {
            ring: Mutex::new(IntervalRing::new()),
        }
    }

    /// Record one inter-sample interval, overwriting the oldest at capacity.
    pub fn add(&self, interval_ns: i64) -> Result<()> {
        let mut ring = self
            .ring
            .lock()
            .map_err(|_| RecorderError::Internal("rate ring lock poisoned".to_string()))?;
        ring.add(interval_ns);
        Ok(())
    }

    /// Reset to empty.
    pub fn clear(&self) -> Result<()> {
        let mut ring = self
            .ring
            .lock()
            .map_err(|_| RecorderError::Internal("rate ring lock poisoned".to_string()))?;
        ring.clear();
        Ok(())
    }

    /// Mean of the currently held intervals in nanoseconds, 0 when empty.
    pub fn average_ns(&self) -> f64 {
        match self.ring.lock() {
            Ok(ring) => ring.average(),
            Err(_) => 0.0,
        }
    }

    /// Rolling rate in Hz, 0 when no intervals have been observed.
    pub fn rate_hz(&self) -> f64 {
        let avg = self.average_ns();
        if avg > 0.0 {
            1e9 / avg
        } else {
            0.0
        }
    }
}

impl Default for RateEstimator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_average_is_zero() {
        let est = RateEstimator::new();
        assert_eq!(est.average_ns(), 0.0);
        assert_eq!(est.rate_hz(), 0.0);
    }

    #[test]
    fn average_matches_window_of_last_values() {
        let est = RateEstimator::new();
        let mut added: Vec<i64> = Vec::new();

        for i in 0..137i64 {
            let v = (i * 977) % 5000 + 1;
            est.add(v).unwrap();
            added.push(v);

            let window: Vec<i64> = added
                .iter()
                .rev()
                .take(WINDOW_CAPACITY)
                .copied()
                .collect();
            let expected = window.iter().sum::<i64>() as f64 / window.len() as f64;
            assert!((est.average_ns() - expected).abs() < 1e-9, "at add {}", i);
        }
    }

    #[test]
    fn overwrites_oldest_at_capacity() {
        let est = RateEstimator::new();
        for _ in 0..WINDOW_CAPACITY {
            est.add(100).unwrap();
        }
        assert_eq!(est.average_ns(), 100.0);

        // Replace the whole window with a different value.
        for _ in 0..WINDOW_CAPACITY {
            est.add(300).unwrap();
        }
        assert_eq!(est.average_ns(), 300.0);
    }

    #[test]
    fn rate_hz_is_reciprocal_of_average() {
        let est = RateEstimator::new();
        // 5 ms intervals -> 200 Hz.
        for _ in 0..10 {
            est.add(5_000_000).unwrap();
        }
        assert!((est.rate_hz() - 200.0).abs() < 1e-6);
    }

    #[test]
    fn clear_resets_to_empty() {
        let est = RateEstimator::new();
        est.add(1_000).unwrap();
        est.add(2_000).unwrap();
        est.clear().unwrap();
        assert_eq!(est.average_ns(), 0.0);
        assert_eq!(est.rate_hz(), 0.0);
    }
}
