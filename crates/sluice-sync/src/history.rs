//! Bounded transfer-speed history fed by the poll loop.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::collab::{SpeedSample, SpeedSink};

/// Shared ring of the most recent speed samples. Clones share storage.
#[derive(Debug, Clone)]
pub struct SpeedHistory {
    capacity: usize,
    samples: Arc<Mutex<VecDeque<SpeedSample>>>,
}

impl SpeedHistory {
    /// Ring holding at most `capacity` samples (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
        }
    }

    fn ring(&self) -> MutexGuard<'_, VecDeque<SpeedSample>> {
        self.samples.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Samples oldest first.
    #[must_use]
    pub fn samples(&self) -> Vec<SpeedSample> {
        self.ring().iter().copied().collect()
    }

    /// Most recent sample.
    #[must_use]
    pub fn latest(&self) -> Option<SpeedSample> {
        self.ring().back().copied()
    }

    /// Number of retained samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring().len()
    }

    /// Whether no sample has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring().is_empty()
    }

    /// Maximum retained samples.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

impl SpeedSink for SpeedHistory {
    fn push_sample(&self, sample: SpeedSample) {
        let mut ring = self.ring();
        while ring.len() >= self.capacity {
            ring.pop_front();
        }
        ring.push_back(sample);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample(second: i64, download_bps: u64) -> SpeedSample {
        SpeedSample {
            at: Utc.timestamp_opt(second, 0).single().unwrap_or_default(),
            download_bps,
            upload_bps: 0,
        }
    }

    #[test]
    fn ring_drops_oldest_samples() {
        let history = SpeedHistory::new(2);
        assert!(history.is_empty());
        history.push_sample(sample(1, 10));
        history.push_sample(sample(2, 20));
        history.push_sample(sample(3, 30));

        let kept: Vec<u64> = history.samples().iter().map(|s| s.download_bps).collect();
        assert_eq!(kept, vec![20, 30]);
        assert_eq!(history.latest().map(|s| s.download_bps), Some(30));
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn clones_share_storage() {
        let history = SpeedHistory::new(4);
        let reader = history.clone();
        history.push_sample(sample(1, 5));
        assert_eq!(reader.len(), 1);
    }
}
