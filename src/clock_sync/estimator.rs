use std::collections::VecDeque;

use crate::clock_sync::sample::SyncSample;

/// Number of most recent samples kept.
pub const SYNC_WINDOW: usize = 5;
/// Samples needed before the estimate is trusted.
pub const SYNC_MIN_SAMPLES: usize = 3;

/// Sliding-window median of clock offset and round trip.
#[derive(Debug, Clone, Default)]
pub struct ClockSyncEstimator {
    offsets: VecDeque<f64>,
    round_trips: VecDeque<i64>,
}

impl ClockSyncEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, sample: SyncSample) {
        if self.offsets.len() == SYNC_WINDOW {
            self.offsets.pop_front();
            self.round_trips.pop_front();
        }
        self.offsets.push_back(sample.offset_ms);
        self.round_trips.push_back(sample.round_trip_ms);
    }

    /// Median offset of the window, 0 before the first sample.
    pub fn offset_ms(&self) -> f64 {
        let mut sorted: Vec<f64> = self.offsets.iter().copied().collect();
        sorted.sort_by(f64::total_cmp);
        upper_median(&sorted).unwrap_or(0.0)
    }

    pub fn round_trip_ms(&self) -> i64 {
        let mut sorted: Vec<i64> = self.round_trips.iter().copied().collect();
        sorted.sort_unstable();
        upper_median(&sorted).unwrap_or(0)
    }

    pub fn is_synced(&self) -> bool {
        self.offsets.len() >= SYNC_MIN_SAMPLES
    }

    pub fn sample_count(&self) -> usize {
        self.offsets.len()
    }
}

/// `sorted[len / 2]`: the upper-middle element for even lengths.
fn upper_median<T: Copy>(sorted: &[T]) -> Option<T> {
    sorted.get(sorted.len() / 2).copied()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::clock_sync::compute_sample;
    use rand::Rng;

    fn sample(offset_ms: f64, round_trip_ms: i64) -> SyncSample {
        SyncSample {
            round_trip_ms,
            offset_ms,
        }
    }

    #[test]
    fn synced_after_three_samples() {
        let mut est = ClockSyncEstimator::new();
        assert!(!est.is_synced());
        assert_eq!(est.offset_ms(), 0.0);

        est.record(compute_sample(100, 105, 106, 112));
        est.record(sample(1.0, 10));
        assert!(!est.is_synced());
        est.record(sample(2.0, 12));
        assert!(est.is_synced());
        assert_eq!(est.offset_ms(), 1.0);
        assert_eq!(est.round_trip_ms(), 11);
    }

    #[test]
    fn even_window_uses_upper_middle() {
        let mut est = ClockSyncEstimator::new();
        for off in [4.0, 1.0, 3.0, 2.0] {
            est.record(sample(off, off as i64));
        }
        assert_eq!(est.offset_ms(), 3.0);
        assert_eq!(est.round_trip_ms(), 3);
    }

    #[test]
    fn window_keeps_only_latest_five() {
        let mut est = ClockSyncEstimator::new();
        // Old outliers get evicted.
        for _ in 0..5 {
            est.record(sample(500.0, 900));
        }
        for off in [1.0, 2.0, 3.0, 4.0, 5.0] {
            est.record(sample(off, 10));
        }
        assert_eq!(est.sample_count(), SYNC_WINDOW);
        assert_eq!(est.offset_ms(), 3.0);
        assert_eq!(est.round_trip_ms(), 10);
    }

    #[test]
    fn median_resists_single_outlier() {
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let mut est = ClockSyncEstimator::new();
            let base: f64 = rng.gen_range(-1000.0..1000.0);
            for _ in 0..4 {
                est.record(sample(base + rng.gen_range(-1.0..1.0), 10));
            }
            est.record(sample(base + 10_000.0, 5_000));
            assert!((est.offset_ms() - base).abs() <= 1.0);
            assert_eq!(est.round_trip_ms(), 10);
        }
    }
}
