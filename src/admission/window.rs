//! Sliding-window request counting.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Timestamps of one client's recent requests, oldest first.
///
/// Entries are evicted lazily, only when the window is next touched.
#[derive(Debug, Clone, Default)]
pub struct RequestWindow {
    timestamps: VecDeque<Instant>,
}

impl RequestWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `now`, keeping the sequence chronological.
    ///
    /// A monotonic caller always appends. If `now` is earlier than the newest
    /// stored timestamp (the clock went backwards) the entry is placed at its
    /// sorted position instead, so that eviction can keep trimming from the
    /// front.
    fn insert(&mut self, now: Instant) {
        match self.timestamps.back() {
            Some(&newest) if now < newest => {
                let pos = self.timestamps.partition_point(|&t| t <= now);
                self.timestamps.insert(pos, now);
            }
            _ => self.timestamps.push_back(now),
        }
    }

    /// Drop every entry strictly older than `now - span`.
    ///
    /// Entries stamped after `now` are kept.
    pub fn evict_expired(&mut self, now: Instant, span: Duration) {
        while let Some(&oldest) = self.timestamps.front() {
            if now.saturating_duration_since(oldest) > span {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Number of stored timestamps (as of the last access).
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// The most recent stored timestamp.
    pub fn newest(&self) -> Option<Instant> {
        self.timestamps.back().copied()
    }
}

/// Counts requests within a trailing time window.
///
/// The counter holds the window length; the per-client [`RequestWindow`]s
/// live in the caller's client table so that a window can be updated in the
/// same critical section as the rest of that client's state.
/// [`AdmissionGate::decide`](super::AdmissionGate::decide) is the
/// client-keyed form: it looks up the client's window under that client's
/// shard lock and calls [`record_and_count`](Self::record_and_count) on it.
#[derive(Debug, Clone, Copy)]
pub struct SlidingWindowCounter {
    span: Duration,
}

impl SlidingWindowCounter {
    pub fn new(span: Duration) -> Self {
        Self { span }
    }

    /// Length of the trailing window.
    pub fn span(&self) -> Duration {
        self.span
    }

    /// Record a request at `now` and return how many requests the window
    /// holds afterwards, this one included.
    ///
    /// Amortized O(1) for non-decreasing `now`: each timestamp is appended
    /// once and popped once. Out-of-order timestamps cost a sorted insert
    /// and are counted conservatively (entries newer than `now` still count).
    pub fn record_and_count(&self, window: &mut RequestWindow, now: Instant) -> usize {
        window.insert(now);
        window.evict_expired(now, self.span);
        window.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(base: Instant, s: u64) -> Instant {
        base + Duration::from_secs(s)
    }

    #[test]
    fn test_counts_requests_within_window() {
        let base = Instant::now();
        let counter = SlidingWindowCounter::new(Duration::from_secs(10));
        let mut window = RequestWindow::new();

        let counts: Vec<usize> = [0, 3, 6, 9, 12, 15, 30]
            .iter()
            .map(|&s| counter.record_and_count(&mut window, secs(base, s)))
            .collect();

        // t=12 drops t=0, t=15 drops t=3, t=30 drops everything before 20
        assert_eq!(counts, vec![1, 2, 3, 4, 4, 4, 1]);
    }

    #[test]
    fn test_window_boundary_is_inclusive() {
        let base = Instant::now();
        let counter = SlidingWindowCounter::new(Duration::from_secs(10));
        let mut window = RequestWindow::new();

        counter.record_and_count(&mut window, secs(base, 0));
        // exactly TIME_WINDOW old: still inside
        assert_eq!(counter.record_and_count(&mut window, secs(base, 10)), 2);
        assert_eq!(counter.record_and_count(&mut window, secs(base, 11)), 2);
    }

    #[test]
    fn test_same_instant_counts_every_call() {
        let now = Instant::now();
        let counter = SlidingWindowCounter::new(Duration::from_secs(10));
        let mut window = RequestWindow::new();

        assert_eq!(counter.record_and_count(&mut window, now), 1);
        assert_eq!(counter.record_and_count(&mut window, now), 2);
        assert_eq!(window.newest(), Some(now));
    }

    #[test]
    fn test_out_of_order_insert_stays_sorted() {
        let base = Instant::now();
        let counter = SlidingWindowCounter::new(Duration::from_secs(10));
        let mut window = RequestWindow::new();

        counter.record_and_count(&mut window, secs(base, 100));
        // clock stepped back: the entry from t=100 still counts
        assert_eq!(counter.record_and_count(&mut window, secs(base, 95)), 2);
        assert_eq!(window.newest(), Some(secs(base, 100)));

        // back on track, t=95 ages out at t=106 while t=100 stays
        assert_eq!(counter.record_and_count(&mut window, secs(base, 106)), 2);
    }

    #[test]
    fn test_clock_regression_does_not_grow_window() {
        let base = Instant::now();
        let counter = SlidingWindowCounter::new(Duration::from_secs(10));
        let mut window = RequestWindow::new();

        counter.record_and_count(&mut window, secs(base, 1_000));
        for s in 0..500 {
            let count = counter.record_and_count(&mut window, secs(base, s));
            // at most the 11 regressed seconds in range plus the stray future entry
            assert!(count <= 12, "count {} at t={}", count, s);
        }
    }

    #[test]
    fn test_evict_expired_without_recording() {
        let base = Instant::now();
        let counter = SlidingWindowCounter::new(Duration::from_secs(10));
        let mut window = RequestWindow::new();

        counter.record_and_count(&mut window, secs(base, 0));
        counter.record_and_count(&mut window, secs(base, 5));

        window.evict_expired(secs(base, 12), counter.span());
        assert_eq!(window.len(), 1);

        window.evict_expired(secs(base, 20), counter.span());
        assert!(window.is_empty());
    }
}
