//! Running totals of decisions by status.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{DecisionEvent, DecisionSink};
use crate::admission::Outcome;

/// Counts decisions per status code with lock-free updates.
#[derive(Debug, Default)]
pub struct DecisionTally {
    allowed: AtomicU64,
    rate_limited: AtomicU64,
    blocked: AtomicU64,
}

/// Point-in-time copy of a [`DecisionTally`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TallySnapshot {
    /// Decisions reported as 200
    pub allowed: u64,
    /// Decisions reported as 429
    pub rate_limited: u64,
    /// Decisions reported as 403
    pub blocked: u64,
}

impl TallySnapshot {
    pub fn total(&self) -> u64 {
        self.allowed + self.rate_limited + self.blocked
    }
}

impl DecisionTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> TallySnapshot {
        TallySnapshot {
            allowed: self.allowed.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            blocked: self.blocked.load(Ordering::Relaxed),
        }
    }

    /// Zero all counters.
    pub fn reset(&self) {
        self.allowed.store(0, Ordering::Relaxed);
        self.rate_limited.store(0, Ordering::Relaxed);
        self.blocked.store(0, Ordering::Relaxed);
    }
}

impl DecisionSink for DecisionTally {
    fn record(&self, event: &DecisionEvent) {
        let counter = match event.outcome {
            Outcome::Allowed => &self.allowed,
            Outcome::RateLimited => &self.rate_limited,
            Outcome::Blocked(_) => &self.blocked,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::{AdmissionGate, Decision};
    use std::time::Instant;

    fn record(tally: &DecisionTally, decision: &Decision) {
        tally.record(&DecisionEvent::new(decision, "/"));
    }

    #[test]
    fn test_tally_counts_by_status() {
        let gate = AdmissionGate::default();
        let tally = DecisionTally::new();
        let now = Instant::now();

        for _ in 0..10 {
            record(&tally, &gate.decide("10.0.0.1", now));
        }

        let snapshot = tally.snapshot();
        assert_eq!(snapshot.allowed, 3);
        assert_eq!(snapshot.rate_limited, 1);
        assert_eq!(snapshot.blocked, 6);
        assert_eq!(snapshot.total(), 10);
    }

    #[test]
    fn test_tally_reset() {
        let tally = DecisionTally::new();
        record(
            &tally,
            &Decision::new("10.0.0.1", Instant::now(), Outcome::Allowed),
        );
        assert_eq!(tally.snapshot().total(), 1);

        tally.reset();
        assert_eq!(tally.snapshot(), TallySnapshot::default());
    }
}
