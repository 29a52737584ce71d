//! The admission gate.

use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use super::decision::{BlockReason, Decision, Outcome};
use super::window::{RequestWindow, SlidingWindowCounter};

/// Default trailing window for counting requests.
pub const DEFAULT_TIME_WINDOW: Duration = Duration::from_secs(10);
/// Default number of requests admitted per window.
pub const DEFAULT_MAX_REQUESTS: usize = 3;
/// Default number of violations before a client is blacklisted.
pub const DEFAULT_BLACKLIST_AFTER: u32 = 2;
/// Default blacklist duration.
pub const DEFAULT_BLACKLIST_DURATION: Duration = Duration::from_secs(60);
/// Extra age, beyond the window, before an idle client may be swept.
pub const SWEEP_GRACE: Duration = Duration::from_secs(1);

/// Construction-time parameters of an [`AdmissionGate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionConfig {
    /// Length of the trailing window requests are counted over
    pub time_window: Duration,
    /// Requests admitted per window; the next one is a violation
    pub max_requests_per_window: usize,
    /// Violations after which a client is blacklisted
    pub blacklist_after_violations: u32,
    /// How long a blacklist entry stays active
    pub blacklist_duration: Duration,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            time_window: DEFAULT_TIME_WINDOW,
            max_requests_per_window: DEFAULT_MAX_REQUESTS,
            blacklist_after_violations: DEFAULT_BLACKLIST_AFTER,
            blacklist_duration: DEFAULT_BLACKLIST_DURATION,
        }
    }
}

/// Everything the gate knows about one client.
#[derive(Debug, Default)]
struct ClientRecord {
    window: RequestWindow,
    /// Never reset on blacklist expiry: a client that offended once stays
    /// one violation closer to the next blacklisting.
    violations: u32,
    blacklisted_until: Option<Instant>,
}

impl ClientRecord {
    /// Whether the record behaves like a client never seen before for any
    /// request at or after `horizon`.
    fn is_idle(&self, horizon: Instant, span: Duration) -> bool {
        self.violations == 0
            && self.blacklisted_until.is_none()
            && self
                .window
                .newest()
                .map_or(true, |newest| horizon.saturating_duration_since(newest) > span)
    }
}

/// `now + duration`, clamped to the latest representable instant.
fn saturating_add(now: Instant, duration: Duration) -> Instant {
    let mut step = duration;
    loop {
        if let Some(later) = now.checked_add(step) {
            return later;
        }
        step /= 2;
    }
}

/// Decides whether to admit, rate limit, or block each request.
///
/// Per-client state lives in a sharded map. A decision holds the write lock
/// of its client's shard from start to finish, so decisions for one client
/// are totally ordered and concurrent bursts cannot both see a stale count.
/// The gate is `Send + Sync` and is meant to be shared behind an `Arc`.
pub struct AdmissionGate {
    config: AdmissionConfig,
    counter: SlidingWindowCounter,
    clients: DashMap<String, ClientRecord>,
}

impl AdmissionGate {
    /// Create a gate with the given configuration.
    pub fn new(config: AdmissionConfig) -> Self {
        Self {
            config,
            counter: SlidingWindowCounter::new(config.time_window),
            clients: DashMap::new(),
        }
    }

    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    /// Decide the fate of one request from `client_id` arriving at `now`.
    ///
    /// Always returns a decision. Blacklisted clients are rejected without
    /// touching their window. Expired blacklist entries are removed here,
    /// on first observation.
    pub fn decide(&self, client_id: &str, now: Instant) -> Decision {
        let outcome = if let Some(mut record) = self.clients.get_mut(client_id) {
            self.evaluate(client_id, &mut record, now)
        } else {
            let mut record = self.clients.entry(client_id.to_owned()).or_default();
            self.evaluate(client_id, &mut record, now)
        };

        trace!(client_id = %client_id, outcome = %outcome, "Admission decision");
        Decision::new(client_id, now, outcome)
    }

    fn evaluate(&self, client_id: &str, record: &mut ClientRecord, now: Instant) -> Outcome {
        if let Some(expiry) = record.blacklisted_until {
            if expiry > now {
                // Longer than a full blacklist period left means the entry was
                // stamped by a clock that has since gone backwards.
                let latest = saturating_add(now, self.config.blacklist_duration);
                if expiry > latest {
                    debug!(client_id = %client_id, "Re-anchoring blacklist entry after clock regression");
                    record.blacklisted_until = Some(latest);
                }
                return Outcome::Blocked(BlockReason::AlreadyBlacklisted);
            }

            debug!(client_id = %client_id, violations = record.violations, "Blacklist entry expired");
            record.blacklisted_until = None;
        }

        let count = self.counter.record_and_count(&mut record.window, now);
        if count <= self.config.max_requests_per_window {
            return Outcome::Allowed;
        }

        record.violations = record.violations.saturating_add(1);
        debug!(
            client_id = %client_id,
            count = count,
            violations = record.violations,
            "Rate limit exceeded"
        );

        if record.violations >= self.config.blacklist_after_violations {
            record.blacklisted_until = Some(saturating_add(now, self.config.blacklist_duration));
            debug!(
                client_id = %client_id,
                duration_secs = self.config.blacklist_duration.as_secs(),
                "Client blacklisted"
            );
            Outcome::Blocked(BlockReason::RateLimitEscalation)
        } else {
            Outcome::RateLimited
        }
    }

    /// Remove client records that no longer affect any decision.
    ///
    /// A record is removed only when it has no violations, no blacklist entry,
    /// and its newest request is older than the window plus [`SWEEP_GRACE`].
    /// Surviving records are left untouched; expiry and trimming stay with
    /// [`decide`](Self::decide). A concurrent decision evaluated slightly
    /// before `now` therefore sees the same outcome as without the sweep.
    ///
    /// Returns the number of client records removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let before = self.clients.len();
        let span = self.counter.span();
        let horizon = now.checked_sub(SWEEP_GRACE).unwrap_or(now);

        self.clients.retain(|_, record| !record.is_idle(horizon, span));

        let removed = before.saturating_sub(self.clients.len());
        debug!(removed = removed, remaining = self.clients.len(), "Swept client table");
        removed
    }

    /// Number of clients with stored state.
    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }

    /// Number of clients whose blacklist entry is still active at `now`.
    pub fn blacklisted_clients(&self, now: Instant) -> usize {
        self.clients
            .iter()
            .filter(|entry| matches!(entry.blacklisted_until, Some(expiry) if expiry > now))
            .count()
    }

    /// Whether `client_id` would be rejected outright at `now`.
    pub fn is_blacklisted(&self, client_id: &str, now: Instant) -> bool {
        self.blacklist_expiry(client_id)
            .is_some_and(|expiry| expiry > now)
    }

    /// The stored blacklist expiry for `client_id`, active or not.
    pub fn blacklist_expiry(&self, client_id: &str) -> Option<Instant> {
        self.clients
            .get(client_id)
            .and_then(|record| record.blacklisted_until)
    }

    /// Cumulative violations recorded for `client_id`.
    pub fn violations(&self, client_id: &str) -> u32 {
        self.clients
            .get(client_id)
            .map_or(0, |record| record.violations)
    }

    /// Timestamps currently stored for `client_id`, as of its last request.
    pub fn window_len(&self, client_id: &str) -> usize {
        self.clients
            .get(client_id)
            .map_or(0, |record| record.window.len())
    }

    /// Forget every client.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.clients.clear();
    }
}

impl Default for AdmissionGate {
    fn default() -> Self {
        Self::new(AdmissionConfig::default())
    }
}
