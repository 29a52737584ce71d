//! Decision events and the sinks that consume them.
//!
//! The gate knows nothing about where decisions end up. The transport
//! adapter wraps each [`Decision`] into a [`DecisionEvent`] and hands it to a
//! [`DecisionSink`], which may log it, count it, or stream it on to a
//! dashboard or recorder.

mod broadcast;
mod logging;
mod tally;

pub use broadcast::BroadcastSink;
pub use logging::TracingSink;
pub use tally::{DecisionTally, TallySnapshot};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::admission::{Decision, Outcome};

/// One admission decision as reported to observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionEvent {
    /// Wall-clock time the event was created
    pub timestamp: DateTime<Utc>,
    /// Client the decision was keyed on
    pub client_id: String,
    /// Request path
    pub path: String,
    /// The decision itself
    pub outcome: Outcome,
    /// Transport status code (200, 429 or 403)
    pub status: u16,
    /// Short description of the outcome
    pub note: &'static str,
}

impl DecisionEvent {
    /// Build an event for `decision`, stamped with the current wall-clock time.
    pub fn new(decision: &Decision, path: &str) -> Self {
        Self::with_timestamp(decision, path, Utc::now())
    }

    pub fn with_timestamp(decision: &Decision, path: &str, timestamp: DateTime<Utc>) -> Self {
        let outcome = decision.outcome();
        Self {
            timestamp,
            client_id: decision.client_id().to_string(),
            path: path.to_string(),
            outcome,
            status: outcome.status_code(),
            note: outcome.note(),
        }
    }
}

/// Consumer of admission decisions.
///
/// `record` is called on the request path for every decision, so
/// implementations must not block.
pub trait DecisionSink: Send + Sync {
    fn record(&self, event: &DecisionEvent);
}

impl<S: DecisionSink + ?Sized> DecisionSink for Arc<S> {
    fn record(&self, event: &DecisionEvent) {
        (**self).record(event)
    }
}

/// Forwards each event to several sinks, in the order they were added.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn DecisionSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink to the fan-out.
    pub fn with(mut self, sink: Arc<dyn DecisionSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl DecisionSink for FanoutSink {
    fn record(&self, event: &DecisionEvent) {
        for sink in &self.sinks {
            sink.record(event);
        }
    }
}
