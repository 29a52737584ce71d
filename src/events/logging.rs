//! Structured logging of decisions.

use tracing::{info, warn};

use super::{DecisionEvent, DecisionSink};

/// Emits one `tracing` event per decision.
///
/// Admitted requests are logged at `info`, rejected ones at `warn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TracingSink {
    pub fn new() -> Self {
        Self
    }
}

impl DecisionSink for TracingSink {
    fn record(&self, event: &DecisionEvent) {
        if event.outcome.is_allowed() {
            info!(
                client_id = %event.client_id,
                path = %event.path,
                status = event.status,
                note = event.note,
                "Request admitted"
            );
        } else {
            warn!(
                client_id = %event.client_id,
                path = %event.path,
                status = event.status,
                note = event.note,
                outcome = %event.outcome,
                "Request rejected"
            );
        }
    }
}
