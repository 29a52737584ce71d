//! Streaming decisions to live observers.

use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::warn;

use super::{DecisionEvent, DecisionSink};

/// Default number of events buffered per subscriber.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Publishes every decision on a broadcast channel.
///
/// Recording never waits on subscribers. A subscriber that falls more than
/// the channel capacity behind skips the events it missed.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    sender: broadcast::Sender<DecisionEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// A stream of every decision recorded from now on.
    pub fn subscribe(&self) -> impl Stream<Item = DecisionEvent> + Send + 'static {
        BroadcastStream::new(self.sender.subscribe()).filter_map(|item| match item {
            Ok(event) => Some(event),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped = skipped, "Decision subscriber lagged");
                None
            }
        })
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl DecisionSink for BroadcastSink {
    fn record(&self, event: &DecisionEvent) {
        // No subscribers is not an error
        let _ = self.sender.send(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::{Decision, Outcome};
    use std::time::Instant;

    fn event(client: &str, outcome: Outcome) -> DecisionEvent {
        DecisionEvent::new(&Decision::new(client, Instant::now(), outcome), "/")
    }

    #[tokio::test]
    async fn test_subscriber_receives_events_in_order() {
        let sink = BroadcastSink::default();
        let mut stream = Box::pin(sink.subscribe());
        assert_eq!(sink.subscriber_count(), 1);

        sink.record(&event("10.0.0.1", Outcome::Allowed));
        sink.record(&event("10.0.0.2", Outcome::RateLimited));

        let first = stream.next().await.unwrap();
        let second = stream.next().await.unwrap();
        assert_eq!(first.client_id, "10.0.0.1");
        assert_eq!(second.status, 429);
    }

    #[tokio::test]
    async fn test_record_without_subscribers() {
        let sink = BroadcastSink::new(4);
        sink.record(&event("10.0.0.1", Outcome::Allowed));
        assert_eq!(sink.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips_missed_events() {
        let sink = BroadcastSink::new(2);
        let mut stream = Box::pin(sink.subscribe());

        for i in 0..5 {
            sink.record(&event(&format!("10.0.0.{}", i), Outcome::Allowed));
        }

        // only the newest two survive in the channel
        let next = stream.next().await.unwrap();
        assert_eq!(next.client_id, "10.0.0.3");
        assert_eq!(stream.next().await.unwrap().client_id, "10.0.0.4");
    }
}
