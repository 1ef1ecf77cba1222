//! Delivered topic activity and the sink it is handed to

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};

/// One message observed on a topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicEvent {
    /// Topic the message arrived on
    pub topic: String,

    /// When the adapter received it
    pub received_at: DateTime<Utc>,
}

impl TopicEvent {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            received_at: Utc::now(),
        }
    }
}

/// Delivery callback handed to an event source.
///
/// Events go onto a bounded queue drained by the watchdog loop, which is the
/// only place topic state is mutated.
#[derive(Debug, Clone)]
pub struct DeliverySink {
    tx: mpsc::Sender<TopicEvent>,
}

impl DeliverySink {
    /// Create a sink and the receiving end of its queue
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<TopicEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Deliver activity for `topic`, stamped with the current time.
    ///
    /// Returns false when the event was dropped.
    pub fn deliver(&self, topic: impl Into<String>) -> bool {
        self.deliver_event(TopicEvent::new(topic))
    }

    pub fn deliver_event(&self, event: TopicEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                tracing::warn!(topic = %event.topic, "Event queue full, dropping message");
                false
            }
            Err(TrySendError::Closed(event)) => {
                tracing::debug!(topic = %event.topic, "Event queue closed, dropping message");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deliver_and_receive() {
        let (sink, mut rx) = DeliverySink::channel(4);

        assert!(sink.deliver("sensor/1"));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.topic, "sensor/1");
    }

    #[test]
    fn test_full_queue_drops() {
        let (sink, _rx) = DeliverySink::channel(1);

        assert!(sink.deliver("a"));
        assert!(!sink.deliver("b"));
    }

    #[test]
    fn test_closed_queue_drops() {
        let (sink, rx) = DeliverySink::channel(1);
        drop(rx);

        assert!(!sink.deliver("a"));
    }
}
