//! NATS event source

use crate::config::BusConfig;
use crate::messaging::error::{MessagingError, MessagingResult};
use crate::messaging::events::DeliverySink;
use crate::messaging::traits::EventSource;
use async_nats::{Client, ConnectOptions, Event};
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Event source backed by a NATS connection.
///
/// Each subscription is drained by its own task, which forwards the subject
/// of every message to the registered delivery sink. Reconnects are handled
/// by the client; a disconnect only delays deliveries.
pub struct NatsEventSource {
    config: BusConfig,
    client: Option<Client>,
    sink: Arc<RwLock<Option<DeliverySink>>>,
    subscriptions: HashMap<String, JoinHandle<()>>,
}

impl NatsEventSource {
    pub fn new(config: BusConfig) -> Self {
        Self {
            config,
            client: None,
            sink: Arc::new(RwLock::new(None)),
            subscriptions: HashMap::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    fn client(&self, operation: &str) -> MessagingResult<&Client> {
        self.client
            .as_ref()
            .ok_or_else(|| MessagingError::NotConnected(operation.to_string()))
    }
}

#[async_trait]
impl EventSource for NatsEventSource {
    async fn connect(&mut self) -> MessagingResult<()> {
        if self.client.is_some() {
            return Ok(());
        }

        let timeout = self.config.connect_timeout();
        let server = self.config.server.clone();

        let options = ConnectOptions::new()
            .name(self.config.client.clone())
            .connection_timeout(timeout)
            .event_callback(move |event| async move {
                match event {
                    Event::Disconnected => tracing::warn!("Event bus disconnected, reconnecting"),
                    Event::Connected => tracing::info!("Event bus connected"),
                    other => tracing::debug!(event = %other, "Event bus event"),
                }
            });

        let client = tokio::time::timeout(timeout, options.connect(server.as_str()))
            .await
            .map_err(|_| {
                MessagingError::Timeout(format!("NATS connect to {} after {:?}", server, timeout))
            })?
            .map_err(|e| {
                MessagingError::ConnectionFailed(format!("NATS connection to {} failed: {}", server, e))
            })?;

        tracing::info!(server = %server, client = %self.config.client, "Connected to event bus");
        self.client = Some(client);
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> MessagingResult<()> {
        if self.subscriptions.contains_key(topic) {
            return Ok(());
        }

        let mut subscriber = self
            .client("subscribe")?
            .subscribe(topic.to_string())
            .await
            .map_err(|e| MessagingError::SubscribeFailed(format!("NATS subscribe to '{}' failed: {}", topic, e)))?;

        let sink = Arc::clone(&self.sink);
        let handle = tokio::spawn(async move {
            while let Some(message) = subscriber.next().await {
                let subject = message.subject.to_string();
                if let Some(sink) = sink.read().as_ref() {
                    sink.deliver(subject);
                }
            }
        });

        tracing::debug!(topic = %topic, "Subscribed");
        self.subscriptions.insert(topic.to_string(), handle);
        Ok(())
    }

    async fn unsubscribe(&mut self, topic: &str) -> MessagingResult<()> {
        // dropping the subscriber inside the task sends UNSUB to the server
        match self.subscriptions.remove(topic) {
            Some(handle) => {
                handle.abort();
                tracing::debug!(topic = %topic, "Unsubscribed");
                Ok(())
            }
            None => Err(MessagingError::UnsubscribeFailed(format!(
                "not subscribed to '{}'",
                topic
            ))),
        }
    }

    fn register_delivery(&mut self, sink: DeliverySink) {
        *self.sink.write() = Some(sink);
    }

    fn cancel_delivery(&mut self) {
        self.sink.write().take();
    }

    async fn disconnect(&mut self) -> MessagingResult<()> {
        for (_, handle) in self.subscriptions.drain() {
            handle.abort();
        }

        if let Some(client) = self.client.take() {
            if let Err(e) = client.flush().await {
                tracing::debug!(error = %e, "Flush before disconnect failed");
            }
            tracing::info!("Disconnected from event bus");
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "nats"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribe_requires_connection() {
        let mut source = NatsEventSource::new(BusConfig::default());

        let err = source.subscribe("sensor/1").await.unwrap_err();
        assert!(matches!(err, MessagingError::NotConnected(_)));
        assert!(!source.is_connected());
    }

    #[tokio::test]
    async fn test_unsubscribe_unknown_topic() {
        let mut source = NatsEventSource::new(BusConfig::default());
        assert!(source.unsubscribe("sensor/1").await.is_err());
    }

    #[tokio::test]
    async fn test_disconnect_without_connect() {
        let mut source = NatsEventSource::new(BusConfig::default());
        assert!(source.disconnect().await.is_ok());
    }

    #[test]
    fn test_delivery_registration() {
        let mut source = NatsEventSource::new(BusConfig::default());
        let (sink, _rx) = DeliverySink::channel(1);

        source.register_delivery(sink);
        assert!(source.sink.read().is_some());

        source.cancel_delivery();
        assert!(source.sink.read().is_none());
    }
}
