//! In-process event source

use crate::messaging::error::{MessagingError, MessagingResult};
use crate::messaging::events::DeliverySink;
use crate::messaging::traits::EventSource;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// Operations observed by an [`InMemoryEventSource`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusOperation {
    Connect,
    Subscribe(String),
    Unsubscribe(String),
    RegisterDelivery,
    CancelDelivery,
    Disconnect,
}

#[derive(Default)]
struct BusState {
    connected: bool,
    subscriptions: Vec<String>,
    sink: Option<DeliverySink>,
    operations: Vec<BusOperation>,
    fail_connect: bool,
    fail_subscribe: HashSet<String>,
}

/// In-process bus. Clones share state, so one handle can be given to the
/// watchdog while another publishes and inspects.
#[derive(Clone, Default)]
pub struct InMemoryEventSource {
    state: Arc<Mutex<BusState>>,
}

impl InMemoryEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `connect` fail
    pub fn with_connect_failure(self) -> Self {
        self.state.lock().fail_connect = true;
        self
    }

    /// Make subscribing to `topic` fail
    pub fn with_subscribe_failure(self, topic: impl Into<String>) -> Self {
        self.state.lock().fail_subscribe.insert(topic.into());
        self
    }

    /// Publish a message; returns whether it was delivered
    pub fn publish(&self, topic: &str) -> bool {
        let state = self.state.lock();
        if !state.connected || !state.subscriptions.iter().any(|t| t == topic) {
            return false;
        }
        match &state.sink {
            Some(sink) => sink.deliver(topic),
            None => false,
        }
    }

    pub fn operations(&self) -> Vec<BusOperation> {
        self.state.lock().operations.clone()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.state.lock().subscriptions.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }
}

#[async_trait]
impl EventSource for InMemoryEventSource {
    async fn connect(&mut self) -> MessagingResult<()> {
        let mut state = self.state.lock();
        if state.fail_connect {
            return Err(MessagingError::ConnectionFailed(
                "in-memory bus refused connection".to_string(),
            ));
        }
        state.connected = true;
        state.operations.push(BusOperation::Connect);
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> MessagingResult<()> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(MessagingError::NotConnected("subscribe".to_string()));
        }
        if state.fail_subscribe.contains(topic) {
            return Err(MessagingError::SubscribeFailed(format!(
                "in-memory bus refused '{}'",
                topic
            )));
        }
        if !state.subscriptions.iter().any(|t| t == topic) {
            state.subscriptions.push(topic.to_string());
        }
        state.operations.push(BusOperation::Subscribe(topic.to_string()));
        Ok(())
    }

    async fn unsubscribe(&mut self, topic: &str) -> MessagingResult<()> {
        let mut state = self.state.lock();
        state.subscriptions.retain(|t| t != topic);
        state.operations.push(BusOperation::Unsubscribe(topic.to_string()));
        Ok(())
    }

    fn register_delivery(&mut self, sink: DeliverySink) {
        let mut state = self.state.lock();
        state.sink = Some(sink);
        state.operations.push(BusOperation::RegisterDelivery);
    }

    fn cancel_delivery(&mut self) {
        let mut state = self.state.lock();
        state.sink = None;
        state.operations.push(BusOperation::CancelDelivery);
    }

    async fn disconnect(&mut self) -> MessagingResult<()> {
        let mut state = self.state.lock();
        state.connected = false;
        state.subscriptions.clear();
        state.operations.push(BusOperation::Disconnect);
        Ok(())
    }

    fn name(&self) -> &str {
        "in_memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_sink() {
        let bus = InMemoryEventSource::new();
        let mut source = bus.clone();
        let (sink, mut rx) = DeliverySink::channel(4);

        source.connect().await.unwrap();
        source.register_delivery(sink);
        source.subscribe("sensor/1").await.unwrap();

        assert!(bus.publish("sensor/1"));
        assert!(!bus.publish("sensor/2"));
        assert_eq!(rx.recv().await.unwrap().topic, "sensor/1");
    }

    #[tokio::test]
    async fn test_cancelled_delivery_drops() {
        let bus = InMemoryEventSource::new();
        let mut source = bus.clone();
        let (sink, _rx) = DeliverySink::channel(4);

        source.connect().await.unwrap();
        source.register_delivery(sink);
        source.subscribe("sensor/1").await.unwrap();
        source.cancel_delivery();

        assert!(!bus.publish("sensor/1"));
    }

    #[tokio::test]
    async fn test_failures() {
        let mut source = InMemoryEventSource::new().with_connect_failure();
        assert!(source.connect().await.is_err());

        let mut source = InMemoryEventSource::new().with_subscribe_failure("bad");
        source.connect().await.unwrap();
        assert!(source.subscribe("good").await.is_ok());
        assert!(source.subscribe("bad").await.is_err());
    }

    #[tokio::test]
    async fn test_operation_log() {
        let bus = InMemoryEventSource::new();
        let mut source = bus.clone();

        source.connect().await.unwrap();
        source.subscribe("a").await.unwrap();
        source.unsubscribe("a").await.unwrap();
        source.disconnect().await.unwrap();

        assert_eq!(
            bus.operations(),
            vec![
                BusOperation::Connect,
                BusOperation::Subscribe("a".to_string()),
                BusOperation::Unsubscribe("a".to_string()),
                BusOperation::Disconnect,
            ]
        );
    }
}
