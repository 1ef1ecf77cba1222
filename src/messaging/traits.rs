//! Event source abstraction

use crate::messaging::error::MessagingResult;
use crate::messaging::events::DeliverySink;
use async_trait::async_trait;

/// Pub/sub transport that reports activity on subscribed topics
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Establish the connection
    async fn connect(&mut self) -> MessagingResult<()>;

    /// Start receiving messages on `topic`
    async fn subscribe(&mut self, topic: &str) -> MessagingResult<()>;

    /// Stop receiving messages on `topic`
    async fn unsubscribe(&mut self, topic: &str) -> MessagingResult<()>;

    /// Route every received message's topic into `sink`
    fn register_delivery(&mut self, sink: DeliverySink);

    /// Stop routing messages; later arrivals are discarded
    fn cancel_delivery(&mut self);

    /// Tear down the connection
    async fn disconnect(&mut self) -> MessagingResult<()>;

    /// Backend name used in logs
    fn name(&self) -> &str;
}
