//! Event-stream adapters
//!
//! This module connects the watchdog to the message bus whose topics it
//! watches. Adapters only report *that* a message arrived on a topic; the
//! payload is never inspected.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐    ┌──────────────────┐
//! │  NATS Backend    │    │  In-memory Bus   │
//! └──────────────────┘    └──────────────────┘
//!           │                        │
//!           ▼                        ▼
//! ┌─────────────────────────────────────────────────┐
//! │  EventSource trait                               │
//! │  - connect()      - subscribe()                  │
//! │  - register_delivery(DeliverySink)               │
//! └─────────────────────────────────────────────────┘
//!                      │ TopicEvent
//!                      ▼
//! ┌─────────────────────────────────────────────────┐
//! │  bounded queue → watchdog loop → record(topic)   │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use topic_watchdog::messaging::{DeliverySink, EventSource, InMemoryEventSource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bus = InMemoryEventSource::new();
//!     let mut source = bus.clone();
//!     let (sink, mut events) = DeliverySink::channel(16);
//!
//!     source.connect().await?;
//!     source.register_delivery(sink);
//!     source.subscribe("sensors/boiler").await?;
//!
//!     bus.publish("sensors/boiler");
//!     assert_eq!(events.recv().await.unwrap().topic, "sensors/boiler");
//!     Ok(())
//! }
//! ```

mod error;
mod events;
mod memory;
mod nats;
mod traits;

pub use error::{MessagingError, MessagingResult};
pub use events::{DeliverySink, TopicEvent};
pub use memory::{BusOperation, InMemoryEventSource};
pub use nats::NatsEventSource;
pub use traits::EventSource;
