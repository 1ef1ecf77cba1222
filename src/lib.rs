//! Liveness watchdog for message-bus topics.
//!
//! Every configured topic carries two silence thresholds. Crossing the first
//! sends a notification; crossing the second notifies and restarts the
//! service behind the topic. Activity below the first threshold re-arms both.

pub mod config;
pub mod error;
pub mod escalation;
pub mod messaging;
pub mod notifications;
pub mod remediation;
pub mod watchdog;

pub use config::Config;
pub use error::{AppError, Result};
pub use escalation::{EscalationEngine, EscalationTable, StreamSpec};
pub use watchdog::{LoopState, Watchdog, WatchdogSettings};
