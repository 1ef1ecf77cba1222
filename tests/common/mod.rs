//! Common test utilities
//!
//! Recording doubles for the notification and remediation adapters, plus
//! helpers to build an engine around them.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use topic_watchdog::{
    error::{AppError, Result},
    escalation::{ActionDispatcher, EscalationEngine, EscalationTable, StreamSpec},
    notifications::Notifier,
    remediation::Remediator,
};

/// Notifier that keeps every subject it was asked to send
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<String>>,
    pub fail: bool,

    /// Subjects containing the pattern take this long to send
    pub slow: Option<(String, Duration)>,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn slow_on(pattern: &str, delay: Duration) -> Self {
        Self {
            slow: Some((pattern.to_string(), delay)),
            ..Default::default()
        }
    }

    pub fn subjects(&self) -> Vec<String> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, subject: &str, _body: &str) -> Result<()> {
        self.sent.lock().push(subject.to_string());
        if let Some((pattern, delay)) = &self.slow {
            if subject.contains(pattern.as_str()) {
                tokio::time::sleep(*delay).await;
            }
        }
        if self.fail {
            return Err(AppError::dispatch("notify", "mail relay unavailable"));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Remediator that keeps every target it was asked to restart
#[derive(Default)]
pub struct RecordingRemediator {
    pub invoked: Mutex<Vec<String>>,
}

impl RecordingRemediator {
    pub fn targets(&self) -> Vec<String> {
        self.invoked.lock().clone()
    }
}

#[async_trait]
impl Remediator for RecordingRemediator {
    async fn invoke(&self, target: &str) -> Result<()> {
        self.invoked.lock().push(target.to_string());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

pub fn spec(id: &str, warn_secs: u64, restart_secs: u64) -> StreamSpec {
    StreamSpec::new(
        id,
        Duration::from_secs(warn_secs),
        Duration::from_secs(restart_secs),
    )
}

pub fn dispatcher(
    notifier: Option<Arc<RecordingNotifier>>,
    remediator: Arc<RecordingRemediator>,
) -> ActionDispatcher {
    let notifier = notifier.map(|n| n as Arc<dyn Notifier>);
    ActionDispatcher::new(notifier, remediator)
}

pub fn engine(table: EscalationTable, dispatcher: ActionDispatcher) -> EscalationEngine {
    EscalationEngine::new(table, dispatcher)
}
