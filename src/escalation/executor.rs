use crate::error::{AppError, Result};
use crate::escalation::state::{Escalation, EscalationLevel};
use crate::notifications::Notifier;
use crate::remediation::Remediator;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Default bound on a single notify or remediate call
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Dispatches the notify and remediate actions behind escalations
pub struct ActionDispatcher {
    notifier: Option<Arc<dyn Notifier>>,
    remediator: Arc<dyn Remediator>,
    timeout: Duration,
}

/// Outcome of dispatching the actions for one escalation
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    pub errors: Vec<AppError>,
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

impl ActionDispatcher {
    /// Create a dispatcher; a missing notifier makes `notify` a no-op
    pub fn new(notifier: Option<Arc<dyn Notifier>>, remediator: Arc<dyn Remediator>) -> Self {
        Self {
            notifier,
            remediator,
            timeout: DEFAULT_DISPATCH_TIMEOUT,
        }
    }

    /// Set the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notifier.is_some()
    }

    async fn bounded<F>(&self, action: &str, call: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout(format!(
                "{} did not complete within {:?}",
                action, self.timeout
            ))),
        }
    }

    /// Send a notification, succeeding without side effects when disabled
    pub async fn notify(&self, subject: &str, body: &str) -> Result<()> {
        let Some(notifier) = &self.notifier else {
            tracing::debug!(subject = %subject, "Notifications disabled, skipping");
            return Ok(());
        };

        self.bounded("notify", notifier.send(subject, body)).await?;
        tracing::info!(channel = notifier.name(), subject = %subject, "Notification issued");
        Ok(())
    }

    /// Run remediation for `target`, succeeding without side effects when empty
    pub async fn remediate(&self, target: &str) -> Result<()> {
        if target.is_empty() {
            return Ok(());
        }

        self.bounded("remediate", self.remediator.invoke(target)).await?;
        tracing::info!(remediator = self.remediator.name(), target = %target, "Remediation issued");
        Ok(())
    }

    /// Run the actions for an escalation.
    ///
    /// Failures are collected and logged; they never undo the escalation.
    pub async fn dispatch(&self, escalation: &Escalation) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();

        if let Err(e) = self.notify(&escalation.subject(), "").await {
            tracing::error!(
                topic = %escalation.topic,
                level = %escalation.level,
                error = %e,
                "Failed to send escalation notification"
            );
            outcome.errors.push(e);
        }

        if escalation.level == EscalationLevel::Restart {
            let target = escalation.remediation_target.as_deref().unwrap_or("");
            if let Err(e) = self.remediate(target).await {
                tracing::error!(
                    topic = %escalation.topic,
                    target = %target,
                    error = %e,
                    "Failed to remediate"
                );
                outcome.errors.push(e);
            }
        }

        outcome
    }
}
