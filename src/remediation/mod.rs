//! Remediation actions triggered by level-2 escalations

pub mod systemd;

pub use systemd::SystemdRemediator;

use crate::error::Result;
use async_trait::async_trait;

/// Invokes a named corrective action
#[async_trait]
pub trait Remediator: Send + Sync {
    /// Trigger the action for `target`; returns once the request is accepted
    async fn invoke(&self, target: &str) -> Result<()>;

    /// Remediator name used in logs
    fn name(&self) -> &str;
}
