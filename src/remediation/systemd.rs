use crate::config::RemediationConfig;
use crate::error::{AppError, Result};
use crate::remediation::Remediator;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{error, info};

/// Restarts systemd units through `systemctl`
#[derive(Debug, Clone)]
pub struct SystemdRemediator {
    systemctl: String,
}

impl SystemdRemediator {
    pub fn new(systemctl: impl Into<String>) -> Self {
        Self {
            systemctl: systemctl.into(),
        }
    }

    pub fn from_config(config: &RemediationConfig) -> Self {
        Self::new(config.systemctl.clone())
    }

    /// Arguments for a non-blocking restart; the job is queued in replace mode
    pub(crate) fn restart_args(unit: &str) -> [&str; 5] {
        ["--no-block", "--job-mode=replace", "restart", "--", unit]
    }
}

impl Default for SystemdRemediator {
    fn default() -> Self {
        Self::new("systemctl")
    }
}

#[async_trait]
impl Remediator for SystemdRemediator {
    async fn invoke(&self, target: &str) -> Result<()> {
        let output = Command::new(&self.systemctl)
            .args(Self::restart_args(target))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                AppError::dispatch("remediate", format!("Failed to run {}: {}", self.systemctl, e))
            })?;

        if output.status.success() {
            info!(unit = %target, "Service restart issued");
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!(unit = %target, status = %output.status, stderr = %stderr, "Service restart failed");
            Err(AppError::dispatch(
                "remediate",
                format!("restart of '{}' failed ({}): {}", target, output.status, stderr),
            ))
        }
    }

    fn name(&self) -> &str {
        "systemd"
    }
}
