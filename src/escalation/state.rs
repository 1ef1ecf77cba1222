use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::Display;

/// Configured description of one monitored topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSpec {
    /// Topic name
    pub id: String,

    /// Unit to restart at level 2 (none means remediation is a no-op)
    pub remediation_target: Option<String>,

    /// Silence after which level 1 fires
    pub warn_after: Duration,

    /// Silence after which level 2 fires
    pub restart_after: Duration,
}

impl StreamSpec {
    pub fn new(id: impl Into<String>, warn_after: Duration, restart_after: Duration) -> Self {
        Self {
            id: id.into(),
            remediation_target: None,
            warn_after,
            restart_after,
        }
    }

    /// Attach a remediation target
    pub fn with_remediation_target(mut self, target: impl Into<String>) -> Self {
        let target = target.into();
        self.remediation_target = if target.is_empty() { None } else { Some(target) };
        self
    }
}

/// Escalation severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum EscalationLevel {
    /// Notify only
    #[strum(serialize = "level-1")]
    Warn,

    /// Notify and remediate
    #[strum(serialize = "level-2")]
    Restart,
}

impl EscalationLevel {
    /// Action tag used in alert subjects
    pub fn actions(&self) -> &'static str {
        match self {
            EscalationLevel::Warn => "notify",
            EscalationLevel::Restart => "notify+restart",
        }
    }
}

/// An escalation decided during one evaluation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Escalation {
    pub topic: String,
    pub level: EscalationLevel,
    pub elapsed_secs: i64,
    pub remediation_target: Option<String>,
    pub fired_at: DateTime<Utc>,
}

impl Escalation {
    /// Alert subject sent through the notify action
    pub fn subject(&self) -> String {
        format!(
            "Alert '{}' {} timeout ({} seconds) [{}]",
            self.topic,
            self.level,
            self.elapsed_secs,
            self.level.actions()
        )
    }
}

/// Liveness bookkeeping for one topic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamMonitor {
    pub id: String,
    pub remediation_target: Option<String>,
    pub warn_after: Duration,
    pub restart_after: Duration,

    /// Last time a message was observed (registration time until the first one)
    pub last_activity: DateTime<Utc>,

    pub warned: bool,
    pub restarted: bool,

    pub level1_count: u64,
    pub level2_count: u64,
    pub last_level1_at: Option<DateTime<Utc>>,
    pub last_level2_at: Option<DateTime<Utc>>,
}

impl StreamMonitor {
    /// Create a monitor whose silence clock starts at `registered_at`
    pub fn new(spec: StreamSpec, registered_at: DateTime<Utc>) -> Self {
        Self {
            id: spec.id,
            remediation_target: spec.remediation_target.filter(|t| !t.is_empty()),
            warn_after: spec.warn_after,
            restart_after: spec.restart_after,
            last_activity: registered_at,
            warned: false,
            restarted: false,
            level1_count: 0,
            level2_count: 0,
            last_level1_at: None,
            last_level2_at: None,
        }
    }

    /// Silence duration at `now`; a clock that stepped backwards counts as zero
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_activity).to_std().unwrap_or(Duration::ZERO)
    }

    /// Refresh the activity timestamp
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }

    /// Apply threshold logic for one pass.
    ///
    /// Level 2 takes precedence over level 1 so a topic that crosses both
    /// thresholds in the same pass fires only level 2. Flags, counter and
    /// timestamp change together inside this call.
    pub fn step(&mut self, now: DateTime<Utc>) -> Option<Escalation> {
        let elapsed = self.elapsed(now);

        let fired = if elapsed >= self.restart_after && !self.restarted {
            self.warned = true;
            self.restarted = true;
            self.level2_count += 1;
            self.last_level2_at = Some(now);
            Some(EscalationLevel::Restart)
        } else if elapsed >= self.warn_after && !self.warned {
            self.warned = true;
            self.level1_count += 1;
            self.last_level1_at = Some(now);
            Some(EscalationLevel::Warn)
        } else {
            None
        };

        if elapsed < self.warn_after {
            self.warned = false;
            self.restarted = false;
        }

        fired.map(|level| Escalation {
            topic: self.id.clone(),
            level,
            elapsed_secs: elapsed.as_secs() as i64,
            remediation_target: self.remediation_target.clone(),
            fired_at: now,
        })
    }

    /// Whether the topic is currently at or beyond its warn threshold
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.elapsed(now) >= self.warn_after
    }
}
