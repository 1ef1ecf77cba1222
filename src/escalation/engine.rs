use crate::error::{AppError, Result};
use crate::escalation::executor::ActionDispatcher;
use crate::escalation::state::{Escalation, EscalationLevel, StreamMonitor, StreamSpec};
use crate::escalation::stats::{render_summary, StatsLine, STATS_BUFFER_CAPACITY};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Maximum number of monitored topics
pub const MAX_STREAMS: usize = 32;

/// Fixed set of topic monitors plus process-wide escalation counters
#[derive(Debug, Clone)]
pub struct EscalationTable {
    /// Monitors in registration order
    monitors: Vec<StreamMonitor>,

    /// Topic name to position in `monitors`
    index: HashMap<String, usize>,

    level1_total: u64,
    level2_total: u64,
}

impl EscalationTable {
    /// Register topics, starting every silence clock at `now`
    pub fn register(specs: Vec<StreamSpec>, now: DateTime<Utc>) -> Result<Self> {
        Self::register_with_capacity(specs, now, MAX_STREAMS)
    }

    /// Register topics against an explicit capacity
    pub fn register_with_capacity(
        specs: Vec<StreamSpec>,
        now: DateTime<Utc>,
        capacity: usize,
    ) -> Result<Self> {
        if specs.is_empty() {
            return Err(AppError::Configuration(
                "No topics configured for monitoring".to_string(),
            ));
        }

        if specs.len() > capacity {
            return Err(AppError::Configuration(format!(
                "{} topics configured, maximum is {}",
                specs.len(),
                capacity
            )));
        }

        let mut monitors = Vec::with_capacity(specs.len());
        let mut index = HashMap::with_capacity(specs.len());

        for spec in specs {
            if index.contains_key(&spec.id) {
                return Err(AppError::Configuration(format!(
                    "Topic '{}' configured more than once",
                    spec.id
                )));
            }

            if spec.restart_after < spec.warn_after {
                tracing::warn!(
                    topic = %spec.id,
                    warning_secs = spec.warn_after.as_secs(),
                    restart_secs = spec.restart_after.as_secs(),
                    "Restart threshold is below warning threshold; level-2 will fire without a prior level-1"
                );
            }

            tracing::info!(
                topic = %spec.id,
                warning_secs = spec.warn_after.as_secs(),
                restart_secs = spec.restart_after.as_secs(),
                service = spec.remediation_target.as_deref().unwrap_or("n/a"),
                "Monitoring topic"
            );

            index.insert(spec.id.clone(), monitors.len());
            monitors.push(StreamMonitor::new(spec, now));
        }

        Ok(Self {
            monitors,
            index,
            level1_total: 0,
            level2_total: 0,
        })
    }

    /// Record activity on a topic. Unknown topics are ignored.
    pub fn record(&mut self, id: &str, now: DateTime<Utc>) -> bool {
        match self.index.get(id) {
            Some(&slot) => {
                self.monitors[slot].touch(now);
                tracing::debug!(topic = %id, "Message received");
                true
            }
            None => false,
        }
    }

    /// Evaluate every topic at `now`, applying state changes and returning
    /// the escalations that fired in this pass.
    pub fn evaluate(&mut self, now: DateTime<Utc>) -> Vec<Escalation> {
        let mut fired = Vec::new();

        for monitor in &mut self.monitors {
            if let Some(escalation) = monitor.step(now) {
                match escalation.level {
                    EscalationLevel::Warn => self.level1_total += 1,
                    EscalationLevel::Restart => self.level2_total += 1,
                }
                fired.push(escalation);
            }
        }

        fired
    }

    /// Number of topics at or beyond their warn threshold
    pub fn stale_count(&self, now: DateTime<Utc>) -> usize {
        self.monitors.iter().filter(|m| m.is_stale(now)).count()
    }

    /// Render the statistics line into the standard buffer size
    pub fn stats_summary(&self) -> StatsLine {
        self.stats_summary_with_capacity(STATS_BUFFER_CAPACITY)
    }

    pub fn stats_summary_with_capacity(&self, capacity: usize) -> StatsLine {
        render_summary(self.level1_total, self.level2_total, &self.monitors, capacity)
    }

    pub fn get(&self, id: &str) -> Option<&StreamMonitor> {
        self.index.get(id).map(|&slot| &self.monitors[slot])
    }

    pub fn monitors(&self) -> &[StreamMonitor] {
        &self.monitors
    }

    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.monitors.iter().map(|m| m.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }

    pub fn level1_total(&self) -> u64 {
        self.level1_total
    }

    pub fn level2_total(&self) -> u64 {
        self.level2_total
    }
}

/// Result of one evaluation pass
#[derive(Debug, Default)]
pub struct EvaluationReport {
    /// Escalations fired in this pass
    pub escalations: Vec<Escalation>,

    /// Topics at or beyond their warn threshold after the pass
    pub stale: usize,

    /// Notify/remediate calls that failed
    pub dispatch_failures: usize,
}

impl EvaluationReport {
    /// No topic is currently silent beyond its warn threshold
    pub fn is_healthy(&self) -> bool {
        self.stale == 0
    }

    pub fn escalated(&self) -> usize {
        self.escalations.len()
    }
}

/// Escalation table bound to the actions it dispatches
pub struct EscalationEngine {
    table: EscalationTable,
    dispatcher: ActionDispatcher,
}

impl EscalationEngine {
    pub fn new(table: EscalationTable, dispatcher: ActionDispatcher) -> Self {
        Self { table, dispatcher }
    }

    pub fn table(&self) -> &EscalationTable {
        &self.table
    }

    pub fn dispatcher(&self) -> &ActionDispatcher {
        &self.dispatcher
    }

    /// Record activity on a topic
    pub fn record(&mut self, id: &str, now: DateTime<Utc>) -> bool {
        self.table.record(id, now)
    }

    /// Evaluate all topics and dispatch the resulting actions.
    ///
    /// State for the whole pass is applied before any action runs, so a
    /// failed or slow dispatch never leaves a topic half-escalated.
    pub async fn evaluate(&mut self, now: DateTime<Utc>) -> EvaluationReport {
        let escalations = self.table.evaluate(now);
        let stale = self.table.stale_count(now);
        let mut dispatch_failures = 0;

        for escalation in &escalations {
            tracing::warn!(
                topic = %escalation.topic,
                level = %escalation.level,
                elapsed_secs = escalation.elapsed_secs,
                "Topic threshold exceeded"
            );

            let outcome = self.dispatcher.dispatch(escalation).await;
            dispatch_failures += outcome.errors.len();
        }

        EvaluationReport {
            escalations,
            stale,
            dispatch_failures,
        }
    }

    pub fn stats_summary(&self) -> StatsLine {
        self.table.stats_summary()
    }
}
