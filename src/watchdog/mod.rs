//! Orchestration loop
//!
//! Ties the event source, the escalation engine and the action dispatcher
//! together. Deliveries arrive on a bounded queue that only this loop reads,
//! so recording activity and evaluating thresholds never race.

mod signal;

pub use signal::{shutdown_signal, spawn_shutdown_listener};

use crate::config::WatchdogConfig;
use crate::error::{AppError, Result};
use crate::escalation::EscalationEngine;
use crate::messaging::{DeliverySink, EventSource, TopicEvent};
use chrono::Utc;
use std::time::Duration;
use strum::Display;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};

/// Subject of the notification sent once the watchdog is up
pub const STARTUP_SUBJECT: &str = "Startup";

/// Lifecycle of the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum LoopState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// Loop cadence
#[derive(Debug, Clone)]
pub struct WatchdogSettings {
    /// Evaluation tick
    pub process_interval: Duration,

    /// Statistics log tick
    pub stats_interval: Duration,

    /// Capacity of the delivered-event queue
    pub event_queue_capacity: usize,
}

impl From<&WatchdogConfig> for WatchdogSettings {
    fn from(config: &WatchdogConfig) -> Self {
        Self {
            process_interval: config.process_interval(),
            stats_interval: config.stats_interval(),
            event_queue_capacity: config.event_queue_capacity,
        }
    }
}

impl Default for WatchdogSettings {
    fn default() -> Self {
        Self::from(&WatchdogConfig::default())
    }
}

pub struct Watchdog {
    source: Box<dyn EventSource>,
    engine: EscalationEngine,
    settings: WatchdogSettings,
    state: LoopState,
    events: Option<mpsc::Receiver<TopicEvent>>,
    subscribed: Vec<String>,
}

impl Watchdog {
    pub fn new(
        source: Box<dyn EventSource>,
        engine: EscalationEngine,
        settings: WatchdogSettings,
    ) -> Self {
        Self {
            source,
            engine,
            settings,
            state: LoopState::Starting,
            events: None,
            subscribed: Vec::new(),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn engine(&self) -> &EscalationEngine {
        &self.engine
    }

    /// Start, serve until `shutdown` flips or a fatal error occurs, then stop.
    ///
    /// Adapters are released on every path.
    pub async fn run(&mut self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let result = match self.start().await {
            Ok(()) => self.serve(shutdown).await,
            Err(e) => Err(e),
        };

        self.stop().await;
        result
    }

    /// Connect, announce startup and subscribe every monitored topic
    pub async fn start(&mut self) -> Result<()> {
        self.state = LoopState::Starting;

        self.source.connect().await?;
        tracing::info!(source = self.source.name(), "Event source connected");

        self.engine
            .dispatcher()
            .notify(STARTUP_SUBJECT, "")
            .await
            .map_err(|e| AppError::AdapterConnect(format!("startup notification failed: {}", e)))?;

        let capacity = self.settings.event_queue_capacity.max(1);
        let (sink, events) = DeliverySink::channel(capacity);
        self.source.register_delivery(sink);
        self.events = Some(events);

        let topics: Vec<String> = self.engine.table().topics().map(str::to_string).collect();
        for topic in topics {
            self.source.subscribe(&topic).await?;
            tracing::debug!(topic = %topic, "Subscribed to topic");
            self.subscribed.push(topic);
        }

        tracing::info!(topics = self.subscribed.len(), "Watchdog started");
        Ok(())
    }

    /// Serve deliveries and ticks until shutdown
    pub async fn serve(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut events = self
            .events
            .take()
            .ok_or_else(|| AppError::Internal("watchdog served before start".to_string()))?;

        let mut evaluate_tick = interval(self.settings.process_interval);
        evaluate_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let stats_every = self.settings.stats_interval;
        let mut stats_tick = interval_at(Instant::now() + stats_every, stats_every);
        stats_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.state = LoopState::Running;

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() {
                        tracing::debug!("Shutdown sender dropped");
                        break;
                    }
                }

                _ = evaluate_tick.tick() => {
                    // deliveries queued behind a slow pass must land before thresholds are checked
                    self.drain_events(&mut events);
                    let report = self.engine.evaluate(Utc::now()).await;
                    if !report.is_healthy() {
                        tracing::debug!(
                            stale = report.stale,
                            escalated = report.escalated(),
                            dispatch_failures = report.dispatch_failures,
                            "Evaluation pass"
                        );
                    }
                }

                _ = stats_tick.tick() => self.log_stats(),

                event = events.recv() => {
                    match event {
                        Some(event) => self.on_event(event),
                        None => {
                            return Err(AppError::Transport("event queue closed".to_string()));
                        }
                    }
                }
            }
        }

        tracing::info!("Shutdown requested");
        Ok(())
    }

    /// Cancel delivery, unsubscribe every topic, then disconnect
    pub async fn stop(&mut self) {
        self.state = LoopState::Stopping;

        self.source.cancel_delivery();
        self.events = None;

        for topic in std::mem::take(&mut self.subscribed) {
            if let Err(e) = self.source.unsubscribe(&topic).await {
                tracing::warn!(topic = %topic, error = %e, "Failed to unsubscribe");
            }
        }

        if let Err(e) = self.source.disconnect().await {
            tracing::warn!(error = %e, "Failed to disconnect event source");
        }

        self.state = LoopState::Stopped;
        tracing::info!("Watchdog stopped");
    }

    fn drain_events(&mut self, events: &mut mpsc::Receiver<TopicEvent>) {
        while let Ok(event) = events.try_recv() {
            self.on_event(event);
        }
    }

    fn on_event(&mut self, event: TopicEvent) {
        if !self.engine.record(&event.topic, event.received_at) {
            tracing::debug!(topic = %event.topic, "Ignoring message on unmonitored topic");
        }
    }

    fn log_stats(&self) {
        match self.engine.stats_summary().into_result() {
            Ok(line) => tracing::info!("notify: {}", line),
            Err(e) => tracing::warn!(error = %e, "Statistics line skipped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::escalation::{ActionDispatcher, EscalationTable, StreamSpec};
    use crate::messaging::{BusOperation, InMemoryEventSource};
    use crate::remediation::Remediator;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct NoopRemediator;

    #[async_trait]
    impl Remediator for NoopRemediator {
        async fn invoke(&self, _target: &str) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "noop"
        }
    }

    fn watchdog(bus: &InMemoryEventSource, topics: &[&str]) -> Watchdog {
        let specs = topics
            .iter()
            .map(|t| StreamSpec::new(*t, Duration::from_secs(60), Duration::from_secs(300)))
            .collect();
        let table = EscalationTable::register(specs, Utc::now()).unwrap();
        let dispatcher = ActionDispatcher::new(None, Arc::new(NoopRemediator));
        let settings = WatchdogSettings {
            process_interval: Duration::from_millis(10),
            stats_interval: Duration::from_millis(25),
            event_queue_capacity: 8,
        };

        Watchdog::new(
            Box::new(bus.clone()),
            EscalationEngine::new(table, dispatcher),
            settings,
        )
    }

    #[test]
    fn test_loop_state_display() {
        assert_eq!(LoopState::Starting.to_string(), "starting");
        assert_eq!(LoopState::Stopped.to_string(), "stopped");
    }

    #[test]
    fn test_settings_from_config() {
        let settings = WatchdogSettings::default();
        assert_eq!(settings.process_interval, Duration::from_secs(5));
        assert_eq!(settings.stats_interval, Duration::from_secs(30));
        assert_eq!(settings.event_queue_capacity, 1024);
    }

    #[tokio::test]
    async fn test_start_subscribes_in_order() {
        let bus = InMemoryEventSource::new();
        let mut dog = watchdog(&bus, &["a", "b"]);

        dog.start().await.unwrap();

        assert_eq!(
            bus.operations(),
            vec![
                BusOperation::Connect,
                BusOperation::RegisterDelivery,
                BusOperation::Subscribe("a".to_string()),
                BusOperation::Subscribe("b".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_connect_failure_is_fatal() {
        let bus = InMemoryEventSource::new().with_connect_failure();
        let mut dog = watchdog(&bus, &["a"]);
        let (_tx, rx) = watch::channel(false);

        let err = dog.run(rx).await.unwrap_err();
        assert!(matches!(err, AppError::AdapterConnect(_)));
        assert_eq!(dog.state(), LoopState::Stopped);
    }

    #[tokio::test]
    async fn test_serve_before_start_fails() {
        let bus = InMemoryEventSource::new();
        let mut dog = watchdog(&bus, &["a"]);
        let (_tx, rx) = watch::channel(false);

        assert!(matches!(dog.serve(rx).await, Err(AppError::Internal(_))));
    }

    #[tokio::test]
    async fn test_shutdown_before_serve() {
        let bus = InMemoryEventSource::new();
        let mut dog = watchdog(&bus, &["a"]);
        let (_tx, rx) = watch::channel(true);

        dog.run(rx).await.unwrap();
        assert_eq!(dog.state(), LoopState::Stopped);
        assert!(!bus.is_connected());
    }

    #[tokio::test]
    async fn test_delivery_records_activity() {
        let bus = InMemoryEventSource::new();
        let mut dog = watchdog(&bus, &["a"]);
        let (tx, rx) = watch::channel(false);

        let before = dog.engine().table().get("a").unwrap().last_activity;

        let publisher = bus.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            publisher.publish("a");
            publisher.publish("unknown");
            tokio::time::sleep(Duration::from_millis(40)).await;
            let _ = tx.send(true);
        });

        dog.run(rx).await.unwrap();
        handle.await.unwrap();

        assert!(dog.engine().table().get("a").unwrap().last_activity > before);
        assert_eq!(dog.engine().table().level1_total(), 0);
    }
}
