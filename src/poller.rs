//! The poll loop: fetch, evaluate, track, present, then wait.
//!
//! One [`Poller`] is owned by one task. Each cycle borrows it mutably, so two
//! cycles can never run at the same time. The wait between cycles is a fixed
//! delay measured from the end of the previous cycle. Cancellation is checked
//! before every fetch and before any result is applied, so once
//! [`Shutdown::trigger`] returns no further readings, alerts or history are
//! written; the sink is only told that polling stopped.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::alerts::{evaluate, pump_running_alert, Alert, AlertChanges, AlertTracker, Thresholds};
use crate::client::ReadingSource;
use crate::dashboard::PresentationSink;
use crate::models::SensorSnapshot;

// ---

/// Cooperative cancellation flag shared between the loop and its owner.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Trigger once `signal` fires. If the signal cannot be listened for,
    /// the flag is left alone and the service keeps running.
    pub async fn trigger_on<F>(&self, signal: F)
    where
        F: Future<Output = std::io::Result<()>>,
    {
        // ---
        match signal.await {
            Ok(()) => {
                info!("Shutdown requested");
                self.trigger();
            }
            Err(e) => error!("Could not listen for shutdown signal: {}", e),
        }
    }

    /// Resolves once [`trigger`](Self::trigger) has been called.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // Err only if the sender is gone, which cannot happen while `self` holds it.
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PollState {
    Idle,
    Polling,
}

/// What one cycle did. Mostly useful to tests and logs.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    // ---
    pub snapshot: Option<SensorSnapshot>,
    pub alerts: Vec<Alert>,
    pub changes: AlertChanges,
    /// Number of history readings applied, if the history fetch succeeded.
    pub history_len: Option<usize>,
    pub failures: Vec<String>,
    /// The cycle stopped early because shutdown was requested.
    pub cancelled: bool,
}

pub struct Poller<S, P> {
    // ---
    source: S,
    sink: P,
    tracker: AlertTracker,
    thresholds: Thresholds,
    interval: Duration,
    state: PollState,
    shutdown: Shutdown,
}

impl<S, P> Poller<S, P>
where
    S: ReadingSource + 'static,
    P: PresentationSink + 'static,
{
    pub fn new(
        source: S,
        sink: P,
        tracker: AlertTracker,
        thresholds: Thresholds,
        interval: Duration,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            source,
            sink,
            tracker,
            thresholds,
            interval,
            state: PollState::Idle,
            shutdown,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn tracker(&self) -> &AlertTracker {
        &self.tracker
    }

    /// Run one fetch-evaluate-present cycle. Never fails: every error is
    /// logged, handed to the sink, and recorded in the report.
    pub async fn poll_once(&mut self) -> CycleReport {
        // ---
        let mut report = CycleReport::default();
        if self.shutdown.is_triggered() {
            report.cancelled = true;
            return report;
        }

        self.state = PollState::Polling;
        self.sink.set_polling(true).await;
        debug!("Poll cycle started");

        self.sync_latest(&mut report).await;
        if !report.cancelled {
            self.sync_history(&mut report).await;
        }

        self.state = PollState::Idle;
        self.sink.set_polling(false).await;
        if !report.cancelled {
            self.sink.cycle_finished().await;
            debug!(
                alerts = report.alerts.len(),
                failures = report.failures.len(),
                "Poll cycle complete"
            );
        }
        report
    }

    async fn sync_latest(&mut self, report: &mut CycleReport) {
        // ---
        let snapshot = match self.source.fetch_latest().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("Failed to fetch latest reading: {}", e);
                if self.shutdown.is_triggered() {
                    report.cancelled = true;
                    return;
                }
                report.failures.push(e.to_string());
                self.sink.show_failure("latest", e.to_string()).await;
                return;
            }
        };

        if self.shutdown.is_triggered() {
            report.cancelled = true;
            return;
        }

        // Pump status only decorates the alert list; failing to get it is fine.
        let pump_alert = match self.source.fetch_pump_status().await {
            Ok(status) => pump_running_alert(&status),
            Err(e) => {
                warn!("Could not fetch pump status: {}", e);
                None
            }
        };

        let mut alerts = evaluate(&snapshot, &self.thresholds);
        if let Some(alert) = pump_alert {
            alerts.insert(0, alert);
        }

        if self.shutdown.is_triggered() {
            report.cancelled = true;
            return;
        }

        let changes = self.tracker.update(&alerts);
        for id in &changes.appeared {
            if let Some(alert) = alerts.iter().find(|a| &a.id == id) {
                warn!(
                    id = %alert.id,
                    severity = ?alert.severity,
                    "NEW ALERT: {} - {}",
                    alert.title,
                    alert.message
                );
            }
        }
        for id in &changes.resolved {
            info!(id = %id, "Alert resolved");
        }

        self.sink.show_snapshot(&snapshot).await;
        self.sink
            .show_alerts(&alerts, self.tracker.active(), &changes)
            .await;

        report.snapshot = Some(snapshot);
        report.alerts = alerts;
        report.changes = changes;
    }

    async fn sync_history(&mut self, report: &mut CycleReport) {
        // ---
        if self.shutdown.is_triggered() {
            report.cancelled = true;
            return;
        }

        let result = self.source.fetch_history().await;
        if self.shutdown.is_triggered() {
            report.cancelled = true;
            return;
        }

        match result {
            Ok(history) => {
                self.sink.show_history(&history).await;
                report.history_len = Some(history.len());
            }
            Err(e) => {
                error!("Failed to fetch reading history: {}", e);
                report.failures.push(e.to_string());
                self.sink.show_failure("history", e.to_string()).await;
            }
        }
    }

    /// Poll immediately, then every `interval` after the previous cycle ends,
    /// until shutdown.
    pub async fn run(mut self) {
        // ---
        info!(
            interval_secs = self.interval.as_secs(),
            policy = ?self.tracker.policy(),
            "Poll loop started"
        );

        let shutdown = self.shutdown.clone();
        while !shutdown.is_triggered() {
            self.poll_once().await;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.wait() => {}
            }
        }

        info!("Poll loop stopped");
    }

    /// Run the loop on its own task.
    pub fn spawn(self) -> PollHandle {
        let shutdown = self.shutdown.clone();
        let task = tokio::spawn(self.run());
        PollHandle { shutdown, task }
    }
}

/// Owner's side of a spawned poll loop.
#[derive(Debug)]
pub struct PollHandle {
    shutdown: Shutdown,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Request cancellation and wait for the loop to exit.
    pub async fn stop(self) {
        // ---
        self.shutdown.trigger();
        if let Err(e) = self.task.await {
            error!("Poll loop task ended abnormally: {}", e);
        }
    }
}
