//! Presentation state: what the dashboard shows after each poll cycle.
//!
//! The poll loop writes through [`PresentationSink`]; HTTP handlers read a
//! cloned [`DashboardState`]. Failed fetches never clear anything: the last
//! known gauges and chart stay in place and only `last_error` changes.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::alerts::{Alert, AlertChanges, Thresholds};
use crate::models::{Device, DeviceAction, SensorSnapshot, WaterStatus};

// ---

/// Receiver of poll-cycle results.
#[async_trait]
pub trait PresentationSink: Send + Sync {
    /// Latest reading arrived and validated.
    async fn show_snapshot(&self, snapshot: &SensorSnapshot);

    /// Alerts for the latest reading, the tracker's active set, and what changed.
    async fn show_alerts(
        &self,
        alerts: &[Alert],
        active: &BTreeSet<String>,
        changes: &AlertChanges,
    );

    /// History arrived; oldest first.
    async fn show_history(&self, history: &[SensorSnapshot]);

    /// A fetch failed; `target` names which one.
    async fn show_failure(&self, target: &'static str, message: String);

    /// The loop entered or left a cycle, whether or not it completed.
    async fn set_polling(&self, polling: bool);

    /// A cycle ran to the end without being cancelled.
    async fn cycle_finished(&self);
}

// ---

#[derive(Debug, Clone, Serialize)]
pub struct Gauges {
    // ---
    pub ph: f64,
    pub nutrient_ppm: f64,
    pub water_level: f64,
    pub water_status: WaterStatus,
    /// 1 when water is detected, else 0.
    pub water_gauge: u8,
    pub reading_at: DateTime<Utc>,
}

impl Gauges {
    /// `out_of_water_below` is the same bound that raises `water-critical`.
    pub fn new(s: &SensorSnapshot, out_of_water_below: f64) -> Self {
        let water_status = WaterStatus::classify(s.water_level, out_of_water_below);
        Self {
            ph: s.ph_level,
            nutrient_ppm: s.nutrient_level,
            water_level: s.water_level,
            water_status,
            water_gauge: water_status.gauge_value(),
            reading_at: s.timestamp,
        }
    }
}

/// Parallel series for the history line chart, newest last.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChartSeries {
    // ---
    pub labels: Vec<String>,
    pub ph: Vec<f64>,
    pub nutrient_ppm: Vec<f64>,
    pub water_level: Vec<f64>,
}

impl ChartSeries {
    /// Build from chronological history, keeping only the last `window` entries.
    pub fn from_history(history: &[SensorSnapshot], window: usize) -> Self {
        // ---
        let start = history.len().saturating_sub(window);
        let recent = &history[start..];

        Self {
            labels: recent
                .iter()
                .map(|s| s.timestamp.format("%-H:%M").to_string())
                .collect(),
            ph: recent.iter().map(|s| s.ph_level).collect(),
            nutrient_ppm: recent.iter().map(|s| s.nutrient_level).collect(),
            water_level: recent.iter().map(|s| s.water_level).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
}

/// Transient user-facing message about a device command.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    // ---
    pub kind: NotificationKind,
    pub device: Device,
    pub action: DeviceAction,
    pub message: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    expires_at: Instant,
}

impl Notification {
    pub fn new(
        kind: NotificationKind,
        device: Device,
        action: DeviceAction,
        message: String,
        ttl: Duration,
    ) -> Self {
        Self {
            kind,
            device,
            action,
            message,
            created_at: Utc::now(),
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Everything the front end needs to render one frame.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardState {
    // ---
    pub gauges: Option<Gauges>,
    pub chart: ChartSeries,
    pub alerts: Vec<Alert>,
    pub active_alert_ids: BTreeSet<String>,
    /// What appeared or resolved in the last completed evaluation.
    pub last_changes: AlertChanges,
    pub all_normal: bool,
    pub polling: bool,
    pub cycles: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub notifications: Vec<Notification>,
}

/// Cloneable handle to the shared presentation state.
#[derive(Debug, Clone)]
pub struct Dashboard {
    // ---
    inner: Arc<RwLock<DashboardState>>,
    history_window: usize,
    out_of_water_below: f64,
}

impl Dashboard {
    pub fn new(history_window: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(DashboardState::default())),
            history_window,
            out_of_water_below: Thresholds::default().water.critical_below,
        }
    }

    /// Classify the water gauge against a non-default critical bound.
    pub fn with_out_of_water_below(mut self, level: f64) -> Self {
        self.out_of_water_below = level;
        self
    }

    /// Copy of the current state with expired notifications removed.
    pub async fn view(&self) -> DashboardState {
        // ---
        let mut state = self.inner.write().await;
        let now = Instant::now();
        state.notifications.retain(|n| n.is_live(now));
        state.clone()
    }

    pub async fn notify(&self, notification: Notification) {
        self.inner.write().await.notifications.push(notification);
    }
}

#[async_trait]
impl PresentationSink for Dashboard {
    async fn show_snapshot(&self, snapshot: &SensorSnapshot) {
        let gauges = Gauges::new(snapshot, self.out_of_water_below);
        self.inner.write().await.gauges = Some(gauges);
    }

    async fn show_alerts(
        &self,
        alerts: &[Alert],
        active: &BTreeSet<String>,
        changes: &AlertChanges,
    ) {
        // ---
        let mut state = self.inner.write().await;
        state.alerts = alerts.to_vec();
        state.active_alert_ids = active.clone();
        state.last_changes = changes.clone();
        state.all_normal = alerts.is_empty();
    }

    async fn show_history(&self, history: &[SensorSnapshot]) {
        // ---
        if history.is_empty() {
            return;
        }
        let chart = ChartSeries::from_history(history, self.history_window);
        self.inner.write().await.chart = chart;
    }

    async fn show_failure(&self, target: &'static str, message: String) {
        self.inner.write().await.last_error = Some(format!("{target}: {message}"));
    }

    async fn set_polling(&self, polling: bool) {
        self.inner.write().await.polling = polling;
    }

    async fn cycle_finished(&self) {
        // ---
        let mut state = self.inner.write().await;
        state.cycles += 1;
        state.last_cycle_at = Some(Utc::now());
    }
}
