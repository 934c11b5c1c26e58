//! Alert evaluation and change tracking.
//!
//! [`evaluator`] turns a snapshot into alerts; [`tracker`] remembers which
//! alert ids were live last cycle so one-shot notifications fire only when
//! something appears or resolves.

use serde::Serialize;

pub mod evaluator;
pub mod tracker;

pub use evaluator::{evaluate, pump_running_alert, RangeBounds, Thresholds, WaterBounds};
pub use tracker::{AlertChanges, AlertPolicy, AlertTracker};

// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// A classified alert for one metric (or the pump) in one cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    // ---
    /// Stable key for the (metric, band) pair, e.g. `ppm-critical-low`.
    pub id: String,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    /// Reading that triggered the alert; `None` for non-threshold alerts.
    pub value: Option<f64>,
}
