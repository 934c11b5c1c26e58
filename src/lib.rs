//! Live monitoring core for the hydroponics rig.
//!
//! Each poll cycle fetches the latest reading and recent history from the
//! rig's HTTP API, turns the reading into threshold alerts, tracks which
//! alerts are new or resolved, and publishes the result as dashboard state.
//! Device commands (pump, spray) run out of band.
//!
//! This crate follows the Explicit Module Boundary Pattern (EMBP): sibling
//! modules depend on what this gateway re-exports rather than on each
//! other's internals where practical.

pub mod alerts;
pub mod client;
pub mod commands;
pub mod config;
pub mod dashboard;
pub mod models;
pub mod poller;
pub mod routes;

pub use alerts::{evaluate, Alert, AlertPolicy, AlertTracker, Severity, Thresholds};
pub use client::{ApiClient, DeviceCommander, FetchError, ReadingSource};
pub use commands::{CommandError, CommandOutcome, DeviceControl};
pub use config::Config;
pub use dashboard::{Dashboard, DashboardState, PresentationSink};
pub use models::{Device, DeviceAction, PumpStatus, SensorSnapshot};
pub use poller::{PollHandle, Poller, Shutdown};
