//! Routes gateway for the dashboard HTTP API.
//!
//! Each sibling module exports a subrouter; this module merges them and
//! attaches the shared [`AppState`], so `main.rs` never sees individual
//! endpoints.

use axum::Router;

use crate::{Dashboard, DeviceControl};

mod dashboard;
mod devices;
mod health;

// ---

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub dashboard: Dashboard,
    pub control: DeviceControl,
}

pub fn router(state: AppState) -> Router {
    // ---
    Router::new()
        .merge(dashboard::router())
        .merge(devices::router())
        .merge(health::router())
        .with_state(state)
}
