//! `GET /dashboard`: the full presentation state as JSON.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tracing::debug;

use super::AppState;
use crate::dashboard::DashboardState;
use crate::models::Device;

// ---

#[derive(Serialize)]
struct DashboardResponse {
    #[serde(flatten)]
    state: DashboardState,
    /// Devices whose controls should render disabled.
    busy_devices: Vec<Device>,
}

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/dashboard", get(handler))
}

async fn handler(State(app): State<AppState>) -> Json<DashboardResponse> {
    // ---
    let state = app.dashboard.view().await;
    debug!(
        "GET /dashboard - {} alerts, {} chart points",
        state.alerts.len(),
        state.chart.len()
    );
    Json(DashboardResponse {
        state,
        busy_devices: app.control.busy_devices(),
    })
}
