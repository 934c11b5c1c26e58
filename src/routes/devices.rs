//! `POST /devices/{device}/{action}`: forward a command to the rig.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tracing::{info, warn};

use super::AppState;
use crate::commands::CommandError;
use crate::models::{Device, DeviceAction};

// ---

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/devices/{device}/{action}", post(handler))
}

async fn handler(
    Path((device, action)): Path<(String, String)>,
    State(app): State<AppState>,
) -> impl IntoResponse {
    // ---
    info!("POST /devices/{}/{}", device, action);

    let parsed = device
        .parse::<Device>()
        .and_then(|d| action.parse::<DeviceAction>().map(|a| (d, a)));
    let (device, action) = match parsed {
        Ok(pair) => pair,
        Err(e) => return error(StatusCode::BAD_REQUEST, e),
    };

    match app.control.execute(device, action).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e @ CommandError::Busy(_)) => {
            warn!("Rejected command: {}", e);
            error(StatusCode::CONFLICT, e.to_string())
        }
        Err(e @ CommandError::Failed { .. }) => error(StatusCode::BAD_GATEWAY, e.to_string()),
    }
}

fn error(status: StatusCode, message: String) -> axum::response::Response {
    (status, Json(ErrorBody { error: message })).into_response()
}
