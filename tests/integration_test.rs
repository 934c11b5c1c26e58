use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use reqwest::Client;
use serde_json::{json, Value};
use tokio_test::{assert_err, assert_ok};

use hydro_dashboard::routes::{self, AppState};
use hydro_dashboard::{
    AlertPolicy, AlertTracker, ApiClient, Dashboard, DeviceControl, FetchError, Poller,
    ReadingSource, Shutdown, Thresholds,
};

// ---

/// Canned responses served by the fake rig API.
#[derive(Default)]
struct Rig {
    latest: Option<Value>,
    history: Vec<Value>,
    pump_on: bool,
    fail_commands: bool,
    commands: Vec<String>,
    auth_headers: Vec<String>,
}

type SharedRig = Arc<Mutex<Rig>>;

fn reading(water: Value, ppm: f64, ph: f64, ts: &str) -> Value {
    json!({ "water_level": water, "nutrient_level": ppm, "ph_level": ph, "timestamp": ts })
}

fn record_auth(rig: &SharedRig, headers: &HeaderMap) {
    if let Some(v) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        rig.lock().unwrap().auth_headers.push(v.to_string());
    }
}

async fn latest(State(rig): State<SharedRig>, headers: HeaderMap) -> impl IntoResponse {
    record_auth(&rig, &headers);
    match rig.lock().unwrap().latest.clone() {
        Some(body) => (StatusCode::OK, Json(body)).into_response(),
        None => {
            let body = Json(json!({"detail": "No readings found"}));
            (StatusCode::NOT_FOUND, body).into_response()
        }
    }
}

async fn history(State(rig): State<SharedRig>) -> Json<Vec<Value>> {
    Json(rig.lock().unwrap().history.clone())
}

async fn pump_status(State(rig): State<SharedRig>) -> Json<Value> {
    let on = rig.lock().unwrap().pump_on;
    Json(json!({ "status": if on { "on" } else { "off" }, "last_updated": "2025-11-04T08:30:05" }))
}

async fn command(
    Path((device, action)): Path<(String, String)>,
    State(rig): State<SharedRig>,
) -> impl IntoResponse {
    let mut rig = rig.lock().unwrap();
    if rig.fail_commands {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"detail": "relay offline"})));
    }
    rig.commands.push(format!("{device}/{action}"));
    (StatusCode::OK, Json(json!({ "device": device, "status": action })))
}

async fn serve(app: Router) -> Result<String> {
    // ---
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

async fn start_rig(rig: SharedRig) -> Result<String> {
    let app = Router::new()
        .route("/readings/latest", get(latest))
        .route("/readings/", get(history))
        .route("/pump/status", get(pump_status))
        .route("/{device}/{action}", post(command))
        .with_state(rig);
    serve(app).await
}

fn rig_with_latest(latest: Value) -> SharedRig {
    Arc::new(Mutex::new(Rig {
        latest: Some(latest),
        ..Default::default()
    }))
}

fn client(base: &str) -> Result<ApiClient> {
    Ok(ApiClient::new(base, None, Duration::from_secs(5))?)
}

fn poller(client: ApiClient, dashboard: Dashboard) -> Poller<ApiClient, Dashboard> {
    Poller::new(
        client,
        dashboard,
        AlertTracker::new(AlertPolicy::Resolving),
        Thresholds::default(),
        Duration::from_secs(30),
        Shutdown::new(),
    )
}

// ---

#[tokio::test]
async fn scenarios_produce_expected_alerts() -> Result<()> {
    // ---
    let cases = [
        (json!(5), 900.0, 6.5, vec![("water-critical", "critical")]),
        (json!(80), 250.0, 6.0, vec![("ppm-critical-low", "critical")]),
        (json!(80), 900.0, 4.8, vec![("ph-critical-low", "critical")]),
        (json!(80), 900.0, 7.0, vec![]),
    ];

    for (water, ppm, ph, expected) in cases {
        let rig = rig_with_latest(reading(water, ppm, ph, "2025-11-04T10:00:00Z"));
        let base = start_rig(rig).await?;

        let dashboard = Dashboard::new(24);
        let mut p = poller(client(&base)?, dashboard.clone());
        let report = p.poll_once().await;
        assert!(report.failures.is_empty(), "failures: {:?}", report.failures);

        let view = serde_json::to_value(dashboard.view().await)?;
        let got: Vec<(String, String)> = view["alerts"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| {
                (
                    a["id"].as_str().unwrap().to_string(),
                    a["severity"].as_str().unwrap().to_string(),
                )
            })
            .collect();
        let expected: Vec<(String, String)> = expected
            .iter()
            .map(|(id, sev)| (id.to_string(), sev.to_string()))
            .collect();
        assert_eq!(got, expected);
        assert_eq!(view["all_normal"], json!(expected.is_empty()));
    }

    Ok(())
}

#[tokio::test]
async fn dashboard_route_serves_state() -> Result<()> {
    // ---
    let rig = rig_with_latest(reading(json!("62.5"), 1500.0, 6.1, "2025-11-04T10:00:00"));
    {
        let mut r = rig.lock().unwrap();
        r.pump_on = true;
        r.history = vec![
            reading(json!(60), 1450.0, 6.0, "2025-11-04T09:30:00Z"),
            json!({ "water_level": "OUT OF WATER", "nutrient_level": 0, "ph_level": 0,
                    "timestamp": "2025-11-04T09:45:00Z" }),
            reading(json!(61), 1480.0, 6.1, "2025-11-04T09:00:00Z"),
        ];
    }
    let base = start_rig(rig.clone()).await?;

    let api = Arc::new(client(&base)?);
    let dashboard = Dashboard::new(24);
    let mut p = poller(client(&base)?, dashboard.clone());
    p.poll_once().await;

    let control = DeviceControl::new(api, dashboard.clone(), Duration::from_secs(3));
    let app = routes::router(AppState { dashboard, control });
    let dash = serve(app).await?;

    let http = Client::new();
    let health: Value = http.get(format!("{dash}/health")).send().await?.json().await?;
    assert_eq!(health["status"], "ok");

    let view: Value = http.get(format!("{dash}/dashboard")).send().await?.json().await?;
    assert_eq!(view["gauges"]["water_level"], 62.5);
    assert_eq!(view["gauges"]["water_status"], "IN_WATER");
    assert_eq!(view["gauges"]["water_gauge"], 1);

    let ids: Vec<&str> = view["alerts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["pump-running", "ppm-warning-high"]);
    assert_eq!(view["alerts"][1]["message"], "PPM: 1500 ppm - Consider diluting solution");

    // Bad row skipped, remaining rows in chronological order.
    assert_eq!(view["chart"]["labels"], json!(["9:00", "9:30"]));
    assert_eq!(view["chart"]["nutrient_ppm"], json!([1480.0, 1450.0]));
    assert_eq!(view["busy_devices"], json!([]));

    Ok(())
}

#[tokio::test]
async fn upstream_failure_keeps_last_values() -> Result<()> {
    // ---
    let rig = rig_with_latest(reading(json!(15), 900.0, 6.5, "2025-11-04T10:00:00Z"));
    let base = start_rig(rig.clone()).await?;

    let dashboard = Dashboard::new(24);
    let mut p = poller(client(&base)?, dashboard.clone());
    p.poll_once().await;

    // API loses its readings: 404 must not be parsed as data.
    rig.lock().unwrap().latest = None;
    let report = p.poll_once().await;
    assert_eq!(report.failures.len(), 1);

    let view = dashboard.view().await;
    assert_eq!(view.gauges.as_ref().unwrap().water_level, 15.0);
    assert_eq!(view.alerts.len(), 1);
    assert_eq!(view.alerts[0].id, "water-warning");
    assert!(view.last_error.unwrap().contains("404"));
    assert_eq!(view.cycles, 2);

    Ok(())
}

#[tokio::test]
async fn client_reports_typed_failures() -> Result<()> {
    // ---
    let rig = rig_with_latest(json!({ "water_level": 50, "ph_level": 6.5,
                                      "timestamp": "2025-11-04T10:00:00Z" }));
    let base = start_rig(rig.clone()).await?;
    let api = client(&base)?;

    let err = assert_err!(api.fetch_latest().await);
    assert!(matches!(err, FetchError::Payload { .. }), "got {err:?}");

    rig.lock().unwrap().latest = Some(json!("not a reading"));
    let err = assert_err!(api.fetch_latest().await);
    assert!(matches!(err, FetchError::Decode { .. }), "got {err:?}");

    rig.lock().unwrap().latest = None;
    let err = assert_err!(api.fetch_latest().await);
    assert!(matches!(err, FetchError::Status { status: 404, .. }), "got {err:?}");

    // Nothing listening on this port once the listener is dropped.
    let closed = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let dead = format!("http://{}", closed.local_addr()?);
    drop(closed);
    let err = assert_err!(client(&dead)?.fetch_history().await);
    assert!(matches!(err, FetchError::Transport { .. }), "got {err:?}");

    Ok(())
}

#[tokio::test]
async fn bearer_token_is_sent_when_configured() -> Result<()> {
    // ---
    let rig = rig_with_latest(reading(json!(80), 900.0, 7.0, "2025-11-04T10:00:00Z"));
    let base = start_rig(rig.clone()).await?;

    let api = ApiClient::new(&base, Some("s3cret".into()), Duration::from_secs(5))?;
    assert_ok!(api.fetch_latest().await);

    assert_eq!(rig.lock().unwrap().auth_headers, ["Bearer s3cret"]);
    Ok(())
}

#[tokio::test]
async fn device_commands_round_trip() -> Result<()> {
    // ---
    let rig = rig_with_latest(reading(json!(80), 900.0, 7.0, "2025-11-04T10:00:00Z"));
    let base = start_rig(rig.clone()).await?;

    let dashboard = Dashboard::new(24);
    let api = Arc::new(client(&base)?);
    let control = DeviceControl::new(api, dashboard.clone(), Duration::from_secs(3));
    let dash = serve(routes::router(AppState { dashboard, control })).await?;
    let http = Client::new();

    let resp = http.post(format!("{dash}/devices/pump/on")).send().await?;
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body: Value = resp.json().await?;
    assert_eq!(body["message"], "Pump turned ON");
    assert_eq!(body["ack"]["status"], "on");

    let resp = http.post(format!("{dash}/devices/spray/off")).send().await?;
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    assert_eq!(rig.lock().unwrap().commands, ["pump/on", "spray/off"]);

    let resp = http.post(format!("{dash}/devices/valve/on")).send().await?;
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

    rig.lock().unwrap().fail_commands = true;
    let resp = http.post(format!("{dash}/devices/pump/off")).send().await?;
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_GATEWAY);
    let body: Value = resp.json().await?;
    assert!(body["error"].as_str().unwrap().contains("503"));

    let view: Value = http.get(format!("{dash}/dashboard")).send().await?.json().await?;
    let kinds: Vec<&str> = view["notifications"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, ["success", "success", "error"]);
    assert_eq!(view["busy_devices"], json!([]));

    Ok(())
}
