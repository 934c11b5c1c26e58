//! Application entry point for the `hydro-dashboard` service.
//!
//! This binary orchestrates the full startup sequence, including:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Building the API client and shared dashboard state
//! - Spawning the poll loop
//! - Binding the Axum HTTP server and serving the dashboard routes
//!
//! Ctrl-C stops the HTTP server and cancels the poll loop; no cycle runs
//! after that.
//!
//! # Environment Variables
//! - `HYDRO_API_URL` (**required**) – base URL of the readings API
//! - see [`hydro_dashboard::config`] for the optional ones
//! - `HYDRO_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `HYDRO_SPAN_EVENTS` (optional) – span event mode for tracing
use std::{env, sync::Arc};

use anyhow::{Context, Result};
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use hydro_dashboard::routes::{self, AppState};
use hydro_dashboard::{config, AlertTracker, ApiClient, Dashboard, DeviceControl, Poller, Shutdown};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    init_tracing();
    dotenv().ok();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let client = Arc::new(ApiClient::from_config(&cfg).context("Failed to build HTTP client")?);
    let dashboard = Dashboard::new(cfg.history_window)
        .with_out_of_water_below(cfg.thresholds.water.critical_below);
    let shutdown = Shutdown::new();

    let poll_handle = Poller::new(
        client.clone(),
        dashboard.clone(),
        AlertTracker::new(cfg.alert_policy),
        cfg.thresholds,
        cfg.poll_interval,
        shutdown.clone(),
    )
    .spawn();

    let control = DeviceControl::new(client, dashboard.clone(), cfg.notification_ttl);
    let app = routes::router(AppState { dashboard, control });

    tracing::info!("Listening on {}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(cfg.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", cfg.bind_addr))?;

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { shutdown.trigger_on(tokio::signal::ctrl_c()).await });
    }

    let graceful = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { graceful.wait().await })
        .await?;

    poll_handle.stop().await;
    tracing::info!("Dashboard stopped");
    Ok(())
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `HYDRO_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by the `HYDRO_LOG_LEVEL` env var
///
/// This should be called once at application startup before any logging
/// or tracing macros are invoked.
fn init_tracing() {
    // ---
    let span_events = match env::var("HYDRO_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    // Determine if we should use colors
    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to HYDRO_LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("HYDRO_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},hyper=info,hyper_util=info,reqwest=info"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
