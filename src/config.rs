//! Configuration loader for the `hydro-dashboard` service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). Parsing goes through a lookup function so the
//! same code can be exercised in tests without touching the process
//! environment.
use std::{env, net::SocketAddr, time::Duration};

use anyhow::{anyhow, Result};

use crate::alerts::{AlertPolicy, Thresholds};

/// Parse an optional environment variable with `FromStr`, falling back to a default.
macro_rules! parse_env {
    ($lookup:expr, $var_name:expr, $ty:ty, $default:expr) => {
        $lookup($var_name)
            .map(|v| v.trim().parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($lookup:expr, $var_name:expr) => {
        $lookup($var_name)
            .filter(|v: &String| !v.trim().is_empty())
            .ok_or_else(|| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Shortest and longest chart window the dashboard supports.
pub const HISTORY_WINDOW_RANGE: std::ops::RangeInclusive<usize> = 24..=100;

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// Base URL of the readings/pump API, without a trailing slash.
    pub api_url: String,

    /// Optional bearer token sent with every API request.
    pub api_token: Option<String>,

    /// Delay between the end of one poll cycle and the start of the next.
    pub poll_interval: Duration,

    /// Number of history readings kept for the chart.
    pub history_window: usize,

    /// Per-request timeout for the API client.
    pub request_timeout: Duration,

    /// Address the dashboard HTTP server binds to.
    pub bind_addr: SocketAddr,

    /// How the active alert set evolves between cycles.
    pub alert_policy: AlertPolicy,

    /// Lifetime of device command notifications.
    pub notification_ttl: Duration,

    /// Alert bands.
    pub thresholds: Thresholds,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `HYDRO_API_URL` – base URL of the readings API
///
/// Optional:
/// - `HYDRO_API_TOKEN` – bearer token (default: none)
/// - `HYDRO_POLL_INTERVAL_SECS` – poll delay (default: 30)
/// - `HYDRO_HISTORY_WINDOW` – chart readings, 24..=100 (default: 24)
/// - `HYDRO_REQUEST_TIMEOUT_SECS` – per-request timeout (default: 10)
/// - `HYDRO_BIND_ADDR` – listen address (default: 0.0.0.0:8080)
/// - `HYDRO_ALERT_POLICY` – `resolving` or `accumulate` (default: resolving)
/// - `HYDRO_NOTIFICATION_TTL_SECS` – command notification lifetime (default: 3)
/// - `HYDRO_WATER_*`, `HYDRO_PPM_*`, `HYDRO_PH_*` – threshold overrides
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    load_from(|key| env::var(key).ok())
}

/// Build a [`Config`] from an arbitrary key lookup.
pub fn load_from<F>(lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    // ---
    let api_url: String = require_env!(lookup, "HYDRO_API_URL");
    let api_url = api_url.trim().trim_end_matches('/').to_string();
    if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
        return Err(anyhow!("Invalid HYDRO_API_URL: expected http(s) URL, got '{}'", api_url));
    }

    let api_token = lookup("HYDRO_API_TOKEN").filter(|t| !t.trim().is_empty());

    let poll_secs: u64 = parse_env!(lookup, "HYDRO_POLL_INTERVAL_SECS", u64, 30);
    let timeout_secs: u64 = parse_env!(lookup, "HYDRO_REQUEST_TIMEOUT_SECS", u64, 10);
    let ttl_secs: u64 = parse_env!(lookup, "HYDRO_NOTIFICATION_TTL_SECS", u64, 3);
    if poll_secs == 0 {
        return Err(anyhow!("Invalid HYDRO_POLL_INTERVAL_SECS: must be greater than 0"));
    }
    if timeout_secs == 0 {
        return Err(anyhow!("Invalid HYDRO_REQUEST_TIMEOUT_SECS: must be greater than 0"));
    }

    let history_window: usize = parse_env!(lookup, "HYDRO_HISTORY_WINDOW", usize, 24);
    if !HISTORY_WINDOW_RANGE.contains(&history_window) {
        return Err(anyhow!(
            "Invalid HYDRO_HISTORY_WINDOW: {} is outside {:?}",
            history_window,
            HISTORY_WINDOW_RANGE
        ));
    }

    let bind_addr: SocketAddr = parse_env!(
        lookup,
        "HYDRO_BIND_ADDR",
        SocketAddr,
        SocketAddr::from(([0, 0, 0, 0], 8080))
    );
    let alert_policy: AlertPolicy = parse_env!(
        lookup,
        "HYDRO_ALERT_POLICY",
        AlertPolicy,
        AlertPolicy::default()
    );

    let d = Thresholds::default();
    let mut thresholds = Thresholds::default();
    thresholds.water.critical_below =
        parse_env!(lookup, "HYDRO_WATER_CRITICAL_BELOW", f64, d.water.critical_below);
    thresholds.water.warning_below =
        parse_env!(lookup, "HYDRO_WATER_WARNING_BELOW", f64, d.water.warning_below);
    thresholds.nutrient.critical_low =
        parse_env!(lookup, "HYDRO_PPM_CRITICAL_LOW", f64, d.nutrient.critical_low);
    thresholds.nutrient.warning_low =
        parse_env!(lookup, "HYDRO_PPM_WARNING_LOW", f64, d.nutrient.warning_low);
    thresholds.nutrient.warning_high =
        parse_env!(lookup, "HYDRO_PPM_WARNING_HIGH", f64, d.nutrient.warning_high);
    thresholds.nutrient.critical_high =
        parse_env!(lookup, "HYDRO_PPM_CRITICAL_HIGH", f64, d.nutrient.critical_high);
    thresholds.ph.critical_low =
        parse_env!(lookup, "HYDRO_PH_CRITICAL_LOW", f64, d.ph.critical_low);
    thresholds.ph.warning_low = parse_env!(lookup, "HYDRO_PH_WARNING_LOW", f64, d.ph.warning_low);
    thresholds.ph.warning_high =
        parse_env!(lookup, "HYDRO_PH_WARNING_HIGH", f64, d.ph.warning_high);
    thresholds.ph.critical_high =
        parse_env!(lookup, "HYDRO_PH_CRITICAL_HIGH", f64, d.ph.critical_high);
    thresholds
        .validate()
        .map_err(|e| anyhow!("Invalid alert thresholds: {}", e))?;

    Ok(Config {
        api_url,
        api_token,
        poll_interval: Duration::from_secs(poll_secs),
        history_window,
        request_timeout: Duration::from_secs(timeout_secs),
        bind_addr,
        alert_policy,
        notification_ttl: Duration::from_secs(ttl_secs),
        thresholds,
    })
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    ///
    /// The API token is never printed, only whether one is configured.
    pub fn log_config(&self) {
        // ---
        let token = if self.api_token.is_some() { "****" } else { "<none>" };

        tracing::info!("Configuration loaded:");
        tracing::info!("  HYDRO_API_URL              : {}", self.api_url);
        tracing::info!("  HYDRO_API_TOKEN            : {}", token);
        tracing::info!("  HYDRO_POLL_INTERVAL_SECS   : {}", self.poll_interval.as_secs());
        tracing::info!("  HYDRO_HISTORY_WINDOW       : {}", self.history_window);
        tracing::info!("  HYDRO_REQUEST_TIMEOUT_SECS : {}", self.request_timeout.as_secs());
        tracing::info!("  HYDRO_BIND_ADDR            : {}", self.bind_addr);
        tracing::info!("  HYDRO_ALERT_POLICY         : {:?}", self.alert_policy);
        tracing::info!("  thresholds                 : {:?}", self.thresholds);
    }
}
