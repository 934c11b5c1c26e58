//! HTTP client for the readings/pump API.
//!
//! The traits are the seams the poll loop and device controls depend on;
//! [`ApiClient`] is the reqwest-backed implementation used in production.
//! Every call is a single request: no retries, non-2xx is a failure and is
//! never parsed as data.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::models::{Device, DeviceAction, PayloadError, PumpStatus, RawReading, SensorSnapshot};
use crate::Config;

// ---

/// Why a single API call produced no usable data.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Network unreachable, timeout, connection reset.
    #[error("request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{path} returned HTTP {status}")]
    Status { path: String, status: u16 },

    /// Body was not the JSON shape expected for the endpoint.
    #[error("{path} returned an unreadable body: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// Body parsed but the reading failed validation.
    #[error("{path} returned a malformed reading: {source}")]
    Payload {
        path: String,
        #[source]
        source: PayloadError,
    },
}

/// Read side of the API.
#[async_trait]
pub trait ReadingSource: Send + Sync {
    /// `GET /readings/latest`
    async fn fetch_latest(&self) -> Result<SensorSnapshot, FetchError>;

    /// `GET /readings/`, oldest first. Entries that fail validation are dropped.
    async fn fetch_history(&self) -> Result<Vec<SensorSnapshot>, FetchError>;

    /// `GET /pump/status`
    async fn fetch_pump_status(&self) -> Result<PumpStatus, FetchError>;
}

/// Actuation side of the API.
#[async_trait]
pub trait DeviceCommander: Send + Sync {
    /// `POST /{device}/{action}`. Returns the acknowledgement body as-is.
    async fn send(&self, device: Device, action: DeviceAction) -> Result<Value, FetchError>;
}

#[async_trait]
impl<T: ReadingSource + ?Sized> ReadingSource for std::sync::Arc<T> {
    async fn fetch_latest(&self) -> Result<SensorSnapshot, FetchError> {
        (**self).fetch_latest().await
    }

    async fn fetch_history(&self) -> Result<Vec<SensorSnapshot>, FetchError> {
        (**self).fetch_history().await
    }

    async fn fetch_pump_status(&self) -> Result<PumpStatus, FetchError> {
        (**self).fetch_pump_status().await
    }
}

#[async_trait]
impl<T: DeviceCommander + ?Sized> DeviceCommander for std::sync::Arc<T> {
    async fn send(&self, device: Device, action: DeviceAction) -> Result<Value, FetchError> {
        (**self).send(device, action).await
    }
}

// ---

const LATEST_PATH: &str = "/readings/latest";
const HISTORY_PATH: &str = "/readings/";
const PUMP_STATUS_PATH: &str = "/pump/status";

/// reqwest-backed client for the hydroponics API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    // ---
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        // ---
        let http = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    pub fn from_config(cfg: &Config) -> reqwest::Result<Self> {
        Self::new(cfg.api_url.clone(), cfg.api_token.clone(), cfg.request_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        // ---
        let url = format!("{}{}", self.base_url, path);
        let req = self.http.request(method, url);
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Send a request and return the body of a 2xx response.
    async fn execute(&self, req: RequestBuilder, path: &str) -> Result<Vec<u8>, FetchError> {
        // ---
        let transport = |source| FetchError::Transport {
            path: path.to_string(),
            source,
        };

        let response = req.send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            tracing::debug!(path, status = status.as_u16(), "Non-success response");
            return Err(FetchError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(transport)?;
        Ok(body.to_vec())
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        // ---
        tracing::debug!("GET {}{}", self.base_url, path);
        let body = self.execute(self.request(Method::GET, path), path).await?;
        serde_json::from_slice(&body).map_err(|source| FetchError::Decode {
            path: path.to_string(),
            source,
        })
    }
}

#[async_trait]
impl ReadingSource for ApiClient {
    async fn fetch_latest(&self) -> Result<SensorSnapshot, FetchError> {
        // ---
        let raw: RawReading = self.get_json(LATEST_PATH).await?;
        SensorSnapshot::try_from(raw).map_err(|source| FetchError::Payload {
            path: LATEST_PATH.to_string(),
            source,
        })
    }

    async fn fetch_history(&self) -> Result<Vec<SensorSnapshot>, FetchError> {
        // ---
        let items: Vec<Value> = self.get_json(HISTORY_PATH).await?;
        let total = items.len();

        let mut history = Vec::with_capacity(total);
        for (i, item) in items.into_iter().enumerate() {
            let parsed = serde_json::from_value::<RawReading>(item)
                .map_err(|e| e.to_string())
                .and_then(|raw| SensorSnapshot::try_from(raw).map_err(|e| e.to_string()));
            match parsed {
                Ok(snapshot) => history.push(snapshot),
                Err(e) => tracing::debug!("Skipping history item {}: {}", i, e),
            }
        }

        // Stable, so equal timestamps keep the order the API sent them in.
        history.sort_by_key(|s| s.timestamp);

        tracing::debug!(
            "Fetched {} history readings ({} skipped)",
            history.len(),
            total - history.len()
        );
        Ok(history)
    }

    async fn fetch_pump_status(&self) -> Result<PumpStatus, FetchError> {
        self.get_json(PUMP_STATUS_PATH).await
    }
}

#[async_trait]
impl DeviceCommander for ApiClient {
    async fn send(&self, device: Device, action: DeviceAction) -> Result<Value, FetchError> {
        // ---
        let path = format!("/{}/{}", device, action);
        tracing::debug!("POST {}{}", self.base_url, path);

        let req = self
            .request(Method::POST, &path)
            .header(header::CONTENT_TYPE, "application/json");
        let body = self.execute(req, &path).await?;

        // The acknowledgement format is up to the rig; keep whatever came back.
        if body.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned())))
    }
}
