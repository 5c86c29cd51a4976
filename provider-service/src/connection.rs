//! InfluxDB 连接配置
//!
//! Validates the connection settings, builds the one HTTP client shared by
//! every reconciler and proves the endpoint is alive before any statement runs.

use std::time::Duration;

use common::config::InfluxConfig;
use common::errors::{AppError, AppResult};
use reqwest::{Client, StatusCode, Url};
use tracing::{debug, info, warn};

use crate::executor::QueryResponse;

/// Header InfluxDB uses to report its version on `/ping`.
const VERSION_HEADER: &str = "x-influxdb-version";

/// Connection handle to the InfluxDB HTTP API.
///
/// Immutable after [`InfluxConnection::configure`]; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct InfluxConnection {
    client: Client,
    base_url: Url,
    credentials: InfluxConfig,
}

impl InfluxConnection {
    /// Parses the settings, builds the client and pings the server once.
    ///
    /// # Errors
    /// `AppError::InvalidUrl` for a malformed endpoint, `AppError::Unreachable`
    /// when the liveness probe fails. No retries.
    pub async fn configure(config: &InfluxConfig, timeout: Duration) -> AppResult<Self> {
        let conn = Self::build(config, timeout)?;
        let version = conn
            .ping()
            .await
            .map_err(|e| AppError::Unreachable(e.to_string()))?;
        info!(url = %conn.base_url, version = %version, "InfluxDB 连接已就绪");
        Ok(conn)
    }

    /// Builds the handle without probing the server.
    pub fn build(config: &InfluxConfig, timeout: Duration) -> AppResult<Self> {
        let base_url = parse_base_url(&config.url)?;

        let mut builder = Client::builder().timeout(timeout);
        if config.skip_ssl_verify {
            warn!("TLS certificate validation disabled for InfluxDB connection");
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder
            .build()
            .map_err(|e| AppError::InvalidSetting {
                name: "skip_ssl_verify".to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url,
            credentials: config.clone(),
        })
    }

    /// Endpoint this handle talks to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Liveness probe. Returns the server version reported in the response headers.
    pub async fn ping(&self) -> AppResult<String> {
        let url = self.endpoint("ping")?;
        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(|e| AppError::Transport(e.to_string()))?;

        let status = response.status();
        if !(status.is_success() || status == StatusCode::NO_CONTENT) {
            return Err(AppError::Transport(format!("ping returned HTTP {}", status)));
        }

        Ok(response
            .headers()
            .get(VERSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string())
    }

    /// Sends one command to `/query` and decodes the result envelope.
    ///
    /// Only transport-level problems are errors here; statement errors stay
    /// inside the returned envelope.
    pub async fn send_query(&self, command: &str) -> AppResult<QueryResponse> {
        let url = self.endpoint("query")?;
        let response = self
            .authorize(self.client.post(url))
            .query(&[("q", command)])
            .send()
            .await
            .map_err(|e| AppError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Transport(e.to_string()))?;
        debug!(status = %status, bytes = body.len(), "InfluxDB 响应");

        match serde_json::from_str::<QueryResponse>(&body) {
            Ok(envelope) => Ok(envelope),
            Err(_) if !status.is_success() => Err(AppError::Transport(format!(
                "HTTP {}: {}",
                status,
                body.trim()
            ))),
            Err(e) => Err(AppError::Transport(format!("malformed response: {}", e))),
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.credentials.has_credentials() {
            request.basic_auth(&self.credentials.username, Some(&self.credentials.password))
        } else {
            request
        }
    }

    fn endpoint(&self, path: &str) -> AppResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| AppError::InvalidUrl(e.to_string()))
    }
}

/// Parses the endpoint and normalizes it to end with `/` so that relative
/// joins keep any path prefix.
fn parse_base_url(raw: &str) -> AppResult<Url> {
    let mut url = Url::parse(raw).map_err(|e| AppError::InvalidUrl(format!("{}: {}", raw, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::InvalidUrl(format!(
            "{}: unsupported scheme {:?}",
            raw,
            url.scheme()
        )));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
