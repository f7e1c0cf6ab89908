// Device HTTP client
//
// Performs exactly one request/response exchange per call against the
// gateway's quick-command endpoint. No retries: the caller owns retry and
// scheduling policy.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, trace};
use url::Url;

use crate::codec::{self, CommandName, Params, Reply};
use crate::error::Error;
use crate::model::DeviceDescriptor;
use crate::transport::TransportConfig;

/// Path of the quick-command endpoint on the gateway.
pub const ENDPOINT_PATH: &str = "parse_quick_cmd_iot";

/// One request/response exchange with a device.
///
/// Implemented by [`DeviceClient`] for real hardware; the core depends only
/// on this trait so it can be driven by in-memory fakes.
#[async_trait]
pub trait DeviceApi: Send + Sync {
    /// Send `command` to `device` and wait at most `timeout` for the reply.
    async fn request(
        &self,
        device: &DeviceDescriptor,
        command: CommandName,
        params: &Params,
        timeout: Duration,
    ) -> Result<Reply, Error>;
}

/// Raw HTTP client for the quick-command protocol.
///
/// Cheap to share behind an `Arc`: the inner `reqwest::Client` pools
/// connections and is safe for concurrent use.
#[derive(Debug, Clone)]
pub struct DeviceClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl DeviceClient {
    /// Create a client for the gateway at `host` (`addr` or `addr:port`).
    pub fn new(host: &str, transport: &TransportConfig) -> Result<Self, Error> {
        let base_url = base_url_for_host(host)?;
        let http = transport.build_client()?;
        Self::with_client(http, &base_url)
    }

    /// Create a client with a pre-built `reqwest::Client` and base URL.
    pub fn with_client(http: reqwest::Client, base_url: &Url) -> Result<Self, Error> {
        let base = base_url.as_str().trim_end_matches('/');
        let endpoint = Url::parse(&format!("{base}/{ENDPOINT_PATH}"))?;
        Ok(Self { http, endpoint })
    }

    /// The full endpoint URL requests are posted to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn exchange(&self, body: String) -> Result<String, Error> {
        let resp = self
            .http
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        let text = resp.text().await.map_err(Error::Transport)?;

        if !status.is_success() {
            return Err(Error::Protocol {
                message: format!("HTTP {status}"),
                body: text,
            });
        }

        Ok(text)
    }
}

#[async_trait]
impl DeviceApi for DeviceClient {
    async fn request(
        &self,
        device: &DeviceDescriptor,
        command: CommandName,
        params: &Params,
        timeout: Duration,
    ) -> Result<Reply, Error> {
        let body = codec::encode(command, device, params)?;
        debug!(device_id = %device.id, %command, "POST {}", self.endpoint);
        trace!(body = %body, "request body");

        let text = tokio::time::timeout(timeout, self.exchange(body))
            .await
            .map_err(|_| Error::Timeout {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            })??;

        codec::decode(&text)
    }
}

/// Turn a configured host into the gateway base URL.
///
/// Accepts a bare host (`192.168.1.50`, `gw.local:8080`) or a full
/// `http://` URL.
pub fn base_url_for_host(host: &str) -> Result<Url, Error> {
    let host = host.trim().trim_end_matches('/');
    if host.contains("://") {
        Ok(Url::parse(host)?)
    } else {
        Ok(Url::parse(&format!("http://{host}/"))?)
    }
}
