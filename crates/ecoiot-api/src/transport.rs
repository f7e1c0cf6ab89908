// Shared transport configuration for building the reqwest::Client.
//
// One client (one connection pool) is shared by every request to the
// gateway, polls and commands alike.

use std::time::Duration;

use crate::error::Error;

/// Transport settings for the HTTP session.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Connection establishment bound. Per-request deadlines are passed by
    /// callers on each exchange.
    pub connect_timeout: Duration,
    /// Upper bound on idle pooled connections kept per host.
    pub pool_max_idle_per_host: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            pool_max_idle_per_host: 4,
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .user_agent(concat!("ecoiot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Http {
                message: format!("failed to build HTTP client: {e}"),
            })
    }
}
