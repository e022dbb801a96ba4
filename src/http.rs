//! HTTP feature source with retry.
//!
//! Used for the live feeds: AirNow forecast polygons and the NWS active
//! alert API. The NWS API rejects requests without a `User-Agent`, so every
//! source sends one. Throttling (429) and server errors (5xx) are retried
//! with exponential backoff; other statuses fail immediately.

use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt};
use log::{debug, info, warn};
use reqwest::{Client, StatusCode};

use crate::error::{AtlasError, Result};
use crate::sources::FeatureSource;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 500;
const MAX_BACKOFF_MS: u64 = 8_000;

/// Default `User-Agent` sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("outdoor-atlas/", env!("CARGO_PKG_VERSION"));

/// Backoff before retry number `attempt` (1-based): 1s, 2s, 4s, 8s, capped.
fn backoff_for(attempt: u32) -> Duration {
    let ms = BASE_BACKOFF_MS.saturating_mul(1 << attempt.min(6));
    Duration::from_millis(ms.min(MAX_BACKOFF_MS))
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// A dataset served over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSource {
    name: String,
    url: String,
    client: Client,
    max_retries: u32,
}

impl HttpSource {
    /// Source with the default timeout and `User-Agent`.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Result<Self> {
        Self::with_user_agent(name, url, DEFAULT_USER_AGENT)
    }

    /// Source with a custom `User-Agent` (NWS asks for contact details in it).
    pub fn with_user_agent(
        name: impl Into<String>,
        url: impl Into<String>,
        user_agent: &str,
    ) -> Result<Self> {
        let name = name.into();
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .user_agent(user_agent)
            .build()
            .map_err(|e| AtlasError::Source {
                source_name: name.clone(),
                message: format!("Failed to create HTTP client: {}", e),
                status_code: None,
            })?;

        Ok(Self {
            name,
            url: url.into(),
            client,
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    /// Share a client (connection pool) between sources.
    pub fn with_client(name: impl Into<String>, url: impl Into<String>, client: Client) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            client,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn error(&self, message: String, status_code: Option<u16>) -> AtlasError {
        AtlasError::Source {
            source_name: self.name.clone(),
            message,
            status_code,
        }
    }

    async fn fetch_with_retry(&self) -> Result<String> {
        let start = Instant::now();
        let mut retries = 0;

        loop {
            match self.client.get(&self.url).send().await {
                Ok(resp) => {
                    let status = resp.status();

                    if is_retryable(status) && retries < self.max_retries {
                        retries += 1;
                        let backoff = backoff_for(retries);
                        warn!(
                            "[HttpSource] {} for '{}', retry {} after {:?}",
                            status, self.name, retries, backoff
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }

                    if !status.is_success() {
                        return Err(self.error(format!("HTTP {}", status), Some(status.as_u16())));
                    }

                    let body = resp
                        .text()
                        .await
                        .map_err(|e| self.error(format!("Failed to read body: {}", e), None))?;

                    info!(
                        "[HttpSource] '{}' fetched {} bytes in {:.2}s",
                        self.name,
                        body.len(),
                        start.elapsed().as_secs_f64()
                    );
                    return Ok(body);
                }
                Err(e) => {
                    if retries >= self.max_retries {
                        return Err(self.error(format!("Request error: {}", e), None));
                    }
                    retries += 1;
                    let backoff = backoff_for(retries);
                    warn!(
                        "[HttpSource] Error for '{}': {}, retry {} after {:?}",
                        self.name, e, retries, backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

impl FeatureSource for HttpSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self) -> BoxFuture<'_, Result<String>> {
        debug!("[HttpSource] GET {}", self.url);
        self.fetch_with_retry().boxed()
    }
}
