//! HTTP client for the weft registry.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use weft_core::identity::PackageIdentity;
use weft_util::errors::{WeftError, WeftResult};

use crate::traits::{RegistryClient, ResolvedRelease, VersionInfo};

const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Registry reached over HTTP(S), JSON responses.
///
/// - `GET {base}/project/resolve/{target}/{org}/{name}/{specifier}`
/// - `GET {base}/project/versions/{target}/{org}/{name}`
#[derive(Debug, Clone)]
pub struct HttpRegistry {
    base_url: String,
    client: Client,
    attempts: u32,
    retry_delay: Duration,
}

impl HttpRegistry {
    /// Build a client with a per-request `timeout` and up to `attempts` tries
    /// for transient failures.
    pub fn new(base_url: &str, timeout: Duration, attempts: u32) -> WeftResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("weft/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| WeftError::Registry {
                message: format!("Failed to create HTTP client: {e}"),
            })?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            attempts: attempts.max(1),
            retry_delay: RETRY_DELAY,
        })
    }

    /// Change the base backoff between attempts.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn resolve_url(&self, identity: &PackageIdentity, specifier: &str) -> String {
        format!(
            "{}/project/resolve/{}/{}/{}/{}",
            self.base_url, identity.target, identity.organization, identity.name, specifier
        )
    }

    pub fn versions_url(&self, identity: &PackageIdentity) -> String {
        format!(
            "{}/project/versions/{}/{}/{}",
            self.base_url, identity.target, identity.organization, identity.name
        )
    }

    /// GET `url` and decode JSON. `Ok(None)` means 404.
    ///
    /// 5xx responses, timeouts and connection errors are retried with a
    /// linearly growing delay; anything else fails immediately.
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> WeftResult<Option<T>> {
        let mut last_err = String::new();

        for attempt in 0..self.attempts {
            if attempt > 0 {
                tracing::debug!("retrying {url} (attempt {})", attempt + 1);
                tokio::time::sleep(self.retry_delay * attempt).await;
            }

            match self.client.get(url).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Ok(None);
                    }
                    if status.is_server_error() {
                        last_err = format!("HTTP {status}");
                        continue;
                    }
                    if !status.is_success() {
                        return Err(WeftError::Registry {
                            message: format!("HTTP {status} fetching {url}"),
                        });
                    }
                    let body = resp.json::<T>().await.map_err(|e| WeftError::Registry {
                        message: format!("Invalid response from {url}: {e}"),
                    })?;
                    return Ok(Some(body));
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    last_err = format!("{e}");
                    continue;
                }
                Err(e) => {
                    return Err(WeftError::Registry {
                        message: format!("Request to {url} failed: {e}"),
                    });
                }
            }
        }

        Err(WeftError::FetchFailure {
            resource: url.to_string(),
            message: format!("giving up after {} attempts: {last_err}", self.attempts),
        })
    }
}

#[async_trait]
impl RegistryClient for HttpRegistry {
    async fn resolve(
        &self,
        identity: &PackageIdentity,
        specifier: &str,
    ) -> WeftResult<ResolvedRelease> {
        let url = self.resolve_url(identity, specifier);
        self.get_json(&url)
            .await?
            .ok_or_else(|| WeftError::NotFound {
                identity: identity.to_string(),
                specifier: specifier.to_string(),
            })
    }

    async fn list_versions(&self, identity: &PackageIdentity) -> WeftResult<Vec<VersionInfo>> {
        let url = self.versions_url(identity);
        self.get_json(&url)
            .await?
            .ok_or_else(|| WeftError::NotFound {
                identity: identity.to_string(),
                specifier: "*".to_string(),
            })
    }
}
