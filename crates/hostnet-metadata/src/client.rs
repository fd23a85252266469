//! HTTP client for the metadata service.

use async_trait::async_trait;
use hostnet_common::{HostnetError, Result};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::types::{Container, Host, Network, Service};

/// Request timeout for individual metadata calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Delay between connection attempts while waiting for the service.
const WAIT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Consistent snapshot access to the authoritative metadata state.
///
/// Each getter returns an independent snapshot; snapshots from different
/// calls may be mutually stale by small windows. Any failure maps to
/// [`HostnetError::MetadataUnavailable`], which aborts the current
/// reconciliation pass; the next tick retries.
#[async_trait]
pub trait MetadataView: Send + Sync {
    async fn get_self_host(&self) -> Result<Host>;
    async fn get_networks(&self) -> Result<Vec<Network>>;
    async fn get_containers(&self) -> Result<Vec<Container>>;
    async fn get_services(&self) -> Result<Vec<Service>>;
}

/// HTTP implementation of [`MetadataView`].
///
/// The answer-version path segment is part of the configured base URL
/// (e.g. `http://metadata.internal/2016-07-29`).
#[derive(Debug, Clone)]
pub struct MetadataClient {
    http: reqwest::Client,
    base_url: String,
}

impl MetadataClient {
    /// Creates a client for the given base URL.
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| HostnetError::metadata_unavailable(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Creates a client and blocks until the service answers.
    ///
    /// Retries forever; startup ordering between this manager and the
    /// metadata service is not guaranteed, so "not up yet" is normal.
    pub async fn connect(base_url: &str) -> Result<Self> {
        let client = Self::new(base_url)?;
        info!(url = %client.base_url, "waiting for metadata");

        let mut attempts = 0u32;
        loop {
            match client.get_self_host().await {
                Ok(host) => {
                    info!(host = %host.uuid, "metadata is up");
                    return Ok(client);
                }
                Err(err) => {
                    attempts += 1;
                    if attempts % 15 == 0 {
                        warn!(error = %err, attempts, "metadata still unavailable");
                    } else {
                        debug!(error = %err, "metadata not ready yet");
                    }
                    tokio::time::sleep(WAIT_RETRY_DELAY).await;
                }
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}/{}", self.base_url, path);

        let response = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| HostnetError::metadata_unavailable(format!("GET {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HostnetError::metadata_unavailable(format!(
                "GET {}: status {}",
                url, status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| HostnetError::metadata_unavailable(format!("decoding {}: {}", url, e)))
    }
}

#[async_trait]
impl MetadataView for MetadataClient {
    async fn get_self_host(&self) -> Result<Host> {
        self.get_json("self/host").await
    }

    async fn get_networks(&self) -> Result<Vec<Network>> {
        self.get_json("networks").await
    }

    async fn get_containers(&self) -> Result<Vec<Container>> {
        self.get_json("containers").await
    }

    async fn get_services(&self) -> Result<Vec<Service>> {
        self.get_json("services").await
    }
}
