//! HTTP client for the manufacturers/devices snapshot endpoint.

use crate::model::{Manufacturer, ManufacturersAndDevicesResponse};
use crate::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Endpoint serving the catalog snapshot.
pub const DEFAULT_API_URL: &str = "http://www.mocky.io/v2/570bbaf6110000b003d17e3a";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Source of complete catalog snapshots.
///
/// Network and deserialization failures surface as one error kind
/// ([`Error::RemoteFetch`]); callers cannot usefully tell them apart.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_manufacturers_and_devices(&self) -> Result<Vec<Manufacturer>>;
}

/// The web API client.
///
/// Construct once per process and share; the underlying connection pool is
/// reused across fetches.
pub struct WebClient {
    http: reqwest::Client,
    endpoint: String,
}

impl WebClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(Error::RemoteFetch)?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SnapshotSource for WebClient {
    async fn fetch_manufacturers_and_devices(&self) -> Result<Vec<Manufacturer>> {
        tracing::debug!(endpoint = %self.endpoint, "fetching catalog snapshot");

        let response = self
            .http
            .get(&self.endpoint)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(Error::RemoteFetch)?;

        let body: ManufacturersAndDevicesResponse =
            response.json().await.map_err(Error::RemoteFetch)?;

        tracing::debug!(
            manufacturers = body.manufacturers.len(),
            "snapshot fetched"
        );
        Ok(body.manufacturers)
    }
}
