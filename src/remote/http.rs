//! HTTP client for the Staybook document store server.
//!
//! `GET` and `PUT` on `/v1/tenants/{tenant}/collections/{name}` with a bearer
//! API key. Both directions carry `{ "items": [...] }`.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::{RemoteConfig, RemoteConnector, RemoteStore};
use crate::error::RemoteError;
use crate::models::Collection;

/// Request timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Serialize)]
struct WriteBody<'a> {
    items: &'a [Value],
}

#[derive(Deserialize)]
struct ReadBody {
    items: Vec<Value>,
}

/// Remote store reached over HTTP.
pub struct HttpRemoteStore {
    client: reqwest::Client,
    base_url: String,
    tenant_id: String,
    api_key: String,
}

impl HttpRemoteStore {
    pub fn new(config: &RemoteConfig, timeout: Duration) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: normalize_base_url(&config.server_url),
            tenant_id: config.tenant_id.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn collection_url(&self, collection: Collection) -> String {
        format!(
            "{}/v1/tenants/{}/collections/{}",
            self.base_url,
            urlencoding::encode(&self.tenant_id),
            collection.key()
        )
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn fetch_collection(&self, collection: Collection) -> Result<Vec<Value>, RemoteError> {
        let response = self
            .client
            .get(self.collection_url(collection))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(transport_error)?;

        let response = check_status(response, collection).await?;
        let body: ReadBody = response.json().await.map_err(|e| {
            RemoteError::ConnectionError(format!("invalid response for {}: {}", collection, e))
        })?;

        Ok(body.items)
    }

    async fn bulk_write(&self, collection: Collection, items: &[Value]) -> Result<(), RemoteError> {
        let response = self
            .client
            .put(self.collection_url(collection))
            .bearer_auth(&self.api_key)
            .json(&WriteBody { items })
            .send()
            .await
            .map_err(transport_error)?;

        check_status(response, collection).await?;
        Ok(())
    }
}

/// Builds [`HttpRemoteStore`] clients with a fixed request timeout.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    timeout: Duration,
}

impl HttpConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HttpConnector {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl RemoteConnector for HttpConnector {
    fn connect(&self, config: &RemoteConfig) -> Result<Arc<dyn RemoteStore>, RemoteError> {
        if !config.is_valid() {
            return Err(RemoteError::NotConnected);
        }
        Ok(Arc::new(HttpRemoteStore::new(config, self.timeout)?))
    }
}

fn transport_error(e: reqwest::Error) -> RemoteError {
    if e.is_timeout() {
        RemoteError::ConnectionError(format!("request timed out: {}", e))
    } else {
        RemoteError::ConnectionError(e.to_string())
    }
}

async fn check_status(
    response: reqwest::Response,
    collection: Collection,
) -> Result<reqwest::Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(RemoteError::PermissionDenied(
            format!("{} ({}): {}", collection, status.as_u16(), body),
        )),
        _ => Err(RemoteError::ConnectionError(format!(
            "{} returned {}: {}",
            collection,
            status.as_u16(),
            body
        ))),
    }
}

/// Adds a scheme to bare hosts and strips trailing slashes.
fn normalize_base_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("http://{}", url)
    }
}
