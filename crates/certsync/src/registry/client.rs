//! HTTP client for the registry admin API

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, info, warn};

use certsync_common::SslId;
use certsync_config::RegistrySettings;

use super::{Registry, RegistryError, RegistrySnapshot, SslList, SslPayload};

/// Header carrying the admin API key
const API_KEY_HEADER: &str = "X-API-KEY";

/// Authenticated client for `<host><api_prefix>/ssls`
///
/// Every call is exactly one request; retries are left to the caller.
pub struct RegistryClient {
    client: Client,
    ssls_url: String,
    token: String,
    timeout: Duration,
}

impl RegistryClient {
    /// Create a client from registry settings
    pub fn new(settings: &RegistrySettings) -> Result<Self, RegistryError> {
        let timeout = Duration::from_secs(settings.timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RegistryError::Client(e.to_string()))?;

        let ssls_url = format!(
            "{}/{}/ssls",
            settings.host.trim_end_matches('/'),
            settings.api_prefix.trim_matches('/')
        );

        debug!(url = %ssls_url, timeout_secs = settings.timeout_secs, "Created registry client");

        Ok(Self {
            client,
            ssls_url,
            token: settings.token.clone(),
            timeout,
        })
    }

    /// URL of the SSL collection
    pub fn ssls_url(&self) -> &str {
        &self.ssls_url
    }

    fn unreachable(&self, url: &str, e: reqwest::Error) -> RegistryError {
        let message = if e.is_timeout() {
            format!("request timed out after {:?}", self.timeout)
        } else {
            e.to_string()
        };
        RegistryError::Unreachable {
            url: url.to_string(),
            message,
        }
    }

    /// Map authorization failures and other non-success statuses
    async fn check_status(response: Response) -> Result<Response, RegistryError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(RegistryError::AuthFailed {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.unwrap_or_default();
        Err(RegistryError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl Registry for RegistryClient {
    async fn list_records(&self) -> Result<RegistrySnapshot, RegistryError> {
        debug!(url = %self.ssls_url, "Listing registry entries");

        let response = self
            .client
            .get(&self.ssls_url)
            .header(API_KEY_HEADER, &self.token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| self.unreachable(&self.ssls_url, e))?;

        let response = Self::check_status(response).await?;

        let body = response
            .bytes()
            .await
            .map_err(|e| self.unreachable(&self.ssls_url, e))?;

        let list: SslList = serde_json::from_slice(&body)
            .map_err(|e| RegistryError::MalformedResponse(e.to_string()))?;

        if let Some(total) = list.total {
            if total as usize != list.list.len() {
                warn!(
                    total,
                    returned = list.list.len(),
                    "Registry listing appears to be paginated or truncated"
                );
            }
        }

        let snapshot = list.into_snapshot();
        debug!(entries = snapshot.len(), "Fetched registry snapshot");
        Ok(snapshot)
    }

    async fn upsert_record(&self, id: &SslId, payload: &SslPayload) -> Result<(), RegistryError> {
        if id.is_empty() {
            return Err(RegistryError::InvalidArgument(
                "registry entry id cannot be empty".to_string(),
            ));
        }

        let url = format!("{}/{}", self.ssls_url, id);
        debug!(url = %url, snis = ?payload.snis, "Writing registry entry");

        let response = self
            .client
            .put(&url)
            .header(API_KEY_HEADER, &self.token)
            .json(payload)
            .send()
            .await
            .map_err(|e| self.unreachable(&url, e))?;

        if response.status() == StatusCode::CONFLICT {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistryError::Conflict {
                id: id.clone(),
                body,
            });
        }

        let response = Self::check_status(response).await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        info!(id = %id, status = status.as_u16(), "Registry entry written");
        debug!(body = %body, "Registry write response");
        Ok(())
    }
}

impl std::fmt::Debug for RegistryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryClient")
            .field("ssls_url", &self.ssls_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}
