use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::{Error, Result};

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Source of bearer tokens for the platform APIs (storage and speech).
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// Fetches tokens for the host's ambient service account from the metadata
/// server, caching each one until shortly before its advertised expiry.
pub struct MetadataTokenSource {
    http: reqwest::Client,
    cached: Mutex<Option<(String, DateTime<Utc>)>>,
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: i64,
}

impl MetadataTokenSource {
    const EXPIRY_SKEW_SECS: i64 = 30;

    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            cached: Mutex::new(None),
        }
    }
}

impl Default for MetadataTokenSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenSource for MetadataTokenSource {
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some((token, expires_at)) = cached.as_ref() {
            if Utc::now() + Duration::seconds(Self::EXPIRY_SKEW_SECS) < *expires_at {
                return Ok(token.clone());
            }
        }

        let response = self
            .http
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::Authentication {
                endpoint: METADATA_TOKEN_URL.to_string(),
                status: e.status().map(|s| s.as_u16()),
                detail: e.to_string(),
            })?;

        let token: MetadataToken = response.json().await.map_err(|e| Error::Authentication {
            endpoint: METADATA_TOKEN_URL.to_string(),
            status: None,
            detail: format!("token response was not valid json: {e}"),
        })?;

        let expires_at = Utc::now() + Duration::seconds(token.expires_in);
        info!(expires_in = token.expires_in, "fetched platform access token");
        *cached = Some((token.access_token.clone(), expires_at));
        Ok(token.access_token)
    }
}

/// Fixed token supplied through configuration. Useful off-platform, where no
/// metadata server answers.
pub struct StaticTokenSource {
    token: String,
}

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn access_token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}
