use std::path::Path;

use futures::StreamExt;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tracing::info;

use super::auth::{LoginProvider, SessionManager};
use super::normalize_base_url;
use super::peerlogic::VoipApiCredentials;
use crate::error::{Error, Result};

/// Client for the telephony provider's API.
///
/// Same session lifecycle as the internal API; the login variant is the
/// OAuth2 password grant with client credentials in the form body.
pub struct NetsapiensClient {
    base_url: String,
    credentials: VoipApiCredentials,
    sessions: SessionManager,
}

impl LoginProvider for NetsapiensClient {
    fn name(&self) -> &'static str {
        "netsapiens"
    }

    fn login_url(&self) -> String {
        format!("{}oauth2/token/", self.base_url)
    }

    fn login_form(&self) -> Vec<(&'static str, String)> {
        vec![
            ("username", self.credentials.username.clone()),
            ("password", self.credentials.password.clone()),
            ("client_id", self.credentials.client_id.clone()),
            ("client_secret", self.credentials.client_secret.clone()),
            ("grant_type", "password".to_string()),
            ("format", "json".to_string()),
        ]
    }

    fn fingerprint(&self) -> String {
        format!("{}|{}|{}", self.login_url(), self.credentials.client_id, self.credentials.username)
    }
}

impl NetsapiensClient {
    /// Builds a client from credentials obtained through the internal API's
    /// lookup resource.
    pub fn new(credentials: VoipApiCredentials) -> Self {
        Self {
            base_url: normalize_base_url(&credentials.api_url),
            credentials,
            sessions: SessionManager::new(),
        }
    }

    pub async fn ensure_session(&self) -> Result<()> {
        self.sessions.ensure_session(self).await?;
        Ok(())
    }

    pub async fn invalidate_session(&self) {
        self.sessions.invalidate().await;
    }

    /// Lists recording descriptors for one call leg pair.
    pub async fn get_recording_urls(&self, orig_callid: &str, term_callid: &str) -> Result<Value> {
        let session = self.sessions.ensure_session(self).await?;
        let url = self.base_url.clone();

        let response = session
            .http()
            .get(&url)
            .query(&[
                ("object", "recording"),
                ("action", "read"),
                ("format", "json"),
                ("limit", "20"),
                ("orig_callid", orig_callid),
                ("term_callid", term_callid),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::Retrieval {
                url: url.clone(),
                detail: e.to_string(),
            })?;

        response.json().await.map_err(|e| Error::Retrieval {
            url,
            detail: format!("recording list was not valid json: {e}"),
        })
    }

    /// Streams one recording to disk through the authenticated session.
    /// Recordings can run long, so the body is written chunk by chunk rather
    /// than buffered whole.
    pub async fn download_recording(&self, url: &str, dest: &Path) -> Result<u64> {
        let session = self.sessions.ensure_session(self).await?;

        let response = session
            .http()
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::Retrieval {
                url: url.to_string(),
                detail: e.to_string(),
            })?;

        let mut file = tokio::fs::File::create(dest).await.map_err(|e| Error::Retrieval {
            url: url.to_string(),
            detail: format!("could not create '{}': {e}", dest.display()),
        })?;

        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::Retrieval {
                url: url.to_string(),
                detail: e.to_string(),
            })?;
            file.write_all(&chunk).await.map_err(|e| Error::Retrieval {
                url: url.to_string(),
                detail: format!("could not write '{}': {e}", dest.display()),
            })?;
            written += chunk.len() as u64;
        }

        info!(url, dest = %dest.display(), written, "downloaded recording");
        Ok(written)
    }
}
