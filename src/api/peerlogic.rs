use serde::Deserialize;
use tracing::info;

use super::auth::{LoginProvider, SessionManager};
use super::normalize_base_url;
use crate::error::{Error, Result};

/// Client for the internal call-platform API.
///
/// Holds the long-lived session cache for this identity; construct it once
/// and share it across events.
pub struct PeerlogicClient {
    base_url: String,
    username: String,
    password: String,
    sessions: SessionManager,
    /// Bare client for pre-signed URLs, which must be fetched without the
    /// Authorization header.
    http: reqwest::Client,
}

/// JSON descriptor for one audio segment, served by the detail resource.
#[derive(Debug, Clone, Deserialize)]
pub struct AudioPartialDescriptor {
    pub id: Option<String>,
    /// Time-limited, pre-authorized download link for the raw audio.
    pub signed_url: String,
}

/// Active API credentials for a telephony provider, as returned by the
/// credentials lookup resource.
#[derive(Debug, Clone, Deserialize)]
pub struct VoipApiCredentials {
    pub id: String,
    pub voip_provider: String,
    pub api_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub active: bool,
}

#[derive(Debug, Deserialize)]
struct CredentialsPage {
    count: u64,
    #[serde(default)]
    results: Vec<VoipApiCredentials>,
}

/// A transcript slot on a call partial, created empty and patched with
/// content once reconstruction has run.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptPartial {
    pub id: String,
}

impl LoginProvider for PeerlogicClient {
    fn name(&self) -> &'static str {
        "peerlogic"
    }

    fn login_url(&self) -> String {
        format!("{}login", self.base_url)
    }

    fn login_form(&self) -> Vec<(&'static str, String)> {
        vec![
            ("username", self.username.clone()),
            ("password", self.password.clone()),
        ]
    }

    fn fingerprint(&self) -> String {
        format!("{}|{}", self.login_url(), self.username)
    }
}

impl PeerlogicClient {
    pub fn new(base_url: &str, username: &str, password: &str) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            username: username.to_string(),
            password: password.to_string(),
            sessions: SessionManager::new(),
            http: reqwest::Client::new(),
        }
    }

    /// Logs in if no live session is cached. Cheap to call per event.
    pub async fn ensure_session(&self) -> Result<()> {
        self.sessions.ensure_session(self).await?;
        Ok(())
    }

    pub async fn invalidate_session(&self) {
        self.sessions.invalidate().await;
    }

    fn call_audio_partial_url(&self, call_id: &str, partial_id: &str, audio_partial_id: &str) -> String {
        format!(
            "{}api/calls/{}/partials/{}/audio/{}/",
            self.base_url, call_id, partial_id, audio_partial_id
        )
    }

    fn call_transcript_partial_url(&self, call_id: &str, partial_id: &str, transcript_partial_id: Option<&str>) -> String {
        match transcript_partial_id {
            Some(id) => format!(
                "{}api/calls/{}/partials/{}/transcripts/{}/",
                self.base_url, call_id, partial_id, id
            ),
            None => format!(
                "{}api/calls/{}/partials/{}/transcripts/",
                self.base_url, call_id, partial_id
            ),
        }
    }

    fn api_credentials_url(&self) -> String {
        format!("{}integrations/netsapiens/admin/api-credentials", self.base_url)
    }

    /// Resolves the audio segment descriptor, which carries the signed
    /// download URL.
    pub async fn get_call_audio_partial(
        &self,
        call_id: &str,
        partial_id: &str,
        audio_partial_id: &str,
    ) -> Result<AudioPartialDescriptor> {
        let session = self.sessions.ensure_session(self).await?;
        let url = self.call_audio_partial_url(call_id, partial_id, audio_partial_id);

        let response = session
            .http()
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::Retrieval {
                url: url.clone(),
                detail: e.to_string(),
            })?;

        response.json().await.map_err(|e| Error::Retrieval {
            url,
            detail: format!("descriptor was not valid json: {e}"),
        })
    }

    /// Downloads the raw audio bytes for one segment: descriptor first, then
    /// the signed URL it names, unauthenticated because the link is
    /// pre-signed.
    pub async fn get_call_audio_partial_wavfile(
        &self,
        call_id: &str,
        partial_id: &str,
        audio_partial_id: &str,
    ) -> Result<Vec<u8>> {
        let descriptor = self
            .get_call_audio_partial(call_id, partial_id, audio_partial_id)
            .await?;
        let url = descriptor.signed_url;

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::Retrieval {
                url: url.clone(),
                detail: e.to_string(),
            })?;

        let bytes = response.bytes().await.map_err(|e| Error::Retrieval {
            url: url.clone(),
            detail: e.to_string(),
        })?;

        info!(call_id, partial_id, audio_partial_id, len = bytes.len(), "downloaded audio segment");
        Ok(bytes.to_vec())
    }

    /// Looks up the active API credentials for a telephony provider. Zero
    /// rows is a hard failure; nothing downstream can proceed without them.
    pub async fn get_api_credentials(&self, voip_provider_id: &str) -> Result<VoipApiCredentials> {
        let session = self.sessions.ensure_session(self).await?;
        let url = self.api_credentials_url();
        info!(voip_provider_id, url = %url, "looking up provider api credentials");

        let response = session
            .http()
            .get(&url)
            .query(&[("voip_provider_id", voip_provider_id), ("active", "true")])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::Retrieval {
                url: url.clone(),
                detail: e.to_string(),
            })?;

        let page: CredentialsPage = response.json().await.map_err(|e| Error::Retrieval {
            url: url.clone(),
            detail: format!("credentials page was not valid json: {e}"),
        })?;

        if page.count == 0 {
            return Err(Error::NotFound {
                resource: format!("api-credentials for voip_provider_id='{voip_provider_id}' at '{url}'"),
            });
        }

        page.results.into_iter().next().ok_or_else(|| Error::NotFound {
            resource: format!("api-credentials for voip_provider_id='{voip_provider_id}' at '{url}'"),
        })
    }

    /// Creates an empty transcript slot on a call partial.
    pub async fn initialize_transcript_partial(
        &self,
        call_id: &str,
        partial_id: &str,
        transcript_type: &str,
        mime_type: &str,
    ) -> Result<TranscriptPartial> {
        let session = self.sessions.ensure_session(self).await?;
        let url = self.call_transcript_partial_url(call_id, partial_id, None);

        let response = session
            .http()
            .post(&url)
            .form(&[
                ("mime_type", mime_type),
                ("call_partial", partial_id),
                ("transcript_type", transcript_type),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::Submission {
                uri: url.clone(),
                detail: e.to_string(),
            })?;

        response.json().await.map_err(|e| Error::Submission {
            uri: url,
            detail: format!("transcript partial response was not valid json: {e}"),
        })
    }

    /// Finalizes a transcript slot by patching the reconstructed text in as
    /// multipart file content.
    pub async fn finalize_transcript_partial(
        &self,
        transcript_partial_id: &str,
        call_id: &str,
        partial_id: &str,
        transcript: &str,
        mime_type: &str,
    ) -> Result<()> {
        let session = self.sessions.ensure_session(self).await?;
        let url = self.call_transcript_partial_url(call_id, partial_id, Some(transcript_partial_id));

        let part = reqwest::multipart::Part::text(transcript.to_string())
            .file_name("transcript.txt")
            .mime_str(mime_type)
            .map_err(|e| Error::Submission {
                uri: url.clone(),
                detail: format!("invalid transcript mime type '{mime_type}': {e}"),
            })?;
        let form = reqwest::multipart::Form::new().part(mime_type.to_string(), part);

        session
            .http()
            .patch(&url)
            .multipart(form)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::Submission {
                uri: url.clone(),
                detail: e.to_string(),
            })?;

        info!(call_id, partial_id, transcript_partial_id, "finalized transcript partial");
        Ok(())
    }
}
