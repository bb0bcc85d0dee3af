use std::collections::HashMap;

use base64::Engine;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Identifies exactly one audio segment of one call. Everything the pipeline
/// does for a delivery hangs off these three identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallAudioReadyEvent {
    pub call_id: String,
    pub partial_id: String,
    pub audio_partial_id: String,
}

/// Push-style delivery envelope: the call id travels as a message attribute,
/// the segment identifiers as a base64-encoded JSON body.
#[derive(Debug, Deserialize)]
struct PushEnvelope {
    message: PushMessage,
}

#[derive(Debug, Deserialize)]
struct PushMessage {
    #[serde(default)]
    data: String,
    #[serde(default)]
    attributes: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct AudioReadyBody {
    partial_id: String,
    audio_partial_id: String,
}

impl CallAudioReadyEvent {
    /// Validates and decodes one delivery.
    ///
    /// Touches neither network nor filesystem: a malformed envelope fails
    /// here, before any side effect, and the transport decides what to do
    /// with the redelivery.
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        let envelope: PushEnvelope =
            serde_json::from_slice(payload).map_err(|e| Error::BadEvent {
                reason: format!("envelope is not valid json: {e}"),
            })?;

        let call_id = envelope
            .message
            .attributes
            .get("call_id")
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or_else(|| Error::BadEvent {
                reason: "missing call_id attribute".to_string(),
            })?;

        let raw = base64::engine::general_purpose::STANDARD
            .decode(&envelope.message.data)
            .map_err(|e| Error::BadEvent {
                reason: format!("message data is not valid base64: {e}"),
            })?;

        let body: AudioReadyBody = serde_json::from_slice(&raw).map_err(|e| Error::BadEvent {
            reason: format!("message data is not a valid audio-ready body: {e}"),
        })?;

        if body.partial_id.is_empty() || body.audio_partial_id.is_empty() {
            return Err(Error::BadEvent {
                reason: "partial_id and audio_partial_id must be non-empty".to_string(),
            });
        }

        Ok(Self {
            call_id,
            partial_id: body.partial_id,
            audio_partial_id: body.audio_partial_id,
        })
    }
}
