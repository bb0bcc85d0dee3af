use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::auth::TokenSource;
use crate::error::{Error, Result};
use crate::pipeline::CallAudioReadyEvent;

const SPEECH_ENDPOINT: &str =
    "https://speech.googleapis.com/v1p1beta1/speech:longrunningrecognize";

/// Recognition parameters, serialized verbatim into the job request.
///
/// Defaults are tuned for two-party phone audio: stereo, one channel per
/// speaker, diarization across two speakers, the enhanced phone_call model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionConfig {
    pub encoding: String,
    pub sample_rate_hertz: u32,
    pub language_code: String,
    pub model: String,
    pub use_enhanced: bool,
    pub enable_automatic_punctuation: bool,
    pub audio_channel_count: u32,
    pub enable_speaker_diarization: bool,
    pub diarization_speaker_count: u32,
    pub enable_separate_recognition_per_channel: bool,
}

/// Everything that determines one recognition job: where the audio is, where
/// the output goes, and the recognition parameters. Constructed once per
/// segment and never mutated after submission.
#[derive(Debug, Clone)]
pub struct RecognitionJobSpec {
    pub source_uri: String,
    pub destination_uri: String,
    pub config: RecognitionConfig,
}

impl RecognitionJobSpec {
    pub fn new(
        source_uri: impl Into<String>,
        destination_uri: impl Into<String>,
        sample_rate_hertz: u32,
    ) -> Self {
        Self {
            source_uri: source_uri.into(),
            destination_uri: destination_uri.into(),
            config: RecognitionConfig {
                encoding: "LINEAR16".to_string(),
                sample_rate_hertz,
                language_code: "en-US".to_string(),
                model: "phone_call".to_string(),
                use_enhanced: true,
                enable_automatic_punctuation: true,
                audio_channel_count: 2,
                enable_speaker_diarization: true,
                diarization_speaker_count: 2,
                enable_separate_recognition_per_channel: true,
            },
        }
    }

    pub fn language_code(mut self, code: impl Into<String>) -> Self {
        self.config.language_code = code.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn channel_count(mut self, channels: u32) -> Self {
        self.config.audio_channel_count = channels;
        self
    }

    pub fn speaker_count(mut self, speakers: u32) -> Self {
        self.config.diarization_speaker_count = speakers;
        self
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LongRunningRecognizeRequest<'a> {
    config: &'a RecognitionConfig,
    audio: RecognitionAudio<'a>,
    output_config: TranscriptOutputConfig<'a>,
}

#[derive(Serialize)]
struct RecognitionAudio<'a> {
    uri: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TranscriptOutputConfig<'a> {
    gcs_uri: &'a str,
}

#[derive(Debug, Deserialize)]
struct Operation {
    name: String,
}

/// Output object name for one segment. Deterministic, so reprocessing the
/// same segment lands on the same name and the bucket's versioning keeps the
/// attempts apart.
pub fn destination_object(event: &CallAudioReadyEvent) -> String {
    format!(
        "{}-{}-{}.json",
        event.call_id, event.partial_id, event.audio_partial_id
    )
}

/// Submits asynchronous recognition jobs.
pub struct SpeechClient {
    http: reqwest::Client,
    tokens: Arc<dyn TokenSource>,
    endpoint: String,
}

impl SpeechClient {
    pub fn new(tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            http: reqwest::Client::new(),
            tokens,
            endpoint: SPEECH_ENDPOINT.to_string(),
        }
    }

    /// Points submissions somewhere else, for exercising the client against
    /// a local stand-in.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Submits the job and returns as soon as the provider accepts it.
    ///
    /// Deliberately fire-and-forget: recognition of a half-hour segment can
    /// take minutes, and the result is written to the destination URI out of
    /// band. Nothing here waits on, or ever learns about, completion.
    pub async fn submit(&self, spec: &RecognitionJobSpec) -> Result<()> {
        let request = LongRunningRecognizeRequest {
            config: &spec.config,
            audio: RecognitionAudio {
                uri: &spec.source_uri,
            },
            output_config: TranscriptOutputConfig {
                gcs_uri: &spec.destination_uri,
            },
        };

        let token = self.tokens.access_token().await?;
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::Submission {
                uri: spec.destination_uri.clone(),
                detail: e.to_string(),
            })?;

        let operation: Operation = response.json().await.map_err(|e| Error::Submission {
            uri: spec.destination_uri.clone(),
            detail: format!("operation response was not valid json: {e}"),
        })?;

        info!(
            operation = %operation.name,
            source = %spec.source_uri,
            destination = %spec.destination_uri,
            sample_rate = spec.config.sample_rate_hertz,
            "recognition job accepted"
        );
        Ok(())
    }
}
