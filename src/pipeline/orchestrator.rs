use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};

use super::event::CallAudioReadyEvent;
use crate::api::PeerlogicClient;
use crate::audio::{self, AudioAsset, Workspace};
use crate::config::Config;
use crate::error::Error;
use crate::gcp::{
    destination_object, MetadataTokenSource, RecognitionJobSpec, SpeechClient, StaticTokenSource,
    StorageClient, TokenSource,
};

/// Sequences one event through its stages:
/// `received → session_ready → audio_downloaded → audio_converted → uploaded
/// → job_submitted`, aborting on the first failure.
///
/// Nothing is persisted between events beyond the session cache inside the
/// API client; every other stage starts fresh. Failures are logged with full
/// context and propagated; retry and redelivery belong to the transport.
pub struct Orchestrator {
    peerlogic: Arc<PeerlogicClient>,
    storage: StorageClient,
    speech: SpeechClient,
    pcm_bucket: String,
    raw_extract_bucket: String,
}

impl Orchestrator {
    pub fn new(
        peerlogic: Arc<PeerlogicClient>,
        storage: StorageClient,
        speech: SpeechClient,
        pcm_bucket: impl Into<String>,
        raw_extract_bucket: impl Into<String>,
    ) -> Self {
        Self {
            peerlogic,
            storage,
            speech,
            pcm_bucket: pcm_bucket.into(),
            raw_extract_bucket: raw_extract_bucket.into(),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        let peerlogic = Arc::new(PeerlogicClient::new(
            &cfg.peerlogic.api_url,
            &cfg.peerlogic.username,
            &cfg.peerlogic.password,
        ));

        let tokens: Arc<dyn TokenSource> = match &cfg.gcp.access_token {
            Some(token) => Arc::new(StaticTokenSource::new(token.clone())),
            None => Arc::new(MetadataTokenSource::new()),
        };

        Self::new(
            peerlogic,
            StorageClient::new(Arc::clone(&tokens)),
            SpeechClient::new(tokens),
            cfg.storage.pcm_bucket.clone(),
            cfg.storage.raw_extract_bucket.clone(),
        )
    }

    /// Runs the full stage sequence for one event. An authentication
    /// failure additionally drops the cached session, so the next event
    /// starts from a fresh login.
    pub async fn process(&self, event: &CallAudioReadyEvent) -> Result<()> {
        match self.run(event).await {
            Ok(()) => Ok(()),
            Err(err) => {
                if matches!(err.downcast_ref::<Error>(), Some(Error::Authentication { .. })) {
                    self.peerlogic.invalidate_session().await;
                }
                Err(err)
            }
        }
    }

    async fn run(&self, event: &CallAudioReadyEvent) -> Result<()> {
        let call_id = event.call_id.as_str();
        let partial_id = event.partial_id.as_str();
        let audio_partial_id = event.audio_partial_id.as_str();

        info!(call_id, partial_id, audio_partial_id, stage = "received", "audio ready");

        self.peerlogic.ensure_session().await?;
        info!(call_id, partial_id, audio_partial_id, stage = "session_ready", "session established");

        let workspace = Workspace::create().context("failed to create event workspace")?;
        let asset = self.fetch_audio(event, &workspace).await?;
        info!(
            call_id,
            partial_id,
            audio_partial_id,
            stage = "audio_downloaded",
            sample_rate = asset.sample_rate_hertz,
            len = asset.byte_len,
            "audio staged"
        );

        let pcm_path = audio::wav_to_pcm_s16le(&workspace, &asset.local_path).await?;
        info!(call_id, partial_id, audio_partial_id, stage = "audio_converted", "audio normalized");

        let object = format!("{partial_id}.wav");
        let source_uri = self
            .storage
            .upload_file(&self.pcm_bucket, &object, &pcm_path)
            .await?;
        info!(call_id, partial_id, audio_partial_id, stage = "uploaded", source = %source_uri, "pcm staged");

        let destination_uri = format!(
            "gs://{}/{}",
            self.raw_extract_bucket,
            destination_object(event)
        );
        let spec = RecognitionJobSpec::new(source_uri, destination_uri, asset.sample_rate_hertz);
        self.speech.submit(&spec).await?;
        info!(call_id, partial_id, audio_partial_id, stage = "job_submitted", "event complete");

        workspace.cleanup();
        Ok(())
    }

    /// Downloads one segment, stages it in the workspace, and reads the
    /// declared sample rate. On a corrupt header the raw file is dumped to
    /// the log before the failure propagates.
    async fn fetch_audio(
        &self,
        event: &CallAudioReadyEvent,
        workspace: &Workspace,
    ) -> Result<AudioAsset> {
        let bytes = self
            .peerlogic
            .get_call_audio_partial_wavfile(
                &event.call_id,
                &event.partial_id,
                &event.audio_partial_id,
            )
            .await?;

        let local_path = workspace
            .persist_download(&format!("{}.wav", event.partial_id), &bytes)
            .context("failed to persist downloaded audio")?;

        let sample_rate_hertz = match audio::declared_sample_rate(&local_path) {
            Ok(rate) => rate,
            Err(err @ Error::AudioCorruption { .. }) => {
                error!(
                    call_id = %event.call_id,
                    partial_id = %event.partial_id,
                    audio_partial_id = %event.audio_partial_id,
                    "downloaded audio failed header inspection"
                );
                audio::log_file_contents(&local_path);
                return Err(err.into());
            }
            Err(err) => return Err(err.into()),
        };

        Ok(AudioAsset {
            local_path,
            sample_rate_hertz,
            byte_len: bytes.len(),
        })
    }
}
