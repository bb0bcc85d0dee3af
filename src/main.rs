use std::sync::Arc;

use anyhow::{Context, Result};
use callscribe::{CallAudioReadyEvent, Config, Orchestrator};
use futures::StreamExt;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config_path =
        std::env::var("CALLSCRIBE_CONFIG").unwrap_or_else(|_| "config/callscribe".to_string());
    let cfg = Config::load(&config_path)?;

    info!("{} starting", cfg.service.name);
    info!("peerlogic api: {}", cfg.peerlogic.api_url);
    info!("pcm bucket: {}", cfg.storage.pcm_bucket);
    info!("raw extract bucket: {}", cfg.storage.raw_extract_bucket);

    let orchestrator = Arc::new(Orchestrator::from_config(&cfg));

    let nats = async_nats::connect(cfg.nats.url.as_str())
        .await
        .context("Failed to connect to NATS")?;
    let mut deliveries = nats
        .subscribe(cfg.nats.subject.clone())
        .await
        .context("Failed to subscribe to audio-ready subject")?;

    info!("subscribed to {} on {}", cfg.nats.subject, cfg.nats.url);

    // Each delivery is processed as its own task: stages within one event
    // are strictly sequential, but independent events may overlap freely.
    // They share only the session cache inside the orchestrator.
    while let Some(delivery) = deliveries.next().await {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            let event = match CallAudioReadyEvent::from_payload(&delivery.payload) {
                Ok(event) => event,
                Err(e) => {
                    error!("discarding malformed audio-ready delivery: {e}");
                    return;
                }
            };

            if let Err(e) = orchestrator.process(&event).await {
                // The transport owns redelivery; all we do here is surface
                // the failure with its identifiers.
                error!(
                    call_id = %event.call_id,
                    partial_id = %event.partial_id,
                    audio_partial_id = %event.audio_partial_id,
                    "event processing failed: {e:#}"
                );
            }
        });
    }

    Ok(())
}
