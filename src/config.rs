use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub nats: NatsConfig,
    pub peerlogic: PeerlogicConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub gcp: GcpConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct NatsConfig {
    pub url: String,
    /// Subject carrying audio-ready deliveries.
    pub subject: String,
}

#[derive(Debug, Deserialize)]
pub struct PeerlogicConfig {
    pub api_url: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    /// Bucket receiving PCM-encoded segments, the recognition input.
    pub pcm_bucket: String,
    /// Bucket the recognition service writes raw JSON output into.
    pub raw_extract_bucket: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct GcpConfig {
    /// Static bearer token for the platform APIs. When unset, tokens come
    /// from the metadata server of the host the worker runs on.
    pub access_token: Option<String>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
