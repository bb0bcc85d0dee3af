pub mod api;
pub mod audio;
pub mod config;
pub mod error;
pub mod gcp;
pub mod pipeline;
pub mod transcript;

pub use api::{AuthToken, LoginProvider, NetsapiensClient, PeerlogicClient, Session, SessionManager};
pub use audio::{AudioAsset, Workspace};
pub use config::Config;
pub use error::Error;
pub use gcp::{RecognitionJobSpec, SpeechClient, StorageClient, TokenSource};
pub use pipeline::{CallAudioReadyEvent, Orchestrator};
pub use transcript::{channel_transcripts, format_transcript, words_by_start_time, RecognizeResponse};
