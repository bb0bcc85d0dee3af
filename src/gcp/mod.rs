//! Platform collaborators: object storage and the speech service.
//!
//! Both authorize through one `TokenSource` and are specified only at their
//! REST boundary; job completion is delivered out of band to storage.

pub mod auth;
pub mod speech;
pub mod storage;

pub use auth::{MetadataTokenSource, StaticTokenSource, TokenSource};
pub use speech::{destination_object, RecognitionConfig, RecognitionJobSpec, SpeechClient};
pub use storage::StorageClient;
