use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced by the pipeline, each tagged with the URL or identifier
/// that failed. Nothing here is retried internally; the triggering transport
/// owns redelivery and dead-lettering.
#[derive(Debug, Error)]
pub enum Error {
    /// The login exchange was rejected or unreachable. `status` carries the
    /// upstream HTTP status when a response was received at all.
    #[error("authentication against '{endpoint}' failed: {detail}")]
    Authentication {
        endpoint: String,
        status: Option<u16>,
        detail: String,
    },

    /// A lookup that must yield at least one row yielded none.
    #[error("no results for '{resource}'")]
    NotFound { resource: String },

    /// Download of a descriptor or of signed content failed.
    #[error("failed to retrieve '{url}': {detail}")]
    Retrieval { url: String, detail: String },

    /// The downloaded container header is missing or truncated. Recognition
    /// needs the declared sample rate, so this is never swallowed.
    #[error("audio container '{}' has an invalid or truncated header: {detail}", .path.display())]
    AudioCorruption { path: PathBuf, detail: String },

    /// Building, staging, or submitting the recognition job failed.
    #[error("recognition submission for '{uri}' failed: {detail}")]
    Submission { uri: String, detail: String },

    /// The external transcoder exited non-zero or could not be spawned.
    #[error("conversion of '{}' failed: {detail}", .path.display())]
    Conversion { path: PathBuf, detail: String },

    /// The delivery envelope failed schema validation. Raised before any
    /// side effect occurs.
    #[error("rejected audio-ready event: {reason}")]
    BadEvent { reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
