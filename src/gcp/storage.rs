use std::path::Path;
use std::sync::Arc;

use tracing::info;

use super::auth::TokenSource;
use crate::error::{Error, Result};

const UPLOAD_BASE: &str = "https://storage.googleapis.com/upload/storage/v1";

/// Minimal object-storage uploader.
///
/// Staging buckets are an external collaborator; all the pipeline needs is
/// "these bytes are now at this gs:// URI". Re-uploading the same object name
/// is allowed and lands as a new generation under the bucket's own
/// versioning scheme.
pub struct StorageClient {
    http: reqwest::Client,
    tokens: Arc<dyn TokenSource>,
    upload_base: String,
}

impl StorageClient {
    pub fn new(tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            http: reqwest::Client::new(),
            tokens,
            upload_base: UPLOAD_BASE.to_string(),
        }
    }

    /// Points uploads somewhere else, for exercising the client against a
    /// local stand-in.
    pub fn with_upload_base(mut self, base: impl Into<String>) -> Self {
        self.upload_base = base.into();
        self
    }

    /// Uploads a local file and returns its `gs://` URI.
    pub async fn upload_file(&self, bucket: &str, object: &str, path: &Path) -> Result<String> {
        let uri = format!("gs://{bucket}/{object}");
        let bytes = tokio::fs::read(path).await.map_err(|e| Error::Submission {
            uri: uri.clone(),
            detail: format!("could not read '{}': {e}", path.display()),
        })?;
        self.upload_bytes(bucket, object, bytes).await
    }

    pub async fn upload_bytes(&self, bucket: &str, object: &str, bytes: Vec<u8>) -> Result<String> {
        let uri = format!("gs://{bucket}/{object}");
        let url = format!("{}/b/{bucket}/o", self.upload_base);
        let token = self.tokens.access_token().await?;
        let len = bytes.len();

        self.http
            .post(&url)
            .query(&[("uploadType", "media"), ("name", object)])
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::Submission {
                uri: uri.clone(),
                detail: e.to_string(),
            })?;

        info!(%uri, len, "uploaded object");
        Ok(uri)
    }
}
