use std::fs;
use std::io;
use std::path::PathBuf;

use tracing::warn;
use uuid::Uuid;

/// Scoped temp layout for one event's intermediate files:
/// `<tmp>/callscribe/<run-id>/{downloaded,encoded}`.
///
/// Concurrently processed events each get their own run id, so their files
/// never collide even for identical segment identifiers.
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn create() -> io::Result<Self> {
        let root = std::env::temp_dir()
            .join("callscribe")
            .join(Uuid::new_v4().to_string());
        fs::create_dir_all(root.join("downloaded"))?;
        fs::create_dir_all(root.join("encoded"))?;
        Ok(Self { root })
    }

    pub fn downloaded_dir(&self) -> PathBuf {
        self.root.join("downloaded")
    }

    /// Where the transcoder writes its output.
    pub fn encoded_dir(&self) -> PathBuf {
        self.root.join("encoded")
    }

    /// Persists downloaded bytes under the workspace for the transcoder to
    /// pick up.
    pub fn persist_download(&self, file_name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let path = self.downloaded_dir().join(file_name);
        fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Best-effort removal once an event is fully processed.
    pub fn cleanup(&self) {
        if let Err(e) = fs::remove_dir_all(&self.root) {
            warn!(root = %self.root.display(), "failed to clean up workspace: {e}");
        }
    }
}
