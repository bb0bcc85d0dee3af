use std::path::{Path, PathBuf};

use hound::WavReader;
use tracing::{info, warn};

use crate::error::{Error, Result};

/// One downloaded segment, staged on disk for the transcoder.
#[derive(Debug, Clone)]
pub struct AudioAsset {
    pub local_path: PathBuf,
    /// Rate declared by the container header; required input to recognition.
    pub sample_rate_hertz: u32,
    pub byte_len: usize,
}

/// Reads the sample rate a WAV container declares in its header.
///
/// Recognition must be told the rate the file claims, not a guess, so a
/// missing or truncated RIFF header surfaces as corruption instead of
/// falling back to a default.
pub fn declared_sample_rate(path: &Path) -> Result<u32> {
    let reader = WavReader::open(path).map_err(|e| Error::AudioCorruption {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;

    let spec = reader.spec();
    info!(
        path = %path.display(),
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        "read wav header"
    );

    Ok(spec.sample_rate)
}

/// Dumps a file's raw contents into the log for post-mortem diagnosis of a
/// corrupt download. Best effort; the caller is already failing.
pub fn log_file_contents(path: &Path) {
    match std::fs::read(path) {
        Ok(bytes) => {
            warn!(
                path = %path.display(),
                len = bytes.len(),
                contents = %String::from_utf8_lossy(&bytes),
                "raw contents of rejected audio file"
            );
        }
        Err(e) => {
            warn!(path = %path.display(), "could not read rejected audio file for dump: {e}");
        }
    }
}
