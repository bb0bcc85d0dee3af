use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::info;

use super::workspace::Workspace;
use crate::error::{Error, Result};

/// Longest input ffmpeg is allowed to consume, in seconds. Bounds runaway
/// inputs; a half-hour segment is already the practical maximum upstream.
const MAX_INPUT_SECS: u32 = 1800;

/// Transcodes a WAV file to 16-bit little-endian PCM with ffmpeg, writing
/// into the workspace's encoded directory under the same file name.
///
/// The transcoder is an external collaborator; anything beyond its exit
/// status is its own business.
pub async fn wav_to_pcm_s16le(workspace: &Workspace, input: &Path) -> Result<PathBuf> {
    let file_name = input.file_name().ok_or_else(|| Error::Conversion {
        path: input.to_path_buf(),
        detail: "input path has no file name".to_string(),
    })?;
    let output = workspace.encoded_dir().join(file_name);

    let status = Command::new("ffmpeg")
        .arg("-y")
        .arg("-i")
        .arg(input)
        .arg("-t")
        .arg(MAX_INPUT_SECS.to_string())
        .arg("-c:a")
        .arg("pcm_s16le")
        .arg(&output)
        .status()
        .await
        .map_err(|e| Error::Conversion {
            path: input.to_path_buf(),
            detail: format!("failed to spawn ffmpeg: {e}"),
        })?;

    if !status.success() {
        return Err(Error::Conversion {
            path: input.to_path_buf(),
            detail: format!("ffmpeg exited with {status}"),
        });
    }

    info!(input = %input.display(), output = %output.display(), "transcoded to pcm_s16le");
    Ok(output)
}
