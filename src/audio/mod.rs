pub mod convert;
pub mod wav;
pub mod workspace;

pub use convert::wav_to_pcm_s16le;
pub use wav::{declared_sample_rate, log_file_contents, AudioAsset};
pub use workspace::Workspace;
