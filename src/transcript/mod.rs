//! Transcript reconstruction over completed recognition output.
//!
//! Pure functions only: recognition results come in as unordered segments
//! with word-level timing, and leave as either per-channel text or one
//! time-ordered word sequence. Invoked out of band, once the recognition
//! service has written its JSON to the destination bucket.

pub mod reconstruct;
pub mod response;

pub use reconstruct::{channel_transcripts, format_transcript, words_by_start_time};
pub use response::{RecognizeResponse, RecognitionResult, Seconds, SpeechAlternative, WordInfo};
