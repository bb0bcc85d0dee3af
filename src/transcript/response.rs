use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};

/// Completed long-running recognition output, as written to the destination
/// bucket. Accepts both the REST camelCase field names and their snake_case
/// equivalents.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RecognizeResponse {
    #[serde(default)]
    pub results: Vec<RecognitionResult>,
}

/// One recognized segment. Alternatives are ordered best-first by the
/// provider; reconstruction only ever reads the first.
#[derive(Debug, Clone, Deserialize)]
pub struct RecognitionResult {
    #[serde(default)]
    pub alternatives: Vec<SpeechAlternative>,
    /// Which audio channel this segment came from (caller vs. callee when
    /// recognition runs per channel).
    #[serde(default, alias = "channelTag")]
    pub channel_tag: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpeechAlternative {
    #[serde(default)]
    pub transcript: String,
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub words: Vec<WordInfo>,
}

/// A single word with its offset from the start of the audio. Multiple words
/// may carry an identical start time.
#[derive(Debug, Clone, Deserialize)]
pub struct WordInfo {
    pub word: String,
    #[serde(alias = "startTime")]
    pub start_time: Seconds,
    #[serde(default, alias = "endTime")]
    pub end_time: Option<Seconds>,
}

/// Fractional seconds, wire-encoded either as a bare number or as a string
/// with a trailing unit (`"1.200s"`), which is how the recognition service
/// writes durations.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Seconds(pub f64);

impl Seconds {
    pub fn parse(s: &str) -> Option<Self> {
        let trimmed = s.strip_suffix('s').unwrap_or(s).trim();
        trimmed.parse::<f64>().ok().map(Seconds)
    }
}

impl<'de> Deserialize<'de> for Seconds {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SecondsVisitor;

        impl Visitor<'_> for SecondsVisitor {
            type Value = Seconds;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a duration in seconds, as a number or a \"<secs>s\" string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Seconds, E> {
                Seconds::parse(v)
                    .ok_or_else(|| E::custom(format!("invalid duration string '{v}'")))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Seconds, E> {
                Ok(Seconds(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Seconds, E> {
                Ok(Seconds(v as f64))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Seconds, E> {
                Ok(Seconds(v as f64))
            }
        }

        deserializer.deserialize_any(SecondsVisitor)
    }
}
