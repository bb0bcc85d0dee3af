use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::response::RecognizeResponse;

/// Per-channel transcript text, keyed by the provider's channel tag.
///
/// Each segment's best alternative is appended to its channel's accumulator
/// in the order segments arrive in the response. Deliberately NOT
/// time-ordered; this view reflects provider-assigned segment order. Use
/// `words_by_start_time` for the chronological view.
pub fn channel_transcripts(response: &RecognizeResponse) -> BTreeMap<i64, String> {
    let mut channels: BTreeMap<i64, String> = BTreeMap::new();

    for result in &response.results {
        let Some(best) = result.alternatives.first() else {
            continue;
        };
        if best.transcript.is_empty() {
            continue;
        }
        channels
            .entry(result.channel_tag)
            .or_default()
            .push_str(&best.transcript);
    }

    channels
}

/// All recognized words across every channel, ordered by ascending start
/// time.
///
/// Words sharing a start time stay adjacent, in the order they were first
/// encountered while scanning the response; a stable sort on the start time
/// gives exactly that grouping, including when the same timestamp recurs far
/// apart in the input. The output is a permutation of the input words:
/// nothing is dropped or duplicated.
pub fn words_by_start_time(response: &RecognizeResponse) -> Vec<String> {
    let mut words: Vec<(f64, &str)> = Vec::new();

    for result in &response.results {
        let Some(best) = result.alternatives.first() else {
            continue;
        };
        if best.transcript.is_empty() {
            continue;
        }
        for info in &best.words {
            words.push((info.start_time.0, info.word.as_str()));
        }
    }

    // Vec::sort_by is stable, which is what keeps equal-timestamp words in
    // encounter order. Start times parsed from the wire are never NaN.
    words.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

    words.into_iter().map(|(_, word)| word.to_string()).collect()
}

/// Joins an ordered word list into one line of transcript text, shedding
/// any double quotes the recognizer left around the words.
pub fn format_transcript(words: &[String]) -> String {
    words.join(" ").trim_matches('"').to_string()
}
