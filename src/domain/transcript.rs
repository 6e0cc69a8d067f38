//! Transcript segments and context-window selection.

use serde::{Deserialize, Serialize};

/// One transcribed span of speech. Segments are ordered by `start` and
/// non-overlapping by construction of the transcription provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Select the contiguous run of segments whose time ranges fall within
/// `[paused_time - max_window_secs, paused_time]` and join their text in
/// timestamp order.
///
/// If `paused_time` precedes every segment, the earliest segments up to the
/// window bound are returned instead. A pause past the end of the transcript
/// selects nothing; the intro is never served as context for a late
/// position. An empty transcript yields an empty string, never an error.
pub fn context_window(
    transcript: &[TranscriptSegment],
    paused_time: f64,
    max_window_secs: f64,
) -> String {
    if transcript.is_empty() {
        return String::new();
    }

    let window_start = paused_time - max_window_secs;
    let selected: Vec<&str> = transcript
        .iter()
        .filter(|seg| seg.end >= window_start && seg.start <= paused_time)
        .map(|seg| seg.text.trim())
        .collect();
    if !selected.is_empty() {
        return selected.join(" ");
    }

    // Paused before anything we know about: serve the earliest window.
    // A pause past the known transcript gets nothing.
    if paused_time >= transcript[0].start {
        return String::new();
    }
    let head = transcript[0].start;
    transcript
        .iter()
        .take_while(|seg| seg.start < head + max_window_secs)
        .map(|seg| seg.text.trim())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Shift every segment by `offset` seconds. Clip transcription returns
/// clip-relative timestamps; the fast lane rebases them onto video time.
pub fn offset(segments: Vec<TranscriptSegment>, offset: f64) -> Vec<TranscriptSegment> {
    segments
        .into_iter()
        .map(|seg| TranscriptSegment {
            start: seg.start + offset,
            end: seg.end + offset,
            text: seg.text,
        })
        .collect()
}

/// Concatenated transcript text truncated to at most `max_chars` characters,
/// used for the job result summary.
pub fn summary(transcript: &[TranscriptSegment], max_chars: usize) -> String {
    let full = transcript
        .iter()
        .map(|seg| seg.text.trim())
        .collect::<Vec<_>>()
        .join(" ");
    if full.chars().count() <= max_chars {
        return full;
    }
    full.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(start: f64, end: f64, text: &str) -> TranscriptSegment {
        TranscriptSegment {
            start,
            end,
            text: text.to_string(),
        }
    }

    fn sample() -> Vec<TranscriptSegment> {
        vec![
            seg(0.0, 10.0, "intro"),
            seg(10.0, 20.0, "first point"),
            seg(20.0, 30.0, "second point"),
            seg(30.0, 40.0, "closing"),
        ]
    }

    #[test]
    fn selects_segments_inside_the_window() {
        let window = context_window(&sample(), 25.0, 15.0);
        assert_eq!(window, "first point second point");
    }

    #[test]
    fn is_idempotent() {
        let transcript = sample();
        let a = context_window(&transcript, 25.0, 15.0);
        let b = context_window(&transcript, 25.0, 15.0);
        assert_eq!(a, b);
    }

    #[test]
    fn empty_transcript_yields_empty_string() {
        assert_eq!(context_window(&[], 25.0, 15.0), "");
    }

    #[test]
    fn paused_before_all_segments_falls_back_to_earliest_window() {
        let late = vec![seg(100.0, 110.0, "late start"), seg(110.0, 120.0, "more")];
        let window = context_window(&late, 5.0, 15.0);
        assert_eq!(window, "late start more");
    }

    #[test]
    fn paused_far_past_the_transcript_yields_no_context() {
        // A partial transcript must not answer a late pause with the intro.
        let window = context_window(&sample(), 500.0, 15.0);
        assert_eq!(window, "");
    }

    #[test]
    fn offset_rebases_timestamps() {
        let shifted = offset(vec![seg(0.0, 5.0, "a")], 60.0);
        assert_eq!(shifted[0].start, 60.0);
        assert_eq!(shifted[0].end, 65.0);
    }

    #[test]
    fn summary_truncates_long_transcripts() {
        let long = vec![seg(0.0, 1.0, &"word ".repeat(200))];
        let s = summary(&long, 50);
        assert_eq!(s.chars().count(), 50);
    }
}
