//! Canonical video identifiers.

use crate::domain::error::CoreError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical identifier for a source video.
///
/// Every raw reference that denotes the same underlying video normalizes to
/// the same `VideoId`, which is the single key used across the voice cache,
/// the session store and the job store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

const ID_PATTERN: &str = r"[A-Za-z0-9_-]{11}";

impl VideoId {
    /// Parse a raw video reference: a watch URL in any of the common shapes,
    /// or a bare 11-character identifier.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let raw = raw.trim();

        let bare = Regex::new(&format!("^{}$", ID_PATTERN)).unwrap();
        if bare.is_match(raw) {
            return Ok(VideoId(raw.to_string()));
        }

        let url_patterns = [
            format!(r"[?&]v=({})", ID_PATTERN),
            format!(r"youtu\.be/({})", ID_PATTERN),
            format!(r"/embed/({})", ID_PATTERN),
            format!(r"/shorts/({})", ID_PATTERN),
            format!(r"/live/({})", ID_PATTERN),
        ];
        for pattern in &url_patterns {
            let re = Regex::new(pattern).unwrap();
            if let Some(caps) = re.captures(raw) {
                return Ok(VideoId(caps.get(1).unwrap().as_str().to_string()));
            }
        }

        Err(CoreError::Validation(format!(
            "not a recognizable video reference: {}",
            raw
        )))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_watch_urls() {
        let id = VideoId::parse("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap();
        assert_eq!(id.as_str(), "dQw4w9WgXcQ");
    }

    #[test]
    fn accepts_watch_urls_with_extra_params() {
        let id = VideoId::parse("https://www.youtube.com/watch?t=42&v=dQw4w9WgXcQ&x=7").unwrap();
        assert_eq!(id.as_str(), "dQw4w9WgXcQ");
    }

    #[test]
    fn accepts_short_embed_and_live_urls() {
        for raw in [
            "https://youtu.be/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "https://www.youtube.com/live/dQw4w9WgXcQ?feature=share",
        ] {
            let id = VideoId::parse(raw).unwrap();
            assert_eq!(id.as_str(), "dQw4w9WgXcQ", "failed for {}", raw);
        }
    }

    #[test]
    fn accepts_bare_ids() {
        let id = VideoId::parse("dQw4w9WgXcQ").unwrap();
        assert_eq!(id.as_str(), "dQw4w9WgXcQ");
    }

    #[test]
    fn different_references_to_the_same_video_normalize_identically() {
        let a = VideoId::parse("https://youtu.be/dQw4w9WgXcQ").unwrap();
        let b = VideoId::parse("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_garbage() {
        for raw in ["", "not a url", "https://example.com/video", "shortid"] {
            let err = VideoId::parse(raw).unwrap_err();
            assert!(matches!(err, CoreError::Validation(_)), "accepted {}", raw);
        }
    }
}
