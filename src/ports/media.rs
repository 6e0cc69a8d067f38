//! Audio acquisition from the video source.

use crate::ports::PortError;
use async_trait::async_trait;
use std::path::Path;
use tempfile::TempPath;

/// A bounded time window of a video, used by the fast lane to avoid
/// fetching the whole audio track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipWindow {
    pub start: f64,
    pub duration: f64,
}

impl ClipWindow {
    /// A window of `length` seconds ending at `paused_time`.
    pub fn around(paused_time: f64, length: f64) -> Self {
        Self {
            start: (paused_time - length).max(0.0),
            duration: length,
        }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Fetch the audio track for a video; `clip` bounds the fetch when only
    /// a window is needed. The returned path is removed on drop.
    async fn fetch_audio(
        &self,
        video_id: &str,
        clip: Option<ClipWindow>,
    ) -> Result<TempPath, PortError>;

    /// Cut a voice sample of `duration_secs` from the head of local audio.
    /// Deterministic for the same input and duration.
    async fn extract_sample(&self, audio: &Path, duration_secs: f64)
        -> Result<TempPath, PortError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_window_is_clamped_at_zero() {
        let clip = ClipWindow::around(30.0, 90.0);
        assert_eq!(clip.start, 0.0);
        assert_eq!(clip.duration, 90.0);
    }

    #[test]
    fn clip_window_ends_at_paused_time() {
        let clip = ClipWindow::around(600.0, 90.0);
        assert_eq!(clip.start, 510.0);
        assert_eq!(clip.end(), 600.0);
    }
}
