//! Transcription provider.

use crate::domain::transcript::TranscriptSegment;
use crate::ports::PortError;
use async_trait::async_trait;
use std::path::Path;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe local audio into ordered, non-overlapping segments with
    /// timestamps relative to the start of the file.
    async fn transcribe(&self, audio: &Path) -> Result<Vec<TranscriptSegment>, PortError>;
}
