//! Shared, durable per-video voice cache.
//!
//! The single source of truth for cross-process facts. Mutation goes through
//! `merge` only: a write updates the supplied fields and never clobbers
//! unrelated ones, so concurrent stages can race to populate different
//! fields of the same entry.

use crate::ports::PortError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Derived artifacts known for a video. Partial by design.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoiceCacheEntry {
    pub voice_id: Option<String>,
    pub speaker_name: Option<String>,
    pub sample_path: Option<String>,
}

/// Fields to merge into an entry; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct VoiceCacheUpdate {
    pub voice_id: Option<String>,
    pub speaker_name: Option<String>,
    pub sample_path: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoiceCache: Send + Sync {
    /// Absence is not an error: callers derive from scratch on `None`.
    async fn get(&self, video_id: &str) -> Result<Option<VoiceCacheEntry>, PortError>;

    /// Atomic with respect to concurrent merges on the same key;
    /// last writer wins per field, not per entry.
    async fn merge(&self, video_id: &str, update: VoiceCacheUpdate) -> Result<(), PortError>;
}
