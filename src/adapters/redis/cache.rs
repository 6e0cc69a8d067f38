//! Redis VoiceCache implementation.
//!
//! Each video maps to a hash; `merge` issues one HSET with only the supplied
//! fields, which makes concurrent merges last-writer-wins per field rather
//! than per entry.

use super::{RedisStore, StoreError, VOICE_CACHE_PREFIX};
use crate::ports::cache::{VoiceCache, VoiceCacheEntry, VoiceCacheUpdate};
use crate::ports::PortError;
use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;
use std::collections::HashMap;

const FIELD_VOICE_ID: &str = "voice_id";
const FIELD_SPEAKER_NAME: &str = "speaker_name";
const FIELD_SAMPLE_PATH: &str = "sample_path";

fn entry_key(video_id: &str) -> String {
    format!("{}{}", VOICE_CACHE_PREFIX, video_id)
}

#[async_trait]
impl VoiceCache for RedisStore {
    async fn get(&self, video_id: &str) -> Result<Option<VoiceCacheEntry>, PortError> {
        let key = entry_key(video_id);
        let mut conn = self.connection().await?;
        let mut fields: HashMap<String, String> = conn
            .hgetall(&key)
            .await
            .map_err(StoreError::command("HGETALL", &key))?;
        if fields.is_empty() {
            return Ok(None);
        }
        Ok(Some(VoiceCacheEntry {
            voice_id: fields.remove(FIELD_VOICE_ID),
            speaker_name: fields.remove(FIELD_SPEAKER_NAME),
            sample_path: fields.remove(FIELD_SAMPLE_PATH),
        }))
    }

    async fn merge(&self, video_id: &str, update: VoiceCacheUpdate) -> Result<(), PortError> {
        let mut items: Vec<(&str, String)> = Vec::with_capacity(3);
        if let Some(voice_id) = update.voice_id {
            items.push((FIELD_VOICE_ID, voice_id));
        }
        if let Some(speaker_name) = update.speaker_name {
            items.push((FIELD_SPEAKER_NAME, speaker_name));
        }
        if let Some(sample_path) = update.sample_path {
            items.push((FIELD_SAMPLE_PATH, sample_path));
        }
        if items.is_empty() {
            return Ok(());
        }

        let key = entry_key(video_id);
        let mut conn = self.connection().await?;
        conn.hset_multiple::<_, _, _, ()>(&key, &items)
            .await
            .map_err(StoreError::command("HSET", &key))?;
        Ok(())
    }
}
