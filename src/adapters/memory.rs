//! In-process store adapter.
//!
//! Implements the same ports as the Redis adapter over plain maps. Used by
//! tests and single-process development setups where no Redis is running.

use crate::domain::jobs::JobRecord;
use crate::ports::cache::{VoiceCache, VoiceCacheEntry, VoiceCacheUpdate};
use crate::ports::queue::JobStore;
use crate::ports::PortError;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Default)]
pub struct MemoryStore {
    cache: Mutex<HashMap<String, VoiceCacheEntry>>,
    records: Mutex<HashMap<String, JobRecord>>,
    queue: Mutex<VecDeque<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VoiceCache for MemoryStore {
    async fn get(&self, video_id: &str) -> Result<Option<VoiceCacheEntry>, PortError> {
        Ok(self.cache.lock().unwrap().get(video_id).cloned())
    }

    async fn merge(&self, video_id: &str, update: VoiceCacheUpdate) -> Result<(), PortError> {
        let mut cache = self.cache.lock().unwrap();
        let entry = cache.entry(video_id.to_string()).or_default();
        if update.voice_id.is_some() {
            entry.voice_id = update.voice_id;
        }
        if update.speaker_name.is_some() {
            entry.speaker_name = update.speaker_name;
        }
        if update.sample_path.is_some() {
            entry.sample_path = update.sample_path;
        }
        Ok(())
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn enqueue(&self, record: JobRecord) -> Result<(), PortError> {
        let id = record.id.clone();
        self.records.lock().unwrap().insert(id.clone(), record);
        self.queue.lock().unwrap().push_back(id);
        Ok(())
    }

    async fn dequeue(&self, timeout_secs: f64) -> Result<Option<String>, PortError> {
        let deadline = if timeout_secs > 0.0 {
            Some(Instant::now() + Duration::from_secs_f64(timeout_secs))
        } else {
            None
        };
        loop {
            if let Some(id) = self.queue.lock().unwrap().pop_front() {
                return Ok(Some(id));
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Ok(None);
                }
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    async fn load(&self, job_id: &str) -> Result<Option<JobRecord>, PortError> {
        Ok(self.records.lock().unwrap().get(job_id).cloned())
    }

    async fn save(&self, record: &JobRecord) -> Result<(), PortError> {
        self.records
            .lock()
            .unwrap()
            .insert(record.id.clone(), record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::jobs::JobState;

    #[tokio::test]
    async fn merge_updates_only_the_supplied_fields() {
        let store = MemoryStore::new();
        store
            .merge(
                "vid",
                VoiceCacheUpdate {
                    voice_id: Some("voice-1".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        store
            .merge(
                "vid",
                VoiceCacheUpdate {
                    speaker_name: Some("Ada".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let entry = store.get("vid").await.unwrap().unwrap();
        assert_eq!(entry.voice_id.as_deref(), Some("voice-1"));
        assert_eq!(entry.speaker_name.as_deref(), Some("Ada"));
        assert_eq!(entry.sample_path, None);
    }

    #[tokio::test]
    async fn absent_entries_read_as_none() {
        let store = MemoryStore::new();
        assert_eq!(store.get("unknown").await.unwrap(), None);
    }

    #[tokio::test]
    async fn jobs_are_delivered_in_submission_order() {
        let store = MemoryStore::new();
        let a = JobRecord::new("v1", "url1", "Speaker");
        let b = JobRecord::new("v2", "url2", "Speaker");
        store.enqueue(a.clone()).await.unwrap();
        store.enqueue(b.clone()).await.unwrap();

        assert_eq!(store.dequeue(0.1).await.unwrap(), Some(a.id.clone()));
        assert_eq!(store.dequeue(0.1).await.unwrap(), Some(b.id));
        assert_eq!(store.dequeue(0.05).await.unwrap(), None);
    }

    #[tokio::test]
    async fn records_stay_queryable_after_save() {
        let store = MemoryStore::new();
        let mut record = JobRecord::new("v1", "url1", "Speaker");
        store.enqueue(record.clone()).await.unwrap();
        record.advance(JobState::Active);
        record.advance(JobState::Completed);
        record.progress = 100;
        store.save(&record).await.unwrap();

        let loaded = store.load(&record.id).await.unwrap().unwrap();
        assert_eq!(loaded.state, JobState::Completed);
        assert_eq!(loaded.progress, 100);
    }
}
