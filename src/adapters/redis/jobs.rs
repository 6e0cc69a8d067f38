//! Redis JobStore implementation.
//!
//! Records live as JSON under `vocero:job:<id>`; delivery goes through an
//! id list with LPUSH/BRPOP, so a job id reaches exactly one worker.

use super::{RedisStore, StoreError, JOB_QUEUE, JOB_RECORD_PREFIX};
use crate::domain::jobs::JobRecord;
use crate::ports::queue::JobStore;
use crate::ports::PortError;
use async_trait::async_trait;
use deadpool_redis::redis::{self, AsyncCommands, Pipeline};

fn record_key(job_id: &str) -> String {
    format!("{}{}", JOB_RECORD_PREFIX, job_id)
}

/// Record write and id push land in a single MULTI/EXEC: either a worker
/// will see the id, or nothing is stored. A half-applied enqueue would
/// otherwise strand a queued record no worker ever delivers.
fn enqueue_pipeline(key: &str, json: &str, job_id: &str) -> Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic().set(key, json).lpush(JOB_QUEUE, job_id);
    pipe
}

#[async_trait]
impl JobStore for RedisStore {
    async fn enqueue(&self, record: JobRecord) -> Result<(), PortError> {
        let key = record_key(&record.id);
        let json = serde_json::to_string(&record).map_err(StoreError::codec(&key))?;
        let mut conn = self.connection().await?;
        enqueue_pipeline(&key, &json, &record.id)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(StoreError::command("MULTI SET+LPUSH", &key))?;
        Ok(())
    }

    async fn dequeue(&self, timeout_secs: f64) -> Result<Option<String>, PortError> {
        let mut conn = self.connection().await?;
        let result: Option<(String, String)> = conn
            .brpop(JOB_QUEUE, timeout_secs)
            .await
            .map_err(StoreError::command("BRPOP", JOB_QUEUE))?;
        Ok(result.map(|(_, job_id)| job_id))
    }

    async fn load(&self, job_id: &str) -> Result<Option<JobRecord>, PortError> {
        let key = record_key(job_id);
        let mut conn = self.connection().await?;
        let json: Option<String> = conn
            .get(&key)
            .await
            .map_err(StoreError::command("GET", &key))?;
        match json {
            Some(data) => Ok(Some(
                serde_json::from_str(&data).map_err(StoreError::codec(&key))?,
            )),
            None => Ok(None),
        }
    }

    async fn save(&self, record: &JobRecord) -> Result<(), PortError> {
        let key = record_key(&record.id);
        let json = serde_json::to_string(record).map_err(StoreError::codec(&key))?;
        let mut conn = self.connection().await?;
        conn.set::<_, _, ()>(&key, json)
            .await
            .map_err(StoreError::command("SET", &key))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_writes_record_and_id_in_one_transaction() {
        let pipe = enqueue_pipeline("vocero:job:abc", "{}", "abc");
        let wire = String::from_utf8_lossy(&pipe.get_packed_pipeline()).into_owned();
        assert!(wire.contains("MULTI"));
        assert!(wire.contains("SET"));
        assert!(wire.contains("LPUSH"));
        assert!(wire.contains("EXEC"));
    }

    #[test]
    fn enqueue_pushes_the_id_onto_the_shared_queue() {
        let pipe = enqueue_pipeline("vocero:job:abc", "{}", "abc");
        let wire = String::from_utf8_lossy(&pipe.get_packed_pipeline()).into_owned();
        assert!(wire.contains(JOB_QUEUE));
        assert!(wire.contains("vocero:job:abc"));
    }
}
