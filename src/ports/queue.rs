//! Durable job store and queue.

use crate::domain::jobs::JobRecord;
use crate::ports::PortError;
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist the record and make its id available to exactly one worker.
    async fn enqueue(&self, record: JobRecord) -> Result<(), PortError>;

    /// Pop the next job id. `timeout_secs`: 0.0 blocks indefinitely,
    /// >0.0 returns `None` once the timeout elapses.
    async fn dequeue(&self, timeout_secs: f64) -> Result<Option<String>, PortError>;

    /// Records stay queryable by id after completion.
    async fn load(&self, job_id: &str) -> Result<Option<JobRecord>, PortError>;

    async fn save(&self, record: &JobRecord) -> Result<(), PortError>;
}
