//! Redis adapter: shared voice cache and durable job store.
//!
//! Provides Redis-backed implementations of:
//! - `VoiceCache` for cross-process voice artifacts (hash per video)
//! - `JobStore` for durable derivation jobs (JSON record + id list)

mod cache;
mod jobs;

use deadpool_redis::{Config, Connection, Pool, Runtime};
use std::fmt;

/// Redis key constants
const JOB_QUEUE: &str = "vocero:jobs";
const JOB_RECORD_PREFIX: &str = "vocero:job:";
const VOICE_CACHE_PREFIX: &str = "vocero:voice:";

pub type RedisError = deadpool_redis::redis::RedisError;

/// Store failure, carrying the operation and key it hit so a log line is
/// enough to locate the bad entry.
#[derive(Debug)]
pub enum StoreError {
    /// The pool could not be built, or no connection was available.
    Connection(String),
    /// A command failed against a live connection.
    Command {
        op: &'static str,
        key: String,
        source: RedisError,
    },
    /// A stored job record would not round-trip through JSON.
    Codec {
        key: String,
        source: serde_json::Error,
    },
}

impl StoreError {
    fn command(op: &'static str, key: &str) -> impl FnOnce(RedisError) -> StoreError {
        let key = key.to_string();
        move |source| StoreError::Command { op, key, source }
    }

    fn codec(key: &str) -> impl FnOnce(serde_json::Error) -> StoreError {
        let key = key.to_string();
        move |source| StoreError::Codec { key, source }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Connection(msg) => write!(f, "redis connection failed: {}", msg),
            StoreError::Command { op, key, source } => {
                write!(f, "redis {} on {} failed: {}", op, key, source)
            }
            StoreError::Codec { key, source } => {
                write!(f, "bad job record under {}: {}", key, source)
            }
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Connection(_) => None,
            StoreError::Command { source, .. } => Some(source),
            StoreError::Codec { source, .. } => Some(source),
        }
    }
}

/// Redis-backed adapter implementing both the voice cache and the job
/// store over one shared pool.
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
}

impl RedisStore {
    pub fn new(redis_url: &str) -> Result<Self, StoreError> {
        let pool = Config::from_url(redis_url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self { pool })
    }

    async fn connection(&self) -> Result<Connection, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))
    }
}
