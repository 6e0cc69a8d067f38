//! Process-local session store.
//!
//! Holds per-video working state (transcript, counters, agent id) for the
//! flows running in this process. The store is bounded by an LRU cap and is
//! never authoritative for cross-process facts: on a miss, callers re-derive
//! from the shared voice cache instead of assuming presence.

use crate::domain::error::CoreError;
use crate::domain::transcript::TranscriptSegment;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Width of one context-window cache bucket. Paused times are keyed by
/// their nearest bucket so near-duplicate timestamps still hit.
pub const WINDOW_BUCKET_SECS: f64 = 5.0;

pub const DEFAULT_SESSION_CAPACITY: usize = 256;

#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub transcript: Vec<TranscriptSegment>,
    pub voice_id: Option<String>,
    pub agent_id: Option<String>,
    pub question_count: u32,
    window_cache: HashMap<u64, String>,
}

fn window_bucket(paused_time: f64) -> u64 {
    (paused_time.max(0.0) / WINDOW_BUCKET_SECS).round() as u64
}

struct SessionMap {
    entries: HashMap<String, SessionState>,
    // LRU order, most recently used at the back
    order: VecDeque<String>,
    capacity: usize,
}

impl SessionMap {
    fn touch(&mut self, video_id: &str) {
        if let Some(pos) = self.order.iter().position(|id| id == video_id) {
            self.order.remove(pos);
        }
        self.order.push_back(video_id.to_string());
    }

    fn entry(&mut self, video_id: &str) -> &mut SessionState {
        if !self.entries.contains_key(video_id) {
            self.entries
                .insert(video_id.to_string(), SessionState::default());
            if self.entries.len() > self.capacity {
                if let Some(evicted) = self.order.pop_front() {
                    self.entries.remove(&evicted);
                }
            }
        }
        self.touch(video_id);
        self.entries.get_mut(video_id).unwrap()
    }
}

/// Shared within the process across all concurrent flows; all mutation goes
/// through the operations below, never through raw references.
pub struct SessionStore {
    inner: Mutex<SessionMap>,
}

impl SessionStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(SessionMap {
                entries: HashMap::new(),
                order: VecDeque::new(),
                capacity: capacity.max(1),
            }),
        }
    }

    pub fn get(&self, video_id: &str) -> Option<SessionState> {
        let mut map = self.inner.lock().unwrap();
        let state = map.entries.get(video_id).cloned();
        if state.is_some() {
            map.touch(video_id);
        }
        state
    }

    /// Create an empty record (question count zero) on first access.
    pub fn get_or_create(&self, video_id: &str) -> SessionState {
        let mut map = self.inner.lock().unwrap();
        map.entry(video_id).clone()
    }

    pub fn set_transcript(&self, video_id: &str, transcript: Vec<TranscriptSegment>) {
        let mut map = self.inner.lock().unwrap();
        let state = map.entry(video_id);
        state.transcript = transcript;
        state.window_cache.clear();
    }

    pub fn set_voice_id(&self, video_id: &str, voice_id: &str) {
        let mut map = self.inner.lock().unwrap();
        map.entry(video_id).voice_id = Some(voice_id.to_string());
    }

    pub fn set_agent_id(&self, video_id: &str, agent_id: &str) {
        let mut map = self.inner.lock().unwrap();
        map.entry(video_id).agent_id = Some(agent_id.to_string());
    }

    /// Atomic check-and-increment of the question counter. The check and the
    /// increment happen under one lock acquisition, so with limit N and any
    /// interleaving of concurrent turns exactly N are accepted.
    pub fn try_consume_question(&self, video_id: &str, limit: u32) -> Result<u32, CoreError> {
        let mut map = self.inner.lock().unwrap();
        let state = map.entry(video_id);
        if state.question_count >= limit {
            return Err(CoreError::QuotaExceeded { limit });
        }
        state.question_count += 1;
        Ok(state.question_count)
    }

    pub fn cache_window(&self, video_id: &str, paused_time: f64, text: String) {
        let mut map = self.inner.lock().unwrap();
        map.entry(video_id)
            .window_cache
            .insert(window_bucket(paused_time), text);
    }

    pub fn cached_window(&self, video_id: &str, paused_time: f64) -> Option<String> {
        let mut map = self.inner.lock().unwrap();
        map.entries
            .get_mut(video_id)
            .and_then(|state| state.window_cache.get(&window_bucket(paused_time)).cloned())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn first_access_creates_an_empty_record() {
        let store = SessionStore::new(8);
        let state = store.get_or_create("vid");
        assert_eq!(state.question_count, 0);
        assert!(state.transcript.is_empty());
        assert!(state.voice_id.is_none());
    }

    #[test]
    fn setters_are_idempotent() {
        let store = SessionStore::new(8);
        store.set_voice_id("vid", "voice-1");
        store.set_voice_id("vid", "voice-1");
        store.set_agent_id("vid", "agent-1");
        let state = store.get("vid").unwrap();
        assert_eq!(state.voice_id.as_deref(), Some("voice-1"));
        assert_eq!(state.agent_id.as_deref(), Some("agent-1"));
    }

    #[test]
    fn exactly_limit_concurrent_questions_are_accepted() {
        let store = Arc::new(SessionStore::new(8));
        let limit = 10u32;
        let handles: Vec<_> = (0..limit + 5)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || store.try_consume_question("vid", limit).is_ok())
            })
            .collect();
        let accepted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&ok| ok)
            .count() as u32;
        assert_eq!(accepted, limit);
        // and every later attempt is rejected
        let err = store.try_consume_question("vid", limit).unwrap_err();
        assert_eq!(err, CoreError::QuotaExceeded { limit });
    }

    #[test]
    fn quotas_are_per_video() {
        let store = SessionStore::new(8);
        store.try_consume_question("a", 1).unwrap();
        assert!(store.try_consume_question("a", 1).is_err());
        assert!(store.try_consume_question("b", 1).is_ok());
    }

    #[test]
    fn window_cache_matches_by_bucket_not_exact_time() {
        let store = SessionStore::new(8);
        store.cache_window("vid", 10.0, "around ten".to_string());
        assert_eq!(
            store.cached_window("vid", 11.4).as_deref(),
            Some("around ten")
        );
        assert_eq!(store.cached_window("vid", 14.0), None);
    }

    #[test]
    fn replacing_the_transcript_invalidates_cached_windows() {
        let store = SessionStore::new(8);
        store.cache_window("vid", 10.0, "stale".to_string());
        store.set_transcript("vid", vec![]);
        assert_eq!(store.cached_window("vid", 10.0), None);
    }

    #[test]
    fn evicts_least_recently_used_beyond_capacity() {
        let store = SessionStore::new(2);
        store.get_or_create("a");
        store.get_or_create("b");
        store.get_or_create("a"); // refresh a
        store.get_or_create("c"); // evicts b
        assert_eq!(store.len(), 2);
        assert!(store.get("b").is_none());
        assert!(store.get("a").is_some());
        assert!(store.get("c").is_some());
    }
}
