//! Staged derivation pipeline.
//!
//! Every stage consults the shared voice cache before invoking its external
//! collaborator, so expensive derivation happens at most once per video even
//! under concurrent requests. Transient audio lands in self-deleting temp
//! paths, so cleanup happens on every exit path.

use crate::config::Config;
use crate::domain::error::CoreError;
use crate::domain::session::SessionStore;
use crate::domain::transcript::{self, TranscriptSegment};
use crate::domain::video::VideoId;
use crate::ports::cache::{VoiceCache, VoiceCacheEntry, VoiceCacheUpdate};
use crate::ports::media::{ClipWindow, MediaSource};
use crate::ports::transcriber::Transcriber;
use crate::ports::voice::VoiceGateway;
use crate::ports::PortError;
use serde::Serialize;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempPath;
use tokio::time::timeout;
use tracing::warn;

const RETRY_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Clone, Debug)]
pub struct PipelineLimits {
    pub clip_seconds: f64,
    pub sample_seconds: f64,
    pub max_window_seconds: f64,
    pub timeout: Duration,
    /// Total attempts for idempotent read-style collaborator calls.
    /// Non-idempotent calls (clone, create-agent) are never retried.
    pub attempts: u32,
}

impl PipelineLimits {
    pub fn from_config(config: &Config) -> Self {
        Self {
            clip_seconds: config.instant_clip_seconds,
            sample_seconds: config.sample_seconds,
            max_window_seconds: config.max_window_seconds,
            timeout: Duration::from_secs(config.collaborator_timeout_seconds),
            attempts: config.collaborator_attempts.max(1),
        }
    }
}

/// Result of the voice-ensuring stage.
#[derive(Debug, Clone)]
pub struct VoiceOutcome {
    /// Canonical voice id as read back from the cache after merging.
    pub voice_id: String,
    /// True when the cache already held a voice and no clone call was made.
    pub cache_hit: bool,
    /// What this flow itself computed, when it paid for a clone.
    pub computed: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstantContext {
    pub video_id: String,
    pub voice_id: String,
    pub context_window: String,
}

pub struct PipelineService<C, M, T, V> {
    cache: Arc<C>,
    media: Arc<M>,
    transcriber: Arc<T>,
    voice: Arc<V>,
    sessions: Arc<SessionStore>,
    limits: PipelineLimits,
}

impl<C, M, T, V> PipelineService<C, M, T, V>
where
    C: VoiceCache,
    M: MediaSource,
    T: Transcriber,
    V: VoiceGateway,
{
    pub fn new(
        cache: Arc<C>,
        media: Arc<M>,
        transcriber: Arc<T>,
        voice: Arc<V>,
        sessions: Arc<SessionStore>,
        limits: PipelineLimits,
    ) -> Self {
        Self {
            cache,
            media,
            transcriber,
            voice,
            sessions,
            limits,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Bound a single collaborator call by the configured budget.
    async fn bounded<O>(
        &self,
        what: &str,
        fut: impl Future<Output = Result<O, PortError>>,
    ) -> Result<O, CoreError> {
        match timeout(self.limits.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(CoreError::collaborator(what, e)),
            Err(_) => Err(CoreError::Collaborator(format!("{} timed out", what))),
        }
    }

    /// Bound and retry an idempotent collaborator call.
    async fn with_retry<O, F, Fut>(&self, what: &str, mut call: F) -> Result<O, CoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<O, PortError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match timeout(self.limits.timeout, call()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => CoreError::collaborator(what, e),
                Err(_) => CoreError::Collaborator(format!("{} timed out", what)),
            };
            if attempt >= self.limits.attempts {
                return Err(err);
            }
            warn!(what, attempt, error = %err, "collaborator call failed, retrying");
            tokio::time::sleep(RETRY_BACKOFF).await;
        }
    }

    /// Cache reads fail fast: an unavailable store must not masquerade as
    /// "not cached" and trigger duplicate expensive work.
    async fn cache_get(&self, video_id: &str) -> Result<Option<VoiceCacheEntry>, CoreError> {
        match timeout(self.limits.timeout, self.cache.get(video_id)).await {
            Ok(Ok(entry)) => Ok(entry),
            Ok(Err(e)) => Err(CoreError::internal("voice cache unavailable", e)),
            Err(_) => Err(CoreError::Internal("voice cache timed out".to_string())),
        }
    }

    async fn cache_merge(&self, video_id: &str, update: VoiceCacheUpdate) -> Result<(), CoreError> {
        match timeout(self.limits.timeout, self.cache.merge(video_id, update)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(CoreError::internal("voice cache unavailable", e)),
            Err(_) => Err(CoreError::Internal("voice cache timed out".to_string())),
        }
    }

    pub async fn fetch_audio(
        &self,
        video_id: &str,
        clip: Option<ClipWindow>,
    ) -> Result<TempPath, CoreError> {
        self.with_retry("audio download", || self.media.fetch_audio(video_id, clip))
            .await
    }

    /// Transcribe local audio and record the result in the session store.
    pub async fn transcribe_into_session(
        &self,
        video_id: &str,
        audio: &Path,
    ) -> Result<Vec<TranscriptSegment>, CoreError> {
        let segments = self
            .with_retry("transcription", || self.transcriber.transcribe(audio))
            .await?;
        self.sessions.set_transcript(video_id, segments.clone());
        Ok(segments)
    }

    pub async fn extract_sample(&self, audio: &Path) -> Result<TempPath, CoreError> {
        self.with_retry("sample extraction", || {
            self.media.extract_sample(audio, self.limits.sample_seconds)
        })
        .await
    }

    /// Clone a voice for the video unless the cache already holds one.
    ///
    /// On a miss the clone result is merged back immediately so concurrent
    /// callers observe the hit as soon as the merge completes; the cache is
    /// then re-read because a racing clone may have won the field.
    pub async fn ensure_voice(
        &self,
        video_id: &str,
        speaker_name: &str,
        sample: &Path,
    ) -> Result<VoiceOutcome, CoreError> {
        if let Some(voice_id) = self.cache_get(video_id).await?.and_then(|e| e.voice_id) {
            self.sessions.set_voice_id(video_id, &voice_id);
            return Ok(VoiceOutcome {
                voice_id,
                cache_hit: true,
                computed: None,
            });
        }

        let computed = self
            .bounded("voice clone", self.voice.clone_voice(speaker_name, sample))
            .await?;
        self.cache_merge(
            video_id,
            VoiceCacheUpdate {
                voice_id: Some(computed.clone()),
                speaker_name: Some(speaker_name.to_string()),
                sample_path: sample.to_str().map(String::from),
            },
        )
        .await?;

        let canonical = self
            .cache_get(video_id)
            .await?
            .and_then(|e| e.voice_id)
            .unwrap_or_else(|| computed.clone());
        self.sessions.set_voice_id(video_id, &canonical);
        Ok(VoiceOutcome {
            voice_id: canonical,
            cache_hit: false,
            computed: Some(computed),
        })
    }

    /// Clone from a caller-supplied sample URL, with the same cache-first
    /// idempotency as `ensure_voice`.
    pub async fn clone_from_sample_url(
        &self,
        video_id: &str,
        speaker_name: &str,
        sample_url: &str,
    ) -> Result<VoiceOutcome, CoreError> {
        if let Some(voice_id) = self.cache_get(video_id).await?.and_then(|e| e.voice_id) {
            self.sessions.set_voice_id(video_id, &voice_id);
            return Ok(VoiceOutcome {
                voice_id,
                cache_hit: true,
                computed: None,
            });
        }

        let computed = self
            .bounded(
                "voice clone",
                self.voice.clone_voice_from_url(speaker_name, sample_url),
            )
            .await?;
        self.cache_merge(
            video_id,
            VoiceCacheUpdate {
                voice_id: Some(computed.clone()),
                speaker_name: Some(speaker_name.to_string()),
                sample_path: Some(sample_url.to_string()),
            },
        )
        .await?;

        let canonical = self
            .cache_get(video_id)
            .await?
            .and_then(|e| e.voice_id)
            .unwrap_or_else(|| computed.clone());
        self.sessions.set_voice_id(video_id, &canonical);
        Ok(VoiceOutcome {
            voice_id: canonical,
            cache_hit: false,
            computed: Some(computed),
        })
    }

    /// Synchronous fast lane: bounded clip download + transcription and a
    /// conditional clone, never the full-video derivation.
    pub async fn instant_context(
        &self,
        video_url: &str,
        paused_time: f64,
        speaker_name: &str,
    ) -> Result<InstantContext, CoreError> {
        let video_id = VideoId::parse(video_url)?;
        let cached = self.cache_get(video_id.as_str()).await?;

        let clip = ClipWindow::around(paused_time, self.limits.clip_seconds);
        let audio = self.fetch_audio(video_id.as_str(), Some(clip)).await?;
        let segments = self
            .with_retry("transcription", || self.transcriber.transcribe(&audio))
            .await?;
        let segments = transcript::offset(segments, clip.start);

        // A clip transcript must not clobber a full one already in session.
        let known = self
            .sessions
            .get(video_id.as_str())
            .map_or(false, |s| !s.transcript.is_empty());
        if !known {
            self.sessions
                .set_transcript(video_id.as_str(), segments.clone());
        }

        let context_window =
            transcript::context_window(&segments, paused_time, self.limits.max_window_seconds);

        let voice_id = match cached.and_then(|e| e.voice_id) {
            Some(voice_id) => {
                self.sessions.set_voice_id(video_id.as_str(), &voice_id);
                voice_id
            }
            None => {
                let sample = self.extract_sample(&audio).await?;
                self.ensure_voice(video_id.as_str(), speaker_name, &sample)
                    .await?
                    .voice_id
            }
        };

        Ok(InstantContext {
            video_id: video_id.to_string(),
            voice_id,
            context_window,
        })
    }

    /// Context window for a known video, served from the bucketed
    /// per-session window cache when possible.
    pub fn context_window_for(&self, video_id: &str, paused_time: f64) -> Result<String, CoreError> {
        let session = self
            .sessions
            .get(video_id)
            .filter(|s| !s.transcript.is_empty())
            .ok_or_else(|| {
                CoreError::NotFound(format!(
                    "no transcript known for video {}; run /prepare-context or /instant-context first",
                    video_id
                ))
            })?;

        if let Some(hit) = self.sessions.cached_window(video_id, paused_time) {
            return Ok(hit);
        }
        let window = transcript::context_window(
            &session.transcript,
            paused_time,
            self.limits.max_window_seconds,
        );
        self.sessions
            .cache_window(video_id, paused_time, window.clone());
        Ok(window)
    }

    /// Create the conversational agent for a video, at most one provider
    /// call per video; later calls return the memoized agent id.
    pub async fn create_agent(
        &self,
        video_id: &str,
        speaker_name: &str,
    ) -> Result<String, CoreError> {
        let session = self.sessions.get(video_id).ok_or_else(|| {
            CoreError::Validation(format!(
                "transcript prerequisite missing for video {}; run /prepare-context first",
                video_id
            ))
        })?;
        if let Some(agent_id) = session.agent_id {
            return Ok(agent_id);
        }
        if session.transcript.is_empty() {
            return Err(CoreError::Validation(format!(
                "transcript prerequisite missing for video {}; run /prepare-context first",
                video_id
            )));
        }

        let voice_id = match session.voice_id {
            Some(voice_id) => voice_id,
            None => self
                .cache_get(video_id)
                .await?
                .and_then(|e| e.voice_id)
                .ok_or_else(|| {
                    CoreError::Validation(format!(
                        "voice prerequisite missing for video {}; clone a voice first",
                        video_id
                    ))
                })?,
        };

        let paused_at_end = session.transcript.last().map(|s| s.end).unwrap_or(0.0);
        let window = transcript::context_window(
            &session.transcript,
            paused_at_end,
            self.limits.max_window_seconds,
        );
        let agent_id = self
            .bounded(
                "agent creation",
                self.voice.create_agent(speaker_name, &voice_id, &window),
            )
            .await?;
        self.sessions.set_agent_id(video_id, &agent_id);
        Ok(agent_id)
    }
}
