//! Conversation relay: quota-checked turns against the voice provider.

use crate::domain::error::CoreError;
use crate::domain::session::SessionStore;
use crate::ports::voice::{LiveSession, TextStream, VoiceGateway};
use crate::ports::PortError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

pub struct RelayService<V> {
    voice: Arc<V>,
    sessions: Arc<SessionStore>,
    max_questions: u32,
    timeout: Duration,
}

impl<V: VoiceGateway> RelayService<V> {
    pub fn new(
        voice: Arc<V>,
        sessions: Arc<SessionStore>,
        max_questions: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            voice,
            sessions,
            max_questions,
            timeout,
        }
    }

    async fn bounded<O>(
        &self,
        what: &str,
        fut: impl Future<Output = Result<O, PortError>>,
    ) -> Result<O, CoreError> {
        match timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(CoreError::collaborator(what, e)),
            Err(_) => Err(CoreError::Collaborator(format!("{} timed out", what))),
        }
    }

    /// One agent turn: requires an existing agent, consumes one question
    /// from the quota, streams the reply back as it arrives.
    pub async fn converse(&self, video_id: &str, text: &str) -> Result<TextStream, CoreError> {
        let agent_id = self
            .sessions
            .get(video_id)
            .and_then(|s| s.agent_id)
            .ok_or_else(|| {
                CoreError::NotFound(format!(
                    "no agent exists for video {}; call /create-agent first",
                    video_id
                ))
            })?;
        self.sessions
            .try_consume_question(video_id, self.max_questions)?;
        self.bounded("agent reply", self.voice.converse(&agent_id, text))
            .await
    }

    /// Agent-less conversational answer grounded in a caller-supplied
    /// context window. Still quota-checked per video.
    pub async fn build_conversation(
        &self,
        video_id: &str,
        voice_id: &str,
        speaker_name: &str,
        context_window: &str,
        question: &str,
    ) -> Result<String, CoreError> {
        self.sessions
            .try_consume_question(video_id, self.max_questions)?;
        self.bounded(
            "conversation",
            self.voice
                .build_conversation(voice_id, speaker_name, context_window, question),
        )
        .await
    }

    /// Plain synthesis fallback; bypasses the agent and quota machinery.
    pub async fn speak(&self, voice_id: &str, text: &str) -> Result<Vec<u8>, CoreError> {
        self.bounded("speech synthesis", self.voice.synthesize(voice_id, text))
            .await
    }

    pub async fn streaming_url(&self, agent_id: &str) -> Result<String, CoreError> {
        self.bounded("signed url", self.voice.streaming_url(agent_id))
            .await
    }

    pub async fn live(&self, voice_id: &str) -> Result<LiveSession, CoreError> {
        self.bounded("live session", self.voice.live_session(voice_id))
            .await
    }
}
