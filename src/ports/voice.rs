//! Voice synthesis / conversational agent provider.

use crate::ports::PortError;
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::pin::Pin;
use tokio::sync::mpsc;

/// Streamed reply text, relayed chunk by chunk as the provider produces it.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, PortError>> + Send>>;

/// Input forwarded to the provider over the live duplex channel.
#[derive(Debug)]
pub enum LiveInput {
    Audio(Vec<u8>),
    Text(String),
}

/// Event streamed back from the provider over the live duplex channel.
/// The serialized tags are the wire format sent to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum LiveEvent {
    UserTranscript { text: String },
    AgentTranscript { text: String },
    AgentAudio { audio: String },
}

/// One established duplex session with the provider. Dropping `to_provider`
/// closes the upstream connection and ends `from_provider`.
pub struct LiveSession {
    pub to_provider: mpsc::Sender<LiveInput>,
    pub from_provider: mpsc::Receiver<LiveEvent>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    /// Derive a cloned voice from a local sample. Not idempotent on the
    /// provider side; callers consult the voice cache first.
    async fn clone_voice(&self, speaker_name: &str, sample: &Path) -> Result<String, PortError>;

    /// Same as `clone_voice` but with a sample fetched from a URL.
    async fn clone_voice_from_url(
        &self,
        speaker_name: &str,
        sample_url: &str,
    ) -> Result<String, PortError>;

    /// Plain text-to-speech, returning MPEG audio bytes.
    async fn synthesize(&self, voice_id: &str, text: &str) -> Result<Vec<u8>, PortError>;

    /// Create a conversational agent bound to a voice and a context window.
    async fn create_agent(
        &self,
        speaker_name: &str,
        voice_id: &str,
        context_window: &str,
    ) -> Result<String, PortError>;

    /// One bounded conversational answer grounded in the supplied context.
    async fn build_conversation(
        &self,
        voice_id: &str,
        speaker_name: &str,
        context_window: &str,
        question: &str,
    ) -> Result<String, PortError>;

    /// Forward one turn to an agent and stream the reply back.
    async fn converse(&self, agent_id: &str, text: &str) -> Result<TextStream, PortError>;

    /// Short-lived signed URL for establishing the duplex audio channel.
    async fn streaming_url(&self, agent_id: &str) -> Result<String, PortError>;

    /// Open a live duplex session for a voice.
    async fn live_session(&self, voice_id: &str) -> Result<LiveSession, PortError>;
}
