//! Voice provider adapter (ElevenLabs-compatible HTTP + WebSocket API).

use crate::ports::voice::{LiveEvent, LiveInput, LiveSession, TextStream, VoiceGateway};
use crate::ports::PortError;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use futures::{SinkExt, StreamExt, TryStreamExt};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request as WsRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message as WsMessage;

const API_KEY_HEADER: &str = "xi-api-key";

pub struct ElevenVoice {
    http: reqwest::Client,
    base_url: String,
    ws_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct VoiceAddResponse {
    voice_id: String,
}

#[derive(Debug, Deserialize)]
struct AgentCreateResponse {
    agent_id: String,
}

#[derive(Debug, Deserialize)]
struct ConversationResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct SignedUrlResponse {
    signed_url: String,
}

/// Messages the provider pushes over the live socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ProviderEvent {
    UserTranscript { text: String },
    AgentResponse { text: String },
    Audio { audio: String },
    #[serde(other)]
    Ignored,
}

impl ElevenVoice {
    pub fn new(base_url: &str, ws_url: &str, api_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            ws_url: ws_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    async fn clone_from_bytes(
        &self,
        speaker_name: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<String, PortError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("audio/mpeg")?;
        let form = reqwest::multipart::Form::new()
            .text("name", speaker_name.to_string())
            .part("files", part);

        let resp = self
            .http
            .post(format!("{}/v1/voices/add", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .multipart(form)
            .send()
            .await?;
        let resp = error_for_status(resp, "voice clone").await?;
        let parsed: VoiceAddResponse = resp.json().await?;
        Ok(parsed.voice_id)
    }

    /// Live handshake request. The key travels as a header, never in the
    /// URL, so it stays out of proxy and access logs.
    fn live_request(&self, voice_id: &str) -> Result<WsRequest, PortError> {
        let mut request = format!(
            "{}/v1/convai/conversation?voice_id={}",
            self.ws_url, voice_id
        )
        .into_client_request()?;
        request
            .headers_mut()
            .insert(API_KEY_HEADER, HeaderValue::from_str(&self.api_key)?);
        Ok(request)
    }
}

async fn error_for_status(
    resp: reqwest::Response,
    what: &str,
) -> Result<reqwest::Response, PortError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    Err(format!("{} API {}: {}", what, status, body).into())
}

#[async_trait]
impl VoiceGateway for ElevenVoice {
    async fn clone_voice(&self, speaker_name: &str, sample: &Path) -> Result<String, PortError> {
        let bytes = tokio::fs::read(sample).await?;
        let file_name = sample
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("sample.mp3")
            .to_string();
        self.clone_from_bytes(speaker_name, &file_name, bytes).await
    }

    async fn clone_voice_from_url(
        &self,
        speaker_name: &str,
        sample_url: &str,
    ) -> Result<String, PortError> {
        let resp = self.http.get(sample_url).send().await?;
        let resp = error_for_status(resp, "sample download").await?;
        let bytes = resp.bytes().await?.to_vec();
        self.clone_from_bytes(speaker_name, "sample.mp3", bytes)
            .await
    }

    async fn synthesize(&self, voice_id: &str, text: &str) -> Result<Vec<u8>, PortError> {
        let resp = self
            .http
            .post(format!("{}/v1/text-to-speech/{}", self.base_url, voice_id))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&json!({ "text": text, "model_id": "eleven_multilingual_v2" }))
            .send()
            .await?;
        let resp = error_for_status(resp, "speech synthesis").await?;
        Ok(resp.bytes().await?.to_vec())
    }

    async fn create_agent(
        &self,
        speaker_name: &str,
        voice_id: &str,
        context_window: &str,
    ) -> Result<String, PortError> {
        let body = json!({
            "name": speaker_name,
            "conversation_config": {
                "agent": {
                    "prompt": {
                        "prompt": format!(
                            "You are {}, the speaker of a video. Answer in their voice, \
                             grounded only in this transcript excerpt:\n{}",
                            speaker_name, context_window
                        )
                    }
                },
                "tts": { "voice_id": voice_id }
            }
        });
        let resp = self
            .http
            .post(format!("{}/v1/convai/agents/create", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await?;
        let resp = error_for_status(resp, "agent creation").await?;
        let parsed: AgentCreateResponse = resp.json().await?;
        Ok(parsed.agent_id)
    }

    async fn build_conversation(
        &self,
        voice_id: &str,
        speaker_name: &str,
        context_window: &str,
        question: &str,
    ) -> Result<String, PortError> {
        let body = json!({
            "voice_id": voice_id,
            "speaker_name": speaker_name,
            "context": context_window,
            "question": question,
        });
        let resp = self
            .http
            .post(format!("{}/v1/convai/conversation", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await?;
        let resp = error_for_status(resp, "conversation").await?;
        let parsed: ConversationResponse = resp.json().await?;
        Ok(parsed.response)
    }

    async fn converse(&self, agent_id: &str, text: &str) -> Result<TextStream, PortError> {
        let resp = self
            .http
            .post(format!(
                "{}/v1/convai/agents/{}/reply",
                self.base_url, agent_id
            ))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&json!({ "text": text }))
            .send()
            .await?;
        let resp = error_for_status(resp, "agent reply").await?;
        let stream = resp
            .bytes_stream()
            .map_ok(|chunk| String::from_utf8_lossy(&chunk).into_owned())
            .map_err(|e| -> PortError { Box::new(e) });
        Ok(Box::pin(stream))
    }

    async fn streaming_url(&self, agent_id: &str) -> Result<String, PortError> {
        let resp = self
            .http
            .get(format!(
                "{}/v1/convai/conversation/get-signed-url",
                self.base_url
            ))
            .query(&[("agent_id", agent_id)])
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        let resp = error_for_status(resp, "signed url").await?;
        let parsed: SignedUrlResponse = resp.json().await?;
        Ok(parsed.signed_url)
    }

    async fn live_session(&self, voice_id: &str) -> Result<LiveSession, PortError> {
        let request = self.live_request(voice_id)?;
        let (stream, _) = connect_async(request).await?;
        let (mut writer, mut reader) = stream.split();

        let (to_provider_tx, mut to_provider_rx) = mpsc::channel::<LiveInput>(32);
        let (from_provider_tx, from_provider_rx) = mpsc::channel::<LiveEvent>(32);

        // Writer side: closing the sender closes the upstream socket.
        tokio::spawn(async move {
            while let Some(input) = to_provider_rx.recv().await {
                let payload = match input {
                    LiveInput::Audio(bytes) => {
                        json!({ "user_audio_chunk": BASE64.encode(&bytes) })
                    }
                    LiveInput::Text(text) => json!({ "type": "user_message", "text": text }),
                };
                if writer.send(WsMessage::Text(payload.to_string())).await.is_err() {
                    break;
                }
            }
            let _ = writer.close().await;
        });

        tokio::spawn(async move {
            while let Some(Ok(msg)) = reader.next().await {
                let text = match msg {
                    WsMessage::Text(text) => text,
                    WsMessage::Close(_) => break,
                    _ => continue,
                };
                let event = match serde_json::from_str::<ProviderEvent>(&text) {
                    Ok(ProviderEvent::UserTranscript { text }) => {
                        LiveEvent::UserTranscript { text }
                    }
                    Ok(ProviderEvent::AgentResponse { text }) => {
                        LiveEvent::AgentTranscript { text }
                    }
                    Ok(ProviderEvent::Audio { audio }) => LiveEvent::AgentAudio { audio },
                    Ok(ProviderEvent::Ignored) | Err(_) => continue,
                };
                if from_provider_tx.send(event).await.is_err() {
                    break;
                }
            }
        });

        Ok(LiveSession {
            to_provider: to_provider_tx,
            from_provider: from_provider_rx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_events_parse_by_tag() {
        let event: ProviderEvent =
            serde_json::from_str(r#"{"type":"agent_response","text":"hi"}"#).unwrap();
        assert!(matches!(event, ProviderEvent::AgentResponse { text } if text == "hi"));
    }

    #[test]
    fn unknown_provider_events_are_ignored() {
        let event: ProviderEvent =
            serde_json::from_str(r#"{"type":"ping","event_id":7}"#).unwrap();
        assert!(matches!(event, ProviderEvent::Ignored));
    }

    #[test]
    fn live_handshake_keeps_the_key_out_of_the_url() {
        let voice = ElevenVoice::new("https://api.example", "wss://ws.example", "secret-key");
        let request = voice.live_request("voice-1").unwrap();
        assert!(!request.uri().to_string().contains("secret-key"));
        assert!(request.uri().to_string().contains("voice_id=voice-1"));
        assert_eq!(
            request.headers().get(API_KEY_HEADER).unwrap(),
            "secret-key"
        );
    }
}
