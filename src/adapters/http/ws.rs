//! Live duplex channel: client WebSocket on one side, the provider's
//! streaming session on the other, with a mute gate in between.

use super::AppState;
use crate::domain::error::CoreError;
use crate::ports::cache::VoiceCache;
use crate::ports::media::MediaSource;
use crate::ports::queue::JobStore;
use crate::ports::transcriber::Transcriber;
use crate::ports::voice::{LiveInput, LiveSession, VoiceGateway};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveParams {
    pub voice_id: String,
}

/// Messages a client may send over the live channel. Audio is base64;
/// mute/unmute gate audio forwarding without tearing the session down.
#[derive(Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    Audio {
        audio: String,
        #[serde(default)]
        voice_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Text {
        text: String,
        #[serde(default)]
        voice_id: Option<String>,
    },
    Mute,
    Unmute,
}

/// Upgrade to a WebSocket and bridge it with a fresh provider session.
/// The provider session is opened first so failures surface as a plain
/// HTTP error instead of an immediately-closed socket.
pub async fn live<C, Q, M, T, V>(
    State(state): State<AppState<C, Q, M, T, V>>,
    Query(params): Query<LiveParams>,
    ws: WebSocketUpgrade,
) -> Result<Response, CoreError>
where
    C: VoiceCache,
    Q: JobStore,
    M: MediaSource,
    T: Transcriber,
    V: VoiceGateway,
{
    let session = state.relay.live(&params.voice_id).await?;
    Ok(ws.on_upgrade(move |socket| bridge(socket, session, params.voice_id)))
}

async fn bridge(socket: WebSocket, session: LiveSession, session_voice: String) {
    let LiveSession {
        to_provider,
        mut from_provider,
    } = session;
    let (mut client_tx, mut client_rx) = socket.split();

    // Provider -> client, as JSON text frames.
    let forward = tokio::spawn(async move {
        while let Some(event) = from_provider.recv().await {
            let frame = match serde_json::to_string(&event) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("unserializable live event: {}", e);
                    continue;
                }
            };
            if client_tx.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
        let _ = client_tx.close().await;
    });

    // Client -> provider, honoring the mute gate.
    let mut muted = false;
    while let Some(Ok(message)) = client_rx.next().await {
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::Audio { audio, voice_id }) => {
                check_voice(&session_voice, voice_id.as_deref());
                if muted {
                    continue;
                }
                let bytes = match BASE64.decode(audio.as_bytes()) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!("dropping undecodable audio frame: {}", e);
                        continue;
                    }
                };
                if to_provider.send(LiveInput::Audio(bytes)).await.is_err() {
                    break;
                }
            }
            Ok(ClientMessage::Text { text, voice_id }) => {
                check_voice(&session_voice, voice_id.as_deref());
                if to_provider.send(LiveInput::Text(text)).await.is_err() {
                    break;
                }
            }
            Ok(ClientMessage::Mute) => muted = true,
            Ok(ClientMessage::Unmute) => muted = false,
            Err(e) => warn!("dropping malformed client frame: {}", e),
        }
    }

    // Dropping the sender closes the provider side; stop relaying to
    // a client that is gone.
    drop(to_provider);
    forward.abort();
    debug!("live channel closed");
}

/// The voice is fixed when the session opens; a frame naming another one
/// is forwarded anyway, but flagged.
fn check_voice(session_voice: &str, frame_voice: Option<&str>) {
    if let Some(frame_voice) = frame_voice {
        if frame_voice != session_voice {
            warn!(session_voice, frame_voice, "frame names a different voice");
        }
    }
}
