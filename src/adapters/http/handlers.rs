//! Request handlers. Thin: parse, delegate to a service, shape the reply.

use super::AppState;
use crate::application::pipeline::InstantContext;
use crate::domain::error::CoreError;
use crate::domain::jobs::{JobOutcome, JobRecord, JobState};
use crate::domain::video::VideoId;
use crate::ports::cache::VoiceCache;
use crate::ports::media::MediaSource;
use crate::ports::queue::JobStore;
use crate::ports::transcriber::Transcriber;
use crate::ports::voice::VoiceGateway;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareContextRequest {
    pub video_url: String,
    #[serde(default)]
    pub speaker_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareContextResponse {
    pub job_id: String,
}

/// Accept a derivation request and hand it to the queue; the heavy work
/// happens on a worker.
pub async fn prepare_context<C, Q, M, T, V>(
    State(state): State<AppState<C, Q, M, T, V>>,
    Json(req): Json<PrepareContextRequest>,
) -> Result<(StatusCode, Json<PrepareContextResponse>), CoreError>
where
    C: VoiceCache,
    Q: JobStore,
    M: MediaSource,
    T: Transcriber,
    V: VoiceGateway,
{
    let video_id = VideoId::parse(&req.video_url)?;
    let speaker_name = req.speaker_name.as_deref().unwrap_or("The speaker");
    let record = JobRecord::new(video_id.as_str(), &req.video_url, speaker_name);
    let job_id = record.id.clone();
    state
        .jobs
        .enqueue(record)
        .await
        .map_err(|e| CoreError::internal("job enqueue", e))?;
    info!(%job_id, video_id = %video_id, "derivation job accepted");
    Ok((StatusCode::ACCEPTED, Json(PrepareContextResponse { job_id })))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub id: String,
    pub state: JobState,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_value: Option<JobOutcome>,
}

pub async fn job_status<C, Q, M, T, V>(
    State(state): State<AppState<C, Q, M, T, V>>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusResponse>, CoreError>
where
    C: VoiceCache,
    Q: JobStore,
    M: MediaSource,
    T: Transcriber,
    V: VoiceGateway,
{
    let record = state
        .jobs
        .load(&job_id)
        .await
        .map_err(|e| CoreError::internal("job lookup", e))?
        .ok_or_else(|| CoreError::NotFound(format!("no job with id {}", job_id)))?;
    Ok(Json(JobStatusResponse {
        id: record.id,
        state: record.state,
        progress: record.progress,
        return_value: record.result,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstantContextRequest {
    pub video_url: String,
    pub speaker_name: String,
    pub paused_time: f64,
}

pub async fn instant_context<C, Q, M, T, V>(
    State(state): State<AppState<C, Q, M, T, V>>,
    Json(req): Json<InstantContextRequest>,
) -> Result<Json<InstantContext>, CoreError>
where
    C: VoiceCache,
    Q: JobStore,
    M: MediaSource,
    T: Transcriber,
    V: VoiceGateway,
{
    let context = state
        .pipeline
        .instant_context(&req.video_url, req.paused_time, &req.speaker_name)
        .await?;
    Ok(Json(context))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneVoiceRequest {
    pub video_id: String,
    pub speaker_name: String,
    pub sample_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneVoiceResponse {
    pub video_id: String,
    pub voice_id: String,
    pub message: String,
}

pub async fn clone_voice<C, Q, M, T, V>(
    State(state): State<AppState<C, Q, M, T, V>>,
    Json(req): Json<CloneVoiceRequest>,
) -> Result<Json<CloneVoiceResponse>, CoreError>
where
    C: VoiceCache,
    Q: JobStore,
    M: MediaSource,
    T: Transcriber,
    V: VoiceGateway,
{
    let video_id = VideoId::parse(&req.video_id)?;
    let outcome = state
        .pipeline
        .clone_from_sample_url(video_id.as_str(), &req.speaker_name, &req.sample_url)
        .await?;
    let message = if outcome.cache_hit {
        "voice already cloned for this video".to_string()
    } else {
        "voice cloned".to_string()
    };
    Ok(Json(CloneVoiceResponse {
        video_id: video_id.to_string(),
        voice_id: outcome.voice_id,
        message,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextWindowRequest {
    pub video_id: String,
    pub paused_time: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextWindowResponse {
    pub video_id: String,
    pub context_window: String,
}

pub async fn get_context_window<C, Q, M, T, V>(
    State(state): State<AppState<C, Q, M, T, V>>,
    Json(req): Json<ContextWindowRequest>,
) -> Result<Json<ContextWindowResponse>, CoreError>
where
    C: VoiceCache,
    Q: JobStore,
    M: MediaSource,
    T: Transcriber,
    V: VoiceGateway,
{
    let video_id = VideoId::parse(&req.video_id)?;
    let window = state
        .pipeline
        .context_window_for(video_id.as_str(), req.paused_time)?;
    Ok(Json(ContextWindowResponse {
        video_id: video_id.to_string(),
        context_window: window,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildConversationRequest {
    pub video_id: String,
    pub voice_id: String,
    pub speaker_name: String,
    pub context_window: String,
    pub user_question_text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildConversationResponse {
    pub conversation: String,
}

pub async fn build_conversation<C, Q, M, T, V>(
    State(state): State<AppState<C, Q, M, T, V>>,
    Json(req): Json<BuildConversationRequest>,
) -> Result<Json<BuildConversationResponse>, CoreError>
where
    C: VoiceCache,
    Q: JobStore,
    M: MediaSource,
    T: Transcriber,
    V: VoiceGateway,
{
    let video_id = VideoId::parse(&req.video_id)?;
    let conversation = state
        .relay
        .build_conversation(
            video_id.as_str(),
            &req.voice_id,
            &req.speaker_name,
            &req.context_window,
            &req.user_question_text,
        )
        .await?;
    Ok(Json(BuildConversationResponse { conversation }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAgentRequest {
    pub video_id: String,
    pub speaker_name: String,
}

#[derive(Debug, Serialize)]
pub struct CreateAgentResponse {
    pub agent_id: String,
}

pub async fn create_agent<C, Q, M, T, V>(
    State(state): State<AppState<C, Q, M, T, V>>,
    Json(req): Json<CreateAgentRequest>,
) -> Result<Json<CreateAgentResponse>, CoreError>
where
    C: VoiceCache,
    Q: JobStore,
    M: MediaSource,
    T: Transcriber,
    V: VoiceGateway,
{
    let video_id = VideoId::parse(&req.video_id)?;
    let agent_id = state
        .pipeline
        .create_agent(video_id.as_str(), &req.speaker_name)
        .await?;
    Ok(Json(CreateAgentResponse { agent_id }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamConversationRequest {
    pub video_id: String,
    pub text: String,
}

/// Relay the agent reply chunk by chunk as it arrives from the provider.
pub async fn stream_conversation<C, Q, M, T, V>(
    State(state): State<AppState<C, Q, M, T, V>>,
    Json(req): Json<StreamConversationRequest>,
) -> Result<Response, CoreError>
where
    C: VoiceCache,
    Q: JobStore,
    M: MediaSource,
    T: Transcriber,
    V: VoiceGateway,
{
    let video_id = VideoId::parse(&req.video_id)?;
    let stream = state.relay.converse(video_id.as_str(), &req.text).await?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(stream),
    )
        .into_response())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingUrlResponse {
    pub url: String,
}

pub async fn streaming_url<C, Q, M, T, V>(
    State(state): State<AppState<C, Q, M, T, V>>,
    Path(agent_id): Path<String>,
) -> Result<Json<StreamingUrlResponse>, CoreError>
where
    C: VoiceCache,
    Q: JobStore,
    M: MediaSource,
    T: Transcriber,
    V: VoiceGateway,
{
    let url = state.relay.streaming_url(&agent_id).await?;
    Ok(Json(StreamingUrlResponse { url }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakRequest {
    pub voice_id: String,
    pub text: String,
}

/// Plain synthesis: MPEG audio bytes, no agent, no quota.
pub async fn speak<C, Q, M, T, V>(
    State(state): State<AppState<C, Q, M, T, V>>,
    Json(req): Json<SpeakRequest>,
) -> Result<Response, CoreError>
where
    C: VoiceCache,
    Q: JobStore,
    M: MediaSource,
    T: Transcriber,
    V: VoiceGateway,
{
    let audio = state.relay.speak(&req.voice_id, &req.text).await?;
    Ok(([(header::CONTENT_TYPE, "audio/mpeg")], audio).into_response())
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
