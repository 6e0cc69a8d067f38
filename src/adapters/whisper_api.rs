//! Transcriber over an OpenAI-compatible transcription HTTP API.

use crate::domain::transcript::TranscriptSegment;
use crate::ports::transcriber::Transcriber;
use crate::ports::PortError;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;

pub struct WhisperApi {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl WhisperApi {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    segments: Vec<ApiSegment>,
}

#[derive(Debug, Deserialize)]
struct ApiSegment {
    start: f64,
    end: f64,
    text: String,
}

#[async_trait]
impl Transcriber for WhisperApi {
    async fn transcribe(&self, audio: &Path) -> Result<Vec<TranscriptSegment>, PortError> {
        let bytes = tokio::fs::read(audio).await?;
        let file_name = audio
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.mp3")
            .to_string();
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/mpeg")?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "segment");

        let resp = self
            .http
            .post(format!("{}/v1/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(format!("transcription API {}: {}", status, body).into());
        }

        let parsed: TranscriptionResponse = resp.json().await?;
        let mut segments: Vec<TranscriptSegment> = parsed
            .segments
            .into_iter()
            .map(|seg| TranscriptSegment {
                start: seg.start,
                end: seg.end,
                text: seg.text,
            })
            .collect();
        if segments.is_empty() && !parsed.text.is_empty() {
            segments.push(TranscriptSegment {
                start: 0.0,
                end: 0.0,
                text: parsed.text,
            });
        }
        segments.sort_by(|a, b| a.start.total_cmp(&b.start));
        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_verbose_json_segments() {
        let json = r#"{
            "text": "hello there",
            "segments": [
                {"start": 1.5, "end": 3.0, "text": " there"},
                {"start": 0.0, "end": 1.5, "text": "hello"}
            ]
        }"#;
        let parsed: TranscriptionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.segments.len(), 2);
        assert_eq!(parsed.text, "hello there");
    }

    #[test]
    fn tolerates_missing_segments() {
        let parsed: TranscriptionResponse =
            serde_json::from_str(r#"{"text": "plain"}"#).unwrap();
        assert!(parsed.segments.is_empty());
    }
}
