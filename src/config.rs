//! Environment configuration.

use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    /// HTTP server bind address
    pub addr: String,
    /// HTTP server port
    pub port: String,
    /// Redis connection URL
    pub redis_url: String,
    /// Transcription API base URL
    pub transcriber_url: String,
    pub transcriber_api_key: String,
    pub transcriber_model: String,
    /// Voice provider API base URL
    pub voice_api_url: String,
    /// Voice provider WebSocket base URL
    pub voice_ws_url: String,
    pub voice_api_key: String,
    /// Per-video question ceiling
    pub max_questions_per_video: u32,
    /// Context window length in seconds
    pub max_window_seconds: f64,
    /// Fast-lane clip length in seconds
    pub instant_clip_seconds: f64,
    /// Voice sample length in seconds
    pub sample_seconds: f64,
    /// Per-collaborator call budget in seconds
    pub collaborator_timeout_seconds: u64,
    /// Extra attempts for idempotent collaborator calls
    pub collaborator_attempts: u32,
    pub worker_count: usize,
    pub session_capacity: usize,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| String::from(default))
}

fn parsed_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            addr: var_or("ADDR", "127.0.0.1"),
            port: var_or("PORT", "3000"),
            redis_url: var_or("REDIS_URL", "redis://127.0.0.1/"),
            transcriber_url: var_or("TRANSCRIBER_URL", "https://api.openai.com"),
            transcriber_api_key: var_or("TRANSCRIBER_API_KEY", ""),
            transcriber_model: var_or("TRANSCRIBER_MODEL", "whisper-1"),
            voice_api_url: var_or("VOICE_API_URL", "https://api.elevenlabs.io"),
            voice_ws_url: var_or("VOICE_WS_URL", "wss://api.elevenlabs.io"),
            voice_api_key: var_or("VOICE_API_KEY", ""),
            max_questions_per_video: parsed_or("MAX_QUESTIONS_PER_VIDEO", 20),
            max_window_seconds: parsed_or("MAX_WINDOW_SECONDS", 120.0),
            instant_clip_seconds: parsed_or("INSTANT_CLIP_SECONDS", 90.0),
            sample_seconds: parsed_or("SAMPLE_SECONDS", 60.0),
            collaborator_timeout_seconds: parsed_or("COLLABORATOR_TIMEOUT_SECONDS", 300),
            collaborator_attempts: parsed_or("COLLABORATOR_ATTEMPTS", 3),
            worker_count: parsed_or("WORKER_COUNT", 4),
            session_capacity: parsed_or(
                "SESSION_CAPACITY",
                crate::domain::session::DEFAULT_SESSION_CAPACITY,
            ),
        }
    }
}
