//! Vocero server binary.
//!
//! Wires up:
//! - Redis-backed voice cache and job store
//! - Subprocess media source (yt-dlp / ffmpeg)
//! - Transcription and voice provider API clients
//! - Derivation workers and the HTTP layer

use std::sync::Arc;
use std::time::Duration;

use vocero::adapters::eleven::ElevenVoice;
use vocero::adapters::http::{router, AppState};
use vocero::adapters::media::{SubprocessMediaSource, YtDlpRunner};
use vocero::adapters::redis::RedisStore;
use vocero::adapters::whisper_api::WhisperApi;
use vocero::application::pipeline::{PipelineLimits, PipelineService};
use vocero::application::relay::RelayService;
use vocero::application::worker::WorkerService;
use vocero::config::Config;
use vocero::domain::session::SessionStore;

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    tracing_subscriber::fmt::init();

    // 1. Adapters
    let store = match RedisStore::new(&config.redis_url) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!("Failed to connect to Redis: {:?}", e);
            std::process::exit(1);
        }
    };
    let media = Arc::new(SubprocessMediaSource::new(YtDlpRunner));
    let transcriber = Arc::new(WhisperApi::new(
        &config.transcriber_url,
        &config.transcriber_api_key,
        &config.transcriber_model,
    ));
    let voice = Arc::new(ElevenVoice::new(
        &config.voice_api_url,
        &config.voice_ws_url,
        &config.voice_api_key,
    ));

    // 2. Application Services
    let sessions = Arc::new(SessionStore::new(config.session_capacity));
    let pipeline = Arc::new(PipelineService::new(
        Arc::clone(&store),
        media,
        transcriber,
        Arc::clone(&voice),
        Arc::clone(&sessions),
        PipelineLimits::from_config(&config),
    ));
    let relay = Arc::new(RelayService::new(
        voice,
        sessions,
        config.max_questions_per_video,
        Duration::from_secs(config.collaborator_timeout_seconds),
    ));

    // 3. Start Workers
    let worker_service = Arc::new(WorkerService::new(Arc::clone(&store), Arc::clone(&pipeline)));
    for i in 0..config.worker_count {
        let w = worker_service.clone();
        tokio::spawn(async move {
            w.run_worker_loop(i).await;
        });
    }
    println!("Started {} derivation workers", config.worker_count);

    // 4. HTTP Layer
    let app = router(AppState {
        pipeline,
        relay,
        jobs: store,
    });

    // 5. Start Server
    let listener = tokio::net::TcpListener::bind(format!("{}:{}", config.addr, config.port))
        .await
        .expect("Failed to bind TCP listener");
    println!("Listening at {}:{}", config.addr, config.port);
    axum::serve(listener, app)
        .await
        .expect("Server failed to start");
}
