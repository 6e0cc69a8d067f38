//! Inbound HTTP adapter: axum router, request handlers, duplex WebSocket.

mod error;
pub mod handlers;
pub mod ws;

use crate::application::pipeline::PipelineService;
use crate::application::relay::RelayService;
use crate::ports::cache::VoiceCache;
use crate::ports::media::MediaSource;
use crate::ports::queue::JobStore;
use crate::ports::transcriber::Transcriber;
use crate::ports::voice::VoiceGateway;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

pub struct AppState<C, Q, M, T, V> {
    pub pipeline: Arc<PipelineService<C, M, T, V>>,
    pub relay: Arc<RelayService<V>>,
    pub jobs: Arc<Q>,
}

impl<C, Q, M, T, V> Clone for AppState<C, Q, M, T, V> {
    fn clone(&self) -> Self {
        Self {
            pipeline: Arc::clone(&self.pipeline),
            relay: Arc::clone(&self.relay),
            jobs: Arc::clone(&self.jobs),
        }
    }
}

pub fn router<C, Q, M, T, V>(state: AppState<C, Q, M, T, V>) -> Router
where
    C: VoiceCache + 'static,
    Q: JobStore + 'static,
    M: MediaSource + 'static,
    T: Transcriber + 'static,
    V: VoiceGateway + 'static,
{
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let routes: Router<AppState<C, Q, M, T, V>> = Router::new()
        .route(
            "/prepare-context",
            post(handlers::prepare_context::<C, Q, M, T, V>),
        )
        .route("/status/:job_id", get(handlers::job_status::<C, Q, M, T, V>))
        .route(
            "/instant-context",
            post(handlers::instant_context::<C, Q, M, T, V>),
        )
        .route("/clone-voice", post(handlers::clone_voice::<C, Q, M, T, V>))
        .route(
            "/get-context-window",
            post(handlers::get_context_window::<C, Q, M, T, V>),
        )
        .route(
            "/build-conversation",
            post(handlers::build_conversation::<C, Q, M, T, V>),
        )
        .route("/create-agent", post(handlers::create_agent::<C, Q, M, T, V>))
        .route(
            "/stream-conversation",
            post(handlers::stream_conversation::<C, Q, M, T, V>),
        )
        .route(
            "/streaming-url/:agent_id",
            get(handlers::streaming_url::<C, Q, M, T, V>),
        )
        .route("/speak", post(handlers::speak::<C, Q, M, T, V>))
        .route("/live", get(ws::live::<C, Q, M, T, V>))
        .route("/health", get(handlers::health));

    routes.with_state(state).layer(cors)
}
