//! HTTP and WebSocket front end for the bridge.

pub mod ws;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures::StreamExt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use sttbridge_backend::SpeechBackend;
use sttbridge_bridge::{BridgeSession, SessionSettings};
use sttbridge_core::config::ServerConfig;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::ws::{WsFrameSource, WsTranscriptSink};

/// Shared by every connection. Holds nothing a session can mutate.
#[derive(Clone)]
pub struct AppState {
    backend: Arc<dyn SpeechBackend>,
    settings: SessionSettings,
    next_session_id: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(backend: Arc<dyn SpeechBackend>, settings: SessionSettings) -> Self {
        Self {
            backend,
            settings,
            next_session_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Fresh session with its own copy of the settings.
    pub fn new_session(&self) -> BridgeSession {
        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        BridgeSession::new(id, Arc::clone(&self.backend), self.settings.clone())
    }
}

pub fn create_router(state: AppState, server: &ServerConfig) -> Router {
    let mut router = Router::new()
        .route("/", get(root))
        .route(&server.ws_path, get(ws_handler));

    if let Some(dir) = &server.static_dir {
        router = router.nest_service("/static", ServeDir::new(dir));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Speech-to-text bridge running" }))
}

async fn ws_handler(State(state): State<AppState>, upgrade: WebSocketUpgrade) -> impl IntoResponse {
    upgrade.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: AppState, socket: WebSocket) {
    let session = state.new_session();
    let session_id = session.id();
    let (sender, receiver) = socket.split();

    let report = session
        .run(
            WsFrameSource::new(receiver, session_id),
            WsTranscriptSink::new(sender),
        )
        .await;

    tracing::debug!(
        session_id,
        chunks = report.chunks_received,
        forwarded = report.egress.forwarded(),
        failed = report.egress.is_failure(),
        "websocket closed"
    );
}
