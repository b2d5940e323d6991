//! Inkwell HTTP transport.
//!
//! Exposes the orchestration layer over axum:
//!
//! | Route | Handler |
//! |-------|---------|
//! | `POST /chat` | one chat turn, JSON response |
//! | `POST /chat/stream` | one chat turn as server-sent events |
//! | `POST /documents/edit` | expand, compress, polish or edit a document |
//! | `GET /documents/:id` | document with its version chain |
//! | `GET /documents/:id/versions/:n` | one version |
//! | `GET /conversations`, `GET /conversations/:id` | conversation log |
//! | `GET /handlers` | registered specialists |
//! | `GET /backends/health`, `/backends/usage`, `/backends/models` | gateway state |
//! | `GET /health` | liveness |
//!
//! ## Architectural Layer
//!
//! **Transport.** Request decoding, response shaping and error → status
//! mapping only. Every body uses camelCase field names and every error is
//! `{"error": <message>, "code": <snake_case kind>}`.

use std::future::Future;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use engine::{ChatService, ConversationStore, DispatchEngine, DocumentEditor, DocumentVersionStore};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod chat;
mod documents;
pub mod dto;
mod error;
mod stream;
mod system;

pub use error::ApiError;
pub use stream::{StreamCompletion, StreamEvent, STREAM_CHUNK_CHARS};

/// Shared state handed to every route.
#[derive(Debug, Clone)]
pub struct AppState {
    pub chat: ChatService,
    pub editor: DocumentEditor,
}

impl AppState {
    /// Wires the chat service and the editor over shared stores.
    pub fn new(
        engine: Arc<DispatchEngine>,
        conversations: Arc<ConversationStore>,
        documents: Arc<DocumentVersionStore>,
    ) -> Self {
        let editor = DocumentEditor::new(Arc::clone(engine.gateway()), Arc::clone(&documents));
        Self {
            chat: ChatService::new(engine, conversations, documents),
            editor,
        }
    }
}

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/chat", post(chat::post_chat))
        .route("/chat/stream", post(stream::post_chat_stream))
        .route("/documents/edit", post(documents::post_edit))
        .route("/documents/:id", get(documents::get_document))
        .route("/documents/:id/versions/:version", get(documents::get_version))
        .route("/conversations", get(system::list_conversations))
        .route("/conversations/:id", get(system::get_conversation))
        .route("/handlers", get(system::list_handlers))
        .route("/backends/health", get(system::backend_health))
        .route("/backends/usage", get(system::backend_usage))
        .route("/backends/models", get(system::backend_models))
        .route("/health", get(system::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves the router on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// I/O errors from the listener.
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
