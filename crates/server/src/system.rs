//! Read-only routes: handlers, conversations, backend state and liveness.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use domain::{BackendKind, Conversation, ConversationId, HealthReport, InkwellError, UsageStats};
use engine::SpecialistInfo;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::dto::ConversationDetail;
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub(crate) struct ModelsQuery {
    kind: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ModelsResponse {
    backend: BackendKind,
    models: Vec<String>,
}

pub(crate) async fn list_handlers(State(state): State<Arc<AppState>>) -> Json<Vec<SpecialistInfo>> {
    Json(state.chat.engine().specialists().infos())
}

pub(crate) async fn list_conversations(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<Conversation>> {
    Json(state.chat.conversations().list())
}

pub(crate) async fn get_conversation(
    State(state): State<Arc<AppState>>,
    path: Result<Path<u64>, PathRejection>,
) -> Result<Json<ConversationDetail>, ApiError> {
    let Path(id) = path?;
    let id = ConversationId::new(id);
    let conversations = state.chat.conversations();
    Ok(Json(ConversationDetail {
        conversation: conversations.get(id)?,
        messages: conversations.messages(id)?,
        documents: state.chat.documents().documents_for_conversation(id),
    }))
}

pub(crate) async fn backend_health(State(state): State<Arc<AppState>>) -> Json<HealthReport> {
    Json(state.chat.engine().gateway().health_check().await)
}

pub(crate) async fn backend_usage(
    State(state): State<Arc<AppState>>,
) -> Json<BTreeMap<BackendKind, UsageStats>> {
    Json(state.chat.engine().gateway().usage().snapshot_all())
}

pub(crate) async fn backend_models(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ModelsQuery>, QueryRejection>,
) -> Result<Json<ModelsResponse>, ApiError> {
    let Query(query) = query?;
    let gateway = state.chat.engine().gateway();
    let backend = match query.kind.as_deref() {
        Some(raw) => raw
            .parse::<BackendKind>()
            .map_err(|_| InkwellError::UnsupportedBackendKind {
                kind: raw.to_string(),
            })?,
        None => gateway.active_config().kind(),
    };
    let models = gateway.list_models(backend).await;
    Ok(Json(ModelsResponse { backend, models }))
}

pub(crate) async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let engine = state.chat.engine();
    Json(json!({
        "status": "ok",
        "backend": engine.gateway().active_config().kind(),
        "handlers": engine.specialists().len(),
    }))
}
