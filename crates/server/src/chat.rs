//! `POST /chat`.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use crate::dto::{ChatRequestBody, ChatResponseBody};
use crate::error::ApiError;
use crate::AppState;

pub(crate) async fn post_chat(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ChatRequestBody>, JsonRejection>,
) -> Result<Json<ChatResponseBody>, ApiError> {
    let Json(body) = body?;
    let request = body.into_request();
    let outcome = state.chat.chat(&request).await?;
    Ok(Json(ChatResponseBody::from_outcome(
        outcome,
        request.document_id,
    )))
}
