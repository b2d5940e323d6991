//! Document routes: explicit edits and version-chain reads.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::Json;
use domain::{DocumentId, DocumentVersion, InkwellError, VersionNumber};

use crate::dto::{DocumentResponse, EditRequestBody, EditResponseBody};
use crate::error::ApiError;
use crate::AppState;

pub(crate) async fn post_edit(
    State(state): State<Arc<AppState>>,
    body: Result<Json<EditRequestBody>, JsonRejection>,
) -> Result<Json<EditResponseBody>, ApiError> {
    let Json(body) = body?;
    let request = body.into_request()?;
    let outcome = state.editor.edit(&request).await?;
    Ok(Json(outcome.into()))
}

pub(crate) async fn get_document(
    State(state): State<Arc<AppState>>,
    path: Result<Path<u64>, PathRejection>,
) -> Result<Json<DocumentResponse>, ApiError> {
    let Path(id) = path?;
    let id = DocumentId::new(id);
    let documents = state.chat.documents();
    let document = documents.document(id)?;
    let versions = documents.versions(id)?;
    Ok(Json(DocumentResponse::new(document, versions)))
}

pub(crate) async fn get_version(
    State(state): State<Arc<AppState>>,
    path: Result<Path<(u64, u32)>, PathRejection>,
) -> Result<Json<DocumentVersion>, ApiError> {
    let Path((id, version)) = path?;
    let version = VersionNumber::new(version).ok_or_else(|| InkwellError::InvalidInput {
        reason: "version must be at least 1".into(),
    })?;
    let found = state
        .chat
        .documents()
        .version(DocumentId::new(id), version)?;
    Ok(Json(found))
}
