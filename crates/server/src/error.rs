//! Error → HTTP status mapping.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use domain::InkwellError;
use engine::StoreError;
use serde_json::json;
use tracing::warn;

/// Transport wrapper around [`InkwellError`].
///
/// Every variant renders as `{"error": <message>, "code": <kind>}`.
#[derive(Debug)]
pub struct ApiError(pub InkwellError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            InkwellError::InvalidInput { .. }
            | InkwellError::UnsupportedHandlerLabel { .. }
            | InkwellError::UnsupportedBackendKind { .. }
            | InkwellError::ConfigurationError { .. } => StatusCode::BAD_REQUEST,
            InkwellError::ConversationNotFound { .. }
            | InkwellError::DocumentNotFound { .. }
            | InkwellError::DocumentVersionNotFound { .. } => StatusCode::NOT_FOUND,
            InkwellError::VersionConflict { .. } => StatusCode::CONFLICT,
            InkwellError::InvocationFailure { .. } | InkwellError::BackendConfigInvalid { .. } => {
                StatusCode::BAD_GATEWAY
            }
        }
    }
}

impl From<InkwellError> for ApiError {
    fn from(err: InkwellError) -> Self {
        Self(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self(err.into())
    }
}

fn invalid(reason: String) -> ApiError {
    ApiError(InkwellError::InvalidInput { reason })
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        invalid(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        invalid(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        invalid(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(code = self.0.code(), error = %self.0, "request failed");
        }
        let body = json!({
            "error": self.0.to_string(),
            "code": self.0.code(),
        });
        (status, Json(body)).into_response()
    }
}
