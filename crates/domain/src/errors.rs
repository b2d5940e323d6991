//! Top-level error and retry-policy types for the Inkwell domain.
//!
//! [`InkwellError`] is the cross-cutting failure taxonomy. Component-level
//! errors (backend invocation, configuration, rule tables) are defined in their
//! respective modules and convert into it at layer boundaries.
//!
//! [`RetryPolicy`] is a cross-cutting concern: any error type that participates
//! in retry decisions must be able to produce a [`RetryPolicy`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ConversationId, DocumentId, VersionNumber};

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// Returned by backend error types to let the invoking handle decide whether
/// to re-issue a request within its configured retry count.
///
/// ## Rules
///
/// - `Retryable` errors: timeouts, connection failures, HTTP 429 and 5xx.
/// - `NonRetryable` errors: authentication failures, malformed requests,
///   unparseable responses, invalid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    ///
    /// `after` optionally specifies the minimum delay before retrying (e.g.
    /// derived from a `Retry-After` response header).
    Retryable {
        /// Minimum back-off before the next attempt. `None` means apply the
        /// caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried.
    NonRetryable,
}

impl RetryPolicy {
    /// Returns `true` for [`RetryPolicy::Retryable`].
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }
}

// ---------------------------------------------------------------------------
// Domain-level errors
// ---------------------------------------------------------------------------

/// Failure taxonomy shared by every layer.
///
/// Classification, dispatch, and gateway failures are recovered into
/// structured results at their own layer; only persistence lookups
/// (`*NotFound`) are expected to reach the transport as errors.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum InkwellError {
    /// The request text was empty or whitespace only.
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// Human-readable description of what was wrong.
        reason: String,
    },

    /// The caller named a handler label that no specialist is registered under.
    #[error("unsupported handler label '{label}'")]
    UnsupportedHandlerLabel {
        /// The label as supplied by the caller.
        label: String,
    },

    /// The configuration named a backend family that is not registered.
    #[error("unsupported backend kind '{kind}'")]
    UnsupportedBackendKind {
        /// The kind as supplied by the caller.
        kind: String,
    },

    /// A backend configuration failed validation.
    ///
    /// The gateway recovers from this by substituting the stub backend.
    #[error("backend configuration invalid: {reason}")]
    BackendConfigInvalid {
        /// Description of the configuration problem.
        reason: String,
    },

    /// A model invocation failed (network, timeout, or remote error).
    #[error("model invocation failed: {message}")]
    InvocationFailure {
        /// Description of the underlying failure.
        message: String,
    },

    /// No conversation exists with the given id.
    #[error("conversation {id} not found")]
    ConversationNotFound {
        /// The requested conversation.
        id: ConversationId,
    },

    /// No document exists with the given id.
    #[error("document {id} not found")]
    DocumentNotFound {
        /// The requested document.
        id: DocumentId,
    },

    /// The document exists but has no version with the given number.
    #[error("document {id} has no version {version}")]
    DocumentVersionNotFound {
        /// The requested document.
        id: DocumentId,
        /// The requested version number.
        version: VersionNumber,
    },

    /// A version chain disagreed with its document's version counter.
    ///
    /// The store serialises increments per document, so this indicates a
    /// broken invariant rather than an expected race.
    #[error("version conflict on document {id}: expected {expected}, found {found}")]
    VersionConflict {
        /// The document whose chain is inconsistent.
        id: DocumentId,
        /// The version number the store was about to write.
        expected: u32,
        /// The number of versions actually present.
        found: u32,
    },

    /// Startup or runtime configuration is invalid.
    #[error("configuration error: {message}")]
    ConfigurationError {
        /// Description of the configuration problem.
        message: String,
    },
}

impl InkwellError {
    /// Stable snake_case name of the variant, used in structured error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "invalid_input",
            Self::UnsupportedHandlerLabel { .. } => "unsupported_handler_label",
            Self::UnsupportedBackendKind { .. } => "unsupported_backend_kind",
            Self::BackendConfigInvalid { .. } => "backend_config_invalid",
            Self::InvocationFailure { .. } => "invocation_failure",
            Self::ConversationNotFound { .. } => "conversation_not_found",
            Self::DocumentNotFound { .. } => "document_not_found",
            Self::DocumentVersionNotFound { .. } => "document_version_not_found",
            Self::VersionConflict { .. } => "version_conflict",
            Self::ConfigurationError { .. } => "configuration_error",
        }
    }
}
