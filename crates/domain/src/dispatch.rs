//! Dispatch request and result value types.
//!
//! The dispatch engine itself lives in the `engine` crate; this module fixes
//! the shapes that cross its boundary so the version store and transport can
//! depend on the output contract without depending on engine internals.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{ConversationId, DocumentId, HandlerLabel};

/// One inbound request for generated content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequest {
    /// Free-text request.
    pub text: String,
    /// Requested handler. The generalist label means "classify the text".
    pub handler_label: HandlerLabel,
    /// Conversation this request belongs to, if any.
    pub conversation_id: Option<ConversationId>,
    /// Document this request continues, if any.
    pub document_id: Option<DocumentId>,
}

impl DispatchRequest {
    /// Creates a request routed by classification.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            handler_label: HandlerLabel::generalist(),
            conversation_id: None,
            document_id: None,
        }
    }

    /// Pins the request to `label`.
    #[must_use]
    pub fn with_handler(mut self, label: HandlerLabel) -> Self {
        self.handler_label = label;
        self
    }

    /// Attaches the owning conversation.
    #[must_use]
    pub fn with_conversation(mut self, id: ConversationId) -> Self {
        self.conversation_id = Some(id);
        self
    }

    /// Attaches the document being continued.
    #[must_use]
    pub fn with_document(mut self, id: DocumentId) -> Self {
        self.document_id = Some(id);
        self
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Fixed machine-readable failure codes for a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DispatchErrorCode {
    /// Empty or whitespace-only request text.
    #[serde(rename = "invalid input")]
    InvalidInput,
    /// The handler returned an error or panicked.
    #[serde(rename = "invocation failure")]
    InvocationFailure,
    /// The handler did not finish before the dispatch deadline.
    #[serde(rename = "invocation timeout")]
    InvocationTimeout,
}

impl DispatchErrorCode {
    /// The code as reported to callers.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid input",
            Self::InvocationFailure => "invocation failure",
            Self::InvocationTimeout => "invocation timeout",
        }
    }
}

impl std::fmt::Display for DispatchErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure attached to an unsuccessful [`DispatchResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchError {
    /// Fixed failure code.
    pub code: DispatchErrorCode,
    /// Human-readable description.
    pub message: String,
}

impl DispatchError {
    /// Creates an error with the given code and message.
    pub fn new(code: DispatchErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// How the dispatched handler was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentSource {
    /// The caller named a specific handler.
    Explicit,
    /// The classifier chose the handler.
    Classifier,
}

impl IntentSource {
    /// Name recorded in result metadata.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::Classifier => "classifier",
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Normalised outcome of one dispatch. Never an error at the engine boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResult {
    /// Whether content was produced.
    pub success: bool,
    /// Generated content, or a human-readable error summary on failure.
    pub content: String,
    /// Handler that ran (or would have run).
    pub handler: HandlerLabel,
    /// Wall-clock time measured by the engine.
    #[serde(rename = "elapsedSeconds", with = "duration_secs")]
    pub elapsed: Duration,
    /// Handler-specific metadata plus engine annotations.
    pub metadata: Map<String, Value>,
    /// Failure detail when `success` is `false`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<DispatchError>,
}

impl DispatchResult {
    /// A successful result with empty metadata and zero elapsed time.
    pub fn success(handler: HandlerLabel, content: impl Into<String>) -> Self {
        Self {
            success: true,
            content: content.into(),
            handler,
            elapsed: Duration::ZERO,
            metadata: Map::new(),
            error: None,
        }
    }

    /// A failed result whose content is the error summary.
    pub fn failure(handler: HandlerLabel, error: DispatchError) -> Self {
        Self {
            success: false,
            content: error.to_string(),
            handler,
            elapsed: Duration::ZERO,
            metadata: Map::new(),
            error: Some(error),
        }
    }

    /// Adds or replaces one metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Elapsed time in fractional seconds.
    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
