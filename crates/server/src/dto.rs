//! Request and response bodies.
//!
//! Field names are camelCase on the wire.

use domain::{
    Conversation, ConversationId, DispatchRequest, Document, DocumentId, DocumentVersion,
    HandlerLabel, InkwellError, Message, OperationKind, VersionNumber,
};
use engine::{ChatOutcome, EditOutcome, EditRequest};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of `POST /chat` and `POST /chat/stream`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequestBody {
    pub message: String,
    #[serde(default)]
    pub handler_label: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<ConversationId>,
    #[serde(default)]
    pub document_id: Option<DocumentId>,
}

impl ChatRequestBody {
    /// Converts the body into a dispatch request.
    ///
    /// A missing or blank `handlerLabel` selects the generalist, which lets
    /// the classifier pick the specialist.
    pub fn into_request(self) -> DispatchRequest {
        let mut request = DispatchRequest::new(self.message);
        if let Some(label) = self.handler_label.and_then(HandlerLabel::new) {
            request = request.with_handler(label);
        }
        if let Some(id) = self.conversation_id {
            request = request.with_conversation(id);
        }
        if let Some(id) = self.document_id {
            request = request.with_document(id);
        }
        request
    }
}

/// Response of `POST /chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponseBody {
    pub conversation_id: ConversationId,
    pub document_id: Option<DocumentId>,
    pub version: Option<VersionNumber>,
    pub content: String,
    pub plain_text_content: String,
    pub handler_label: HandlerLabel,
    pub success: bool,
    pub elapsed_seconds: f64,
    pub metadata: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatResponseBody {
    /// `requested_document` is echoed back when the dispatch failed.
    pub fn from_outcome(outcome: ChatOutcome, requested_document: Option<DocumentId>) -> Self {
        let ChatOutcome {
            conversation,
            result,
            document,
            version,
        } = outcome;
        let plain_text_content = match &version {
            Some(version) => version.plain_text_content.clone(),
            None => domain::to_plain_text(&result.content),
        };
        Self {
            conversation_id: conversation.id,
            document_id: document.map(|d| d.id).or(requested_document),
            version: version.map(|v| v.version),
            elapsed_seconds: result.elapsed_seconds(),
            error: result.error.map(|e| e.to_string()),
            content: result.content,
            plain_text_content,
            handler_label: result.handler,
            success: result.success,
            metadata: result.metadata,
        }
    }
}

/// Body of `POST /documents/edit`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditRequestBody {
    pub document_id: DocumentId,
    pub operation: String,
    #[serde(default)]
    pub instruction: String,
    #[serde(default)]
    pub target_version: Option<u32>,
}

impl EditRequestBody {
    /// Validates the operation name and target version.
    ///
    /// # Errors
    ///
    /// [`InkwellError::InvalidInput`] for an unknown operation or a target
    /// version of zero.
    pub fn into_request(self) -> Result<EditRequest, InkwellError> {
        let operation: OperationKind = self
            .operation
            .trim()
            .to_ascii_lowercase()
            .parse()
            .map_err(|reason| InkwellError::InvalidInput { reason })?;
        let target_version = match self.target_version {
            Some(raw) => Some(VersionNumber::new(raw).ok_or_else(|| {
                InkwellError::InvalidInput {
                    reason: "targetVersion must be at least 1".into(),
                }
            })?),
            None => None,
        };
        Ok(EditRequest {
            document_id: self.document_id,
            operation,
            instruction: self.instruction,
            target_version,
        })
    }
}

/// Response of `POST /documents/edit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditResponseBody {
    pub success: bool,
    pub document_id: DocumentId,
    pub new_version: Option<VersionNumber>,
    pub operation: OperationKind,
    pub content: String,
    pub plain_text_content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<EditOutcome> for EditResponseBody {
    fn from(outcome: EditOutcome) -> Self {
        Self {
            success: outcome.success,
            document_id: outcome.document.id,
            new_version: outcome.version.map(|v| v.version),
            operation: outcome.operation,
            content: outcome.content,
            plain_text_content: outcome.plain_text_content,
            error: outcome.error,
        }
    }
}

/// Response of `GET /documents/:id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    #[serde(flatten)]
    pub document: Document,
    /// Plain text of the current version.
    pub plain_text_content: String,
    pub versions: Vec<DocumentVersion>,
}

impl DocumentResponse {
    pub fn new(document: Document, versions: Vec<DocumentVersion>) -> Self {
        let plain_text_content = versions
            .iter()
            .find(|v| v.version == document.current_version)
            .map(|v| v.plain_text_content.clone())
            .unwrap_or_default();
        Self {
            document,
            plain_text_content,
            versions,
        }
    }
}

/// Response of `GET /conversations/:id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDetail {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub messages: Vec<Message>,
    pub documents: Vec<Document>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_body_defaults_to_generalist() {
        let body: ChatRequestBody = serde_json::from_value(json!({"message": "hi"})).unwrap();
        let request = body.into_request();
        assert!(request.handler_label.is_generalist());
        assert_eq!(request.conversation_id, None);
    }

    #[test]
    fn test_chat_body_blank_label_is_generalist() {
        let body: ChatRequestBody =
            serde_json::from_value(json!({"message": "hi", "handlerLabel": "  ", "documentId": 3}))
                .unwrap();
        let request = body.into_request();
        assert!(request.handler_label.is_generalist());
        assert_eq!(request.document_id, Some(DocumentId::new(3)));
    }

    #[test]
    fn test_edit_body_parses_operation_case_insensitively() {
        let body: EditRequestBody =
            serde_json::from_value(json!({"documentId": 1, "operation": "Expand"})).unwrap();
        let request = body.into_request().unwrap();
        assert_eq!(request.operation, OperationKind::Expand);
        assert_eq!(request.instruction, "");
        assert_eq!(request.target_version, None);
    }

    #[test]
    fn test_edit_body_rejects_unknown_operation_and_zero_version() {
        let body: EditRequestBody =
            serde_json::from_value(json!({"documentId": 1, "operation": "rewrite"})).unwrap();
        assert!(matches!(
            body.into_request(),
            Err(InkwellError::InvalidInput { .. })
        ));

        let body: EditRequestBody = serde_json::from_value(
            json!({"documentId": 1, "operation": "polish", "targetVersion": 0}),
        )
        .unwrap();
        assert!(matches!(
            body.into_request(),
            Err(InkwellError::InvalidInput { .. })
        ));
    }
}
