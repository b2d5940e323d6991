//! Explicit document edits: expand, compress, polish and free-form edit.

use std::sync::Arc;

use domain::{
    Document, DocumentId, DocumentVersion, HandlerLabel, InkwellError, ModelRequest,
    OperationKind, VersionNumber,
};
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

use crate::gateway::GatewayContext;
use crate::versions::{AppendVersion, DocumentVersionStore};

const EDITOR_SYSTEM_PROMPT: &str = "You revise documents. Return only the complete revised \
     document in Markdown, with no preamble or commentary.";

fn operation_prompt(operation: OperationKind) -> &'static str {
    match operation {
        OperationKind::Expand => {
            "Expand the following document. Add depth, examples and supporting detail \
             while keeping its structure and tone."
        }
        OperationKind::Compress => {
            "Condense the following document to its key points. Keep the structure and \
             remove repetition."
        }
        OperationKind::Polish => {
            "Polish the wording of the following document for clarity and flow without \
             changing its meaning."
        }
        OperationKind::Edit | OperationKind::Create => {
            "Revise the following document according to the instruction."
        }
    }
}

/// A requested edit of an existing document.
#[derive(Debug, Clone)]
pub struct EditRequest {
    pub document_id: DocumentId,
    pub operation: OperationKind,
    /// Free-text instruction; recorded as the new version's note.
    pub instruction: String,
    /// Version to revise; the current version when `None`.
    pub target_version: Option<VersionNumber>,
}

/// Result of an edit. A failed invocation carries the base content and no
/// new version.
#[derive(Debug, Clone)]
pub struct EditOutcome {
    pub success: bool,
    pub document: Document,
    pub operation: OperationKind,
    pub base_version: VersionNumber,
    pub version: Option<DocumentVersion>,
    pub content: String,
    pub plain_text_content: String,
    pub error: Option<String>,
}

/// Applies edit operations through the active model backend.
#[derive(Debug, Clone)]
pub struct DocumentEditor {
    gateway: Arc<GatewayContext>,
    documents: Arc<DocumentVersionStore>,
}

impl DocumentEditor {
    pub fn new(gateway: Arc<GatewayContext>, documents: Arc<DocumentVersionStore>) -> Self {
        Self { gateway, documents }
    }

    /// Revises a document version and appends the result as a new version.
    ///
    /// # Errors
    ///
    /// - [`InkwellError::InvalidInput`] for the `create` operation.
    /// - [`InkwellError::DocumentNotFound`] or
    ///   [`InkwellError::DocumentVersionNotFound`] for unknown targets.
    #[instrument(skip_all, fields(document_id = %request.document_id, operation = %request.operation))]
    pub async fn edit(&self, request: &EditRequest) -> Result<EditOutcome, InkwellError> {
        if !OperationKind::EDITS.contains(&request.operation) {
            return Err(InkwellError::InvalidInput {
                reason: format!("'{}' is not an edit operation", request.operation),
            });
        }

        let (document, base) = match request.target_version {
            Some(version) => (
                self.documents.document(request.document_id)?,
                self.documents.version(request.document_id, version)?,
            ),
            None => self.documents.latest(request.document_id)?,
        };

        let handle = self.gateway.active_handle().await;
        let model_request = ModelRequest::new(build_prompt(request, &base.content))
            .with_system(EDITOR_SYSTEM_PROMPT);

        let response = match handle.invoke(&model_request).await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "edit invocation failed, no version written");
                return Ok(EditOutcome {
                    success: false,
                    document,
                    operation: request.operation,
                    base_version: base.version,
                    version: None,
                    content: base.content,
                    plain_text_content: base.plain_text_content,
                    error: Some(InkwellError::from(err).to_string()),
                });
            }
        };

        let mut metadata = Map::new();
        metadata.insert("baseVersion".into(), Value::from(base.version.as_u32()));
        metadata.insert("backend".into(), Value::from(handle.kind().as_str()));
        metadata.insert("model".into(), Value::from(handle.model().as_str()));

        let mut append = AppendVersion::new(
            document.conversation_id,
            HandlerLabel::generalist(),
            response.content,
        )
        .to_document(document.id)
        .with_operation(request.operation)
        .with_metadata(metadata);
        if !request.instruction.trim().is_empty() {
            append = append.with_note(request.instruction.trim());
        }

        let (document, version) = self.documents.append_version(append)?;
        info!(
            document_id = %document.id,
            base_version = %base.version,
            new_version = %version.version,
            "document edited"
        );
        Ok(EditOutcome {
            success: true,
            document,
            operation: request.operation,
            base_version: base.version,
            content: version.content.clone(),
            plain_text_content: version.plain_text_content.clone(),
            version: Some(version),
            error: None,
        })
    }
}

fn build_prompt(request: &EditRequest, content: &str) -> String {
    let mut prompt = operation_prompt(request.operation).to_string();
    let instruction = request.instruction.trim();
    if !instruction.is_empty() {
        prompt.push_str("\n\nInstruction: ");
        prompt.push_str(instruction);
    }
    prompt.push_str("\n\nDocument:\n");
    prompt.push_str(content);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(operation: OperationKind, instruction: &str) -> EditRequest {
        EditRequest {
            document_id: DocumentId::new(1),
            operation,
            instruction: instruction.into(),
            target_version: None,
        }
    }

    #[test]
    fn test_prompt_includes_instruction_and_document() {
        let prompt = build_prompt(&request(OperationKind::Polish, " formal tone "), "Hi all");
        assert!(prompt.starts_with("Polish the wording"));
        assert!(prompt.contains("\n\nInstruction: formal tone\n\n"));
        assert!(prompt.ends_with("Document:\nHi all"));
    }

    #[test]
    fn test_prompt_omits_blank_instruction() {
        let prompt = build_prompt(&request(OperationKind::Compress, "  "), "text");
        assert!(!prompt.contains("Instruction"));
    }
}
