//! Chat turns: conversation bookkeeping around a dispatch, and persistence
//! of the generated content.

use std::sync::Arc;

use domain::{
    Conversation, DispatchRequest, DispatchResult, Document, DocumentVersion, InkwellError,
    MessageRole,
};
use serde_json::{Map, Value};
use tracing::{info, instrument};

use crate::conversations::ConversationStore;
use crate::dispatch::DispatchEngine;
use crate::versions::{AppendVersion, DocumentVersionStore};

/// Everything produced by one chat turn.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub conversation: Conversation,
    pub result: DispatchResult,
    /// The document written, or `None` when the dispatch failed.
    pub document: Option<Document>,
    pub version: Option<DocumentVersion>,
}

/// Runs chat turns against the dispatch engine and the stores.
#[derive(Debug, Clone)]
pub struct ChatService {
    engine: Arc<DispatchEngine>,
    conversations: Arc<ConversationStore>,
    documents: Arc<DocumentVersionStore>,
}

impl ChatService {
    pub fn new(
        engine: Arc<DispatchEngine>,
        conversations: Arc<ConversationStore>,
        documents: Arc<DocumentVersionStore>,
    ) -> Self {
        Self {
            engine,
            conversations,
            documents,
        }
    }

    pub fn engine(&self) -> &DispatchEngine {
        &self.engine
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    pub fn documents(&self) -> &DocumentVersionStore {
        &self.documents
    }

    /// Runs a whole turn: [`begin`](Self::begin) then [`complete`](Self::complete).
    ///
    /// # Errors
    ///
    /// See [`begin`](Self::begin) and [`complete`](Self::complete).
    pub async fn chat(&self, request: &DispatchRequest) -> Result<ChatOutcome, InkwellError> {
        let conversation = self.begin(request)?;
        self.complete(conversation, request).await
    }

    /// Validates the request, opens (or creates) its conversation and records
    /// the user message.
    ///
    /// # Errors
    ///
    /// - [`InkwellError::InvalidInput`] for blank text.
    /// - [`InkwellError::UnsupportedHandlerLabel`] if no specialist is
    ///   registered under the requested label.
    /// - [`InkwellError::ConversationNotFound`] or
    ///   [`InkwellError::DocumentNotFound`] for unknown ids.
    pub fn begin(&self, request: &DispatchRequest) -> Result<Conversation, InkwellError> {
        if request.text.trim().is_empty() {
            return Err(InkwellError::InvalidInput {
                reason: "message must not be empty".into(),
            });
        }
        if !self.engine.specialists().contains(&request.handler_label) {
            return Err(InkwellError::UnsupportedHandlerLabel {
                label: request.handler_label.to_string(),
            });
        }
        if let Some(id) = request.document_id {
            self.documents.document(id)?;
        }

        let conversation = self
            .conversations
            .open(request.conversation_id, &request.text)?;
        self.conversations.append_message(
            conversation.id,
            MessageRole::User,
            request.text.clone(),
            None,
            Map::new(),
        )?;
        Ok(conversation)
    }

    /// Dispatches the request, records the assistant message and, on
    /// success, appends the content as a document version.
    ///
    /// A request naming a document extends it with an `edit` version;
    /// otherwise a new document is created. A failed dispatch writes nothing.
    ///
    /// # Errors
    ///
    /// Store failures only; dispatch failures are reported in the outcome.
    #[instrument(skip_all, fields(conversation_id = %conversation.id))]
    pub async fn complete(
        &self,
        conversation: Conversation,
        request: &DispatchRequest,
    ) -> Result<ChatOutcome, InkwellError> {
        let mut request = request.clone();
        request.conversation_id = Some(conversation.id);
        let result = self.engine.dispatch(&request).await;

        let mut message_metadata = Map::new();
        message_metadata.insert("elapsedSeconds".into(), Value::from(result.elapsed_seconds()));
        message_metadata.insert("success".into(), Value::from(result.success));
        message_metadata.insert("handler".into(), Value::from(result.handler.as_str()));
        self.conversations.append_message(
            conversation.id,
            MessageRole::Assistant,
            result.content.clone(),
            Some(result.handler.clone()),
            message_metadata,
        )?;

        if !result.success {
            return Ok(ChatOutcome {
                conversation,
                result,
                document: None,
                version: None,
            });
        }

        let mut append = AppendVersion::new(
            conversation.id,
            result.handler.clone(),
            result.content.clone(),
        )
        .with_metadata(result.metadata.clone());
        if let Some(id) = request.document_id {
            append = append.to_document(id);
        }
        let (document, version) = self.documents.append_version(append)?;
        info!(
            document_id = %document.id,
            version = %version.version,
            handler = %result.handler,
            "chat turn persisted"
        );

        Ok(ChatOutcome {
            conversation,
            result,
            document: Some(document),
            version: Some(version),
        })
    }
}
