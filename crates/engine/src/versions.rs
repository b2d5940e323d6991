//! Append-only, versioned document storage.
//!
//! Each document owns a chain of immutable [`DocumentVersion`]s numbered
//! `1..=current_version`. The store is the only writer of `current_version`:
//! an append takes the document's entry guard, checks the chain against the
//! counter, pushes the next version and bumps the counter before releasing
//! the guard. Appends to different documents never contend.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use domain::{
    derive_title, detect_document_type, to_plain_text, ConversationId, Document, DocumentId,
    DocumentVersion, HandlerLabel, InkwellError, OperationKind, Timestamp, VersionNumber,
};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error, info};

/// Failure of a document or conversation store operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("conversation {id} not found")]
    ConversationNotFound { id: ConversationId },

    #[error("document {id} not found")]
    DocumentNotFound { id: DocumentId },

    #[error("document {id} has no version {version}")]
    VersionNotFound {
        id: DocumentId,
        version: VersionNumber,
    },

    /// The chain length disagreed with the document's version counter.
    #[error("version conflict on document {id}: expected {expected}, found {found}")]
    VersionConflict {
        id: DocumentId,
        expected: u32,
        found: u32,
    },
}

impl From<StoreError> for InkwellError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ConversationNotFound { id } => InkwellError::ConversationNotFound { id },
            StoreError::DocumentNotFound { id } => InkwellError::DocumentNotFound { id },
            StoreError::VersionNotFound { id, version } => {
                InkwellError::DocumentVersionNotFound { id, version }
            }
            StoreError::VersionConflict { id, expected, found } => {
                InkwellError::VersionConflict { id, expected, found }
            }
        }
    }
}

/// Input to [`DocumentVersionStore::append_version`].
#[derive(Debug, Clone)]
pub struct AppendVersion {
    /// Existing document to extend; `None` creates a new document.
    pub document_id: Option<DocumentId>,
    /// Owning conversation of a new document. Ignored for existing ones.
    pub conversation_id: ConversationId,
    /// Raw rich-text content.
    pub content: String,
    /// Handler that produced the content.
    pub origin: HandlerLabel,
    /// Operation for an existing document; defaults to `edit`.
    pub operation: Option<OperationKind>,
    pub note: Option<String>,
    pub metadata: Map<String, Value>,
}

impl AppendVersion {
    /// Content for a new document in `conversation_id`.
    pub fn new(
        conversation_id: ConversationId,
        origin: HandlerLabel,
        content: impl Into<String>,
    ) -> Self {
        Self {
            document_id: None,
            conversation_id,
            content: content.into(),
            origin,
            operation: None,
            note: None,
            metadata: Map::new(),
        }
    }

    /// Targets an existing document instead of creating one.
    #[must_use]
    pub fn to_document(mut self, id: DocumentId) -> Self {
        self.document_id = Some(id);
        self
    }

    #[must_use]
    pub fn with_operation(mut self, operation: OperationKind) -> Self {
        self.operation = Some(operation);
        self
    }

    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Debug)]
struct DocumentChain {
    document: Document,
    versions: Vec<DocumentVersion>,
}

/// In-memory document store.
#[derive(Debug)]
pub struct DocumentVersionStore {
    next_id: AtomicU64,
    chains: DashMap<DocumentId, DocumentChain>,
    by_conversation: DashMap<ConversationId, Vec<DocumentId>>,
}

impl Default for DocumentVersionStore {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            chains: DashMap::new(),
            by_conversation: DashMap::new(),
        }
    }
}

impl DocumentVersionStore {
    /// Creates an empty store whose first document id is 1.
    ///
    /// ```
    /// let store = engine::DocumentVersionStore::new();
    /// assert!(store.is_empty());
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends content as the next version of a document.
    ///
    /// Without a document id a new document is created at version 1 with
    /// operation `create`, a derived title and a derived type. With one, the
    /// document's counter is incremented by exactly one and the new version
    /// is written with the requested operation (`edit` by default).
    ///
    /// # Errors
    ///
    /// - [`StoreError::DocumentNotFound`] if the target document is missing.
    /// - [`StoreError::VersionConflict`] if the chain and counter disagree.
    pub fn append_version(
        &self,
        append: AppendVersion,
    ) -> Result<(Document, DocumentVersion), StoreError> {
        match append.document_id {
            None => Ok(self.create(append)),
            Some(id) => self.extend(id, append),
        }
    }

    fn create(&self, append: AppendVersion) -> (Document, DocumentVersion) {
        let id = DocumentId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let now = Timestamp::now();
        let document = Document {
            id,
            conversation_id: append.conversation_id,
            title: derive_title(&append.content),
            document_type: detect_document_type(&append.origin, &append.content),
            current_version: VersionNumber::FIRST,
            created_at: now,
            updated_at: now,
        };
        let version = DocumentVersion {
            document_id: id,
            version: VersionNumber::FIRST,
            plain_text_content: to_plain_text(&append.content),
            content: append.content,
            operation: OperationKind::Create,
            note: append.note,
            metadata: append.metadata,
            created_at: now,
        };

        self.chains.insert(
            id,
            DocumentChain {
                document: document.clone(),
                versions: vec![version.clone()],
            },
        );
        self.by_conversation
            .entry(document.conversation_id)
            .or_default()
            .push(id);
        info!(
            document_id = %id,
            conversation_id = %document.conversation_id,
            title = %document.title,
            "document created"
        );
        (document, version)
    }

    fn extend(
        &self,
        id: DocumentId,
        append: AppendVersion,
    ) -> Result<(Document, DocumentVersion), StoreError> {
        let plain_text_content = to_plain_text(&append.content);
        let mut chain = self
            .chains
            .get_mut(&id)
            .ok_or(StoreError::DocumentNotFound { id })?;

        let current = chain.document.current_version;
        let next = current.next();
        let found = u32::try_from(chain.versions.len()).unwrap_or(u32::MAX);
        if found != current.as_u32() {
            error!(document_id = %id, expected = next.as_u32(), found, "version chain is inconsistent");
            return Err(StoreError::VersionConflict {
                id,
                expected: next.as_u32(),
                found,
            });
        }

        let operation = append
            .operation
            .filter(|op| *op != OperationKind::Create)
            .unwrap_or(OperationKind::Edit);
        let now = Timestamp::now();
        let version = DocumentVersion {
            document_id: id,
            version: next,
            content: append.content,
            plain_text_content,
            operation,
            note: append.note,
            metadata: append.metadata,
            created_at: now,
        };
        chain.versions.push(version.clone());
        chain.document.current_version = next;
        chain.document.updated_at = now;
        debug!(document_id = %id, version = %next, operation = %operation, "version appended");
        Ok((chain.document.clone(), version))
    }

    /// # Errors
    ///
    /// [`StoreError::DocumentNotFound`] if `id` is unknown.
    pub fn document(&self, id: DocumentId) -> Result<Document, StoreError> {
        self.chains
            .get(&id)
            .map(|chain| chain.document.clone())
            .ok_or(StoreError::DocumentNotFound { id })
    }

    /// One version of a document.
    ///
    /// # Errors
    ///
    /// [`StoreError::DocumentNotFound`] or [`StoreError::VersionNotFound`].
    pub fn version(
        &self,
        id: DocumentId,
        version: VersionNumber,
    ) -> Result<DocumentVersion, StoreError> {
        let chain = self
            .chains
            .get(&id)
            .ok_or(StoreError::DocumentNotFound { id })?;
        let index = (version.as_u32() - 1) as usize;
        chain
            .versions
            .get(index)
            .cloned()
            .ok_or(StoreError::VersionNotFound { id, version })
    }

    /// The document together with its latest version.
    ///
    /// # Errors
    ///
    /// [`StoreError::DocumentNotFound`] if `id` is unknown.
    pub fn latest(&self, id: DocumentId) -> Result<(Document, DocumentVersion), StoreError> {
        let chain = self
            .chains
            .get(&id)
            .ok_or(StoreError::DocumentNotFound { id })?;
        let latest = chain
            .versions
            .last()
            .cloned()
            .ok_or(StoreError::VersionNotFound {
                id,
                version: chain.document.current_version,
            })?;
        Ok((chain.document.clone(), latest))
    }

    /// Every version of a document, oldest first.
    ///
    /// # Errors
    ///
    /// [`StoreError::DocumentNotFound`] if `id` is unknown.
    pub fn versions(&self, id: DocumentId) -> Result<Vec<DocumentVersion>, StoreError> {
        self.chains
            .get(&id)
            .map(|chain| chain.versions.clone())
            .ok_or(StoreError::DocumentNotFound { id })
    }

    /// Documents created in `conversation_id`, oldest first.
    pub fn documents_for_conversation(&self, conversation_id: ConversationId) -> Vec<Document> {
        let ids = self
            .by_conversation
            .get(&conversation_id)
            .map(|ids| ids.clone())
            .unwrap_or_default();
        ids.into_iter()
            .filter_map(|id| self.chains.get(&id).map(|c| c.document.clone()))
            .collect()
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation() -> ConversationId {
        ConversationId::new(1)
    }

    fn first(store: &DocumentVersionStore, content: &str) -> Document {
        store
            .append_version(AppendVersion::new(
                conversation(),
                HandlerLabel::generalist(),
                content,
            ))
            .unwrap()
            .0
    }

    #[test]
    fn test_create_derives_title_type_and_plain_text() {
        let store = DocumentVersionStore::new();
        let (document, version) = store
            .append_version(AppendVersion::new(
                conversation(),
                HandlerLabel::new("speech_writer").unwrap(),
                "# Annual Meeting Address\n\nDear **colleagues**",
            ))
            .unwrap();
        assert_eq!(document.title, "Annual Meeting Address");
        assert_eq!(document.current_version, VersionNumber::FIRST);
        assert_eq!(version.operation, OperationKind::Create);
        assert_eq!(
            version.plain_text_content,
            "Annual Meeting Address\n\nDear colleagues"
        );
    }

    #[test]
    fn test_extend_missing_document_fails() {
        let store = DocumentVersionStore::new();
        let err = store
            .append_version(
                AppendVersion::new(conversation(), HandlerLabel::generalist(), "x")
                    .to_document(DocumentId::new(99)),
            )
            .unwrap_err();
        assert_eq!(err, StoreError::DocumentNotFound { id: DocumentId::new(99) });
    }

    #[test]
    fn test_create_operation_is_not_accepted_for_existing_documents() {
        let store = DocumentVersionStore::new();
        let document = first(&store, "draft");
        let (_, version) = store
            .append_version(
                AppendVersion::new(conversation(), HandlerLabel::generalist(), "second")
                    .to_document(document.id)
                    .with_operation(OperationKind::Create),
            )
            .unwrap();
        assert_eq!(version.operation, OperationKind::Edit);
        assert_eq!(version.version.as_u32(), 2);
    }

    #[test]
    fn test_inconsistent_chain_is_reported_as_conflict() {
        let store = DocumentVersionStore::new();
        let document = first(&store, "draft");
        store
            .chains
            .get_mut(&document.id)
            .unwrap()
            .versions
            .clear();

        let err = store
            .append_version(
                AppendVersion::new(conversation(), HandlerLabel::generalist(), "again")
                    .to_document(document.id),
            )
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::VersionConflict {
                id: document.id,
                expected: 2,
                found: 0
            }
        );
        assert_eq!(
            InkwellError::from(err).code(),
            "version_conflict"
        );
    }

    #[test]
    fn test_documents_are_indexed_by_conversation() {
        let store = DocumentVersionStore::new();
        let a = first(&store, "one");
        let b = first(&store, "two");
        store
            .append_version(AppendVersion::new(
                ConversationId::new(2),
                HandlerLabel::generalist(),
                "elsewhere",
            ))
            .unwrap();
        let ids: Vec<_> = store
            .documents_for_conversation(conversation())
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec![a.id, b.id]);
        assert!(store
            .documents_for_conversation(ConversationId::new(3))
            .is_empty());
    }

    #[test]
    fn test_missing_version_is_reported() {
        let store = DocumentVersionStore::new();
        let document = first(&store, "draft");
        let missing = VersionNumber::new(2).unwrap();
        assert_eq!(
            store.version(document.id, missing).unwrap_err(),
            StoreError::VersionNotFound {
                id: document.id,
                version: missing
            }
        );
    }
}
