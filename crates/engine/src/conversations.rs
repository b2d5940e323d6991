//! In-memory conversation log.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use domain::{
    Conversation, ConversationId, HandlerLabel, Message, MessageId, MessageRole, Timestamp,
};
use serde_json::{Map, Value};
use tracing::debug;

use crate::versions::StoreError;

#[derive(Debug)]
struct ConversationLog {
    conversation: Conversation,
    messages: Vec<Message>,
}

/// Conversations and their messages, keyed by conversation id.
#[derive(Debug)]
pub struct ConversationStore {
    next_conversation: AtomicU64,
    next_message: AtomicU64,
    logs: DashMap<ConversationId, ConversationLog>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self {
            next_conversation: AtomicU64::new(1),
            next_message: AtomicU64::new(1),
            logs: DashMap::new(),
        }
    }
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a conversation titled from its first message.
    pub fn create(&self, first_message: &str) -> Conversation {
        let id = ConversationId::new(self.next_conversation.fetch_add(1, Ordering::SeqCst));
        let now = Timestamp::now();
        let conversation = Conversation {
            id,
            title: Conversation::title_from(first_message),
            created_at: now,
            updated_at: now,
        };
        self.logs.insert(
            id,
            ConversationLog {
                conversation: conversation.clone(),
                messages: Vec::new(),
            },
        );
        debug!(conversation_id = %id, "conversation created");
        conversation
    }

    /// Returns the conversation `id`, or opens a new one when `id` is `None`.
    ///
    /// # Errors
    ///
    /// [`StoreError::ConversationNotFound`] if `id` is given but unknown.
    pub fn open(
        &self,
        id: Option<ConversationId>,
        first_message: &str,
    ) -> Result<Conversation, StoreError> {
        match id {
            Some(id) => self.get(id),
            None => Ok(self.create(first_message)),
        }
    }

    /// # Errors
    ///
    /// [`StoreError::ConversationNotFound`] if `id` is unknown.
    pub fn get(&self, id: ConversationId) -> Result<Conversation, StoreError> {
        self.logs
            .get(&id)
            .map(|log| log.conversation.clone())
            .ok_or(StoreError::ConversationNotFound { id })
    }

    /// Records a message and touches the conversation's `updated_at`.
    ///
    /// # Errors
    ///
    /// [`StoreError::ConversationNotFound`] if `id` is unknown.
    pub fn append_message(
        &self,
        id: ConversationId,
        role: MessageRole,
        content: impl Into<String>,
        handler: Option<HandlerLabel>,
        metadata: Map<String, Value>,
    ) -> Result<Message, StoreError> {
        let mut log = self
            .logs
            .get_mut(&id)
            .ok_or(StoreError::ConversationNotFound { id })?;
        let now = Timestamp::now();
        let message = Message {
            id: MessageId::new(self.next_message.fetch_add(1, Ordering::SeqCst)),
            conversation_id: id,
            role,
            content: content.into(),
            handler,
            metadata,
            created_at: now,
        };
        log.messages.push(message.clone());
        log.conversation.updated_at = now;
        Ok(message)
    }

    /// Messages of a conversation in recording order.
    ///
    /// # Errors
    ///
    /// [`StoreError::ConversationNotFound`] if `id` is unknown.
    pub fn messages(&self, id: ConversationId) -> Result<Vec<Message>, StoreError> {
        self.logs
            .get(&id)
            .map(|log| log.messages.clone())
            .ok_or(StoreError::ConversationNotFound { id })
    }

    /// Every conversation, most recently updated first.
    pub fn list(&self) -> Vec<Conversation> {
        let mut all: Vec<Conversation> = self
            .logs
            .iter()
            .map(|log| log.conversation.clone())
            .collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        all
    }
}
