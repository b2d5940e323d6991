//! Conversation and message records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{ConversationId, HandlerLabel, MessageId, Timestamp};

const MAX_TITLE_CHARS: usize = 50;

/// A thread of messages that owns zero or more documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Store-assigned identifier.
    pub id: ConversationId,
    /// Title taken from the first message.
    pub title: String,
    /// When the conversation was opened.
    pub created_at: Timestamp,
    /// When the last message was recorded.
    pub updated_at: Timestamp,
}

impl Conversation {
    /// Title for a conversation opened by `first_message`: its trimmed text,
    /// cut to 50 characters.
    pub fn title_from(first_message: &str) -> String {
        first_message.trim().chars().take(MAX_TITLE_CHARS).collect()
    }
}

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// The person making requests.
    User,
    /// Generated content.
    Assistant,
}

/// One recorded message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Store-assigned identifier.
    pub id: MessageId,
    /// Conversation the message belongs to.
    pub conversation_id: ConversationId,
    /// Author.
    pub role: MessageRole,
    /// Message text.
    pub content: String,
    /// Handler that produced an assistant message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handler: Option<HandlerLabel>,
    /// Dispatch annotations for assistant messages.
    pub metadata: Map<String, Value>,
    /// When the message was recorded.
    pub created_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_is_cut_to_fifty_chars() {
        let long = "字".repeat(70);
        assert_eq!(Conversation::title_from(&long).chars().count(), 50);
        assert_eq!(Conversation::title_from("  Hello  "), "Hello");
    }
}
