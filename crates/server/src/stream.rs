//! `POST /chat/stream`: one chat turn as server-sent events.
//!
//! Validation and conversation bookkeeping happen before the response
//! starts, so request errors still map to a status code. After that the
//! client receives `conversationId`, then the content in fixed-size chunks,
//! then exactly one `complete` or `error` event.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use domain::{ConversationId, DocumentId, VersionNumber};
use engine::ChatOutcome;
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::dto::ChatRequestBody;
use crate::error::ApiError;
use crate::AppState;

/// Characters carried by each `content` event.
pub const STREAM_CHUNK_CHARS: usize = 24;

/// One frame of the event stream, serialised as `{"type": ..., "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum StreamEvent {
    ConversationId(ConversationId),
    Content(String),
    Complete(StreamCompletion),
    Error(String),
}

/// Payload of the terminal `complete` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamCompletion {
    pub raw_content: String,
    pub plain_text_content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<DocumentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<VersionNumber>,
}

pub(crate) async fn post_chat_stream(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ChatRequestBody>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let Json(body) = body?;
    let request = body.into_request();
    let conversation = state.chat.begin(&request)?;

    let (tx, rx) = mpsc::channel::<StreamEvent>(32);
    let chat = state.chat.clone();
    tokio::spawn(async move {
        let conversation_id = conversation.id;
        let mut events = vec![StreamEvent::ConversationId(conversation_id)];
        match chat.complete(conversation, &request).await {
            Ok(outcome) => events.extend(outcome_events(outcome)),
            Err(err) => events.push(StreamEvent::Error(err.to_string())),
        }
        for event in events {
            if tx.send(event).await.is_err() {
                debug!(conversation_id = %conversation_id, "stream client went away");
                break;
            }
        }
    });

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        Some((Event::default().json_data(&event), rx))
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn outcome_events(outcome: ChatOutcome) -> Vec<StreamEvent> {
    let ChatOutcome {
        result,
        document,
        version,
        ..
    } = outcome;
    if !result.success {
        let message = result
            .error
            .map_or(result.content, |error| error.to_string());
        return vec![StreamEvent::Error(message)];
    }

    let mut events: Vec<StreamEvent> = chunk_chars(&result.content, STREAM_CHUNK_CHARS)
        .into_iter()
        .map(StreamEvent::Content)
        .collect();
    let plain_text_content = match &version {
        Some(version) => version.plain_text_content.clone(),
        None => domain::to_plain_text(&result.content),
    };
    events.push(StreamEvent::Complete(StreamCompletion {
        raw_content: result.content,
        plain_text_content,
        document_id: document.map(|d| d.id),
        version: version.map(|v| v.version),
    }));
    events
}

/// Splits `content` into pieces of at most `size` characters.
fn chunk_chars(content: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = content.chars().collect();
    chars
        .chunks(size.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chunks_split_on_characters() {
        let text = "文档".repeat(20);
        let chunks = chunk_chars(&text, STREAM_CHUNK_CHARS);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), 24);
        assert_eq!(chunks[1].chars().count(), 16);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_empty_content_has_no_chunks() {
        assert!(chunk_chars("", STREAM_CHUNK_CHARS).is_empty());
    }

    #[test]
    fn test_event_wire_shape() {
        let event = StreamEvent::ConversationId(ConversationId::new(7));
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "conversationId", "data": 7})
        );

        let event = StreamEvent::Complete(StreamCompletion {
            raw_content: "# Hi".into(),
            plain_text_content: "Hi".into(),
            document_id: Some(DocumentId::new(2)),
            version: None,
        });
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "complete",
                "data": {"rawContent": "# Hi", "plainTextContent": "Hi", "documentId": 2}
            })
        );
    }
}
