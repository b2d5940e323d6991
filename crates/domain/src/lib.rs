//! Core domain for Inkwell.
//!
//! This crate contains every domain concept, newtype identifier, shared primitive
//! type, and cross-cutting error type used by the gateway, the dispatch engine,
//! and the document version store. Infrastructure crates implement the traits
//! defined here; they never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype domain identifiers (`DocumentId`, `HandlerLabel`, etc.) |
//! | [`types`] | Shared value types (`TokenCount`, `TokenCost`, `Temperature`, etc.) |
//! | [`errors`] | Top-level error taxonomy and retry-policy types |
//! | [`backend`] | Backend configuration, handle/descriptor ports, registry |
//! | [`usage`] | Per-backend usage accounting |
//! | [`intent`] | Ordered keyword rule table and the classifier |
//! | [`dispatch`] | Dispatch request/result value types |
//! | [`document`] | Documents, versions, title and type derivation |
//! | [`plain_text`] | Plain-text projection of rich-text content |
//! | [`conversation`] | Conversation and message records |

pub mod backend;
pub mod conversation;
pub mod dispatch;
pub mod document;
pub mod errors;
pub mod identifiers;
pub mod intent;
pub mod plain_text;
pub mod types;
pub mod usage;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use backend::{
    BackendConfig, BackendConfigBuilder, BackendDescriptor, BackendError, BackendHandle,
    BackendKind, BackendRegistry, ConfigError, Credential, HealthReport, HealthStatus,
    ModelRequest, ModelResponse, stub_response,
};
pub use conversation::{Conversation, Message, MessageRole};
pub use dispatch::{DispatchError, DispatchErrorCode, DispatchRequest, DispatchResult, IntentSource};
pub use document::{
    derive_title, detect_document_type, Document, DocumentVersion, OperationKind,
};
pub use errors::{InkwellError, RetryPolicy};
pub use identifiers::{
    ConversationId, DocumentId, HandlerLabel, MessageId, ModelId, RequestId, VersionNumber,
};
pub use intent::{Classifier, IntentResult, IntentRule, RuleTable, RuleTableError};
pub use plain_text::to_plain_text;
pub use types::{Temperature, Timestamp, TokenCost, TokenCount, TokenUsage};
pub use usage::UsageStats;
