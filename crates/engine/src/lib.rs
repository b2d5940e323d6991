//! Inkwell orchestration: the backend gateway, usage tracking, intent
//! dispatch, the built-in specialists and the document version store.
//!
//! A request flows through this crate as follows:
//!
//! 1. [`ChatService`] records the user message and hands the text to the
//!    [`DispatchEngine`].
//! 2. The engine classifies the text, resolves a [`Specialist`] from the
//!    [`SpecialistRegistry`], and runs it under an optional deadline.
//! 3. The specialist calls the model through the [`GatewayContext`], which
//!    meters every invocation into the [`UsageTracker`].
//! 4. Successful content is appended to the [`DocumentVersionStore`].
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** Sequences calls between the business rules in the
//! [`domain`] crate and the backend ports it defines. No HTTP transport lives
//! here; concrete backends are injected through a [`domain::BackendRegistry`].

pub mod chat;
pub mod conversations;
pub mod dispatch;
pub mod editor;
pub mod gateway;
pub mod specialists;
pub mod usage_tracker;
pub mod versions;

pub use chat::{ChatOutcome, ChatService};
pub use conversations::ConversationStore;
pub use dispatch::DispatchEngine;
pub use editor::{DocumentEditor, EditOutcome, EditRequest};
pub use gateway::{GatewayContext, ModelHandle};
pub use specialists::{
    register_builtin_specialists, PromptSpecialist, RegistrationError, Specialist,
    SpecialistError, SpecialistInfo, SpecialistRegistry,
};
pub use usage_tracker::UsageTracker;
pub use versions::{AppendVersion, DocumentVersionStore, StoreError};
