//! Inkwell model backend adapters.
//!
//! Implements the [`domain::BackendDescriptor`] and [`domain::BackendHandle`]
//! ports for every registered backend kind:
//!
//! | Kind | Descriptor | Wire protocol |
//! |------|------------|---------------|
//! | `openai`, `qwen`, `deepseek` | [`OpenAiCompatible`] | `POST /chat/completions` |
//! | `claude` | [`ClaudeBackend`] | `POST /v1/messages` |
//! | `ollama` | [`OllamaBackend`] | `POST /api/chat`, or legacy `POST /api/generate` |
//! | `stub` | [`StubBackend`] | none |
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** All HTTP transport, request formatting, response
//! parsing, `Retry-After` handling and exponential back-off live here. The
//! orchestration layer sees only the [`domain`] ports.

use std::sync::Arc;

use domain::BackendRegistry;

mod http;

pub mod anthropic;
pub mod ollama;
pub mod openai;
pub mod pricing;
pub mod stub;

pub use anthropic::ClaudeBackend;
pub use ollama::OllamaBackend;
pub use openai::OpenAiCompatible;
pub use stub::StubBackend;

/// Registry containing a descriptor for every built-in backend kind.
pub fn builtin_registry() -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    registry.register(Arc::new(OpenAiCompatible::openai()));
    registry.register(Arc::new(OpenAiCompatible::qwen()));
    registry.register(Arc::new(OpenAiCompatible::deepseek()));
    registry.register(Arc::new(ClaudeBackend));
    registry.register(Arc::new(OllamaBackend));
    registry.register(Arc::new(StubBackend));
    registry
}
