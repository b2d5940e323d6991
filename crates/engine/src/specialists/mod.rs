//! Specialist handlers and their registry.
//!
//! A [`Specialist`] turns a classified [`DispatchRequest`] into content. The
//! [`SpecialistRegistry`] is filled deterministically at startup; every
//! registration failure is returned to the caller rather than logged and
//! skipped.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use domain::{BackendError, DispatchRequest, DispatchResult, HandlerLabel, InkwellError};
use serde::Serialize;
use thiserror::Error;

use crate::gateway::GatewayContext;

mod builtin;
mod profile;

pub use builtin::{builtin_specialists, register_builtin_specialists};
pub use profile::{tag_untagged_fences, Facet, PromptSpecialist};

// ---------------------------------------------------------------------------
// Port
// ---------------------------------------------------------------------------

/// Descriptive metadata for a specialist, as listed by `GET /handlers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialistInfo {
    /// Registry key.
    pub label: HandlerLabel,
    /// Human-readable name.
    pub name: String,
    /// One-line description.
    pub description: String,
    /// What the specialist can produce.
    pub capabilities: Vec<String>,
}

/// Failure raised by a specialist while processing a request.
///
/// The dispatch engine converts every variant into a failed
/// [`DispatchResult`]; none of them reach the transport layer.
#[derive(Debug, Error)]
pub enum SpecialistError {
    /// The model call failed.
    #[error("model invocation failed: {0}")]
    Backend(#[from] BackendError),

    /// The specialist declined the request.
    #[error("request rejected: {reason}")]
    Rejected { reason: String },
}

/// A registered unit that turns a request into generated content.
#[async_trait]
pub trait Specialist: Send + Sync {
    /// Registry key for this specialist.
    fn label(&self) -> &HandlerLabel;

    /// Descriptive metadata.
    fn info(&self) -> SpecialistInfo;

    /// Produces content for `request`, calling models through `gateway`.
    ///
    /// The engine measures elapsed time itself; whatever the specialist sets
    /// in [`DispatchResult::elapsed`] is overwritten.
    ///
    /// # Errors
    ///
    /// [`SpecialistError`] when no content could be produced.
    async fn process(
        &self,
        request: &DispatchRequest,
        gateway: &GatewayContext,
    ) -> Result<DispatchResult, SpecialistError>;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Failure to register a specialist or to assemble an engine from a registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// A specialist was given a blank label.
    #[error("specialist label must not be blank")]
    BlankLabel,

    /// The label is already taken.
    #[error("a specialist is already registered under '{label}'")]
    DuplicateLabel { label: HandlerLabel },

    /// The registration key differs from the specialist's own label.
    #[error("specialist '{found}' cannot be registered under '{expected}'")]
    LabelMismatch {
        expected: HandlerLabel,
        found: HandlerLabel,
    },

    /// No generalist handler is available for fallback.
    #[error("no '{}' specialist is registered", HandlerLabel::GENERALIST)]
    MissingGeneralist,
}

impl From<RegistrationError> for InkwellError {
    fn from(err: RegistrationError) -> Self {
        InkwellError::ConfigurationError {
            message: err.to_string(),
        }
    }
}

/// Specialists keyed by label, remembering registration order.
#[derive(Clone, Default)]
pub struct SpecialistRegistry {
    handlers: HashMap<HandlerLabel, Arc<dyn Specialist>>,
    order: Vec<HandlerLabel>,
}

impl SpecialistRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `specialist` under `label`.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::LabelMismatch`] if `label` is not the
    ///   specialist's own label.
    /// - [`RegistrationError::DuplicateLabel`] if `label` is already taken.
    pub fn register(
        &mut self,
        label: HandlerLabel,
        specialist: Arc<dyn Specialist>,
    ) -> Result<(), RegistrationError> {
        if specialist.label() != &label {
            return Err(RegistrationError::LabelMismatch {
                expected: label,
                found: specialist.label().clone(),
            });
        }
        if self.handlers.contains_key(&label) {
            return Err(RegistrationError::DuplicateLabel { label });
        }
        self.order.push(label.clone());
        self.handlers.insert(label, specialist);
        Ok(())
    }

    /// Looks up the specialist registered under `label`.
    pub fn get(&self, label: &HandlerLabel) -> Option<Arc<dyn Specialist>> {
        self.handlers.get(label).cloned()
    }

    /// Returns `true` if `label` is registered.
    pub fn contains(&self, label: &HandlerLabel) -> bool {
        self.handlers.contains_key(label)
    }

    /// Registered labels in registration order.
    pub fn labels(&self) -> &[HandlerLabel] {
        &self.order
    }

    /// Metadata of every specialist in registration order.
    pub fn infos(&self) -> Vec<SpecialistInfo> {
        self.order
            .iter()
            .filter_map(|label| self.handlers.get(label))
            .map(|s| s.info())
            .collect()
    }

    /// Number of registered specialists.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl std::fmt::Debug for SpecialistRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpecialistRegistry")
            .field("labels", &self.order)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo {
        label: HandlerLabel,
    }

    #[async_trait]
    impl Specialist for Echo {
        fn label(&self) -> &HandlerLabel {
            &self.label
        }

        fn info(&self) -> SpecialistInfo {
            SpecialistInfo {
                label: self.label.clone(),
                name: "Echo".into(),
                description: "Repeats the request".into(),
                capabilities: vec![],
            }
        }

        async fn process(
            &self,
            request: &DispatchRequest,
            _gateway: &GatewayContext,
        ) -> Result<DispatchResult, SpecialistError> {
            Ok(DispatchResult::success(self.label.clone(), request.text.clone()))
        }
    }

    fn echo(label: &str) -> Arc<dyn Specialist> {
        Arc::new(Echo {
            label: HandlerLabel::new(label).unwrap(),
        })
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut registry = SpecialistRegistry::new();
        registry
            .register(HandlerLabel::generalist(), echo("generalist"))
            .unwrap();
        let err = registry
            .register(HandlerLabel::generalist(), echo("generalist"))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateLabel { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_rejects_label_mismatch() {
        let mut registry = SpecialistRegistry::new();
        let err = registry
            .register(HandlerLabel::new("news_writer").unwrap(), echo("speech_writer"))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::LabelMismatch { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_labels_keep_registration_order() {
        let mut registry = SpecialistRegistry::new();
        for label in ["speech_writer", "generalist", "code_assistant"] {
            registry
                .register(HandlerLabel::new(label).unwrap(), echo(label))
                .unwrap();
        }
        let labels: Vec<&str> = registry.labels().iter().map(|l| l.as_str()).collect();
        assert_eq!(labels, ["speech_writer", "generalist", "code_assistant"]);
        assert_eq!(registry.infos()[2].label.as_str(), "code_assistant");
    }
}
