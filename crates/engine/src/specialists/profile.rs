//! Prompt-driven specialists configured by data.
//!
//! Every built-in specialist is a [`PromptSpecialist`]: a system prompt plus
//! a list of keyword [`Facet`]s. Facets are detected from the request text
//! with first-match, ordered lookups, steer the system prompt, and are echoed
//! into the result metadata.

use async_trait::async_trait;
use domain::{DispatchRequest, DispatchResult, HandlerLabel, ModelRequest};
use tracing::debug;

use super::{RegistrationError, Specialist, SpecialistError, SpecialistInfo};
use crate::gateway::GatewayContext;

/// One keyword-detected property of a request, such as a programming
/// language or a speech occasion.
#[derive(Debug, Clone)]
pub struct Facet {
    key: &'static str,
    fallback: &'static str,
    options: Vec<(&'static str, &'static [&'static str])>,
}

impl Facet {
    /// A facet reported under metadata `key`, valued `fallback` when no
    /// option matches.
    pub fn new(key: &'static str, fallback: &'static str) -> Self {
        Self {
            key,
            fallback,
            options: Vec::new(),
        }
    }

    /// Appends an option. Earlier options win when several match.
    #[must_use]
    pub fn option(mut self, value: &'static str, keywords: &'static [&'static str]) -> Self {
        self.options.push((value, keywords));
        self
    }

    /// Metadata key.
    pub fn key(&self) -> &'static str {
        self.key
    }

    /// Value of this facet for already lower-cased `text`.
    pub fn detect(&self, lowered: &str) -> &'static str {
        self.options
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k)))
            .map_or(self.fallback, |(value, _)| *value)
    }

    fn is_fallback(&self, value: &str) -> bool {
        self.fallback == value
    }
}

/// A specialist defined by its system prompt and facets.
#[derive(Debug, Clone)]
pub struct PromptSpecialist {
    info: SpecialistInfo,
    system_prompt: String,
    facets: Vec<Facet>,
    fence_language: Option<&'static str>,
}

impl PromptSpecialist {
    /// Creates a specialist with an empty prompt and no facets.
    ///
    /// # Errors
    ///
    /// [`RegistrationError::BlankLabel`] if `label` is blank.
    pub fn new(
        label: &str,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Self, RegistrationError> {
        let label = HandlerLabel::new(label.trim()).ok_or(RegistrationError::BlankLabel)?;
        Ok(Self {
            info: SpecialistInfo {
                label,
                name: name.into(),
                description: description.into(),
                capabilities: Vec::new(),
            },
            system_prompt: String::new(),
            facets: Vec::new(),
            fence_language: None,
        })
    }

    #[must_use]
    pub fn capabilities(mut self, capabilities: &[&str]) -> Self {
        self.info.capabilities = capabilities.iter().map(|c| c.to_string()).collect();
        self
    }

    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    #[must_use]
    pub fn facet(mut self, facet: Facet) -> Self {
        self.facets.push(facet);
        self
    }

    /// Tags untagged code fences in the output with the value of the facet
    /// named `facet_key`, when that facet matched.
    #[must_use]
    pub fn tag_code_fences_with(mut self, facet_key: &'static str) -> Self {
        self.fence_language = Some(facet_key);
        self
    }

    /// Facet values detected in `text`, in facet order.
    pub fn analyse(&self, text: &str) -> Vec<(&'static str, &'static str)> {
        let lowered = text.to_lowercase();
        self.facets
            .iter()
            .map(|facet| (facet.key(), facet.detect(&lowered)))
            .collect()
    }

    fn system_text(&self, facets: &[(&'static str, &'static str)]) -> String {
        if facets.is_empty() {
            return self.system_prompt.clone();
        }
        let mut text = self.system_prompt.clone();
        text.push_str("\n\nRequest profile:");
        for (key, value) in facets {
            text.push_str(&format!("\n- {key}: {value}"));
        }
        text
    }

    fn fence_tag(&self, facets: &[(&'static str, &'static str)]) -> Option<&'static str> {
        let key = self.fence_language?;
        let facet = self.facets.iter().find(|f| f.key() == key)?;
        facets
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, value)| *value)
            .filter(|value| !facet.is_fallback(value))
    }
}

#[async_trait]
impl Specialist for PromptSpecialist {
    fn label(&self) -> &HandlerLabel {
        &self.info.label
    }

    fn info(&self) -> SpecialistInfo {
        self.info.clone()
    }

    async fn process(
        &self,
        request: &DispatchRequest,
        gateway: &GatewayContext,
    ) -> Result<DispatchResult, SpecialistError> {
        let facets = self.analyse(&request.text);
        debug!(handler = %self.info.label, ?facets, "request profile detected");

        let handle = gateway.active_handle().await;
        let model_request =
            ModelRequest::new(request.text.clone()).with_system(self.system_text(&facets));
        let response = handle.invoke(&model_request).await?;

        let content = match self.fence_tag(&facets) {
            Some(language) => tag_untagged_fences(&response.content, language),
            None => response.content,
        };

        let mut result = DispatchResult::success(self.info.label.clone(), content)
            .with_metadata("backend", handle.kind().as_str())
            .with_metadata("model", handle.model().as_str())
            .with_metadata("degraded", handle.is_degraded())
            .with_metadata("inputTokens", response.usage.input.as_u64())
            .with_metadata("outputTokens", response.usage.output.as_u64());
        for (key, value) in facets {
            result = result.with_metadata(key, value);
        }
        Ok(result)
    }
}

/// Adds `language` to every opening code fence that has no info string.
///
/// Closing fences and fences that already carry a language are untouched.
pub fn tag_untagged_fences(content: &str, language: &str) -> String {
    let mut inside = false;
    let mut out = Vec::new();
    for line in content.split('\n') {
        let trimmed = line.trim_start();
        if !trimmed.starts_with("```") {
            out.push(line.to_string());
            continue;
        }
        if inside {
            inside = false;
            out.push(line.to_string());
        } else {
            inside = true;
            if trimmed.trim_end() == "```" {
                let indent = &line[..line.len() - trimmed.len()];
                out.push(format!("{indent}```{language}"));
            } else {
                out.push(line.to_string());
            }
        }
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn language() -> Facet {
        Facet::new("language", "unspecified")
            .option("javascript", &["javascript"])
            .option("java", &["java"])
            .option("rust", &["rust"])
    }

    #[test]
    fn test_facet_first_declared_option_wins() {
        let facet = language();
        assert_eq!(facet.detect("port this javascript to rust"), "javascript");
        assert_eq!(facet.detect("a java class"), "java");
        assert_eq!(facet.detect("a shell script"), "unspecified");
    }

    #[test]
    fn test_analyse_lowercases_input() {
        let specialist = PromptSpecialist::new("code_assistant", "Code", "Writes code")
            .unwrap()
            .facet(language());
        assert_eq!(
            specialist.analyse("Write RUST please"),
            vec![("language", "rust")]
        );
    }

    #[test]
    fn test_blank_label_is_rejected() {
        assert_eq!(
            PromptSpecialist::new("  ", "x", "y").unwrap_err(),
            RegistrationError::BlankLabel
        );
    }

    #[test]
    fn test_untagged_fences_are_tagged() {
        let input = "Here:\n```\nfn main() {}\n```\nand\n  ```python\nprint(1)\n  ```";
        let expected = "Here:\n```rust\nfn main() {}\n```\nand\n  ```python\nprint(1)\n  ```";
        assert_eq!(tag_untagged_fences(input, "rust"), expected);
    }

    #[test]
    fn test_fence_tag_skips_fallback_language() {
        let specialist = PromptSpecialist::new("code_assistant", "Code", "Writes code")
            .unwrap()
            .facet(language())
            .tag_code_fences_with("language");
        assert_eq!(specialist.fence_tag(&specialist.analyse("rust")), Some("rust"));
        assert_eq!(specialist.fence_tag(&specialist.analyse("bash")), None);
    }

    #[test]
    fn test_system_text_lists_facets() {
        let specialist = PromptSpecialist::new("code_assistant", "Code", "Writes code")
            .unwrap()
            .system_prompt("You write code.")
            .facet(language());
        let text = specialist.system_text(&specialist.analyse("java"));
        assert_eq!(text, "You write code.\n\nRequest profile:\n- language: java");
    }
}
