//! Anthropic Claude backend over `POST {endpoint}/v1/messages`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domain::{
    BackendConfig, BackendDescriptor, BackendError, BackendHandle, BackendKind, Credential,
    ModelId, ModelRequest, ModelResponse, TokenCost, TokenUsage,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http;
use crate::pricing;

const ANTHROPIC_VERSION: &str = "2023-06-01";

const CLAUDE_MODELS: &[&str] = &[
    "claude-3-5-sonnet-20241022",
    "claude-3-5-haiku-20241022",
    "claude-3-opus-20240229",
    "claude-3-sonnet-20240229",
    "claude-3-haiku-20240307",
];

/// Descriptor for the Claude backend kind.
///
/// Credentials must start with `sk-ant-`. The model list is curated; the
/// messages API has no unauthenticated listing.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClaudeBackend;

#[async_trait]
impl BackendDescriptor for ClaudeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Claude
    }

    async fn validate(&self, config: &BackendConfig) -> bool {
        config
            .credential()
            .is_some_and(|c| c.expose().starts_with("sk-ant-"))
    }

    fn build(&self, config: &BackendConfig) -> Result<Arc<dyn BackendHandle>, BackendError> {
        Ok(Arc::new(MessagesHandle::new(config)?))
    }

    fn estimate_cost(&self, model: &str, input_tokens: u64, output_tokens: u64) -> TokenCost {
        pricing::estimate_cost(BackendKind::Claude, model, input_tokens, output_tokens)
    }

    async fn list_models(&self, _config: &BackendConfig) -> Vec<String> {
        CLAUDE_MODELS.iter().map(|m| m.to_string()).collect()
    }
}

/// Invocation handle for the messages API.
pub struct MessagesHandle {
    model: ModelId,
    client: reqwest::Client,
    url: String,
    credential: Option<Credential>,
    temperature: f64,
    max_tokens: u32,
    timeout: Duration,
    max_retries: u32,
}

impl MessagesHandle {
    /// Builds a handle from a validated config.
    ///
    /// # Errors
    ///
    /// [`BackendError::Misconfigured`] if the HTTP client cannot be built.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        Ok(Self {
            model: config.model().clone(),
            client: http::client_for(config)?,
            url: format!("{}/v1/messages", http::endpoint_for(config)?),
            credential: config.credential().cloned(),
            temperature: config.temperature().as_f64(),
            max_tokens: config.max_output_tokens(),
            timeout: config.timeout(),
            max_retries: config.max_retries(),
        })
    }

    async fn send_once(&self, request: &ModelRequest) -> Result<ModelResponse, BackendError> {
        let body = MessagesRequest {
            model: self.model.as_str(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: request.system.as_deref(),
            messages: vec![UserMessage {
                role: "user",
                content: &request.prompt,
            }],
        };
        let mut builder = self
            .client
            .post(&self.url)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);
        if let Some(credential) = &self.credential {
            builder = builder.header("x-api-key", credential.expose());
        }
        let response = builder
            .send()
            .await
            .map_err(|e| http::transport_error(e, self.timeout))?;
        let parsed: MessagesResponse = http::read_json(response, self.timeout).await?;

        let content: String = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect();
        if content.trim().is_empty() {
            return Err(BackendError::EmptyResponse);
        }
        Ok(ModelResponse {
            content,
            usage: TokenUsage::new(parsed.usage.input_tokens, parsed.usage.output_tokens),
        })
    }
}

#[async_trait]
impl BackendHandle for MessagesHandle {
    fn kind(&self) -> BackendKind {
        BackendKind::Claude
    }

    fn model(&self) -> &ModelId {
        &self.model
    }

    async fn invoke(&self, request: &ModelRequest) -> Result<ModelResponse, BackendError> {
        debug!(backend = "claude", model = %self.model, "invoking messages API");
        http::with_retries(BackendKind::Claude, self.max_retries, || self.send_once(request)).await
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<UserMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: MessagesUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MessagesUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_claude_requires_sk_ant_prefix() {
        let good = BackendConfig::builder(BackendKind::Claude)
            .credential("sk-ant-123")
            .build()
            .unwrap();
        let openai_style = BackendConfig::builder(BackendKind::Claude)
            .credential("sk-123")
            .build()
            .unwrap();
        assert!(ClaudeBackend.validate(&good).await);
        assert!(!ClaudeBackend.validate(&openai_style).await);
    }

    #[test]
    fn test_claude_costs_are_not_priced() {
        assert!(ClaudeBackend
            .estimate_cost("claude-3-opus-20240229", 10_000, 10_000)
            .is_zero());
    }
}
