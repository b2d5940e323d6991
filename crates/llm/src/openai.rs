//! OpenAI-compatible chat-completions backends: OpenAI, Qwen (DashScope
//! compatible mode) and DeepSeek.
//!
//! The three kinds share one wire protocol and differ only in endpoint,
//! credential rules, curated model list and price table.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domain::{
    BackendConfig, BackendDescriptor, BackendError, BackendHandle, BackendKind, Credential,
    ModelId, ModelRequest, ModelResponse, TokenCost, TokenCount, TokenUsage,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::http::{self, ChatMessage};
use crate::pricing;

const OPENAI_MODELS: &[&str] = &[
    "gpt-3.5-turbo",
    "gpt-3.5-turbo-16k",
    "gpt-4",
    "gpt-4-turbo-preview",
    "gpt-4o",
    "gpt-4o-mini",
];
const QWEN_MODELS: &[&str] = &[
    "qwen-max",
    "qwen-max-1201",
    "qwen-plus",
    "qwen-plus-1201",
    "qwen-turbo",
    "qwen-turbo-1201",
];
const DEEPSEEK_MODELS: &[&str] = &["deepseek-chat", "deepseek-coder"];

/// Descriptor for one OpenAI-compatible backend kind.
#[derive(Debug, Clone, Copy)]
pub struct OpenAiCompatible {
    kind: BackendKind,
}

impl OpenAiCompatible {
    /// OpenAI proper. Credentials must start with `sk-`.
    pub fn openai() -> Self {
        Self {
            kind: BackendKind::OpenAi,
        }
    }

    /// Qwen via DashScope. Any non-blank credential.
    pub fn qwen() -> Self {
        Self {
            kind: BackendKind::Qwen,
        }
    }

    /// DeepSeek. Any non-blank credential.
    pub fn deepseek() -> Self {
        Self {
            kind: BackendKind::DeepSeek,
        }
    }

    fn curated_models(&self) -> &'static [&'static str] {
        match self.kind {
            BackendKind::Qwen => QWEN_MODELS,
            BackendKind::DeepSeek => DEEPSEEK_MODELS,
            _ => OPENAI_MODELS,
        }
    }

    fn credential_is_valid(&self, credential: Option<&Credential>) -> bool {
        match credential {
            Some(c) if !c.is_blank() => match self.kind {
                BackendKind::OpenAi => c.expose().starts_with("sk-"),
                _ => true,
            },
            _ => false,
        }
    }

    async fn fetch_models(&self, config: &BackendConfig) -> Result<Vec<String>, BackendError> {
        let client = http::client_with_timeout(http::PROBE_TIMEOUT)?;
        let url = format!("{}/models", http::endpoint_for(config)?);
        let mut request = client.get(&url);
        if let Some(credential) = config.credential() {
            request = request.bearer_auth(credential.expose());
        }
        let response = request
            .send()
            .await
            .map_err(|e| http::transport_error(e, http::PROBE_TIMEOUT))?;
        let list: ModelList = http::read_json(response, http::PROBE_TIMEOUT).await?;
        Ok(list.data.into_iter().map(|m| m.id).collect())
    }
}

#[async_trait]
impl BackendDescriptor for OpenAiCompatible {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn validate(&self, config: &BackendConfig) -> bool {
        self.credential_is_valid(config.credential())
    }

    fn build(&self, config: &BackendConfig) -> Result<Arc<dyn BackendHandle>, BackendError> {
        Ok(Arc::new(ChatCompletionsHandle::new(config)?))
    }

    fn estimate_cost(&self, model: &str, input_tokens: u64, output_tokens: u64) -> TokenCost {
        pricing::estimate_cost(self.kind, model, input_tokens, output_tokens)
    }

    async fn list_models(&self, config: &BackendConfig) -> Vec<String> {
        let curated = || -> Vec<String> {
            self.curated_models().iter().map(|m| m.to_string()).collect()
        };
        if !self.credential_is_valid(config.credential()) {
            return curated();
        }
        match self.fetch_models(config).await {
            Ok(models) if !models.is_empty() => models,
            Ok(_) => curated(),
            Err(err) => {
                warn!(
                    backend = %self.kind,
                    error = %err,
                    "model list query failed, using curated list"
                );
                curated()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Invocation handle for `POST {endpoint}/chat/completions`.
pub struct ChatCompletionsHandle {
    kind: BackendKind,
    model: ModelId,
    client: reqwest::Client,
    url: String,
    credential: Option<Credential>,
    temperature: f64,
    max_tokens: u32,
    timeout: Duration,
    max_retries: u32,
}

impl ChatCompletionsHandle {
    /// Builds a handle from a validated config.
    ///
    /// # Errors
    ///
    /// [`BackendError::Misconfigured`] if the HTTP client cannot be built.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        Ok(Self {
            kind: config.kind(),
            model: config.model().clone(),
            client: http::client_for(config)?,
            url: format!("{}/chat/completions", http::endpoint_for(config)?),
            credential: config.credential().cloned(),
            temperature: config.temperature().as_f64(),
            max_tokens: config.max_output_tokens(),
            timeout: config.timeout(),
            max_retries: config.max_retries(),
        })
    }

    async fn send_once(&self, request: &ModelRequest) -> Result<ModelResponse, BackendError> {
        let body = ChatRequest {
            model: self.model.as_str(),
            messages: http::chat_messages(request),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        let mut builder = self.client.post(&self.url).json(&body);
        if let Some(credential) = &self.credential {
            builder = builder.bearer_auth(credential.expose());
        }
        let response = builder
            .send()
            .await
            .map_err(|e| http::transport_error(e, self.timeout))?;
        let parsed: ChatResponse = http::read_json(response, self.timeout).await?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(BackendError::EmptyResponse)?;
        let usage = match parsed.usage {
            Some(u) => TokenUsage::new(u.prompt_tokens, u.completion_tokens),
            None => TokenUsage {
                input: TokenCount::estimate_for(&request.prompt),
                output: TokenCount::estimate_for(&content),
            },
        };
        Ok(ModelResponse { content, usage })
    }
}

#[async_trait]
impl BackendHandle for ChatCompletionsHandle {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn model(&self) -> &ModelId {
        &self.model
    }

    async fn invoke(&self, request: &ModelRequest) -> Result<ModelResponse, BackendError> {
        debug!(backend = %self.kind, model = %self.model, "invoking chat completions");
        http::with_retries(self.kind, self.max_retries, || self.send_once(request)).await
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}
