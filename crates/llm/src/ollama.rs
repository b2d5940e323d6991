//! Ollama local model server.
//!
//! Two handles implement the same [`BackendHandle`] port:
//!
//! - [`OllamaChatHandle`] talks to `POST /api/chat` (the default).
//! - [`OllamaGenerateHandle`] talks to the legacy `POST /api/generate`
//!   endpoint, sending the prompt and system text as separate fields.
//!
//! The choice is made once in [`BackendDescriptor::build`] from the config's
//! `api` extra parameter (`"generate"` selects the legacy handle).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domain::{
    BackendConfig, BackendDescriptor, BackendError, BackendHandle, BackendKind, ModelId,
    ModelRequest, ModelResponse, TokenCost, TokenCount, TokenUsage,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::http::{self, ChatMessage};

/// Extra-parameter key selecting the Ollama API flavour.
pub const API_PARAM: &str = "api";
/// Value of [`API_PARAM`] that selects the legacy generate endpoint.
pub const GENERATE_API: &str = "generate";

const CURATED_MODELS: &[&str] = &[
    "llama2:7b",
    "llama2:13b",
    "llama2:70b",
    "llama3:8b",
    "llama3:70b",
    "codellama:7b",
    "codellama:13b",
    "mistral:7b",
    "qwen:7b",
    "qwen:14b",
    "deepseek-coder:6.7b",
    "deepseek-coder:33b",
];

/// Descriptor for the Ollama backend kind.
///
/// Validation is a live reachability probe of `GET /api/tags`; the model list
/// comes from the same endpoint with a curated fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct OllamaBackend;

impl OllamaBackend {
    async fn tags(&self, config: &BackendConfig) -> Result<Vec<String>, BackendError> {
        let client = http::client_with_timeout(http::PROBE_TIMEOUT)?;
        let url = format!("{}/api/tags", http::endpoint_for(config)?);
        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| http::transport_error(e, http::PROBE_TIMEOUT))?;
        let tags: TagList = http::read_json(response, http::PROBE_TIMEOUT).await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    fn uses_generate_api(config: &BackendConfig) -> bool {
        config
            .extra_param(API_PARAM)
            .and_then(|v| v.as_str())
            .is_some_and(|v| v.eq_ignore_ascii_case(GENERATE_API))
    }
}

#[async_trait]
impl BackendDescriptor for OllamaBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Ollama
    }

    async fn validate(&self, config: &BackendConfig) -> bool {
        match self.tags(config).await {
            Ok(_) => true,
            Err(err) => {
                warn!(endpoint = ?config.endpoint(), error = %err, "ollama is not reachable");
                false
            }
        }
    }

    fn build(&self, config: &BackendConfig) -> Result<Arc<dyn BackendHandle>, BackendError> {
        let transport = Transport::new(config)?;
        if Self::uses_generate_api(config) {
            Ok(Arc::new(OllamaGenerateHandle { transport }))
        } else {
            Ok(Arc::new(OllamaChatHandle { transport }))
        }
    }

    fn estimate_cost(&self, _model: &str, _input_tokens: u64, _output_tokens: u64) -> TokenCost {
        TokenCost::zero()
    }

    async fn list_models(&self, config: &BackendConfig) -> Vec<String> {
        match self.tags(config).await {
            Ok(models) if !models.is_empty() => models,
            Ok(_) => curated(),
            Err(err) => {
                warn!(error = %err, "could not list ollama models, using curated list");
                curated()
            }
        }
    }
}

fn curated() -> Vec<String> {
    CURATED_MODELS.iter().map(|m| m.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// Connection state shared by both Ollama handles.
struct Transport {
    model: ModelId,
    client: reqwest::Client,
    endpoint: String,
    options: Options,
    timeout: Duration,
    max_retries: u32,
}

impl Transport {
    fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        Ok(Self {
            model: config.model().clone(),
            client: http::client_for(config)?,
            endpoint: http::endpoint_for(config)?,
            options: Options {
                temperature: config.temperature().as_f64(),
                num_predict: config.max_output_tokens(),
            },
            timeout: config.timeout(),
            max_retries: config.max_retries(),
        })
    }

    async fn post<B: Serialize, R: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, BackendError> {
        let response = self
            .client
            .post(format!("{}{path}", self.endpoint))
            .json(body)
            .send()
            .await
            .map_err(|e| http::transport_error(e, self.timeout))?;
        http::read_json(response, self.timeout).await
    }
}

fn usage_for(
    request: &ModelRequest,
    content: &str,
    prompt: Option<u64>,
    eval: Option<u64>,
) -> TokenUsage {
    TokenUsage {
        input: prompt
            .map(TokenCount::new)
            .unwrap_or_else(|| TokenCount::estimate_for(&request.prompt)),
        output: eval
            .map(TokenCount::new)
            .unwrap_or_else(|| TokenCount::estimate_for(content)),
    }
}

/// Handle for `POST /api/chat`.
pub struct OllamaChatHandle {
    transport: Transport,
}

impl OllamaChatHandle {
    async fn send_once(&self, request: &ModelRequest) -> Result<ModelResponse, BackendError> {
        let body = ChatRequest {
            model: self.transport.model.as_str(),
            messages: http::chat_messages(request),
            stream: false,
            options: self.transport.options,
        };
        let parsed: ChatResponse = self.transport.post("/api/chat", &body).await?;
        let content = parsed.message.map(|m| m.content).unwrap_or_default();
        if content.trim().is_empty() {
            return Err(BackendError::EmptyResponse);
        }
        let usage = usage_for(request, &content, parsed.prompt_eval_count, parsed.eval_count);
        Ok(ModelResponse { content, usage })
    }
}

#[async_trait]
impl BackendHandle for OllamaChatHandle {
    fn kind(&self) -> BackendKind {
        BackendKind::Ollama
    }

    fn model(&self) -> &ModelId {
        &self.transport.model
    }

    async fn invoke(&self, request: &ModelRequest) -> Result<ModelResponse, BackendError> {
        debug!(model = %self.transport.model, "invoking ollama chat");
        http::with_retries(BackendKind::Ollama, self.transport.max_retries, || {
            self.send_once(request)
        })
        .await
    }
}

/// Handle for the legacy `POST /api/generate` endpoint.
pub struct OllamaGenerateHandle {
    transport: Transport,
}

impl OllamaGenerateHandle {
    async fn send_once(&self, request: &ModelRequest) -> Result<ModelResponse, BackendError> {
        let body = GenerateRequest {
            model: self.transport.model.as_str(),
            prompt: &request.prompt,
            system: request.system.as_deref(),
            stream: false,
            options: self.transport.options,
        };
        let parsed: GenerateResponse = self.transport.post("/api/generate", &body).await?;
        if parsed.response.trim().is_empty() {
            return Err(BackendError::EmptyResponse);
        }
        let usage = usage_for(
            request,
            &parsed.response,
            parsed.prompt_eval_count,
            parsed.eval_count,
        );
        Ok(ModelResponse {
            content: parsed.response,
            usage,
        })
    }
}

#[async_trait]
impl BackendHandle for OllamaGenerateHandle {
    fn kind(&self) -> BackendKind {
        BackendKind::Ollama
    }

    fn model(&self) -> &ModelId {
        &self.transport.model
    }

    async fn invoke(&self, request: &ModelRequest) -> Result<ModelResponse, BackendError> {
        debug!(model = %self.transport.model, "invoking ollama generate");
        http::with_retries(BackendKind::Ollama, self.transport.max_retries, || {
            self.send_once(request)
        })
        .await
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize)]
struct Options {
    temperature: f64,
    num_predict: u32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: Options,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ChatResponseMessage>,
    prompt_eval_count: Option<u64>,
    eval_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    options: Options,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    prompt_eval_count: Option<u64>,
    eval_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    models: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
struct Tag {
    name: String,
}
