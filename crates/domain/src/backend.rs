//! Model backend configuration and port definitions.
//!
//! A *backend kind* is a family of interchangeable model services (a hosted
//! API family, a locally-run model server, or the deterministic stub). Each
//! kind is described by a [`BackendDescriptor`] which validates configuration,
//! builds a [`BackendHandle`], estimates cost, and lists models. Concrete
//! descriptors live in the `llm` crate; this module only defines the ports.
//!
//! [`BackendConfig`] enforces its numeric bounds at construction: there is no
//! way to hold a config with an out-of-range temperature or a zero token cap.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    InkwellError, ModelId, RetryPolicy, Temperature, Timestamp, TokenCost, TokenCount, TokenUsage,
};

// ---------------------------------------------------------------------------
// Backend kinds
// ---------------------------------------------------------------------------

/// A registered family of model backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// OpenAI chat-completions API.
    #[serde(rename = "openai")]
    OpenAi,
    /// Qwen via DashScope's OpenAI-compatible mode.
    Qwen,
    /// DeepSeek's OpenAI-compatible API.
    #[serde(rename = "deepseek")]
    DeepSeek,
    /// Anthropic Claude messages API.
    Claude,
    /// Locally-run Ollama model server.
    Ollama,
    /// Deterministic non-network fallback.
    Stub,
}

impl BackendKind {
    /// Every registered kind, in declaration order.
    pub const ALL: [BackendKind; 6] = [
        Self::OpenAi,
        Self::Qwen,
        Self::DeepSeek,
        Self::Claude,
        Self::Ollama,
        Self::Stub,
    ];

    /// Canonical lowercase name (`"openai"`, `"ollama"`, …).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Qwen => "qwen",
            Self::DeepSeek => "deepseek",
            Self::Claude => "claude",
            Self::Ollama => "ollama",
            Self::Stub => "stub",
        }
    }

    /// Human-readable product name.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::Qwen => "Qwen",
            Self::DeepSeek => "DeepSeek",
            Self::Claude => "Claude",
            Self::Ollama => "Ollama",
            Self::Stub => "Stub",
        }
    }

    /// Prefix for per-kind environment variables (`OPENAI_MODEL`, …).
    pub fn env_prefix(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI",
            Self::Qwen => "QWEN",
            Self::DeepSeek => "DEEPSEEK",
            Self::Claude => "CLAUDE",
            Self::Ollama => "OLLAMA",
            Self::Stub => "STUB",
        }
    }

    /// Model used when the configuration does not name one.
    pub fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-3.5-turbo",
            Self::Qwen => "qwen-max",
            Self::DeepSeek => "deepseek-chat",
            Self::Claude => "claude-3-5-haiku-20241022",
            Self::Ollama => "qwen3:8b",
            Self::Stub => "stub-model",
        }
    }

    /// Base endpoint used when the configuration does not override it.
    ///
    /// `None` for the stub, which never touches the network.
    pub fn default_endpoint(self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some("https://api.openai.com/v1"),
            Self::Qwen => Some("https://dashscope.aliyuncs.com/compatible-mode/v1"),
            Self::DeepSeek => Some("https://api.deepseek.com/v1"),
            Self::Claude => Some("https://api.anthropic.com"),
            Self::Ollama => Some("http://localhost:11434"),
            Self::Stub => None,
        }
    }

    /// Per-attempt request timeout used when the configuration does not set one.
    ///
    /// Local inference is slower to first byte, so Ollama gets a longer budget.
    pub fn default_timeout(self) -> Duration {
        match self {
            Self::Ollama => Duration::from_secs(60),
            _ => Duration::from_secs(30),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "qwen" => Ok(Self::Qwen),
            "deepseek" => Ok(Self::DeepSeek),
            "claude" => Ok(Self::Claude),
            "ollama" => Ok(Self::Ollama),
            "stub" | "mock" => Ok(Self::Stub),
            _ => Err(ConfigError::UnsupportedBackendKind {
                kind: s.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// An API credential. `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wraps a raw secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Returns the raw secret for use in an outgoing request header.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the secret is empty or whitespace.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Reasons a [`BackendConfig`] cannot be constructed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// The kind string does not name a registered backend family.
    #[error("unsupported backend kind '{kind}'")]
    UnsupportedBackendKind {
        /// The kind as supplied.
        kind: String,
    },

    /// The model identifier was empty.
    #[error("model identifier must not be empty")]
    EmptyModel,

    /// Temperature outside `[0, 2]`.
    #[error("temperature {value} is outside [0, 2]")]
    TemperatureOutOfRange {
        /// The rejected value.
        value: f64,
    },

    /// `max_output_tokens` was zero.
    #[error("max output tokens must be at least 1")]
    MaxTokensZero,

    /// The request timeout was zero.
    #[error("timeout must be greater than zero")]
    TimeoutZero,
}

impl From<ConfigError> for InkwellError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::UnsupportedBackendKind { kind } => Self::UnsupportedBackendKind { kind },
            other => Self::ConfigurationError {
                message: other.to_string(),
            },
        }
    }
}

/// Validated configuration for one backend.
///
/// Construct with [`BackendConfig::builder`]. Serialisation omits the
/// credential; deserialisation re-applies every bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBackendConfig", into = "RawBackendConfig")]
pub struct BackendConfig {
    kind: BackendKind,
    model: ModelId,
    credential: Option<Credential>,
    endpoint: Option<String>,
    temperature: Temperature,
    max_output_tokens: u32,
    timeout: Duration,
    max_retries: u32,
    enable_cache: bool,
    enable_monitoring: bool,
    extra_params: BTreeMap<String, serde_json::Value>,
}

impl BackendConfig {
    /// Starts a builder for `kind` with every field at its documented default.
    pub fn builder(kind: BackendKind) -> BackendConfigBuilder {
        BackendConfigBuilder::new(kind)
    }

    /// The stub configuration substituted by the gateway on validation failure.
    pub fn stub() -> Self {
        Self {
            kind: BackendKind::Stub,
            model: ModelId::from_static(BackendKind::Stub.default_model()),
            credential: None,
            endpoint: None,
            temperature: Temperature::default(),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            timeout: BackendKind::Stub.default_timeout(),
            max_retries: 0,
            enable_cache: false,
            enable_monitoring: true,
            extra_params: BTreeMap::new(),
        }
    }

    /// Backend family.
    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Model identifier.
    pub fn model(&self) -> &ModelId {
        &self.model
    }

    /// API credential, if any.
    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// Explicit endpoint override, if any.
    pub fn endpoint_override(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Endpoint to contact: the override if present, else the kind's default.
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint
            .as_deref()
            .or_else(|| self.kind.default_endpoint())
            .map(|e| e.trim_end_matches('/'))
    }

    /// Sampling temperature.
    pub fn temperature(&self) -> Temperature {
        self.temperature
    }

    /// Maximum tokens the model may generate per invocation (`>= 1`).
    pub fn max_output_tokens(&self) -> u32 {
        self.max_output_tokens
    }

    /// Per-attempt request timeout (`> 0`).
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Additional attempts after the first for retryable failures.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Whether response caching is requested.
    pub fn cache_enabled(&self) -> bool {
        self.enable_cache
    }

    /// Whether usage monitoring is requested.
    pub fn monitoring_enabled(&self) -> bool {
        self.enable_monitoring
    }

    /// Kind-specific extra parameters (e.g. `{"api": "generate"}` for Ollama).
    pub fn extra_param(&self, key: &str) -> Option<&serde_json::Value> {
        self.extra_params.get(key)
    }
}

const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 2000;
const DEFAULT_MAX_RETRIES: u32 = 3;

// ---------------------------------------------------------------------------

/// Builder for [`BackendConfig`]; [`build`](Self::build) enforces the bounds.
#[derive(Debug, Clone)]
pub struct BackendConfigBuilder {
    kind: BackendKind,
    model: Option<String>,
    credential: Option<Credential>,
    endpoint: Option<String>,
    temperature: f64,
    max_output_tokens: u32,
    timeout: Duration,
    max_retries: u32,
    enable_cache: bool,
    enable_monitoring: bool,
    extra_params: BTreeMap<String, serde_json::Value>,
}

impl BackendConfigBuilder {
    fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            model: None,
            credential: None,
            endpoint: None,
            temperature: Temperature::default().as_f64(),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            timeout: kind.default_timeout(),
            max_retries: DEFAULT_MAX_RETRIES,
            enable_cache: true,
            enable_monitoring: true,
            extra_params: BTreeMap::new(),
        }
    }

    /// Sets the model identifier (defaults to the kind's default model).
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the API credential.
    pub fn credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(Credential::new(credential));
        self
    }

    /// Overrides the base endpoint.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the sampling temperature.
    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the per-invocation output token cap.
    pub fn max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    /// Sets the per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the number of retries after the first attempt.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Enables or disables response caching.
    pub fn enable_cache(mut self, enabled: bool) -> Self {
        self.enable_cache = enabled;
        self
    }

    /// Enables or disables usage monitoring.
    pub fn enable_monitoring(mut self, enabled: bool) -> Self {
        self.enable_monitoring = enabled;
        self
    }

    /// Adds a kind-specific extra parameter.
    pub fn extra_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra_params.insert(key.into(), value);
        self
    }

    /// Validates every bound and produces the config.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first violated bound.
    pub fn build(self) -> Result<BackendConfig, ConfigError> {
        let model = match self.model {
            Some(m) => ModelId::new(m).ok_or(ConfigError::EmptyModel)?,
            None => ModelId::from_static(self.kind.default_model()),
        };
        let temperature = Temperature::new(self.temperature).ok_or(
            ConfigError::TemperatureOutOfRange {
                value: self.temperature,
            },
        )?;
        if self.max_output_tokens == 0 {
            return Err(ConfigError::MaxTokensZero);
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::TimeoutZero);
        }
        Ok(BackendConfig {
            kind: self.kind,
            model,
            credential: self.credential,
            endpoint: self.endpoint.filter(|e| !e.trim().is_empty()),
            temperature,
            max_output_tokens: self.max_output_tokens,
            timeout: self.timeout,
            max_retries: self.max_retries,
            enable_cache: self.enable_cache,
            enable_monitoring: self.enable_monitoring,
            extra_params: self.extra_params,
        })
    }
}

/// Wire form of [`BackendConfig`]; every field optional except `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawBackendConfig {
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    #[serde(default, skip_serializing)]
    credential: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timeout_secs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    enable_cache: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    enable_monitoring: Option<bool>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    extra_params: BTreeMap<String, serde_json::Value>,
}

impl TryFrom<RawBackendConfig> for BackendConfig {
    type Error = ConfigError;

    fn try_from(raw: RawBackendConfig) -> Result<Self, Self::Error> {
        let kind: BackendKind = raw.kind.parse()?;
        let mut builder = BackendConfig::builder(kind);
        if let Some(model) = raw.model {
            builder = builder.model(model);
        }
        if let Some(credential) = raw.credential {
            builder = builder.credential(credential);
        }
        if let Some(endpoint) = raw.endpoint {
            builder = builder.endpoint(endpoint);
        }
        if let Some(t) = raw.temperature {
            builder = builder.temperature(t);
        }
        if let Some(n) = raw.max_output_tokens {
            builder = builder.max_output_tokens(n);
        }
        if let Some(secs) = raw.timeout_secs {
            if !secs.is_finite() || secs <= 0.0 {
                return Err(ConfigError::TimeoutZero);
            }
            builder = builder.timeout(Duration::from_secs_f64(secs));
        }
        if let Some(n) = raw.max_retries {
            builder = builder.max_retries(n);
        }
        if let Some(flag) = raw.enable_cache {
            builder = builder.enable_cache(flag);
        }
        if let Some(flag) = raw.enable_monitoring {
            builder = builder.enable_monitoring(flag);
        }
        for (key, value) in raw.extra_params {
            builder = builder.extra_param(key, value);
        }
        builder.build()
    }
}

impl From<BackendConfig> for RawBackendConfig {
    fn from(config: BackendConfig) -> Self {
        Self {
            kind: config.kind.as_str().to_string(),
            model: Some(config.model.as_str().to_string()),
            credential: None,
            endpoint: config.endpoint,
            temperature: Some(config.temperature.as_f64()),
            max_output_tokens: Some(config.max_output_tokens),
            timeout_secs: Some(config.timeout.as_secs_f64()),
            max_retries: Some(config.max_retries),
            enable_cache: Some(config.enable_cache),
            enable_monitoring: Some(config.enable_monitoring),
            extra_params: config.extra_params,
        }
    }
}

// ---------------------------------------------------------------------------
// Invocation payloads
// ---------------------------------------------------------------------------

/// One model invocation: optional system instructions plus the user prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRequest {
    /// Handler-specific instructions, sent as the system message.
    pub system: Option<String>,
    /// The user-facing prompt.
    pub prompt: String,
}

impl ModelRequest {
    /// Creates a request with no system text.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
        }
    }

    /// Attaches system instructions.
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// Content generated by one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    /// Generated text.
    pub content: String,
    /// Token usage, as reported by the backend or estimated.
    pub usage: TokenUsage,
}

/// Deterministic response produced by the stub backend for `model`.
///
/// Content is clearly labelled so degraded output is never mistaken for a
/// real generation. Token counts are estimated from the text.
pub fn stub_response(model: &ModelId, request: &ModelRequest) -> ModelResponse {
    let content = format!("[stub:{model}] simulated response from {model}");
    let input = request
        .system
        .as_deref()
        .map(TokenCount::estimate_for)
        .unwrap_or_default()
        + TokenCount::estimate_for(&request.prompt);
    let output = TokenCount::estimate_for(&content);
    ModelResponse {
        content,
        usage: TokenUsage { input, output },
    }
}

// ---------------------------------------------------------------------------
// Backend errors
// ---------------------------------------------------------------------------

/// Failure of a single backend operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    /// The request did not complete within the configured timeout.
    #[error("request timed out after {after:?}")]
    Timeout {
        /// The timeout that elapsed.
        after: Duration,
    },

    /// The connection could not be established or was dropped.
    #[error("connection failed: {message}")]
    Connection {
        /// Transport-level description.
        message: String,
    },

    /// The backend answered with a non-success status.
    #[error("backend returned HTTP {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body (possibly truncated).
        body: String,
        /// Parsed `Retry-After` delay, if the backend sent one.
        retry_after: Option<Duration>,
    },

    /// The response body could not be decoded.
    #[error("could not decode backend response: {message}")]
    Decode {
        /// Decoder error description.
        message: String,
    },

    /// The response decoded but contained no generated content.
    #[error("backend response contained no content")]
    EmptyResponse,

    /// The handle could not be built from the configuration.
    #[error("backend misconfigured: {message}")]
    Misconfigured {
        /// Description of the problem.
        message: String,
    },
}

impl BackendError {
    /// Whether re-issuing the same request may succeed.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Timeout { .. } | Self::Connection { .. } => RetryPolicy::Retryable { after: None },
            Self::Http {
                status,
                retry_after,
                ..
            } if *status == 429 || *status >= 500 => RetryPolicy::Retryable {
                after: *retry_after,
            },
            _ => RetryPolicy::NonRetryable,
        }
    }
}

impl From<BackendError> for InkwellError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Misconfigured { message } => Self::BackendConfigInvalid { reason: message },
            other => Self::InvocationFailure {
                message: other.to_string(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// A ready-to-use connection to one configured backend.
///
/// Every backend kind presents this same capability set; callers never see
/// kind-specific client types.
#[async_trait]
pub trait BackendHandle: Send + Sync {
    /// Family this handle belongs to.
    fn kind(&self) -> BackendKind;

    /// Model this handle invokes.
    fn model(&self) -> &ModelId;

    /// Generates content for `request`.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] once the configured retries are exhausted
    /// or on the first non-retryable failure.
    async fn invoke(&self, request: &ModelRequest) -> Result<ModelResponse, BackendError>;

    /// Releases any resources held by the handle.
    async fn close(&self) {}
}

/// Health classification reported by [`BackendDescriptor::health_check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Configuration validated.
    Healthy,
    /// Configuration did not validate.
    Unhealthy,
    /// The check itself could not be performed.
    Error,
}

/// Result of a backend health check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Outcome of the check.
    pub status: HealthStatus,
    /// Backend family checked.
    pub backend: BackendKind,
    /// Model named by the checked configuration.
    pub model: String,
    /// When the check completed.
    pub timestamp: Timestamp,
    /// Failure description for [`HealthStatus::Error`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Static description of one backend kind.
#[async_trait]
pub trait BackendDescriptor: Send + Sync {
    /// The family this descriptor describes.
    fn kind(&self) -> BackendKind;

    /// Checks credential presence/shape, or probes reachability for local
    /// backends. Never fails; returns `false` for any problem.
    async fn validate(&self, config: &BackendConfig) -> bool;

    /// Builds an invocation handle for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Misconfigured`] if the handle cannot be built
    /// (e.g. the HTTP client fails to initialise).
    fn build(&self, config: &BackendConfig) -> Result<Arc<dyn BackendHandle>, BackendError>;

    /// Estimated cost of one invocation from a static price table.
    /// Unknown models cost zero.
    fn estimate_cost(&self, model: &str, input_tokens: u64, output_tokens: u64) -> TokenCost;

    /// Models available for this kind; live where possible, else curated.
    async fn list_models(&self, config: &BackendConfig) -> Vec<String>;

    /// Reports whether `config` validates. Never fails.
    async fn health_check(&self, config: &BackendConfig) -> HealthReport {
        let (status, error) = if config.kind() != self.kind() {
            (
                HealthStatus::Error,
                Some(format!(
                    "configuration is for '{}', descriptor is '{}'",
                    config.kind(),
                    self.kind()
                )),
            )
        } else if self.validate(config).await {
            (HealthStatus::Healthy, None)
        } else {
            (HealthStatus::Unhealthy, None)
        };
        HealthReport {
            status,
            backend: config.kind(),
            model: config.model().to_string(),
            timestamp: Timestamp::now(),
            error,
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Catalog of backend descriptors available to a gateway.
///
/// Constructed explicitly at startup (the `llm` crate provides the full
/// built-in catalog); tests may register fakes or omit kinds.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    descriptors: HashMap<BackendKind, Arc<dyn BackendDescriptor>>,
}

impl BackendRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `descriptor` under its own kind, returning any descriptor it replaced.
    pub fn register(
        &mut self,
        descriptor: Arc<dyn BackendDescriptor>,
    ) -> Option<Arc<dyn BackendDescriptor>> {
        self.descriptors.insert(descriptor.kind(), descriptor)
    }

    /// Looks up the descriptor for `kind`.
    pub fn get(&self, kind: BackendKind) -> Option<Arc<dyn BackendDescriptor>> {
        self.descriptors.get(&kind).cloned()
    }

    /// Returns `true` if `kind` is registered.
    pub fn contains(&self, kind: BackendKind) -> bool {
        self.descriptors.contains_key(&kind)
    }

    /// Registered kinds in declaration order.
    pub fn kinds(&self) -> Vec<BackendKind> {
        BackendKind::ALL
            .into_iter()
            .filter(|k| self.descriptors.contains_key(k))
            .collect()
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysValid;

    #[async_trait]
    impl BackendDescriptor for AlwaysValid {
        fn kind(&self) -> BackendKind {
            BackendKind::Qwen
        }
        async fn validate(&self, config: &BackendConfig) -> bool {
            config.credential().is_some()
        }
        fn build(&self, _config: &BackendConfig) -> Result<Arc<dyn BackendHandle>, BackendError> {
            Err(BackendError::Misconfigured {
                message: "not needed".into(),
            })
        }
        fn estimate_cost(&self, _model: &str, _i: u64, _o: u64) -> TokenCost {
            TokenCost::zero()
        }
        async fn list_models(&self, _config: &BackendConfig) -> Vec<String> {
            vec![]
        }
    }

    #[test]
    fn test_kind_parses_case_insensitively_with_mock_alias() {
        assert_eq!("OpenAI".parse::<BackendKind>().unwrap(), BackendKind::OpenAi);
        assert_eq!("mock".parse::<BackendKind>().unwrap(), BackendKind::Stub);
        assert!(matches!(
            "gemini".parse::<BackendKind>(),
            Err(ConfigError::UnsupportedBackendKind { .. })
        ));
    }

    #[test]
    fn test_builder_applies_kind_defaults() {
        let config = BackendConfig::builder(BackendKind::Ollama).build().unwrap();
        assert_eq!(config.model().as_str(), "qwen3:8b");
        assert_eq!(config.endpoint(), Some("http://localhost:11434"));
        assert_eq!(config.timeout(), Duration::from_secs(60));
        assert_eq!(config.max_output_tokens(), 2000);
        assert_eq!(config.max_retries(), 3);
    }

    #[test]
    fn test_builder_rejects_out_of_bounds_values() {
        let hot = BackendConfig::builder(BackendKind::OpenAi).temperature(2.5).build();
        assert!(matches!(hot, Err(ConfigError::TemperatureOutOfRange { .. })));

        let zero = BackendConfig::builder(BackendKind::OpenAi).max_output_tokens(0).build();
        assert_eq!(zero, Err(ConfigError::MaxTokensZero));

        let instant = BackendConfig::builder(BackendKind::OpenAi)
            .timeout(Duration::ZERO)
            .build();
        assert_eq!(instant, Err(ConfigError::TimeoutZero));

        let blank = BackendConfig::builder(BackendKind::OpenAi).model("  ").build();
        assert_eq!(blank, Err(ConfigError::EmptyModel));
    }

    #[test]
    fn test_endpoint_override_strips_trailing_slash() {
        let config = BackendConfig::builder(BackendKind::DeepSeek)
            .endpoint("http://127.0.0.1:9000/v1/")
            .build()
            .unwrap();
        assert_eq!(config.endpoint(), Some("http://127.0.0.1:9000/v1"));
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let config = BackendConfig::builder(BackendKind::OpenAi)
            .credential("sk-secret")
            .build()
            .unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("Credential(***)"));
    }

    #[test]
    fn test_deserialisation_revalidates_bounds() {
        let ok: BackendConfig =
            serde_json::from_str(r#"{"kind": "claude", "credential": "sk-ant-x"}"#).unwrap();
        assert_eq!(ok.kind(), BackendKind::Claude);
        assert_eq!(ok.credential().map(Credential::expose), Some("sk-ant-x"));

        let bad = serde_json::from_str::<BackendConfig>(r#"{"kind": "claude", "temperature": 3.0}"#);
        assert!(bad.is_err());
        let unknown = serde_json::from_str::<BackendConfig>(r#"{"kind": "palm"}"#);
        assert!(unknown.is_err());
    }

    #[test]
    fn test_serialisation_omits_credential() {
        let config = BackendConfig::builder(BackendKind::Qwen)
            .credential("dashscope-key")
            .build()
            .unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("dashscope-key"));
        assert!(json.contains("\"kind\":\"qwen\""));
    }

    #[test]
    fn test_retry_policy_classification() {
        assert!(BackendError::Timeout {
            after: Duration::from_secs(1)
        }
        .retry_policy()
        .is_retryable());
        let throttled = BackendError::Http {
            status: 429,
            body: String::new(),
            retry_after: Some(Duration::from_secs(2)),
        };
        assert_eq!(
            throttled.retry_policy(),
            RetryPolicy::Retryable {
                after: Some(Duration::from_secs(2))
            }
        );
        let unauthorized = BackendError::Http {
            status: 401,
            body: String::new(),
            retry_after: None,
        };
        assert_eq!(unauthorized.retry_policy(), RetryPolicy::NonRetryable);
    }

    #[tokio::test]
    async fn test_health_check_reports_validation_outcome() {
        let descriptor = AlwaysValid;
        let with_key = BackendConfig::builder(BackendKind::Qwen)
            .credential("k")
            .build()
            .unwrap();
        let without_key = BackendConfig::builder(BackendKind::Qwen).build().unwrap();
        assert_eq!(
            descriptor.health_check(&with_key).await.status,
            HealthStatus::Healthy
        );
        assert_eq!(
            descriptor.health_check(&without_key).await.status,
            HealthStatus::Unhealthy
        );

        let mismatched = BackendConfig::builder(BackendKind::Claude).build().unwrap();
        let report = descriptor.health_check(&mismatched).await;
        assert_eq!(report.status, HealthStatus::Error);
        assert!(report.error.is_some());
    }

    #[test]
    fn test_registry_lists_kinds_in_declaration_order() {
        let mut registry = BackendRegistry::new();
        assert!(registry.register(Arc::new(AlwaysValid)).is_none());
        assert!(registry.contains(BackendKind::Qwen));
        assert!(!registry.contains(BackendKind::Stub));
        assert_eq!(registry.kinds(), vec![BackendKind::Qwen]);
    }
}
