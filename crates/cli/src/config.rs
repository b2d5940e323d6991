//! Backend selection from environment variables.
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `LLM_BACKEND` (alias `LLM_PROVIDER`) | backend kind, default `ollama` |
//! | `<KIND>_MODEL`, `<KIND>_API_KEY`, `<KIND>_BASE_URL` | model, credential, endpoint |
//! | `LLM_TEMPERATURE`, `LLM_MAX_TOKENS`, `LLM_TIMEOUT`, `LLM_MAX_RETRIES` | numeric bounds |
//! | `LLM_ENABLE_CACHE`, `LLM_ENABLE_MONITORING` | flags |
//! | `OLLAMA_API=generate` | legacy Ollama generate endpoint |
//!
//! The loader never fails. An unknown kind or a value outside its bounds
//! yields the stub configuration; an unparseable value keeps its default.

use std::str::FromStr;
use std::time::Duration;

use domain::{BackendConfig, BackendKind};
use llm::ollama::{API_PARAM, GENERATE_API};
use tracing::warn;

const DEFAULT_BACKEND: BackendKind = BackendKind::Ollama;

/// Reads the active backend configuration from the process environment.
pub fn backend_config_from_env() -> BackendConfig {
    backend_config_from(|key| std::env::var(key).ok())
}

/// Reads the active backend configuration through `lookup`.
pub fn backend_config_from<F>(lookup: F) -> BackendConfig
where
    F: Fn(&str) -> Option<String>,
{
    let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    let kind = match value("LLM_BACKEND").or_else(|| value("LLM_PROVIDER")) {
        Some(raw) => match raw.parse::<BackendKind>() {
            Ok(kind) => kind,
            Err(err) => {
                warn!(kind = %raw, error = %err, "unknown backend kind, using stub");
                return BackendConfig::stub();
            }
        },
        None => DEFAULT_BACKEND,
    };

    let prefix = kind.env_prefix();
    let mut builder = BackendConfig::builder(kind);
    if let Some(model) = value(&format!("{prefix}_MODEL")) {
        builder = builder.model(model);
    }
    if let Some(key) = value(&format!("{prefix}_API_KEY")) {
        builder = builder.credential(key);
    }
    if let Some(url) = value(&format!("{prefix}_BASE_URL")) {
        builder = builder.endpoint(url);
    }
    if let Some(temperature) = parsed::<f64>(&value, "LLM_TEMPERATURE") {
        builder = builder.temperature(temperature);
    }
    if let Some(max_tokens) = parsed::<u32>(&value, "LLM_MAX_TOKENS") {
        builder = builder.max_output_tokens(max_tokens);
    }
    if let Some(secs) = parsed::<f64>(&value, "LLM_TIMEOUT") {
        match Duration::try_from_secs_f64(secs) {
            Ok(timeout) => builder = builder.timeout(timeout),
            Err(_) => warn!(key = "LLM_TIMEOUT", value = secs, "ignoring invalid timeout"),
        }
    }
    if let Some(retries) = parsed::<u32>(&value, "LLM_MAX_RETRIES") {
        builder = builder.max_retries(retries);
    }
    if let Some(enabled) = flag(&value, "LLM_ENABLE_CACHE") {
        builder = builder.enable_cache(enabled);
    }
    if let Some(enabled) = flag(&value, "LLM_ENABLE_MONITORING") {
        builder = builder.enable_monitoring(enabled);
    }
    if kind == BackendKind::Ollama
        && value("OLLAMA_API").is_some_and(|api| api.trim().eq_ignore_ascii_case(GENERATE_API))
    {
        builder = builder.extra_param(API_PARAM, serde_json::Value::from(GENERATE_API));
    }

    match builder.build() {
        Ok(config) => config,
        Err(err) => {
            warn!(backend = %kind, error = %err, "backend configuration rejected, using stub");
            BackendConfig::stub()
        }
    }
}

fn parsed<T>(value: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = value(key)?;
    match raw.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            warn!(key, value = %raw, error = %err, "ignoring unparseable setting");
            None
        }
    }
}

fn flag(value: &impl Fn(&str) -> Option<String>, key: &str) -> Option<bool> {
    let raw = value(key)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            warn!(key, value = %raw, "ignoring unparseable flag");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> BackendConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        backend_config_from(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_to_ollama() {
        let config = load(&[]);
        assert_eq!(config.kind(), BackendKind::Ollama);
        assert_eq!(config.model().as_str(), "qwen3:8b");
        assert_eq!(config.timeout(), Duration::from_secs(60));
        assert!(config.extra_param(API_PARAM).is_none());
    }

    #[test]
    fn test_per_kind_variables_are_applied() {
        let config = load(&[
            ("LLM_BACKEND", "openai"),
            ("OPENAI_MODEL", "gpt-4o"),
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_BASE_URL", "http://localhost:9000/v1"),
            ("QWEN_MODEL", "ignored"),
            ("LLM_TEMPERATURE", "0.2"),
            ("LLM_MAX_TOKENS", "512"),
            ("LLM_TIMEOUT", "12.5"),
            ("LLM_MAX_RETRIES", "1"),
            ("LLM_ENABLE_CACHE", "no"),
            ("LLM_ENABLE_MONITORING", "off"),
        ]);
        assert_eq!(config.kind(), BackendKind::OpenAi);
        assert_eq!(config.model().as_str(), "gpt-4o");
        assert_eq!(config.credential().map(|c| c.expose()), Some("sk-test"));
        assert_eq!(config.endpoint(), Some("http://localhost:9000/v1"));
        assert!((config.temperature().as_f64() - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.max_output_tokens(), 512);
        assert_eq!(config.timeout(), Duration::from_millis(12_500));
        assert_eq!(config.max_retries(), 1);
        assert!(!config.cache_enabled());
        assert!(!config.monitoring_enabled());
    }

    #[test]
    fn test_provider_alias_and_mock_kind() {
        let config = load(&[("LLM_PROVIDER", "mock")]);
        assert_eq!(config.kind(), BackendKind::Stub);

        let config = load(&[("LLM_BACKEND", "claude"), ("LLM_PROVIDER", "qwen")]);
        assert_eq!(config.kind(), BackendKind::Claude);
    }

    #[test]
    fn test_unknown_kind_falls_back_to_stub() {
        assert_eq!(load(&[("LLM_BACKEND", "gpt-5")]), BackendConfig::stub());
    }

    #[test]
    fn test_out_of_bounds_value_falls_back_to_stub() {
        let config = load(&[("LLM_BACKEND", "deepseek"), ("LLM_TEMPERATURE", "3.5")]);
        assert_eq!(config, BackendConfig::stub());

        let config = load(&[("LLM_BACKEND", "deepseek"), ("LLM_MAX_TOKENS", "0")]);
        assert_eq!(config, BackendConfig::stub());
    }

    #[test]
    fn test_unparseable_values_keep_defaults() {
        let config = load(&[
            ("LLM_BACKEND", "qwen"),
            ("LLM_MAX_TOKENS", "lots"),
            ("LLM_TIMEOUT", "-4"),
            ("LLM_ENABLE_CACHE", "maybe"),
        ]);
        assert_eq!(config.kind(), BackendKind::Qwen);
        assert_eq!(config.max_output_tokens(), 2000);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.cache_enabled());
    }

    #[test]
    fn test_ollama_generate_api_selection() {
        let config = load(&[("OLLAMA_API", "Generate")]);
        assert_eq!(
            config.extra_param(API_PARAM).and_then(|v| v.as_str()),
            Some(GENERATE_API)
        );

        let config = load(&[("LLM_BACKEND", "openai"), ("OLLAMA_API", "generate")]);
        assert!(config.extra_param(API_PARAM).is_none());
    }
}
