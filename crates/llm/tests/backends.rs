//! HTTP-level tests for the backend adapters against `wiremock` servers.

use std::time::Duration;

use domain::{
    BackendConfig, BackendDescriptor, BackendError, BackendHandle, BackendKind, ModelRequest,
};
use llm::{ClaudeBackend, OllamaBackend, OpenAiCompatible};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn chat_completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}],
        "usage": {"prompt_tokens": 12, "completion_tokens": 5, "total_tokens": 17}
    })
}

fn openai_config(server: &MockServer) -> BackendConfig {
    BackendConfig::builder(BackendKind::OpenAi)
        .model("gpt-4o-mini")
        .credential("sk-test")
        .endpoint(server.uri())
        .max_retries(2)
        .build()
        .unwrap()
}

#[tokio::test]
async fn openai_chat_returns_content_and_reported_usage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "messages": [
                {"role": "system", "content": "be brief"},
                {"role": "user", "content": "Hello"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion("Hi there")))
        .expect(1)
        .mount(&server)
        .await;

    let handle = OpenAiCompatible::openai()
        .build(&openai_config(&server))
        .unwrap();
    let response = handle
        .invoke(&ModelRequest::new("Hello").with_system("be brief"))
        .await
        .unwrap();

    assert_eq!(response.content, "Hi there");
    assert_eq!(response.usage.input.as_u64(), 12);
    assert_eq!(response.usage.output.as_u64(), 5);
}

#[tokio::test]
async fn openai_chat_retries_rate_limits_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "0")
                .set_body_json(json!({"error": {"message": "Rate limit reached"}})),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion("ok")))
        .expect(1)
        .mount(&server)
        .await;

    let handle = OpenAiCompatible::openai()
        .build(&openai_config(&server))
        .unwrap();
    let response = handle.invoke(&ModelRequest::new("Hello")).await.unwrap();
    assert_eq!(response.content, "ok");
}

#[tokio::test]
async fn openai_chat_does_not_retry_authentication_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"error": {"message": "Invalid API key"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let handle = OpenAiCompatible::openai()
        .build(&openai_config(&server))
        .unwrap();
    let err = handle.invoke(&ModelRequest::new("Hello")).await.unwrap_err();
    match err {
        BackendError::Http { status, body, .. } => {
            assert_eq!(status, 401);
            assert!(body.contains("Invalid API key"));
        }
        other => panic!("expected HTTP error, got {other:?}"),
    }
}

#[tokio::test]
async fn openai_chat_times_out_slow_responses() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_completion("late"))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let config = BackendConfig::builder(BackendKind::OpenAi)
        .credential("sk-test")
        .endpoint(server.uri())
        .timeout(Duration::from_millis(200))
        .max_retries(0)
        .build()
        .unwrap();
    let handle = OpenAiCompatible::openai().build(&config).unwrap();
    let err = handle.invoke(&ModelRequest::new("Hello")).await.unwrap_err();
    assert!(matches!(err, BackendError::Timeout { .. }), "got {err:?}");
}

#[tokio::test]
async fn openai_chat_rejects_empty_choices() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let handle = OpenAiCompatible::openai()
        .build(&openai_config(&server))
        .unwrap();
    let err = handle.invoke(&ModelRequest::new("Hello")).await.unwrap_err();
    assert_eq!(err, BackendError::EmptyResponse);
}

#[tokio::test]
async fn openai_list_models_queries_live_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "gpt-4o"}, {"id": "gpt-4o-mini"}]
        })))
        .mount(&server)
        .await;

    let models = OpenAiCompatible::openai()
        .list_models(&openai_config(&server))
        .await;
    assert_eq!(models, vec!["gpt-4o", "gpt-4o-mini"]);
}

#[tokio::test]
async fn openai_list_models_falls_back_to_curated_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let models = OpenAiCompatible::openai()
        .list_models(&openai_config(&server))
        .await;
    assert!(models.contains(&"gpt-3.5-turbo".to_string()));
}

#[tokio::test]
async fn claude_messages_sends_api_key_and_system_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "sk-ant-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({"system": "formal tone"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "Dear reader"}],
            "usage": {"input_tokens": 9, "output_tokens": 3}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = BackendConfig::builder(BackendKind::Claude)
        .credential("sk-ant-test")
        .endpoint(server.uri())
        .build()
        .unwrap();
    let handle = ClaudeBackend.build(&config).unwrap();
    let response = handle
        .invoke(&ModelRequest::new("Write a memo").with_system("formal tone"))
        .await
        .unwrap();
    assert_eq!(response.content, "Dear reader");
    assert_eq!(response.usage.total().as_u64(), 12);
}

fn ollama_config(endpoint: &str) -> BackendConfig {
    BackendConfig::builder(BackendKind::Ollama)
        .model("llama3:8b")
        .endpoint(endpoint)
        .max_retries(0)
        .build()
        .unwrap()
}

#[tokio::test]
async fn ollama_validates_and_lists_via_tags() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{"name": "llama3:8b"}, {"name": "qwen3:8b"}]
        })))
        .mount(&server)
        .await;

    let config = ollama_config(&server.uri());
    assert!(OllamaBackend.validate(&config).await);
    assert_eq!(
        OllamaBackend.list_models(&config).await,
        vec!["llama3:8b", "qwen3:8b"]
    );
}

#[tokio::test]
async fn ollama_unreachable_fails_validation_and_lists_curated() {
    let config = ollama_config("http://127.0.0.1:9");
    assert!(!OllamaBackend.validate(&config).await);
    let models = OllamaBackend.list_models(&config).await;
    assert!(models.contains(&"llama3:8b".to_string()));
}

#[tokio::test]
async fn ollama_chat_handle_posts_to_chat_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"model": "llama3:8b", "stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {"role": "assistant", "content": "local answer"},
            "prompt_eval_count": 4,
            "eval_count": 2
        })))
        .expect(1)
        .mount(&server)
        .await;

    let handle = OllamaBackend.build(&ollama_config(&server.uri())).unwrap();
    let response = handle.invoke(&ModelRequest::new("hi")).await.unwrap();
    assert_eq!(response.content, "local answer");
    assert_eq!(response.usage.total().as_u64(), 6);
}

#[tokio::test]
async fn ollama_generate_adapter_sends_prompt_and_system_separately() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({
            "prompt": "summarise this",
            "system": "one sentence",
            "stream": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "Short summary.",
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = BackendConfig::builder(BackendKind::Ollama)
        .endpoint(server.uri())
        .extra_param("api", json!("generate"))
        .build()
        .unwrap();
    let handle = OllamaBackend.build(&config).unwrap();
    assert_eq!(handle.kind(), BackendKind::Ollama);
    let response = handle
        .invoke(&ModelRequest::new("summarise this").with_system("one sentence"))
        .await
        .unwrap();
    assert_eq!(response.content, "Short summary.");
}
