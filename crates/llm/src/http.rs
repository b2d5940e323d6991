//! Shared HTTP plumbing: client construction, status/transport error mapping,
//! and the retry loop used by every network backend.

use std::future::Future;
use std::time::Duration;

use domain::{BackendConfig, BackendError, BackendKind, ModelRequest, RetryPolicy};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

/// Timeout for reachability probes and model-list queries.
pub(crate) const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

const BACKOFF_BASE: Duration = Duration::from_millis(500);
const BACKOFF_CAP: Duration = Duration::from_secs(8);
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Builds a client whose per-request timeout is the config's timeout.
pub(crate) fn client_for(config: &BackendConfig) -> Result<reqwest::Client, BackendError> {
    client_with_timeout(config.timeout())
}

pub(crate) fn client_with_timeout(timeout: Duration) -> Result<reqwest::Client, BackendError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| BackendError::Misconfigured {
            message: format!("failed to build HTTP client: {e}"),
        })
}

/// Endpoint for `config`, or a misconfiguration error if the kind has none.
pub(crate) fn endpoint_for(config: &BackendConfig) -> Result<String, BackendError> {
    config
        .endpoint()
        .map(str::to_string)
        .ok_or_else(|| BackendError::Misconfigured {
            message: format!("backend '{}' has no endpoint", config.kind()),
        })
}

/// Maps a transport-level `reqwest` failure.
pub(crate) fn transport_error(err: reqwest::Error, timeout: Duration) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout { after: timeout }
    } else if err.is_decode() {
        BackendError::Decode {
            message: err.to_string(),
        }
    } else {
        BackendError::Connection {
            message: err.to_string(),
        }
    }
}

/// Checks the status and decodes a JSON body.
///
/// Non-success statuses become [`BackendError::Http`] carrying a truncated
/// body and any `Retry-After` delay.
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    timeout: Duration,
) -> Result<T, BackendError> {
    let status = response.status();
    if !status.is_success() {
        let retry_after = parse_retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();
        return Err(BackendError::Http {
            status: status.as_u16(),
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            retry_after,
        });
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|e| transport_error(e, timeout))?;
    serde_json::from_slice(&bytes).map_err(|e| BackendError::Decode {
        message: e.to_string(),
    })
}

/// Parses a `Retry-After` header given in whole seconds.
pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Exponential back-off for the given zero-based retry number.
pub(crate) fn backoff(retry: u32) -> Duration {
    BACKOFF_BASE
        .checked_mul(1u32 << retry.min(16))
        .map_or(BACKOFF_CAP, |d| d.min(BACKOFF_CAP))
}

/// Delay before the next retry. A server-supplied `Retry-After` is honoured
/// up to [`BACKOFF_CAP`].
pub(crate) fn retry_delay(after: Option<Duration>, retry: u32) -> Duration {
    after.map_or_else(|| backoff(retry), |d| d.min(BACKOFF_CAP))
}

/// Runs `attempt` until it succeeds, fails non-retryably, or `max_retries`
/// retries have been spent.
pub(crate) async fn with_retries<T, F, Fut>(
    kind: BackendKind,
    max_retries: u32,
    mut attempt: F,
) -> Result<T, BackendError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    let mut retries = 0;
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) => match err.retry_policy() {
                RetryPolicy::Retryable { after } if retries < max_retries => {
                    let delay = retry_delay(after, retries);
                    warn!(
                        backend = %kind,
                        retry = retries + 1,
                        max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying backend request"
                    );
                    tokio::time::sleep(delay).await;
                    retries += 1;
                }
                _ => return Err(err),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Chat message wire shape shared by the OpenAI-compatible and Ollama chat APIs
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(crate) struct ChatMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

/// System message (if any) followed by the user prompt.
pub(crate) fn chat_messages(request: &ModelRequest) -> Vec<ChatMessage<'_>> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = request.system.as_deref() {
        messages.push(ChatMessage {
            role: "system",
            content: system,
        });
    }
    messages.push(ChatMessage {
        role: "user",
        content: &request.prompt,
    });
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_doubles_and_caps() {
        assert_eq!(backoff(0), Duration::from_millis(500));
        assert_eq!(backoff(1), Duration::from_secs(1));
        assert_eq!(backoff(3), Duration::from_secs(4));
        assert_eq!(backoff(10), BACKOFF_CAP);
        assert_eq!(backoff(u32::MAX), BACKOFF_CAP);
    }

    #[test]
    fn test_retry_delay_clamps_server_supplied_wait() {
        assert_eq!(
            retry_delay(Some(Duration::from_secs(86_400)), 0),
            BACKOFF_CAP
        );
        assert_eq!(
            retry_delay(Some(Duration::from_secs(2)), 5),
            Duration::from_secs(2)
        );
        assert_eq!(retry_delay(None, 1), backoff(1));
    }

    #[test]
    fn test_retry_after_parses_whole_seconds_only() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("3"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(3)));
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn test_chat_messages_put_system_first() {
        let request = ModelRequest::new("hi").with_system("be brief");
        let messages = chat_messages(&request);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].content, "hi");
        assert_eq!(chat_messages(&ModelRequest::new("x")).len(), 1);
    }

    fn throttled() -> BackendError {
        BackendError::Http {
            status: 429,
            body: String::new(),
            retry_after: Some(Duration::ZERO),
        }
    }

    #[tokio::test]
    async fn test_with_retries_stops_after_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retries(BackendKind::OpenAi, 2, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(throttled()) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retries_does_not_retry_client_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retries(BackendKind::OpenAi, 5, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(BackendError::Http {
                    status: 400,
                    body: "bad".into(),
                    retry_after: None,
                })
            }
        })
        .await;
        assert!(matches!(result, Err(BackendError::Http { status: 400, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_retries_returns_first_success() {
        let calls = AtomicU32::new(0);
        let result = with_retries(BackendKind::Qwen, 3, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(throttled())
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 1);
    }
}
