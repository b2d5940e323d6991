//! Deterministic stub backend.
//!
//! Never touches the network and always validates. The gateway substitutes it
//! whenever the configured backend cannot be used.

use std::sync::Arc;

use async_trait::async_trait;
use domain::{
    stub_response, BackendConfig, BackendDescriptor, BackendError, BackendHandle, BackendKind,
    ModelId, ModelRequest, ModelResponse, TokenCost,
};

/// Descriptor for the stub backend kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubBackend;

#[async_trait]
impl BackendDescriptor for StubBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Stub
    }

    async fn validate(&self, _config: &BackendConfig) -> bool {
        true
    }

    fn build(&self, config: &BackendConfig) -> Result<Arc<dyn BackendHandle>, BackendError> {
        Ok(Arc::new(StubHandle {
            model: config.model().clone(),
        }))
    }

    fn estimate_cost(&self, _model: &str, _input_tokens: u64, _output_tokens: u64) -> TokenCost {
        TokenCost::zero()
    }

    async fn list_models(&self, _config: &BackendConfig) -> Vec<String> {
        vec![BackendKind::Stub.default_model().to_string()]
    }
}

/// Handle returning [`stub_response`] for every request.
#[derive(Debug, Clone)]
pub struct StubHandle {
    model: ModelId,
}

#[async_trait]
impl BackendHandle for StubHandle {
    fn kind(&self) -> BackendKind {
        BackendKind::Stub
    }

    fn model(&self) -> &ModelId {
        &self.model
    }

    async fn invoke(&self, request: &ModelRequest) -> Result<ModelResponse, BackendError> {
        Ok(stub_response(&self.model, request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stub_is_deterministic_and_labelled() {
        let handle = StubBackend.build(&BackendConfig::stub()).unwrap();
        let request = ModelRequest::new("Hello");
        let first = handle.invoke(&request).await.unwrap();
        let second = handle.invoke(&request).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first.content,
            "[stub:stub-model] simulated response from stub-model"
        );
        assert!(first.usage.output.as_u64() > 0);
    }

    #[tokio::test]
    async fn test_stub_always_validates() {
        assert!(StubBackend.validate(&BackendConfig::stub()).await);
    }
}
