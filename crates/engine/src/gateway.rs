//! Backend gateway: resolves configurations into metered model handles.
//!
//! [`GatewayContext`] is built once at startup and passed by reference to
//! everything that needs a model. Resolution never fails. A configuration
//! that cannot be used (unregistered kind, failed validation, handle build
//! error) degrades to the stub backend with a `warn!` so callers always get
//! a working, clearly-labelled handle.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use domain::{
    stub_response, BackendConfig, BackendDescriptor, BackendError, BackendHandle, BackendKind,
    BackendRegistry, HealthReport, HealthStatus, ModelId, ModelRequest, ModelResponse, Timestamp,
    TokenCost, TokenCount,
};
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use crate::usage_tracker::UsageTracker;

// ---------------------------------------------------------------------------
// ModelHandle
// ---------------------------------------------------------------------------

/// A resolved backend handle that meters every invocation.
///
/// Cloning is cheap; clones share the underlying connection and tracker.
#[derive(Clone)]
pub struct ModelHandle {
    inner: Arc<dyn BackendHandle>,
    pricing: Option<Arc<dyn BackendDescriptor>>,
    usage: Arc<UsageTracker>,
    monitored: bool,
    degraded: bool,
}

impl ModelHandle {
    /// Kind of the backend actually serving requests.
    pub fn kind(&self) -> BackendKind {
        self.inner.kind()
    }

    /// Model actually serving requests.
    pub fn model(&self) -> &ModelId {
        self.inner.model()
    }

    /// `true` if the stub was substituted for the requested configuration.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Invokes the backend, recording latency, tokens and estimated cost.
    ///
    /// Failures are recorded too, with zero tokens and zero cost.
    ///
    /// # Errors
    ///
    /// Whatever [`BackendError`] the underlying handle returns.
    pub async fn invoke(&self, request: &ModelRequest) -> Result<ModelResponse, BackendError> {
        let started = Instant::now();
        let result = self.inner.invoke(request).await;
        let latency = started.elapsed();

        match &result {
            Ok(response) => {
                let cost = self
                    .pricing
                    .as_ref()
                    .map(|d| {
                        d.estimate_cost(
                            self.model().as_str(),
                            response.usage.input.as_u64(),
                            response.usage.output.as_u64(),
                        )
                    })
                    .unwrap_or_default();
                debug!(
                    backend = %self.kind(),
                    model = %self.model(),
                    tokens = %response.usage.total(),
                    latency_ms = latency.as_millis() as u64,
                    "model invocation succeeded"
                );
                if self.monitored {
                    self.usage
                        .record(self.kind(), true, response.usage.total(), cost, latency);
                }
            }
            Err(err) => {
                warn!(
                    backend = %self.kind(),
                    model = %self.model(),
                    error = %err,
                    "model invocation failed"
                );
                if self.monitored {
                    self.usage.record(
                        self.kind(),
                        false,
                        TokenCount::default(),
                        TokenCost::zero(),
                        latency,
                    );
                }
            }
        }
        result
    }

    /// Releases the underlying handle's resources.
    pub async fn close(&self) {
        self.inner.close().await;
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("kind", &self.kind())
            .field("model", self.model())
            .field("degraded", &self.degraded)
            .finish()
    }
}

/// Stub used when the registry has no stub descriptor of its own.
struct FallbackStub {
    model: ModelId,
}

#[async_trait]
impl BackendHandle for FallbackStub {
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

// ---------------------------------------------------------------------------
// GatewayContext
// ---------------------------------------------------------------------------

/// Process-wide gateway state: the backend catalog, the usage tracker and
/// the active configuration.
pub struct GatewayContext {
    registry: BackendRegistry,
    usage: Arc<UsageTracker>,
    active: BackendConfig,
    active_handle: OnceCell<ModelHandle>,
}

impl GatewayContext {
    /// Creates a gateway whose default handle is resolved from `active` on
    /// first use.
    pub fn new(registry: BackendRegistry, usage: Arc<UsageTracker>, active: BackendConfig) -> Self {
        Self {
            registry,
            usage,
            active,
            active_handle: OnceCell::new(),
        }
    }

    /// The backend catalog.
    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// The shared usage tracker.
    pub fn usage(&self) -> &Arc<UsageTracker> {
        &self.usage
    }

    /// The configuration chosen at startup.
    pub fn active_config(&self) -> &BackendConfig {
        &self.active
    }

    /// Runs the kind-specific check for `config`. Unregistered kinds fail.
    pub async fn validate(&self, config: &BackendConfig) -> bool {
        match self.registry.get(config.kind()) {
            Some(descriptor) => descriptor.validate(config).await,
            None => false,
        }
    }

    /// Resolves `config` into a handle, substituting the stub backend when
    /// the configuration cannot be used.
    #[instrument(skip_all, fields(backend = %config.kind(), model = %config.model()))]
    pub async fn resolve(&self, config: &BackendConfig) -> ModelHandle {
        let Some(descriptor) = self.registry.get(config.kind()) else {
            warn!(
                backend = %config.kind(),
                model = %config.model(),
                "backend kind is not registered, substituting stub backend"
            );
            return self.stub_handle();
        };

        if !descriptor.validate(config).await {
            warn!(
                backend = %config.kind(),
                model = %config.model(),
                "backend configuration failed validation, substituting stub backend"
            );
            return self.stub_handle();
        }

        match descriptor.build(config) {
            Ok(inner) => {
                info!(backend = %config.kind(), model = %config.model(), "backend resolved");
                ModelHandle {
                    inner,
                    pricing: Some(descriptor),
                    usage: Arc::clone(&self.usage),
                    monitored: config.monitoring_enabled(),
                    degraded: false,
                }
            }
            Err(err) => {
                warn!(
                    backend = %config.kind(),
                    model = %config.model(),
                    error = %err,
                    "backend handle could not be built, substituting stub backend"
                );
                self.stub_handle()
            }
        }
    }

    /// Resolves a kind given by name with that kind's defaults.
    ///
    /// The active kind resolves to the cached active handle. Unknown names
    /// degrade to the stub backend.
    pub async fn resolve_kind(&self, kind: &str) -> ModelHandle {
        let kind = match kind.parse::<BackendKind>() {
            Ok(kind) => kind,
            Err(err) => {
                warn!(error = %err, "substituting stub backend");
                return self.stub_handle();
            }
        };
        if kind == self.active.kind() {
            return self.active_handle().await;
        }
        match BackendConfig::builder(kind).build() {
            Ok(config) => self.resolve(&config).await,
            Err(err) => {
                warn!(backend = %kind, error = %err, "substituting stub backend");
                self.stub_handle()
            }
        }
    }

    /// Handle for the active configuration, resolved once and cached.
    pub async fn active_handle(&self) -> ModelHandle {
        self.active_handle
            .get_or_init(|| self.resolve(&self.active))
            .await
            .clone()
    }

    /// Health of the active configuration. Never fails.
    pub async fn health_check(&self) -> HealthReport {
        match self.registry.get(self.active.kind()) {
            Some(descriptor) => descriptor.health_check(&self.active).await,
            None => HealthReport {
                status: HealthStatus::Error,
                backend: self.active.kind(),
                model: self.active.model().to_string(),
                timestamp: Timestamp::now(),
                error: Some(format!(
                    "backend kind '{}' is not registered",
                    self.active.kind()
                )),
            },
        }
    }

    /// Estimated cost of an invocation; zero for unregistered kinds.
    pub fn estimate_cost(
        &self,
        kind: BackendKind,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
    ) -> TokenCost {
        self.registry
            .get(kind)
            .map(|d| d.estimate_cost(model, input_tokens, output_tokens))
            .unwrap_or_default()
    }

    /// Models available for `kind`.
    ///
    /// The active kind is queried with the active configuration (and its
    /// credential); other kinds with their defaults.
    pub async fn list_models(&self, kind: BackendKind) -> Vec<String> {
        let Some(descriptor) = self.registry.get(kind) else {
            return Vec::new();
        };
        if kind == self.active.kind() {
            return descriptor.list_models(&self.active).await;
        }
        match BackendConfig::builder(kind).build() {
            Ok(config) => descriptor.list_models(&config).await,
            Err(_) => Vec::new(),
        }
    }

    fn stub_handle(&self) -> ModelHandle {
        let config = BackendConfig::stub();
        let descriptor = self.registry.get(BackendKind::Stub);
        let inner = descriptor
            .as_ref()
            .and_then(|d| d.build(&config).ok())
            .unwrap_or_else(|| {
                Arc::new(FallbackStub {
                    model: config.model().clone(),
                })
            });
        ModelHandle {
            inner,
            pricing: descriptor,
            usage: Arc::clone(&self.usage),
            monitored: config.monitoring_enabled(),
            degraded: true,
        }
    }
}

impl std::fmt::Debug for GatewayContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayContext")
            .field("registry", &self.registry)
            .field("active", &self.active)
            .finish()
    }
}
