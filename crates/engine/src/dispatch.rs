//! The dispatch engine: classify, resolve a specialist, invoke, normalise.
//!
//! Per request the engine moves through
//! `Received → Classified → HandlerResolved → Invoking → {Completed | Failed}`.
//! Every outcome, including handler errors, panics and deadline expiry, is
//! returned as a [`DispatchResult`]; [`DispatchEngine::dispatch`] never fails.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use domain::{
    Classifier, DispatchError, DispatchErrorCode, DispatchRequest, DispatchResult, HandlerLabel,
    IntentSource, RequestId,
};
use futures::FutureExt;
use serde_json::Value;
use tracing::{field, info, info_span, warn, Instrument};

use crate::gateway::GatewayContext;
use crate::specialists::{RegistrationError, Specialist, SpecialistRegistry};

/// Routes requests to specialists.
pub struct DispatchEngine {
    classifier: Classifier,
    specialists: SpecialistRegistry,
    generalist: Arc<dyn Specialist>,
    gateway: Arc<GatewayContext>,
    deadline: Option<Duration>,
}

/// Where the handler label came from, and whether it was found.
struct Route {
    specialist: Arc<dyn Specialist>,
    resolved: bool,
    source: IntentSource,
    intent: String,
    matched_rule: Option<usize>,
}

impl DispatchEngine {
    /// Assembles an engine with no invocation deadline.
    ///
    /// # Errors
    ///
    /// [`RegistrationError::MissingGeneralist`] if `specialists` has no
    /// generalist to fall back to.
    pub fn new(
        classifier: Classifier,
        specialists: SpecialistRegistry,
        gateway: Arc<GatewayContext>,
    ) -> Result<Self, RegistrationError> {
        let generalist = specialists
            .get(&HandlerLabel::generalist())
            .ok_or(RegistrationError::MissingGeneralist)?;
        Ok(Self {
            classifier,
            specialists,
            generalist,
            gateway,
            deadline: None,
        })
    }

    /// Bounds every handler invocation by `deadline`.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Intent classifier consulted when a request names no handler.
    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Registered specialist handlers, keyed by label.
    pub fn specialists(&self) -> &SpecialistRegistry {
        &self.specialists
    }

    /// Shared model gateway every handler invokes through.
    pub fn gateway(&self) -> &Arc<GatewayContext> {
        &self.gateway
    }

    /// Runs `request` to completion. Never fails and never panics outward.
    pub async fn dispatch(&self, request: &DispatchRequest) -> DispatchResult {
        let request_id = RequestId::new_random();
        let span = info_span!("dispatch", request_id = %request_id, handler = field::Empty);
        self.run(request, request_id).instrument(span).await
    }

    async fn run(&self, request: &DispatchRequest, request_id: RequestId) -> DispatchResult {
        let started = Instant::now();

        if request.text.trim().is_empty() {
            warn!("rejecting blank request");
            let mut result = DispatchResult::failure(
                request.handler_label.clone(),
                DispatchError::new(
                    DispatchErrorCode::InvalidInput,
                    "request text must not be empty",
                ),
            )
            .with_metadata("requestId", request_id.to_string());
            result.elapsed = started.elapsed();
            return result;
        }

        let route = self.route(request);
        let label = route.specialist.label().clone();
        tracing::Span::current().record("handler", field::display(&label));

        let mut result = self.invoke(&route.specialist, request).await;
        result.elapsed = started.elapsed();
        result.metadata.insert("requestId".into(), request_id.to_string().into());
        result
            .metadata
            .insert("handlerResolved".into(), route.resolved.into());
        result.metadata.insert("intent".into(), route.intent.into());
        result.metadata.insert(
            "intentRule".into(),
            route.matched_rule.map_or(Value::Null, Value::from),
        );
        result
            .metadata
            .insert("intentSource".into(), route.source.as_str().into());

        info!(
            handler = %label,
            success = result.success,
            elapsed_ms = result.elapsed.as_millis() as u64,
            "dispatch finished"
        );
        result
    }

    fn route(&self, request: &DispatchRequest) -> Route {
        let (label, source, intent, matched_rule) = if request.handler_label.is_generalist() {
            let intent = self.classifier.classify(&request.text);
            let reported = intent.reported_label().to_string();
            (intent.label, IntentSource::Classifier, reported, intent.matched_rule)
        } else {
            let label = request.handler_label.clone();
            let reported = label.to_string();
            (label, IntentSource::Explicit, reported, None)
        };

        match self.specialists.get(&label) {
            Some(specialist) => Route {
                specialist,
                resolved: true,
                source,
                intent,
                matched_rule,
            },
            None => {
                warn!(handler = %label, "no specialist registered, falling back to generalist");
                Route {
                    specialist: Arc::clone(&self.generalist),
                    resolved: false,
                    source,
                    intent,
                    matched_rule,
                }
            }
        }
    }

    async fn invoke(
        &self,
        specialist: &Arc<dyn Specialist>,
        request: &DispatchRequest,
    ) -> DispatchResult {
        let label = specialist.label().clone();
        let invocation = AssertUnwindSafe(specialist.process(request, &self.gateway)).catch_unwind();

        let outcome = match self.deadline {
            Some(limit) => match tokio::time::timeout(limit, invocation).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(handler = %label, deadline_ms = limit.as_millis() as u64, "handler timed out");
                    return DispatchResult::failure(
                        label,
                        DispatchError::new(
                            DispatchErrorCode::InvocationTimeout,
                            format!("handler did not finish within {:.3}s", limit.as_secs_f64()),
                        ),
                    );
                }
            },
            None => invocation.await,
        };

        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                warn!(handler = %label, error = %err, "handler failed");
                DispatchResult::failure(
                    label,
                    DispatchError::new(DispatchErrorCode::InvocationFailure, err.to_string()),
                )
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(handler = %label, panic = %message, "handler panicked");
                DispatchResult::failure(
                    label,
                    DispatchError::new(
                        DispatchErrorCode::InvocationFailure,
                        format!("handler panicked: {message}"),
                    ),
                )
            }
        }
    }
}

impl std::fmt::Debug for DispatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchEngine")
            .field("specialists", &self.specialists)
            .field("deadline", &self.deadline)
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
