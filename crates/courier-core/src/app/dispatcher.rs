//! HandlerDispatcher - decoded event -> every subscribed handler
//!
//! Shared by both consumers. One handler scope per message; handlers run one
//! after another in registration order.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::domain::DecodedEvent;
use crate::error::{DispatchError, HandlerFailure, ProcessingError};
use crate::ports::HandlerFactory;
use crate::typed::{EnvelopeCodec, SubscriptionRegistry};

/// What to do with the remaining handlers after one fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerFailureMode {
    /// Stop at the first failure.
    #[default]
    StopOnFirst,
    /// Run every handler and report all failures together.
    Isolated,
}

/// Outcome of one successful dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub event: String,
    pub invoked: Vec<&'static str>,
    /// Subscribed handlers the scope could not resolve.
    pub skipped: Vec<&'static str>,
}

impl DispatchReport {
    fn new(event: &str) -> Self {
        Self {
            event: event.to_string(),
            ..Self::default()
        }
    }

    pub fn is_noop(&self) -> bool {
        self.invoked.is_empty()
    }
}

pub struct HandlerDispatcher {
    registry: Arc<SubscriptionRegistry>,
    factory: Arc<dyn HandlerFactory>,
    mode: HandlerFailureMode,
}

impl HandlerDispatcher {
    pub fn new(
        registry: Arc<SubscriptionRegistry>,
        factory: Arc<dyn HandlerFactory>,
        mode: HandlerFailureMode,
    ) -> Self {
        Self {
            registry,
            factory,
            mode,
        }
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    pub fn mode(&self) -> HandlerFailureMode {
        self.mode
    }

    /// Decode a raw body and dispatch it.
    pub async fn process(&self, body: &[u8]) -> Result<DispatchReport, ProcessingError> {
        let event = EnvelopeCodec::decode(body, &self.registry)?;
        Ok(self.dispatch(&event).await?)
    }

    pub async fn dispatch(&self, event: &DecodedEvent) -> Result<DispatchReport, DispatchError> {
        let name = event.name();
        let mut report = DispatchReport::new(name);

        let Ok(subscriptions) = self.registry.handlers_for(name) else {
            warn!(event = %name, "no subscription for event, dropping it");
            return Ok(report);
        };

        // Dropped on every return path below, which releases the scope.
        let mut scope = self.factory.create_scope();
        let mut failures = Vec::new();

        for subscription in subscriptions {
            let key = subscription.handler();
            let Some(handler) = scope.resolve(key) else {
                warn!(event = %name, handler = key.name(), "unable to resolve registered handler");
                report.skipped.push(key.name());
                continue;
            };

            debug!(event = %name, handler = key.name(), "invoking handler");
            match subscription.invoker().invoke(handler, event).await {
                Ok(()) => report.invoked.push(key.name()),
                Err(err) => {
                    error!(event = %name, handler = key.name(), error = %format!("{err:#}"), "handler failed");
                    let failure = HandlerFailure {
                        handler: key.name(),
                        error: err,
                    };
                    match self.mode {
                        HandlerFailureMode::StopOnFirst => {
                            return Err(DispatchError::HandlerFailed {
                                event: name.to_string(),
                                failure,
                            });
                        }
                        HandlerFailureMode::Isolated => failures.push(failure),
                    }
                }
            }
        }

        if failures.is_empty() {
            Ok(report)
        } else {
            Err(DispatchError::HandlersFailed {
                event: name.to_string(),
                failures,
            })
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::impls::HandlerContainer;
    use crate::typed::registry::fixtures::{AcceptEvent, RejectEvent};

    fn accept(id: &str) -> DecodedEvent {
        DecodedEvent::new(AcceptEvent {
            transaction_id: id.into(),
        })
    }

    fn dispatcher(
        registry: SubscriptionRegistry,
        container: HandlerContainer,
        mode: HandlerFailureMode,
    ) -> HandlerDispatcher {
        HandlerDispatcher::new(Arc::new(registry), Arc::new(container), mode)
    }

    #[tokio::test]
    async fn test_zero_subscribers_is_a_noop() {
        let log = CallLog::default();
        let d = dispatcher(
            SubscriptionRegistry::new(),
            container(&log),
            HandlerFailureMode::StopOnFirst,
        );

        let report = d.dispatch(&accept("a")).await.unwrap();
        assert!(report.is_noop());
        assert!(log.entries().is_empty());
    }

    #[tokio::test]
    async fn test_two_subscribers_run_in_registration_order() {
        let log = CallLog::default();
        let mut registry = SubscriptionRegistry::new();
        registry.register::<AcceptEvent, SecondHandler>().unwrap();
        registry.register::<AcceptEvent, FirstHandler>().unwrap();
        let d = dispatcher(registry, container(&log), HandlerFailureMode::StopOnFirst);

        let report = d.dispatch(&accept("t1")).await.unwrap();

        assert_eq!(report.invoked, vec!["SecondHandler", "FirstHandler"]);
        assert_eq!(log.entries(), vec!["second:t1", "first:t1"]);
    }

    #[tokio::test]
    async fn test_stop_on_first_skips_remaining_handlers() {
        let log = CallLog::default();
        let mut registry = SubscriptionRegistry::new();
        registry.register::<AcceptEvent, FailingHandler>().unwrap();
        registry.register::<AcceptEvent, FirstHandler>().unwrap();
        let d = dispatcher(registry, container(&log), HandlerFailureMode::StopOnFirst);

        let err = d.dispatch(&accept("t2")).await.unwrap_err();

        assert!(matches!(
            err,
            DispatchError::HandlerFailed { ref failure, .. } if failure.handler == "FailingHandler"
        ));
        assert_eq!(log.entries(), vec!["failing:t2"]);
    }

    #[tokio::test]
    async fn test_isolated_mode_runs_everything_and_aggregates() {
        let log = CallLog::default();
        let mut registry = SubscriptionRegistry::new();
        registry.register::<AcceptEvent, FailingHandler>().unwrap();
        registry.register::<AcceptEvent, FirstHandler>().unwrap();
        let d = dispatcher(registry, container(&log), HandlerFailureMode::Isolated);

        let err = d.dispatch(&accept("t3")).await.unwrap_err();

        match err {
            DispatchError::HandlersFailed { event, failures } => {
                assert_eq!(event, "Accept");
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].handler, "FailingHandler");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(log.entries(), vec!["failing:t3", "first:t3"]);
    }

    #[tokio::test]
    async fn test_unresolvable_handler_is_skipped() {
        let log = CallLog::default();
        let mut registry = SubscriptionRegistry::new();
        registry.register::<AcceptEvent, FirstHandler>().unwrap();
        registry.register::<AcceptEvent, SecondHandler>().unwrap();

        let mut partial = HandlerContainer::new();
        let l = log.clone();
        partial.provide(move || SecondHandler(l.clone()));
        let d = dispatcher(registry, partial, HandlerFailureMode::StopOnFirst);

        let report = d.dispatch(&accept("t4")).await.unwrap();

        assert_eq!(report.skipped, vec!["FirstHandler"]);
        assert_eq!(report.invoked, vec!["SecondHandler"]);
        assert_eq!(log.entries(), vec!["second:t4"]);
    }

    #[tokio::test]
    async fn test_process_decodes_then_dispatches() {
        let log = CallLog::default();
        let mut registry = SubscriptionRegistry::new();
        registry.register::<AcceptEvent, FirstHandler>().unwrap();
        let d = dispatcher(registry, container(&log), HandlerFailureMode::StopOnFirst);

        let body = EnvelopeCodec::encode(&AcceptEvent {
            transaction_id: "abc".into(),
        })
        .unwrap();
        d.process(&body).await.unwrap();
        assert_eq!(log.entries(), vec!["first:abc"]);

        let unknown = EnvelopeCodec::encode(&RejectEvent {
            transaction_id: "r".into(),
            reason: "x".into(),
        })
        .unwrap();
        let err = d.process(&unknown).await.unwrap_err();
        assert!(matches!(err, ProcessingError::Codec(_)));
        assert_eq!(log.entries().len(), 1);
    }
}
