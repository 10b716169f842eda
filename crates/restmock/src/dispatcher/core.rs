//! Core Dispatcher struct and the dispatch state machine.

use super::types::{DispatchError, DispatchOutcome, ResponseWriter};
use crate::context::RunContext;
use crate::scripting::{HookOutcome, ScriptError};
use crate::service::{match_base_path, MockRequest, MockResult, MockService, ResultSource};
use bytes::Bytes;
use hyper::Request;
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Dispatches requests against one mock service
pub struct Dispatcher {
    service: Arc<dyn MockService>,
    context: RunContext,
}

impl Dispatcher {
    pub fn new(service: Arc<dyn MockService>, context: RunContext) -> Self {
        Self { service, context }
    }

    pub fn service(&self) -> &Arc<dyn MockService> {
        &self.service
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Base path of the dispatched service
    pub fn path(&self) -> &str {
        self.service.path()
    }

    /// Handle one request from receipt to response.
    ///
    /// Blocks until the hooks and the action have finished. The outcome has
    /// already been written to `response` when this returns.
    pub fn dispatch_request(
        &self,
        raw: &Request<Bytes>,
        response: &mut dyn ResponseWriter,
    ) -> DispatchOutcome {
        let dispatch_id = self.context.record_dispatch();
        let mut request = MockRequest::from_http(raw);
        debug!(
            "Dispatch #{} on '{}': {} {}",
            dispatch_id,
            self.service.name(),
            request.method(),
            request.path()
        );

        let outcome = match catch_unwind(AssertUnwindSafe(|| self.resolve_and_run(&mut request))) {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("Dispatch #{} panicked: {}", dispatch_id, message);
                DispatchOutcome::Failed(DispatchError::Panicked(message))
            }
        };

        // Hard failures leave nothing for the after-request hook to observe
        if let Some(result) = outcome.result() {
            self.run_after_request(result);
        }

        outcome.write_to(response);
        debug!(
            "Dispatch #{} finished with {}",
            dispatch_id,
            outcome.status()
        );
        outcome
    }

    fn resolve_and_run(&self, request: &mut MockRequest) -> DispatchOutcome {
        match self.run_on_request(request) {
            HookOutcome::NoOverride => {}
            HookOutcome::Override(result) => {
                debug!("On-request hook overrode the dispatch");
                return DispatchOutcome::Overridden(result.attributed(ResultSource::Override));
            }
            HookOutcome::Failed(e) => {
                error!("On-request hook of '{}' failed: {}", self.service.name(), e);
                return DispatchOutcome::Failed(DispatchError::OnRequestHook(e));
            }
        }

        let Some(residual) = match_base_path(request.path(), self.service.path()) else {
            debug!(
                "Path {} is outside base path '{}'",
                request.path(),
                self.service.path()
            );
            return DispatchOutcome::NotFound(MockResult::not_found(
                request.method(),
                request.path(),
            ));
        };
        let residual = residual.to_string();

        let Some(resolved) = self
            .service
            .find_best_matched_operation(&residual, request.method())
        else {
            debug!("No operation matches {} {}", request.method(), residual);
            return DispatchOutcome::NotFound(MockResult::not_found(
                request.method(),
                request.path(),
            ));
        };

        let operation = resolved.operation;
        request.set_path_params(resolved.path_params);
        debug!("Matched operation '{}'", operation.name());

        let request = &*request;
        let action = operation.action();
        match catch_unwind(AssertUnwindSafe(|| {
            action.dispatch_request(request, &self.context)
        })) {
            Ok(Ok(result)) => DispatchOutcome::Matched(result.attributed(ResultSource::Operation {
                name: operation.name().to_string(),
            })),
            Ok(Err(e)) => {
                error!("Operation '{}' failed: {}", operation.name(), e);
                DispatchOutcome::Failed(DispatchError::Action {
                    operation: operation.name().to_string(),
                    source: e,
                })
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("Operation '{}' panicked: {}", operation.name(), message);
                DispatchOutcome::Failed(DispatchError::ActionPanicked {
                    operation: operation.name().to_string(),
                    message,
                })
            }
        }
    }

    fn run_on_request(&self, request: &MockRequest) -> HookOutcome {
        catch_unwind(AssertUnwindSafe(|| {
            self.service.run_on_request_script(&self.context, request)
        }))
        .unwrap_or_else(|panic| {
            HookOutcome::Failed(ScriptError::Panicked {
                script: "on-request".to_string(),
                message: panic_message(panic.as_ref()),
            })
        })
    }

    fn run_after_request(&self, result: &MockResult) {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.service.run_after_request_script(&self.context, result)
        }));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("After-request hook of '{}' failed: {}", self.service.name(), e),
            Err(panic) => warn!(
                "After-request hook of '{}' panicked: {}",
                self.service.name(),
                panic_message(panic.as_ref())
            ),
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("service", &self.service.name())
            .field("path", &self.service.path())
            .field("context", &self.context)
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
