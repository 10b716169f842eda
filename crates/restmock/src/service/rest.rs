//! REST mock service: a base path, operations and optional hooks.

use super::operation::{resolve_operation, Operation, ResolvedOperation};
use super::path::normalize_base_path;
use super::types::{MockRequest, MockResult};
use crate::context::RunContext;
use crate::scripting::{HookOutcome, HookScript, ScriptError};
use hyper::Method;
use std::fmt;

/// What the dispatcher needs from a mock service
pub trait MockService: Send + Sync {
    fn name(&self) -> &str;

    /// Base path; empty means the service claims every path
    fn path(&self) -> &str;

    fn find_best_matched_operation(
        &self,
        residual_path: &str,
        method: &Method,
    ) -> Option<ResolvedOperation<'_>>;

    fn run_on_request_script(&self, context: &RunContext, request: &MockRequest) -> HookOutcome;

    fn run_after_request_script(
        &self,
        context: &RunContext,
        result: &MockResult,
    ) -> Result<(), ScriptError>;
}

/// Mock service backed by a list of operations and Rhai hooks.
///
/// Immutable once built; share it behind an `Arc`.
#[derive(Default)]
pub struct RestMockService {
    name: String,
    path: String,
    operations: Vec<Operation>,
    on_request: Option<HookScript>,
    after_request: Option<HookScript>,
}

impl RestMockService {
    pub fn new(name: impl Into<String>, path: &str) -> Self {
        Self {
            name: name.into(),
            path: normalize_base_path(path),
            ..Default::default()
        }
    }

    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operations.push(operation);
        self
    }

    pub fn with_on_request_script(mut self, script: HookScript) -> Self {
        self.on_request = Some(script);
        self
    }

    pub fn with_after_request_script(mut self, script: HookScript) -> Self {
        self.after_request = Some(script);
        self
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }
}

impl MockService for RestMockService {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn find_best_matched_operation(
        &self,
        residual_path: &str,
        method: &Method,
    ) -> Option<ResolvedOperation<'_>> {
        resolve_operation(&self.operations, residual_path, method)
    }

    fn run_on_request_script(&self, context: &RunContext, request: &MockRequest) -> HookOutcome {
        match &self.on_request {
            Some(script) => script.run_on_request(context, request, &self.name),
            None => HookOutcome::NoOverride,
        }
    }

    fn run_after_request_script(
        &self,
        context: &RunContext,
        result: &MockResult,
    ) -> Result<(), ScriptError> {
        match &self.after_request {
            Some(script) => script.run_after_request(context, result, &self.name),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for RestMockService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestMockService")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("operations", &self.operations)
            .field("on_request", &self.on_request.as_ref().map(HookScript::name))
            .field(
                "after_request",
                &self.after_request.as_ref().map(HookScript::name),
            )
            .finish()
    }
}
