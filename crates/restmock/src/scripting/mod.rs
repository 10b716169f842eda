//! Rhai hook scripts.
//!
//! A [`HookScript`] is compiled once and evaluated many times, possibly from
//! several dispatches at once. Every evaluation builds its own engine and
//! scope; only the AST is shared.
//!
//! Scripts see three variables:
//!
//! - `request` (on-request and response selection): a map with `method`,
//!   `path`, `query`, `headers`, `body`, `json` and `pathParams`
//! - `result` (after-request): a map with `status`, `headers`, `body`,
//!   `operation`, `source` and `response`
//! - `context`: the service's `RunContext`, with `get`, `set`, `exists`,
//!   `remove`, `increment` and `dispatch_count`
//!
//! Hooks also see `service`, the service name.

mod rhai_engine;

use crate::context::RunContext;
use crate::service::{MockRequest, MockResult};
use rhai::{Dynamic, Scope, AST};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub use rhai_engine::{create_engine, dynamic_to_json, json_to_dynamic};

/// Failure while compiling or running a hook script
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptError {
    #[error("script '{script}' failed to compile: {message}")]
    Compile { script: String, message: String },
    #[error("script '{script}' failed: {message}")]
    Runtime { script: String, message: String },
    #[error("script '{script}' returned an invalid result: {message}")]
    InvalidResult { script: String, message: String },
    #[error("script '{script}' panicked: {message}")]
    Panicked { script: String, message: String },
}

impl ScriptError {
    /// Name of the script that failed
    pub fn script(&self) -> &str {
        match self {
            ScriptError::Compile { script, .. }
            | ScriptError::Runtime { script, .. }
            | ScriptError::InvalidResult { script, .. }
            | ScriptError::Panicked { script, .. } => script,
        }
    }
}

/// What an on-request hook decided
#[derive(Debug, Clone, PartialEq)]
pub enum HookOutcome {
    /// Continue with normal resolution
    NoOverride,
    /// Answer with this result and skip resolution
    Override(MockResult),
    /// The hook failed; the dispatch answers with an internal error
    Failed(ScriptError),
}

/// A compiled Rhai script
#[derive(Clone)]
pub struct HookScript {
    name: String,
    ast: Arc<AST>,
}

impl HookScript {
    pub fn compile(name: impl Into<String>, source: &str) -> Result<Self, ScriptError> {
        let name = name.into();
        let ast = create_engine()
            .compile(source)
            .map_err(|e| ScriptError::Compile {
                script: name.clone(),
                message: e.to_string(),
            })?;

        Ok(Self {
            name,
            ast: Arc::new(ast),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn eval(&self, mut scope: Scope<'_>) -> Result<Dynamic, ScriptError> {
        create_engine()
            .eval_ast_with_scope::<Dynamic>(&mut scope, &self.ast)
            .map_err(|e| ScriptError::Runtime {
                script: self.name.clone(),
                message: e.to_string(),
            })
    }

    /// Run as an on-request hook.
    ///
    /// A returned map overrides the dispatch; anything else does not.
    pub fn run_on_request(
        &self,
        context: &RunContext,
        request: &MockRequest,
        service: &str,
    ) -> HookOutcome {
        let mut scope = Scope::new();
        scope.push("request", rhai_engine::request_map(request));
        scope.push("context", context.clone());
        scope.push_constant("service", service.to_string());

        let value = match self.eval(scope) {
            Ok(value) => value,
            Err(e) => return HookOutcome::Failed(e),
        };

        match rhai_engine::parse_override(value) {
            Ok(Some(result)) => {
                debug!("Script '{}' overrode the dispatch", self.name);
                HookOutcome::Override(result)
            }
            Ok(None) => HookOutcome::NoOverride,
            Err(message) => HookOutcome::Failed(ScriptError::InvalidResult {
                script: self.name.clone(),
                message,
            }),
        }
    }

    /// Run as an after-request hook. The return value is ignored.
    pub fn run_after_request(
        &self,
        context: &RunContext,
        result: &MockResult,
        service: &str,
    ) -> Result<(), ScriptError> {
        let mut scope = Scope::new();
        scope.push("result", rhai_engine::result_map(result));
        scope.push("context", context.clone());
        scope.push_constant("service", service.to_string());

        self.eval(scope).map(|_| ())
    }

    /// Run as a response selector, returning the chosen response name
    pub fn select_response(
        &self,
        context: &RunContext,
        request: &MockRequest,
    ) -> Result<Option<String>, ScriptError> {
        let mut scope = Scope::new();
        scope.push("request", rhai_engine::request_map(request));
        scope.push("context", context.clone());

        Ok(self.eval(scope)?.try_cast::<String>())
    }
}

impl fmt::Debug for HookScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookScript")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
