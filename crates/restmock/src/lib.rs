//! REST mock-service dispatching.
//!
//! A [`Dispatcher`] takes an inbound HTTP request, runs the service's
//! on-request hook, resolves the operation bound to the request's method and
//! path, executes its action and lets the after-request hook observe the
//! result before the response is written.

pub mod config;
pub mod context;
pub mod dispatcher;
pub mod scripting;
pub mod server;
pub mod service;

pub use context::RunContext;
pub use dispatcher::{BufferedResponse, DispatchError, DispatchOutcome, Dispatcher, ResponseWriter};
pub use scripting::{HookOutcome, HookScript, ScriptError};
pub use service::{
    match_base_path, resolve_operation, ActionError, DispatchStyle, MockAction, MockRequest,
    MockResponse, MockResult, MockService, Operation, PathPattern, ResolvedOperation,
    ResponseAction, RestMockService, ResultSource,
};
