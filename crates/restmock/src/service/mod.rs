//! Mock services and the pieces a dispatch resolves against.
//!
//! - `types`: `MockRequest`, `MockResult` and action errors
//! - `path`: base path matching and operation path patterns
//! - `operation`: `Operation`, the `MockAction` trait and operation resolution
//! - `action`: `ResponseAction`, the canned-response action
//! - `rest`: the `MockService` trait and `RestMockService`

mod action;
mod operation;
mod path;
mod rest;
mod types;

pub use action::{DispatchStyle, MockResponse, ResponseAction};
pub use operation::{resolve_operation, MockAction, Operation, ResolvedOperation};
pub use path::{match_base_path, normalize_base_path, PathPattern, PatternError};
pub use rest::{MockService, RestMockService};
pub use types::{
    normalize_method, parse_method, parse_query_string, ActionError, MockRequest, MockResult,
    ResultSource,
};
