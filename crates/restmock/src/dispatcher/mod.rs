//! Request dispatch for a single mock service.
//!
//! A [`Dispatcher`] pairs one `MockService` with the `RunContext` its hooks
//! share and turns each inbound request into a [`DispatchOutcome`]:
//!
//! 1. run the on-request hook, which may override the dispatch or fail
//! 2. strip the service base path and resolve an operation
//! 3. run the operation's action
//! 4. let the after-request hook observe the result
//! 5. write status, headers and body to the [`ResponseWriter`]
//!
//! Failures of hooks and actions, panics included, end as a 500 and never
//! escape `dispatch_request`.
//!
//! ## Module Structure
//!
//! - `types`: `DispatchOutcome`, `DispatchError`, `ResponseWriter`, `BufferedResponse`
//! - `core`: the `Dispatcher` itself

mod core;
mod types;


pub use core::Dispatcher;
pub use types::{BufferedResponse, DispatchError, DispatchOutcome, ResponseWriter};
