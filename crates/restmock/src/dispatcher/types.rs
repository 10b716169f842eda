//! Outcome, error and response-writer types for the dispatcher.

use crate::scripting::ScriptError;
use crate::service::{ActionError, MockResult};
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{Response, StatusCode};
use tracing::warn;

/// A dispatch failure contained at the dispatch boundary
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("on-request hook failed: {0}")]
    OnRequestHook(#[source] ScriptError),
    #[error("operation '{operation}' failed: {source}")]
    Action {
        operation: String,
        #[source]
        source: ActionError,
    },
    #[error("operation '{operation}' panicked: {message}")]
    ActionPanicked { operation: String, message: String },
    #[error("dispatch panicked: {0}")]
    Panicked(String),
}

/// How a dispatch ended
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The on-request hook supplied the result
    Overridden(MockResult),
    /// An operation matched and its action produced the result
    Matched(MockResult),
    /// No service path or operation matched
    NotFound(MockResult),
    /// A hook or action failed before a result existed
    Failed(DispatchError),
}

impl DispatchOutcome {
    pub fn result(&self) -> Option<&MockResult> {
        match self {
            DispatchOutcome::Overridden(result)
            | DispatchOutcome::Matched(result)
            | DispatchOutcome::NotFound(result) => Some(result),
            DispatchOutcome::Failed(_) => None,
        }
    }

    pub fn into_result(self) -> Option<MockResult> {
        match self {
            DispatchOutcome::Overridden(result)
            | DispatchOutcome::Matched(result)
            | DispatchOutcome::NotFound(result) => Some(result),
            DispatchOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&DispatchError> {
        match self {
            DispatchOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Status written for this outcome
    pub fn status(&self) -> StatusCode {
        match self.result() {
            Some(result) => result.status(),
            None => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_overridden(&self) -> bool {
        matches!(self, DispatchOutcome::Overridden(_))
    }

    pub fn is_matched(&self) -> bool {
        matches!(self, DispatchOutcome::Matched(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DispatchOutcome::NotFound(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, DispatchOutcome::Failed(_))
    }

    pub(crate) fn write_to(&self, response: &mut dyn ResponseWriter) {
        match self {
            DispatchOutcome::Failed(e) => {
                response.set_status(StatusCode::INTERNAL_SERVER_ERROR);
                response.set_header("content-type", "application/json");
                let body = serde_json::json!({ "error": e.to_string() });
                response.write_body(body.to_string().as_bytes());
            }
            _ => {
                if let Some(result) = self.result() {
                    response.set_status(result.status());
                    for (name, value) in result.headers() {
                        response.set_header(name, value);
                    }
                    response.write_body(result.body());
                }
            }
        }
    }
}

/// The outbound side of a dispatch
pub trait ResponseWriter {
    fn set_status(&mut self, status: StatusCode);
    fn set_header(&mut self, name: &str, value: &str);
    fn write_body(&mut self, chunk: &[u8]);
}

/// In-memory response, later turned into a hyper response
#[derive(Debug, Clone)]
pub struct BufferedResponse {
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Default for BufferedResponse {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }
}

impl BufferedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Convert into a hyper response, skipping headers that are not valid on the wire
    pub fn into_response(self) -> Response<Full<Bytes>> {
        let mut builder = Response::builder().status(self.status);
        for (name, value) in &self.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => builder = builder.header(name, value),
                _ => warn!("Dropping invalid response header '{}'", name),
            }
        }
        builder
            .body(Full::new(Bytes::from(self.body)))
            .unwrap_or_else(|_| {
                let mut response = Response::new(Full::new(Bytes::from("Internal Server Error")));
                *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                response
            })
    }
}

impl ResponseWriter for BufferedResponse {
    fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    fn set_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn write_body(&mut self, chunk: &[u8]) {
        self.body.extend_from_slice(chunk);
    }
}
