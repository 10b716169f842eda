//! Canned-response action.

use super::operation::MockAction;
use super::types::{ActionError, MockRequest, MockResult};
use crate::context::RunContext;
use crate::scripting::HookScript;
use bytes::Bytes;
use hyper::StatusCode;
use rand::Rng;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

/// A named response an operation can return
#[derive(Debug, Clone, PartialEq)]
pub struct MockResponse {
    name: String,
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: Bytes,
    delay: Option<Duration>,
}

impl MockResponse {
    pub fn new(name: impl Into<String>, status: StatusCode) -> Self {
        Self {
            name: name.into(),
            status,
            headers: Vec::new(),
            body: Bytes::new(),
            delay: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Block the dispatching worker for `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn delay(&self) -> Option<Duration> {
        self.delay
    }

    fn to_result(&self) -> MockResult {
        self.headers
            .iter()
            .fold(MockResult::new(self.status), |result, (k, v)| {
                result.with_header(k.clone(), v.clone())
            })
            .with_body(self.body.clone())
            .with_response_name(self.name.clone())
    }
}

/// How a `ResponseAction` picks among its responses
#[derive(Clone)]
pub enum DispatchStyle {
    /// Cycle through responses in declared order
    Sequence,
    /// Pick a response uniformly at random
    Random,
    /// Ask a script for the response name
    Script(HookScript),
}

impl fmt::Debug for DispatchStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchStyle::Sequence => f.write_str("Sequence"),
            DispatchStyle::Random => f.write_str("Random"),
            DispatchStyle::Script(script) => write!(f, "Script({})", script.name()),
        }
    }
}

/// Action answering with one of a fixed list of responses
pub struct ResponseAction {
    responses: Vec<MockResponse>,
    style: DispatchStyle,
    default_response: Option<String>,
    cursor: AtomicUsize,
}

impl ResponseAction {
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            responses,
            style: DispatchStyle::Sequence,
            default_response: None,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn with_style(mut self, style: DispatchStyle) -> Self {
        self.style = style;
        self
    }

    /// Response used when a script selects nothing usable
    pub fn with_default_response(mut self, name: impl Into<String>) -> Self {
        self.default_response = Some(name.into());
        self
    }

    pub fn responses(&self) -> &[MockResponse] {
        &self.responses
    }

    pub fn style(&self) -> &DispatchStyle {
        &self.style
    }

    fn position_of(&self, name: &str) -> Option<usize> {
        self.responses.iter().position(|r| r.name == name)
    }

    fn default_index(&self) -> usize {
        self.default_response
            .as_deref()
            .and_then(|name| self.position_of(name))
            .unwrap_or(0)
    }

    fn next_in_sequence(&self) -> usize {
        let count = self.responses.len();
        self.cursor
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |i| {
                Some((i + 1) % count)
            })
            .unwrap_or_else(|i| i)
            % count
    }

    fn select(
        &self,
        request: &MockRequest,
        context: &RunContext,
    ) -> Result<&MockResponse, ActionError> {
        if self.responses.is_empty() {
            return Err(ActionError::NoResponses);
        }

        let index = match &self.style {
            DispatchStyle::Sequence => self.next_in_sequence(),
            DispatchStyle::Random => rand::thread_rng().gen_range(0..self.responses.len()),
            DispatchStyle::Script(script) => {
                let selected = script.select_response(context, request)?;
                match selected.as_deref().and_then(|name| self.position_of(name)) {
                    Some(index) => index,
                    None => {
                        debug!(
                            "Script '{}' selected {:?}, using default response",
                            script.name(),
                            selected
                        );
                        self.default_index()
                    }
                }
            }
        };

        Ok(&self.responses[index])
    }
}

impl MockAction for ResponseAction {
    fn dispatch_request(
        &self,
        request: &MockRequest,
        context: &RunContext,
    ) -> Result<MockResult, ActionError> {
        let response = self.select(request, context)?;
        debug!("Selected response '{}'", response.name);

        if let Some(delay) = response.delay {
            std::thread::sleep(delay);
        }
        Ok(response.to_result())
    }
}

impl fmt::Debug for ResponseAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseAction")
            .field("responses", &self.responses.len())
            .field("style", &self.style)
            .field("default_response", &self.default_response)
            .finish()
    }
}
