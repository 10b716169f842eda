//! Request and result types exchanged between the dispatcher, hooks and actions.

use crate::scripting::ScriptError;
use bytes::Bytes;
use hyper::http::method::InvalidMethod;
use hyper::{HeaderMap, Method, Request, StatusCode};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::HashMap;

/// Upper-case a request method so `delete` and `DELETE` compare equal
pub fn normalize_method(method: &Method) -> Method {
    let upper = method.as_str().to_ascii_uppercase();
    if upper == method.as_str() {
        return method.clone();
    }
    Method::from_bytes(upper.as_bytes()).unwrap_or_else(|_| method.clone())
}

/// Parse a configured method name, case-insensitively
pub fn parse_method(method: &str) -> Result<Method, InvalidMethod> {
    Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
}

/// Parse a query string into decoded key/value pairs. Later keys win.
pub fn parse_query_string(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|s| !s.is_empty())
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?;
            let value = parts.next().unwrap_or("");
            Some((decode_component(key), decode_component(value)))
        })
        .collect()
}

/// Percent-decode one path segment. `+` stays literal in paths.
pub(crate) fn decode_path_segment(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| raw.to_string())
}

/// Form decoding for query strings: `+` is a space
pub(crate) fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    let decoded = urlencoding::decode(&spaced).map(Cow::into_owned);
    match decoded {
        Ok(decoded) => decoded,
        Err(_) => spaced,
    }
}

/// Read-only view of the inbound request for one dispatch
#[derive(Debug, Clone)]
pub struct MockRequest {
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    body: Bytes,
    path_params: HashMap<String, String>,
    received_at: chrono::DateTime<chrono::Utc>,
}

impl MockRequest {
    pub fn from_http(request: &Request<Bytes>) -> Self {
        Self {
            method: normalize_method(request.method()),
            path: request.uri().path().to_string(),
            query: request.uri().query().map(str::to_string),
            headers: request.headers().clone(),
            body: request.body().clone(),
            path_params: HashMap::new(),
            received_at: chrono::Utc::now(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Full request path, including the service base path
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn query_params(&self) -> HashMap<String, String> {
        parse_query_string(self.query.as_deref().unwrap_or(""))
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header, if it is valid visible ASCII
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Body parsed as JSON, `None` when empty or not JSON
    pub fn body_json(&self) -> Option<Value> {
        if self.body.is_empty() {
            return None;
        }
        serde_json::from_slice(&self.body).ok()
    }

    /// Parameters bound by the resolved operation's path pattern
    pub fn path_params(&self) -> &HashMap<String, String> {
        &self.path_params
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    pub fn received_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.received_at
    }

    pub(crate) fn set_path_params(&mut self, params: HashMap<String, String>) {
        self.path_params = params;
    }
}

/// Where a `MockResult` came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultSource {
    /// Synthesized by the on-request hook
    Override,
    /// Produced by the action of the named operation
    Operation { name: String },
    /// No operation matched the request
    NotFound,
}

impl ResultSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultSource::Override => "override",
            ResultSource::Operation { .. } => "operation",
            ResultSource::NotFound => "notFound",
        }
    }
}

/// Outcome of a dispatch that produced a response
#[derive(Debug, Clone, PartialEq)]
pub struct MockResult {
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: Bytes,
    source: ResultSource,
    response_name: Option<String>,
}

impl MockResult {
    /// A result with the given status and an empty body.
    ///
    /// The source starts as an unnamed operation; the dispatcher attributes
    /// the result once it knows where it came from.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
            source: ResultSource::Operation {
                name: String::new(),
            },
            response_name: None,
        }
    }

    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    pub(crate) fn not_found(method: &Method, path: &str) -> Self {
        let body = serde_json::json!({ "error": format!("No operation matches {method} {path}") });
        let mut result = Self::new(StatusCode::NOT_FOUND)
            .with_header("content-type", "application/json")
            .with_body(body.to_string());
        result.source = ResultSource::NotFound;
        result
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_json_body(self, body: &Value) -> Self {
        self.with_header("content-type", "application/json")
            .with_body(body.to_string())
    }

    pub fn with_response_name(mut self, name: impl Into<String>) -> Self {
        self.response_name = Some(name.into());
        self
    }

    pub(crate) fn attributed(mut self, source: ResultSource) -> Self {
        self.source = source;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First header with the given name, compared case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn source(&self) -> &ResultSource {
        &self.source
    }

    /// Name of the matched operation, if the result came from one
    pub fn operation_name(&self) -> Option<&str> {
        match &self.source {
            ResultSource::Operation { name } if !name.is_empty() => Some(name),
            _ => None,
        }
    }

    /// Name of the canned response that produced this result
    pub fn response_name(&self) -> Option<&str> {
        self.response_name.as_deref()
    }
}

/// Failure of an operation's action
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("operation has no responses configured")]
    NoResponses,
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error("{0}")]
    Failed(String),
}
