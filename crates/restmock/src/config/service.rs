//! Service, operation and response definitions.

use super::ConfigError;
use crate::context::RunContext;
use crate::scripting::HookScript;
use crate::service::{
    parse_method, DispatchStyle, MockResponse, Operation, PathPattern, ResponseAction,
    RestMockService,
};
use hyper::header::{HeaderName, HeaderValue};
use hyper::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    pub name: String,
    /// Base path; empty or `/` claims every request
    #[serde(default)]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_request_script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_request_script: Option<String>,
    /// Initial run context properties
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Value>,
    #[serde(default)]
    pub operations: Vec<OperationConfig>,
}

impl ServiceConfig {
    pub fn build(&self) -> Result<RestMockService, ConfigError> {
        let mut service = RestMockService::new(&self.name, &self.path);

        if let Some(source) = &self.on_request_script {
            service = service.with_on_request_script(self.compile("onRequest", source)?);
        }
        if let Some(source) = &self.after_request_script {
            service = service.with_after_request_script(self.compile("afterRequest", source)?);
        }

        for operation in &self.operations {
            service = service.with_operation(operation.build(&self.name)?);
        }
        Ok(service)
    }

    /// A fresh run context seeded with the configured properties
    pub fn run_context(&self) -> RunContext {
        RunContext::with_properties(
            &self.name,
            self.properties
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        )
    }

    fn compile(&self, hook: &str, source: &str) -> Result<HookScript, ConfigError> {
        HookScript::compile(format!("{}/{}", self.name, hook), source).map_err(|source| {
            ConfigError::Script {
                service: self.name.clone(),
                source,
            }
        })
    }
}

/// How an operation picks its response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchKind {
    #[default]
    Sequence,
    Random,
    Script,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationConfig {
    /// Defaults to `METHOD path`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub dispatch: DispatchKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatch_script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_response: Option<String>,
    #[serde(default)]
    pub responses: Vec<ResponseConfig>,
}

impl OperationConfig {
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{} {}", self.method.trim().to_ascii_uppercase(), self.path),
        }
    }

    pub fn build(&self, service: &str) -> Result<Operation, ConfigError> {
        let name = self.display_name();
        let invalid = |message: String| ConfigError::InvalidOperation {
            service: service.to_string(),
            operation: name.clone(),
            message,
        };

        let method = parse_method(&self.method).map_err(|_| ConfigError::InvalidMethod {
            service: service.to_string(),
            operation: name.clone(),
            method: self.method.clone(),
        })?;
        let pattern = PathPattern::parse(&self.path).map_err(|source| ConfigError::InvalidPattern {
            service: service.to_string(),
            operation: name.clone(),
            source,
        })?;

        let responses = self
            .responses
            .iter()
            .enumerate()
            .map(|(i, response)| response.build(i, service, &name))
            .collect::<Result<Vec<_>, _>>()?;

        let style = match self.dispatch {
            DispatchKind::Sequence => DispatchStyle::Sequence,
            DispatchKind::Random => DispatchStyle::Random,
            DispatchKind::Script => {
                let source = self
                    .dispatch_script
                    .as_deref()
                    .ok_or_else(|| invalid("dispatch 'script' requires dispatchScript".to_string()))?;
                let script = HookScript::compile(format!("{service}/{name}/dispatch"), source)
                    .map_err(|source| ConfigError::Script {
                        service: service.to_string(),
                        source,
                    })?;
                DispatchStyle::Script(script)
            }
        };

        let mut action = ResponseAction::new(responses).with_style(style);
        if let Some(default) = &self.default_response {
            if !action.responses().iter().any(|r| r.name() == default) {
                return Err(invalid(format!("unknown default response '{default}'")));
            }
            action = action.with_default_response(default);
        }

        Ok(Operation::new(name, method, pattern, Arc::new(action)).with_priority(self.priority))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseConfig {
    /// Defaults to `response-<index>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default = "default_status")]
    pub status: u16,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// A string is sent as-is; any other value is sent as JSON
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
}

fn default_status() -> u16 {
    200
}

impl ResponseConfig {
    fn build(&self, index: usize, service: &str, operation: &str) -> Result<MockResponse, ConfigError> {
        let name = self
            .name
            .clone()
            .unwrap_or_else(|| format!("response-{index}"));
        let status = StatusCode::from_u16(self.status).map_err(|_| ConfigError::InvalidStatus {
            service: service.to_string(),
            operation: operation.to_string(),
            status: self.status,
        })?;

        let mut response = MockResponse::new(name, status);
        for (key, value) in &self.headers {
            if HeaderName::from_bytes(key.as_bytes()).is_err() || HeaderValue::from_str(value).is_err() {
                return Err(ConfigError::InvalidHeader {
                    service: service.to_string(),
                    operation: operation.to_string(),
                    header: key.clone(),
                });
            }
            response = response.with_header(key, value);
        }

        match &self.body {
            None | Some(Value::Null) => {}
            Some(Value::String(text)) => response = response.with_body(text.clone()),
            Some(json) => {
                if !self.headers.keys().any(|k| k.eq_ignore_ascii_case("content-type")) {
                    response = response.with_header("content-type", "application/json");
                }
                response = response.with_body(json.to_string());
            }
        }

        if let Some(delay_ms) = self.delay_ms.filter(|ms| *ms > 0) {
            response = response.with_delay(Duration::from_millis(delay_ms));
        }
        Ok(response)
    }
}
