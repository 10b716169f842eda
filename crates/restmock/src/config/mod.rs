//! Configuration types for restmock.
//!
//! A config document lists the mock services to serve. YAML is the default;
//! files ending in `.json` are read as JSON.

mod service;

use crate::dispatcher::Dispatcher;
use crate::scripting::ScriptError;
use crate::service::PatternError;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

pub use service::{DispatchKind, OperationConfig, ResponseConfig, ServiceConfig};

/// Why a config could not be turned into services
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("service name must not be empty")]
    EmptyServiceName,
    #[error("duplicate service name '{0}'")]
    DuplicateService(String),
    #[error("service '{service}', operation '{operation}': invalid method '{method}'")]
    InvalidMethod {
        service: String,
        operation: String,
        method: String,
    },
    #[error("service '{service}', operation '{operation}': invalid path: {source}")]
    InvalidPattern {
        service: String,
        operation: String,
        #[source]
        source: PatternError,
    },
    #[error("service '{service}', operation '{operation}': invalid status {status}")]
    InvalidStatus {
        service: String,
        operation: String,
        status: u16,
    },
    #[error("service '{service}', operation '{operation}': invalid header '{header}'")]
    InvalidHeader {
        service: String,
        operation: String,
        header: String,
    },
    #[error("service '{service}', operation '{operation}': {message}")]
    InvalidOperation {
        service: String,
        operation: String,
        message: String,
    },
    #[error("service '{service}': {source}")]
    Script {
        service: String,
        #[source]
        source: ScriptError,
    },
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MockServerConfig {
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
}

impl MockServerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config = if is_json {
            Self::from_json_str(&contents)
        } else {
            Self::from_yaml_str(&contents)
        };
        config.with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, anyhow::Error> {
        let config: MockServerConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(contents: &str) -> Result<Self, anyhow::Error> {
        let config: MockServerConfig = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check service names, then build every service so methods, patterns
    /// and scripts are checked. No run context is created.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.check_names()?;
        for service in &self.services {
            service.build()?;
        }
        Ok(())
    }

    /// One dispatcher per service, each with its own run context
    pub fn build_dispatchers(&self) -> Result<Vec<Dispatcher>, ConfigError> {
        self.check_names()?;
        self.services
            .iter()
            .map(|service| {
                Ok(Dispatcher::new(
                    Arc::new(service.build()?),
                    service.run_context(),
                ))
            })
            .collect()
    }

    fn check_names(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for service in &self.services {
            if service.name.trim().is_empty() {
                return Err(ConfigError::EmptyServiceName);
            }
            if !names.insert(service.name.as_str()) {
                return Err(ConfigError::DuplicateService(service.name.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::BufferedResponse;
    use crate::service::MockService;
    use bytes::Bytes;
    use hyper::{Method, Request, StatusCode};
    use serde_json::json;
    use std::io::Write;
    use std::time::Duration;

    const YAML: &str = r#"
services:
  - name: sweden
    path: /sweden/
    properties:
      greeting: hej
    afterRequestScript: |
      context.increment("seen");
    operations:
      - name: delete-api
        method: delete
        path: /api
        responses:
          - name: gone
            status: 204
      - method: GET
        path: /users/{id}
        priority: 5
        dispatch: script
        dispatchScript: |
          if request.pathParams.id == "0" { "missing" } else { "found" }
        defaultResponse: found
        responses:
          - name: found
            body: { id: 1, name: "Astrid" }
          - name: missing
            status: 404
            headers:
              content-type: text/plain
            body: no such user
            delayMs: 5
"#;

    #[test]
    fn test_parse_yaml_config() {
        let config = MockServerConfig::from_yaml_str(YAML).unwrap();
        assert_eq!(config.services.len(), 1);

        let service = &config.services[0];
        assert_eq!(service.operations.len(), 2);
        assert_eq!(service.operations[1].dispatch, DispatchKind::Script);
        assert_eq!(service.operations[1].display_name(), "GET /users/{id}");
        assert_eq!(service.operations[1].responses[1].delay_ms, Some(5));
        assert_eq!(service.operations[0].responses[0].status, 204);
        assert_eq!(service.operations[1].responses[0].status, 200);

        let context = service.run_context();
        assert_eq!(context.name(), "sweden");
        assert_eq!(context.get("greeting"), Some(json!("hej")));
    }

    #[test]
    fn test_built_service() {
        let config = MockServerConfig::from_yaml_str(YAML).unwrap();
        let service = config.services[0].build().unwrap();

        assert_eq!(service.path(), "/sweden");
        let operation = &service.operations()[0];
        assert_eq!(operation.name(), "delete-api");
        assert_eq!(operation.method(), &Method::DELETE);
        assert_eq!(service.operations()[1].priority(), 5);
    }

    #[test]
    fn test_build_dispatchers_serve_configured_responses() {
        let config = MockServerConfig::from_yaml_str(YAML).unwrap();
        let dispatchers = config.build_dispatchers().unwrap();
        let dispatcher = &dispatchers[0];

        let send = |method: &str, uri: &str| {
            let raw = Request::builder()
                .method(method)
                .uri(uri)
                .body(Bytes::new())
                .unwrap();
            let mut response = BufferedResponse::new();
            dispatcher.dispatch_request(&raw, &mut response);
            response
        };

        assert_eq!(send("DELETE", "/sweden/api").status(), StatusCode::NO_CONTENT);

        let found = send("GET", "/sweden/users/7");
        assert_eq!(found.status(), StatusCode::OK);
        assert_eq!(found.header("content-type"), Some("application/json"));
        assert_eq!(
            serde_json::from_slice::<serde_json::Value>(found.body()).unwrap(),
            json!({"id": 1, "name": "Astrid"})
        );

        let started = std::time::Instant::now();
        let missing = send("GET", "/sweden/users/0");
        assert!(started.elapsed() >= Duration::from_millis(5));
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(missing.header("content-type"), Some("text/plain"));
        assert_eq!(missing.body(), b"no such user");

        assert_eq!(dispatcher.context().get("seen"), Some(json!(3)));
        assert_eq!(dispatcher.context().dispatch_count(), 3);
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(YAML.as_bytes()).unwrap();

        let config = MockServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.services[0].name, "sweden");
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        let document = json!({
            "services": [{
                "name": "root",
                "operations": [{
                    "method": "GET",
                    "path": "/",
                    "responses": [{ "body": "hello" }]
                }]
            }]
        });
        file.write_all(document.to_string().as_bytes()).unwrap();

        let config = MockServerConfig::from_file(file.path()).unwrap();
        let service = config.services[0].build().unwrap();
        assert_eq!(service.path(), "");
        assert_eq!(service.operations()[0].name(), "GET /");
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = MockServerConfig::from_file("/nonexistent/restmock.yaml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/restmock.yaml"));
    }

    #[test]
    fn test_duplicate_and_empty_names() {
        let config = MockServerConfig {
            services: vec![
                serde_yaml::from_str("name: a").unwrap(),
                serde_yaml::from_str("name: a").unwrap(),
            ],
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateService(name)) if name == "a"
        ));

        let config = MockServerConfig {
            services: vec![serde_yaml::from_str("name: ' '").unwrap()],
        };
        assert!(matches!(config.validate(), Err(ConfigError::EmptyServiceName)));
    }

    #[test]
    fn test_build_dispatchers_checks_names_and_owns_contexts() {
        let config = MockServerConfig {
            services: vec![
                serde_yaml::from_str("name: a").unwrap(),
                serde_yaml::from_str("name: a").unwrap(),
            ],
        };
        assert!(matches!(
            config.build_dispatchers(),
            Err(ConfigError::DuplicateService(name)) if name == "a"
        ));

        let config = MockServerConfig::from_yaml_str(YAML).unwrap();
        config.validate().unwrap();
        let first = config.build_dispatchers().unwrap();
        let second = config.build_dispatchers().unwrap();
        assert!(!first[0].context().same_as(second[0].context()));
        assert_eq!(first[0].context().dispatch_count(), 0);
        assert_eq!(first[0].context().get("greeting"), Some(json!("hej")));
    }

    fn operation_error(operation: &str) -> ConfigError {
        let yaml = format!("services:\n  - name: svc\n    operations:\n{operation}");
        let config: MockServerConfig = serde_yaml::from_str(&yaml).unwrap();
        config.validate().unwrap_err()
    }

    #[test]
    fn test_invalid_operations() {
        assert!(matches!(
            operation_error("      - { method: 'NOT VALID', path: /x }"),
            ConfigError::InvalidMethod { .. }
        ));
        assert!(matches!(
            operation_error("      - { method: GET, path: '/x/{}' }"),
            ConfigError::InvalidPattern { .. }
        ));
        assert!(matches!(
            operation_error("      - { method: GET, path: /x, responses: [{ status: 1000 }] }"),
            ConfigError::InvalidStatus { status: 1000, .. }
        ));
        assert!(matches!(
            operation_error(
                "      - { method: GET, path: /x, responses: [{ headers: { 'bad header': x } }] }"
            ),
            ConfigError::InvalidHeader { .. }
        ));
        assert!(matches!(
            operation_error("      - { method: GET, path: /x, dispatch: script }"),
            ConfigError::InvalidOperation { .. }
        ));
        assert!(matches!(
            operation_error(
                "      - { method: GET, path: /x, defaultResponse: nope, responses: [{ name: ok }] }"
            ),
            ConfigError::InvalidOperation { .. }
        ));
        assert!(matches!(
            operation_error(
                "      - { method: GET, path: /x, dispatch: script, dispatchScript: 'let = ;' }"
            ),
            ConfigError::Script { .. }
        ));
    }

    #[test]
    fn test_invalid_hook_script() {
        let config: MockServerConfig =
            serde_yaml::from_str("services:\n  - name: svc\n    onRequestScript: 'if {'\n")
                .unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(&err, ConfigError::Script { service, .. } if service == "svc"));
    }
}
