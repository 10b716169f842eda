//! Operations and resolution of the best matching one.

use super::path::PathPattern;
use super::types::{normalize_method, ActionError, MockRequest, MockResult};
use crate::context::RunContext;
use hyper::Method;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Something that produces a response for a matched request
pub trait MockAction: Send + Sync {
    fn dispatch_request(
        &self,
        request: &MockRequest,
        context: &RunContext,
    ) -> Result<MockResult, ActionError>;
}

impl<F> MockAction for F
where
    F: Fn(&MockRequest, &RunContext) -> Result<MockResult, ActionError> + Send + Sync,
{
    fn dispatch_request(
        &self,
        request: &MockRequest,
        context: &RunContext,
    ) -> Result<MockResult, ActionError> {
        self(request, context)
    }
}

/// A (method, path pattern) binding to an action
#[derive(Clone)]
pub struct Operation {
    name: String,
    method: Method,
    pattern: PathPattern,
    priority: i32,
    action: Arc<dyn MockAction>,
}

impl Operation {
    pub fn new(
        name: impl Into<String>,
        method: Method,
        pattern: PathPattern,
        action: Arc<dyn MockAction>,
    ) -> Self {
        Self {
            name: name.into(),
            method: normalize_method(&method),
            pattern,
            priority: 0,
            action,
        }
    }

    /// Higher priority wins when several operations match
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn action(&self) -> &Arc<dyn MockAction> {
        &self.action
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("method", &self.method)
            .field("pattern", &self.pattern.as_str())
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// An operation selected for a request, with its bound path parameters
#[derive(Debug)]
pub struct ResolvedOperation<'a> {
    pub operation: &'a Operation,
    pub path_params: HashMap<String, String>,
}

/// Select the best operation for a residual path and method.
///
/// Candidates must have the same (upper-cased) method and a pattern matching
/// the path. Among candidates the highest priority wins, then the pattern
/// with the most literal segments, then the earliest declared operation.
pub fn resolve_operation<'a>(
    operations: &'a [Operation],
    residual_path: &str,
    method: &Method,
) -> Option<ResolvedOperation<'a>> {
    let method = normalize_method(method);
    let mut best: Option<(ResolvedOperation<'a>, (i32, usize))> = None;

    for operation in operations {
        if operation.method != method {
            continue;
        }
        let Some(path_params) = operation.pattern.matches(residual_path) else {
            continue;
        };

        let rank = (operation.priority, operation.pattern.literal_count());
        // Strictly better only, so ties keep declaration order
        if best.as_ref().is_some_and(|(_, best_rank)| *best_rank >= rank) {
            continue;
        }
        best = Some((
            ResolvedOperation {
                operation,
                path_params,
            },
            rank,
        ));
    }

    best.map(|(resolved, _)| resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(name: &str, method: Method, pattern: &str) -> Operation {
        let action: Arc<dyn MockAction> = Arc::new(
            |_: &MockRequest, _: &RunContext| -> Result<MockResult, ActionError> {
                Ok(MockResult::ok())
            },
        );
        Operation::new(name, method, PathPattern::parse(pattern).unwrap(), action)
    }

    fn resolved_name(operations: &[Operation], path: &str, method: Method) -> Option<String> {
        resolve_operation(operations, path, &method).map(|r| r.operation.name().to_string())
    }

    #[test]
    fn test_resolves_by_method_and_path() {
        let operations = vec![
            op("get-api", Method::GET, "/api"),
            op("delete-api", Method::DELETE, "/api"),
        ];

        assert_eq!(
            resolved_name(&operations, "/api", Method::DELETE).as_deref(),
            Some("delete-api")
        );
        assert_eq!(
            resolved_name(&operations, "/api", Method::GET).as_deref(),
            Some("get-api")
        );
        assert!(resolved_name(&operations, "/api", Method::PUT).is_none());
        assert!(resolved_name(&operations, "/other", Method::GET).is_none());
    }

    #[test]
    fn test_method_comparison_is_case_normalized() {
        let operations = vec![op("delete-api", Method::DELETE, "/api")];
        let lower = Method::from_bytes(b"delete").unwrap();
        assert_eq!(
            resolved_name(&operations, "/api", lower).as_deref(),
            Some("delete-api")
        );
    }

    #[test]
    fn test_ties_keep_declaration_order() {
        let operations = vec![
            op("first", Method::GET, "/items/{id}"),
            op("second", Method::GET, "/items/{key}"),
        ];
        for _ in 0..10 {
            assert_eq!(
                resolved_name(&operations, "/items/1", Method::GET).as_deref(),
                Some("first")
            );
        }
    }

    #[test]
    fn test_literal_segments_beat_templates() {
        let operations = vec![
            op("by-id", Method::GET, "/users/{id}"),
            op("me", Method::GET, "/users/me"),
        ];
        assert_eq!(
            resolved_name(&operations, "/users/me", Method::GET).as_deref(),
            Some("me")
        );
        assert_eq!(
            resolved_name(&operations, "/users/7", Method::GET).as_deref(),
            Some("by-id")
        );
    }

    #[test]
    fn test_priority_beats_specificity() {
        let operations = vec![
            op("me", Method::GET, "/users/me"),
            op("catch-all", Method::GET, "/users/{id}").with_priority(10),
        ];
        assert_eq!(
            resolved_name(&operations, "/users/me", Method::GET).as_deref(),
            Some("catch-all")
        );
    }

    #[test]
    fn test_resolved_operation_carries_params() {
        let operations = vec![op("order", Method::GET, "/users/{user}/orders/{order}")];
        let resolved = resolve_operation(&operations, "/users/u1/orders/o2/", &Method::GET).unwrap();
        assert_eq!(resolved.path_params.get("user").map(String::as_str), Some("u1"));
        assert_eq!(resolved.path_params.get("order").map(String::as_str), Some("o2"));
    }
}
