use crate::context::RunContext;
use crate::service::{MockRequest, MockResult};
use hyper::StatusCode;
use rhai::{Dynamic, Engine, Map, INT};
use serde_json::Value;

/// Build an engine with the `RunContext` API registered
pub fn create_engine() -> Engine {
    let mut engine = Engine::new();

    engine
        .register_type_with_name::<RunContext>("RunContext")
        .register_fn("get", |context: &mut RunContext, key: String| -> Dynamic {
            context.get(&key).map(json_to_dynamic).unwrap_or(Dynamic::UNIT)
        })
        .register_fn("set", |context: &mut RunContext, key: String, value: Dynamic| {
            context.set(key, dynamic_to_json(value));
        })
        .register_fn("exists", |context: &mut RunContext, key: String| -> bool {
            context.exists(&key)
        })
        .register_fn("remove", |context: &mut RunContext, key: String| -> Dynamic {
            context.remove(&key).map(json_to_dynamic).unwrap_or(Dynamic::UNIT)
        })
        .register_fn("increment", |context: &mut RunContext, key: String| -> INT {
            context.increment(&key)
        })
        .register_fn("dispatch_count", |context: &mut RunContext| -> INT {
            INT::try_from(context.dispatch_count()).unwrap_or(INT::MAX)
        });

    engine
}

pub(super) fn request_map(request: &MockRequest) -> Map {
    let mut map = Map::new();
    map.insert("method".into(), Dynamic::from(request.method().to_string()));
    map.insert("path".into(), Dynamic::from(request.path().to_string()));

    let mut query = Map::new();
    for (k, v) in request.query_params() {
        query.insert(k.into(), Dynamic::from(v));
    }
    map.insert("query".into(), Dynamic::from(query));

    // Repeated headers are joined the way they would be folded on the wire
    let mut headers = Map::new();
    for name in request.headers().keys() {
        let values: Vec<_> = request
            .headers()
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect();
        headers.insert(name.as_str().into(), Dynamic::from(values.join(", ")));
    }
    map.insert("headers".into(), Dynamic::from(headers));

    let mut path_params = Map::new();
    for (k, v) in request.path_params() {
        path_params.insert(k.as_str().into(), Dynamic::from(v.clone()));
    }
    map.insert("pathParams".into(), Dynamic::from(path_params));

    map.insert("body".into(), Dynamic::from(request.body_text().into_owned()));
    map.insert(
        "json".into(),
        request.body_json().map(json_to_dynamic).unwrap_or(Dynamic::UNIT),
    );
    map
}

pub(super) fn result_map(result: &MockResult) -> Map {
    let mut map = Map::new();
    map.insert(
        "status".into(),
        Dynamic::from(INT::from(result.status().as_u16())),
    );

    let mut headers = Map::new();
    for (k, v) in result.headers() {
        headers.insert(k.to_ascii_lowercase().into(), Dynamic::from(v.clone()));
    }
    map.insert("headers".into(), Dynamic::from(headers));

    map.insert("body".into(), Dynamic::from(result.body_text().into_owned()));
    map.insert("source".into(), Dynamic::from(result.source().as_str().to_string()));
    map.insert(
        "operation".into(),
        optional_string(result.operation_name()),
    );
    map.insert("response".into(), optional_string(result.response_name()));
    map
}

fn optional_string(value: Option<&str>) -> Dynamic {
    value
        .map(|s| Dynamic::from(s.to_string()))
        .unwrap_or(Dynamic::UNIT)
}

/// Turn an on-request hook's return value into an override.
///
/// Only a map overrides; `Err` carries why a map was rejected.
pub(super) fn parse_override(value: Dynamic) -> Result<Option<MockResult>, String> {
    let Some(map) = value.try_cast::<Map>() else {
        return Ok(None);
    };

    let status = match map.get("status") {
        None => StatusCode::OK,
        Some(v) => {
            let code = v
                .as_int()
                .map_err(|t| format!("'status' must be an integer, got {t}"))?;
            u16::try_from(code)
                .ok()
                .and_then(|c| StatusCode::from_u16(c).ok())
                .ok_or_else(|| format!("invalid status code {code}"))?
        }
    };

    let mut result = MockResult::new(status);

    if let Some(headers) = map.get("headers") {
        let headers = headers
            .clone()
            .try_cast::<Map>()
            .ok_or_else(|| "'headers' must be a map".to_string())?;
        for (key, value) in headers {
            let value = match value.clone().try_cast::<String>() {
                Some(s) => s,
                None => format!("{value}"),
            };
            result = result.with_header(key.to_string(), value);
        }
    }

    if let Some(body) = map.get("body") {
        if let Some(text) = body.clone().try_cast::<String>() {
            result = result.with_body(text);
        } else if !body.is_unit() {
            let json = dynamic_to_json(body.clone());
            result = if result.header("content-type").is_some() {
                result.with_body(json.to_string())
            } else {
                result.with_json_body(&json)
            };
        }
    }

    Ok(Some(result))
}

/// JSON values reach scripts through rhai's serde bridge; `null` reads as `()`
pub fn json_to_dynamic(value: Value) -> Dynamic {
    rhai::serde::to_dynamic(&value).unwrap_or(Dynamic::UNIT)
}

/// Values with no JSON shape (registered types, function pointers) are kept
/// as their display string
pub fn dynamic_to_json(value: Dynamic) -> Value {
    rhai::serde::from_dynamic::<Value>(&value).unwrap_or_else(|_| Value::String(value.to_string()))
}
