//! Job context helpers.

use cloudconnect_host_http::Response;
use serde_json::{Map, Value, json};

/// Variable bindings threaded through one job's execution.
///
/// Owned by exactly one job. Forked children receive their own copies.
pub type Context = Map<String, Value>;

/// Reserved key holding the most recent response.
pub const RESPONSE_KEY: &str = "__response__";

/// Truthiness of a context value: null, false, zero, and empty strings,
/// arrays, or objects are falsy.
pub fn is_truthy(value: &Value) -> bool {
  match value {
    Value::Null => false,
    Value::Bool(b) => *b,
    Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
    Value::String(s) => !s.is_empty(),
    Value::Array(a) => !a.is_empty(),
    Value::Object(o) => !o.is_empty(),
  }
}

/// Representation of a response stored under [`RESPONSE_KEY`].
pub fn response_value(response: &Response) -> Value {
  json!({
    "status": response.status,
    "headers": response.headers,
    "body": response.body,
  })
}

/// Convert a value to text for headers and string interpolation.
pub fn value_to_string(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    Value::Null => String::new(),
    Value::Bool(b) => b.to_string(),
    Value::Number(n) => n.to_string(),
    other => other.to_string(),
  }
}
