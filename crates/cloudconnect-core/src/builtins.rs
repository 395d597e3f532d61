//! Built-in functions available to tasks and conditions.
//!
//! | name | inputs | result |
//! |---|---|---|
//! | `set_var` | value | the value |
//! | `regex_match` | pattern, source | source matches pattern at its start |
//! | `regex_not_match` | pattern, source | negation of `regex_match` |
//! | `regex_search` | pattern, source | named capture groups of the first match |
//! | `json_path` | source, path | value(s) at `path` |
//! | `json_empty` | source, [path] | value at `path` is empty |
//! | `json_not_empty` | source, [path] | negation of `json_empty` |
//! | `is_true` | value | boolean reading of the value |
//! | `split_by` | source, delimiter | array of substrings |
//! | `lookup` | source, key | value stored under `key` |
//! | `time_str2str` | date, from_format, to_format | reformatted date |
//! | `std_output` | events | writes events to stdout |
//!
//! Sources given to the `json_*` functions may be JSON values or strings
//! holding JSON (such as a response body).

use std::fmt::{self, Write as _};
use std::io::Write;

use chrono::{DateTime, NaiveDateTime};
use regex::Regex;
use serde_json::{Map, Value, json};

use crate::context::{is_truthy, value_to_string};
use crate::registry::{FunctionError, FunctionRegistry, FunctionResult, arg, str_arg};

pub(crate) fn register_all(registry: &mut FunctionRegistry) {
  registry
    .register("set_var", set_var)
    .register("regex_match", regex_match)
    .register("regex_not_match", regex_not_match)
    .register("regex_search", regex_search)
    .register("json_path", json_path)
    .register("json_empty", json_empty)
    .register("json_not_empty", json_not_empty)
    .register("is_true", is_true)
    .register("split_by", split_by)
    .register("lookup", lookup)
    .register("time_str2str", time_str2str)
    .register("std_output", std_output);
}

pub fn set_var(args: &[Value]) -> FunctionResult {
  Ok(arg(args, 0)?.clone())
}

fn compile_regex(pattern: &str) -> Result<Regex, FunctionError> {
  Regex::new(pattern).map_err(|e| FunctionError::invalid(0, e.to_string()))
}

pub fn regex_match(args: &[Value]) -> FunctionResult {
  let pattern = str_arg(args, 0)?;
  let source = value_to_string(arg(args, 1)?);
  let re = compile_regex(&format!("^(?:{})", pattern))?;
  Ok(Value::Bool(re.is_match(&source)))
}

pub fn regex_not_match(args: &[Value]) -> FunctionResult {
  let matched = regex_match(args)?;
  Ok(Value::Bool(!is_truthy(&matched)))
}

pub fn regex_search(args: &[Value]) -> FunctionResult {
  let pattern = str_arg(args, 0)?;
  let source = value_to_string(arg(args, 1)?);
  let re = compile_regex(pattern)?;

  let mut groups = Map::new();
  if let Some(captures) = re.captures(&source) {
    for name in re.capture_names().flatten() {
      if let Some(m) = captures.name(name) {
        groups.insert(name.to_string(), Value::String(m.as_str().to_string()));
      }
    }
  }
  Ok(Value::Object(groups))
}

pub fn json_path(args: &[Value]) -> FunctionResult {
  let source = parse_json_source(arg(args, 0)?);
  let path = str_arg(args, 1)?;
  Ok(select(&source, path))
}

pub fn json_empty(args: &[Value]) -> FunctionResult {
  let source = parse_json_source(arg(args, 0)?);
  let value = match args.get(1).and_then(Value::as_str) {
    Some(path) if !path.is_empty() => select(&source, path),
    _ => source,
  };
  Ok(Value::Bool(!is_truthy(&value)))
}

pub fn json_not_empty(args: &[Value]) -> FunctionResult {
  let empty = json_empty(args)?;
  Ok(Value::Bool(!is_truthy(&empty)))
}

pub fn is_true(args: &[Value]) -> FunctionResult {
  let value = arg(args, 0)?;
  let result = match value {
    Value::String(s) => matches!(
      s.trim().to_lowercase().as_str(),
      "1" | "true" | "t" | "yes" | "y"
    ),
    other => is_truthy(other),
  };
  Ok(Value::Bool(result))
}

pub fn split_by(args: &[Value]) -> FunctionResult {
  let source = value_to_string(arg(args, 0)?);
  let delimiter = str_arg(args, 1)?;
  if delimiter.is_empty() {
    return Err(FunctionError::invalid(1, "delimiter must not be empty"));
  }
  if source.is_empty() {
    return Ok(json!([]));
  }
  Ok(Value::Array(
    source
      .split(delimiter)
      .map(|part| Value::String(part.to_string()))
      .collect(),
  ))
}

pub fn lookup(args: &[Value]) -> FunctionResult {
  let source = parse_json_source(arg(args, 0)?);
  let key = value_to_string(arg(args, 1)?);
  Ok(source.get(&key).cloned().unwrap_or(Value::Null))
}

pub fn time_str2str(args: &[Value]) -> FunctionResult {
  let date = str_arg(args, 0)?;
  let from_format = str_arg(args, 1)?;
  let to_format = str_arg(args, 2)?;

  if let Ok(dt) = DateTime::parse_from_str(date, from_format) {
    return render_date(dt.format(to_format), to_format);
  }

  let dt = NaiveDateTime::parse_from_str(date, from_format)
    .map_err(|e| FunctionError::invalid(0, format!("'{}' does not match '{}': {}", date, from_format, e)))?;
  render_date(dt.format(to_format), to_format)
}

fn render_date(formatted: impl fmt::Display, to_format: &str) -> FunctionResult {
  let mut out = String::new();
  write!(out, "{}", formatted).map_err(|_| FunctionError::invalid(2, format!("invalid format '{}'", to_format)))?;
  Ok(Value::String(out))
}

pub fn std_output(args: &[Value]) -> FunctionResult {
  let events: Vec<&Value> = match arg(args, 0)? {
    Value::Array(items) => items.iter().collect(),
    other => vec![other],
  };

  let mut out = std::io::stdout().lock();
  for event in events {
    writeln!(out, "{}", value_to_string(event)).map_err(write_failed)?;
  }
  out.flush().map_err(write_failed)?;
  Ok(Value::Null)
}

fn write_failed(e: std::io::Error) -> FunctionError {
  FunctionError::Failed(format!("failed to write events: {}", e))
}

/// Strings holding JSON are parsed; everything else is taken as-is.
fn parse_json_source(value: &Value) -> Value {
  match value {
    Value::String(s) => serde_json::from_str(s).unwrap_or_else(|_| value.clone()),
    other => other.clone(),
  }
}

// ---------------------------------------------------------------------------
// Path selection
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
enum Index {
  At(usize),
  All,
}

#[derive(Debug, PartialEq)]
struct Segment<'a> {
  name: &'a str,
  index: Option<Index>,
}

/// Parse `$.items[0].name`, `items[*].id`, `a.*` into segments.
fn parse_path(path: &str) -> Vec<Segment<'_>> {
  let path = path.trim();
  let path = path.strip_prefix('$').unwrap_or(path);

  path
    .split('.')
    .filter(|part| !part.is_empty())
    .map(|part| {
      if let Some(open) = part.find('[')
        && let Some(close) = part[open..].find(']')
      {
        let inner = &part[open + 1..open + close];
        let index = if inner == "*" {
          Some(Index::All)
        } else {
          inner.parse::<usize>().ok().map(Index::At)
        };
        return Segment {
          name: &part[..open],
          index,
        };
      }
      Segment {
        name: part,
        index: None,
      }
    })
    .collect()
}

fn children(value: &Value) -> Vec<&Value> {
  match value {
    Value::Array(items) => items.iter().collect(),
    Value::Object(map) => map.values().collect(),
    _ => Vec::new(),
  }
}

/// Select values at `path`. No match yields null, one match the value
/// itself, several matches an array.
fn select(root: &Value, path: &str) -> Value {
  let mut current: Vec<&Value> = vec![root];
  let mut fanned_out = false;

  for segment in parse_path(path) {
    let mut next = Vec::new();
    for value in current {
      let fields: Vec<&Value> = match segment.name {
        "" => vec![value],
        "*" => {
          fanned_out = true;
          children(value)
        }
        name => value.get(name).into_iter().collect(),
      };

      for field in fields {
        match segment.index {
          Some(Index::At(i)) => next.extend(field.get(i)),
          Some(Index::All) => {
            fanned_out = true;
            next.extend(children(field));
          }
          None => next.push(field),
        }
      }
    }
    current = next;
  }

  match (current.len(), fanned_out) {
    (0, false) => Value::Null,
    (1, false) => current[0].clone(),
    _ => Value::Array(current.into_iter().cloned().collect()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_set_var() {
    assert_eq!(set_var(&[json!({"a": 1})]).unwrap(), json!({"a": 1}));
    assert!(set_var(&[]).is_err());
  }

  #[test]
  fn test_regex_match_anchors_at_start() {
    assert_eq!(regex_match(&[json!("ab+"), json!("abbbc")]).unwrap(), json!(true));
    assert_eq!(regex_match(&[json!("b+"), json!("abbbc")]).unwrap(), json!(false));
    assert_eq!(regex_not_match(&[json!("b+"), json!("abbbc")]).unwrap(), json!(true));
  }

  #[test]
  fn test_regex_invalid_pattern() {
    assert!(matches!(
      regex_match(&[json!("("), json!("x")]),
      Err(FunctionError::InvalidArgument { index: 0, .. })
    ));
  }

  #[test]
  fn test_regex_search_named_groups() {
    let result = regex_search(&[
      json!(r#"<(?P<link>[^>]+)>; rel="next""#),
      json!(r#"<https://api/items?page=2>; rel="next""#),
    ])
    .unwrap();
    assert_eq!(result, json!({"link": "https://api/items?page=2"}));

    let result = regex_search(&[json!("(?P<x>z)"), json!("abc")]).unwrap();
    assert_eq!(result, json!({}));
  }

  #[test]
  fn test_json_path_on_string_body() {
    let body = json!(r#"{"data": {"items": [{"id": 1}, {"id": 2}]}, "next": "abc"}"#);

    assert_eq!(json_path(&[body.clone(), json!("$.next")]).unwrap(), json!("abc"));
    assert_eq!(json_path(&[body.clone(), json!("data.items[1].id")]).unwrap(), json!(2));
    assert_eq!(json_path(&[body.clone(), json!("data.items[*].id")]).unwrap(), json!([1, 2]));
    assert_eq!(json_path(&[body, json!("$.missing")]).unwrap(), Value::Null);
  }

  #[test]
  fn test_json_path_wildcard_single_match_is_array() {
    let source = json!({"items": [{"id": 7}]});
    assert_eq!(json_path(&[source, json!("items[*].id")]).unwrap(), json!([7]));
  }

  #[test]
  fn test_json_empty() {
    assert_eq!(json_empty(&[json!("[]")]).unwrap(), json!(true));
    assert_eq!(json_empty(&[json!({"items": []}), json!("items")]).unwrap(), json!(true));
    assert_eq!(json_empty(&[json!({"items": [1]}), json!("items")]).unwrap(), json!(false));
    assert_eq!(json_not_empty(&[json!({"items": [1]}), json!("items")]).unwrap(), json!(true));
    assert_eq!(json_empty(&[Value::Null]).unwrap(), json!(true));
  }

  #[test]
  fn test_is_true() {
    assert_eq!(is_true(&[json!("TRUE")]).unwrap(), json!(true));
    assert_eq!(is_true(&[json!("1")]).unwrap(), json!(true));
    assert_eq!(is_true(&[json!("no")]).unwrap(), json!(false));
    assert_eq!(is_true(&[json!(1)]).unwrap(), json!(true));
    assert_eq!(is_true(&[Value::Null]).unwrap(), json!(false));
  }

  #[test]
  fn test_split_by() {
    assert_eq!(split_by(&[json!("a,b,c"), json!(",")]).unwrap(), json!(["a", "b", "c"]));
    assert_eq!(split_by(&[json!(""), json!(",")]).unwrap(), json!([]));
    assert!(split_by(&[json!("a"), json!("")]).is_err());
  }

  #[test]
  fn test_lookup() {
    assert_eq!(lookup(&[json!({"k": [1]}), json!("k")]).unwrap(), json!([1]));
    assert_eq!(lookup(&[json!(r#"{"k": 2}"#), json!("k")]).unwrap(), json!(2));
    assert_eq!(lookup(&[json!({}), json!("k")]).unwrap(), Value::Null);
  }

  #[test]
  fn test_time_str2str() {
    let result = time_str2str(&[
      json!("2024-03-05 10:20:30"),
      json!("%Y-%m-%d %H:%M:%S"),
      json!("%Y-%m-%dT%H:%M:%S"),
    ])
    .unwrap();
    assert_eq!(result, json!("2024-03-05T10:20:30"));

    assert!(time_str2str(&[json!("garbage"), json!("%Y"), json!("%Y")]).is_err());
    assert!(
      time_str2str(&[
        json!("2024-03-05 10:20:30"),
        json!("%Y-%m-%d %H:%M:%S"),
        json!("%Q"),
      ])
      .is_err()
    );
  }

  #[test]
  fn test_parse_path() {
    let segments = parse_path("$.items[0].name");
    assert_eq!(
      segments,
      vec![
        Segment { name: "items", index: Some(Index::At(0)) },
        Segment { name: "name", index: None },
      ]
    );
  }

  #[test]
  fn test_builtins_registered() {
    let registry = FunctionRegistry::with_builtins();
    for name in ["set_var", "json_path", "regex_match", "std_output", "time_str2str"] {
      assert!(registry.contains(name), "missing builtin {}", name);
    }
  }
}
