//! Function registry.
//!
//! Tasks and conditions name the function they invoke. The registry maps
//! those names to strongly-typed callables registered at startup. Names are
//! resolved on every execution, so a registry can be swapped between runs.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::error::CoreError;

/// Result type returned by registered functions.
pub type FunctionResult = Result<Value, FunctionError>;

/// Errors raised by a registered function.
#[derive(Debug, Error)]
pub enum FunctionError {
  /// Wrong number of positional arguments.
  #[error("expected {expected} argument(s), got {actual}")]
  Arity { expected: String, actual: usize },

  /// An argument had the wrong shape.
  #[error("invalid argument {index}: {message}")]
  InvalidArgument { index: usize, message: String },

  /// The function ran and failed.
  #[error("{0}")]
  Failed(String),
}

impl FunctionError {
  pub fn invalid(index: usize, message: impl Into<String>) -> Self {
    Self::InvalidArgument {
      index,
      message: message.into(),
    }
  }
}

/// A callable taking rendered positional inputs.
pub trait Function: Send + Sync {
  fn call(&self, args: &[Value]) -> FunctionResult;
}

impl<F> Function for F
where
  F: Fn(&[Value]) -> FunctionResult + Send + Sync,
{
  fn call(&self, args: &[Value]) -> FunctionResult {
    self(args)
  }
}

/// Name to function mapping supplied by the host.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
  functions: HashMap<String, Arc<dyn Function>>,
}

impl FunctionRegistry {
  /// Create an empty registry.
  pub fn new() -> Self {
    Self::default()
  }

  /// Create a registry pre-populated with the built-in functions.
  pub fn with_builtins() -> Self {
    let mut registry = Self::new();
    crate::builtins::register_all(&mut registry);
    registry
  }

  /// Register (or replace) a function under a name.
  pub fn register(&mut self, name: impl Into<String>, function: impl Function + 'static) -> &mut Self {
    self.functions.insert(name.into(), Arc::new(function));
    self
  }

  /// Resolve a function by name.
  ///
  /// Dotted names such as `ext.regex_match` are tried verbatim first, then by
  /// their final segment.
  pub fn resolve(&self, name: &str) -> Result<Arc<dyn Function>, CoreError> {
    if let Some(f) = self.functions.get(name) {
      return Ok(f.clone());
    }

    name
      .rsplit_once('.')
      .and_then(|(_, short)| self.functions.get(short))
      .cloned()
      .ok_or_else(|| CoreError::FunctionNotFound {
        name: name.to_string(),
      })
  }

  pub fn contains(&self, name: &str) -> bool {
    self.resolve(name).is_ok()
  }

  /// Registered names, sorted.
  pub fn names(&self) -> Vec<&str> {
    let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
    names.sort_unstable();
    names
  }
}

impl fmt::Debug for FunctionRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("FunctionRegistry")
      .field("functions", &self.names())
      .finish()
  }
}

/// Fetch a required positional argument.
pub fn arg(args: &[Value], index: usize) -> Result<&Value, FunctionError> {
  args.get(index).ok_or_else(|| FunctionError::Arity {
    expected: format!("at least {}", index + 1),
    actual: args.len(),
  })
}

/// Fetch a required string argument.
pub fn str_arg(args: &[Value], index: usize) -> Result<&str, FunctionError> {
  arg(args, index)?
    .as_str()
    .ok_or_else(|| FunctionError::invalid(index, "expected a string"))
}
