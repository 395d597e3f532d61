//! Functional nodes: tasks and conditions.
//!
//! A node names a registry function and lists its input templates. Inputs
//! are rendered in order against the context and passed positionally. The
//! function is looked up on every execution.

use serde_json::Value;
use tracing::debug;

use crate::context::Context;
use crate::error::CoreError;
use crate::registry::FunctionRegistry;
use crate::template::Template;

#[derive(Debug, Clone)]
struct Node {
  function: String,
  inputs: Vec<Template>,
}

impl Node {
  fn new(function: impl Into<String>, inputs: &[String]) -> Result<Self, CoreError> {
    let function = function.into();
    if function.trim().is_empty() {
      return Err(CoreError::config("function name must not be empty"));
    }
    let inputs = inputs
      .iter()
      .map(|i| Template::compile(i.as_str()))
      .collect::<Result<Vec<_>, _>>()?;
    Ok(Self { function, inputs })
  }

  fn call(
    &self,
    context: &Context,
    registry: &FunctionRegistry,
    output: Option<&str>,
  ) -> Result<Value, CoreError> {
    let args = self
      .inputs
      .iter()
      .map(|input| input.render(context))
      .collect::<Result<Vec<_>, _>>()?;

    let function = registry.resolve(&self.function)?;
    debug!(function = %self.function, args = args.len(), "calling function");

    function.call(&args).map_err(|source| CoreError::TaskExecution {
      function: self.function.clone(),
      output: output.map(str::to_string),
      source,
    })
  }
}

/// A pipeline step whose result may be bound to an output variable.
#[derive(Debug, Clone)]
pub struct Task {
  node: Node,
  output: Option<String>,
}

impl Task {
  pub fn new(
    function: impl Into<String>,
    inputs: &[String],
    output: Option<String>,
  ) -> Result<Self, CoreError> {
    Ok(Self {
      node: Node::new(function, inputs)?,
      output: output.filter(|o| !o.is_empty()),
    })
  }

  pub fn function(&self) -> &str {
    &self.node.function
  }

  pub fn output(&self) -> Option<&str> {
    self.output.as_deref()
  }

  /// Run the task. Returns `{output: result}`, or an empty map when the task
  /// binds no output.
  pub fn execute(&self, context: &Context, registry: &FunctionRegistry) -> Result<Context, CoreError> {
    let result = self.node.call(context, registry, self.output.as_deref())?;

    let mut outputs = Context::new();
    if let Some(output) = &self.output {
      outputs.insert(output.clone(), result);
    }
    Ok(outputs)
  }
}

/// A predicate evaluated by truthiness of its function's result.
#[derive(Debug, Clone)]
pub struct Condition {
  node: Node,
}

impl Condition {
  pub fn new(function: impl Into<String>, inputs: &[String]) -> Result<Self, CoreError> {
    Ok(Self {
      node: Node::new(function, inputs)?,
    })
  }

  pub fn function(&self) -> &str {
    &self.node.function
  }

  pub fn calculate(&self, context: &Context, registry: &FunctionRegistry) -> Result<Value, CoreError> {
    self.node.call(context, registry, None)
  }
}
