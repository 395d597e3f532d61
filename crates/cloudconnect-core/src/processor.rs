//! Conditional gates, processors and repeat policies.

use tracing::{debug, info};

use crate::context::{Context, is_truthy};
use crate::error::CoreError;
use crate::node::{Condition, Task};
use crate::registry::FunctionRegistry;

/// An ordered list of conditions. Passes only if every condition is truthy.
#[derive(Debug, Clone, Default)]
pub struct Conditional {
  conditions: Vec<Condition>,
}

impl Conditional {
  pub fn new(conditions: Vec<Condition>) -> Self {
    Self { conditions }
  }

  pub fn is_empty(&self) -> bool {
    self.conditions.is_empty()
  }

  /// Evaluate in order, stopping at the first falsy condition. An empty gate
  /// passes.
  pub fn passed(&self, context: &Context, registry: &FunctionRegistry) -> Result<bool, CoreError> {
    for condition in &self.conditions {
      let value = condition.calculate(context, registry)?;
      if !is_truthy(&value) {
        debug!(function = %condition.function(), "condition not met");
        return Ok(false);
      }
    }
    Ok(true)
  }
}

/// Result of running a processor.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
  /// The gate did not pass; no task ran.
  Skipped,
  /// Every task ran. Holds the outputs produced by the pipeline.
  Ran { outputs: Context },
}

impl ProcessOutcome {
  pub fn is_skipped(&self) -> bool {
    matches!(self, ProcessOutcome::Skipped)
  }
}

/// A gate plus an ordered pipeline of tasks.
#[derive(Debug, Clone, Default)]
pub struct Processor {
  label: String,
  gate: Conditional,
  pipeline: Vec<Task>,
}

impl Processor {
  pub fn new(label: impl Into<String>, gate: Conditional, pipeline: Vec<Task>) -> Self {
    Self {
      label: label.into(),
      gate,
      pipeline,
    }
  }

  pub fn label(&self) -> &str {
    &self.label
  }

  pub fn is_empty(&self) -> bool {
    self.gate.is_empty() && self.pipeline.is_empty()
  }

  /// Run the pipeline if the gate passes. Each task's outputs are merged into
  /// `context` before the next task renders its inputs.
  pub fn run(&self, context: &mut Context, registry: &FunctionRegistry) -> Result<ProcessOutcome, CoreError> {
    if !self.gate.passed(context, registry)? {
      info!(processor = %self.label, "processor skipped, conditions not met");
      return Ok(ProcessOutcome::Skipped);
    }

    let mut outputs = Context::new();
    for task in &self.pipeline {
      let produced = task.execute(context, registry)?;
      for (key, value) in produced {
        context.insert(key.clone(), value.clone());
        outputs.insert(key, value);
      }
    }

    debug!(processor = %self.label, tasks = self.pipeline.len(), "processor finished");
    Ok(ProcessOutcome::Ran { outputs })
  }
}

/// Decides whether a job issues another request.
#[derive(Debug, Clone)]
pub struct RepeatMode {
  repeat_type: String,
  stop_gate: Conditional,
}

impl RepeatMode {
  /// `repeat_type` is trimmed and lower-cased.
  pub fn new(repeat_type: &str, stop_gate: Conditional) -> Self {
    Self {
      repeat_type: repeat_type.trim().to_lowercase(),
      stop_gate,
    }
  }

  pub fn once() -> Self {
    Self::new("once", Conditional::default())
  }

  pub fn repeat_type(&self) -> &str {
    &self.repeat_type
  }

  pub fn is_once(&self) -> bool {
    self.repeat_type == "once"
  }

  /// Whether the job should stop after the current iteration.
  pub fn should_stop(&self, context: &Context, registry: &FunctionRegistry) -> Result<bool, CoreError> {
    if self.is_once() {
      return Ok(true);
    }
    self.stop_gate.passed(context, registry)
  }
}

impl Default for RepeatMode {
  fn default() -> Self {
    Self::once()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::registry::FunctionResult;
  use serde_json::{Value, json};
  use std::sync::Arc;
  use std::sync::atomic::{AtomicUsize, Ordering};

  fn counting_registry(calls: Arc<AtomicUsize>) -> FunctionRegistry {
    let mut registry = FunctionRegistry::with_builtins();
    registry.register("count_false", move |_: &[Value]| -> FunctionResult {
      calls.fetch_add(1, Ordering::SeqCst);
      Ok(json!(false))
    });
    registry
  }

  fn cond(function: &str, inputs: &[&str]) -> Condition {
    let inputs: Vec<String> = inputs.iter().map(|s| s.to_string()).collect();
    Condition::new(function, &inputs).unwrap()
  }

  fn task(function: &str, inputs: &[&str], output: &str) -> Task {
    let inputs: Vec<String> = inputs.iter().map(|s| s.to_string()).collect();
    Task::new(function, &inputs, Some(output.to_string())).unwrap()
  }

  #[test]
  fn test_empty_gate_passes() {
    let registry = FunctionRegistry::new();
    assert!(Conditional::default().passed(&Context::new(), &registry).unwrap());
  }

  #[test]
  fn test_gate_short_circuits() {
    let calls = Arc::new(AtomicUsize::new(0));
    let registry = counting_registry(calls.clone());
    let gate = Conditional::new(vec![
      cond("count_false", &[]),
      cond("count_false", &[]),
    ]);

    assert!(!gate.passed(&Context::new(), &registry).unwrap());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn test_processor_skipped_leaves_context_untouched() {
    let registry = FunctionRegistry::with_builtins();
    let processor = Processor::new(
      "post",
      Conditional::new(vec![cond("is_true", &["false"])]),
      vec![task("set_var", &["1"], "x")],
    );

    let mut context = Context::new();
    let outcome = processor.run(&mut context, &registry).unwrap();
    assert!(outcome.is_skipped());
    assert!(context.is_empty());
  }

  #[test]
  fn test_pipeline_outputs_visible_to_next_task() {
    let registry = FunctionRegistry::with_builtins();
    let processor = Processor::new(
      "post",
      Conditional::default(),
      vec![
        task("set_var", &["{{ [1, 2, 3] }}"], "items"),
        task("json_path", &["{{ items }}", "[2]"], "last"),
      ],
    );

    let mut context = Context::new();
    let outcome = processor.run(&mut context, &registry).unwrap();
    assert_eq!(
      outcome,
      ProcessOutcome::Ran {
        outputs: json!({"items": [1, 2, 3], "last": 3}).as_object().cloned().unwrap()
      }
    );
    assert_eq!(context.get("last"), Some(&json!(3)));
  }

  #[test]
  fn test_repeat_mode_once_always_stops() {
    let registry = FunctionRegistry::new();
    let mode = RepeatMode::new(" ONCE ", Conditional::default());
    assert!(mode.is_once());
    assert!(mode.should_stop(&Context::new(), &registry).unwrap());
  }

  #[test]
  fn test_repeat_mode_loop_stops_when_gate_passes() {
    let registry = FunctionRegistry::with_builtins();
    let mode = RepeatMode::new(
      "loop",
      Conditional::new(vec![cond("json_empty", &["{{ next }}"])]),
    );
    assert!(!mode.is_once());

    let mut context = Context::new();
    context.insert("next".to_string(), json!("token"));
    assert!(!mode.should_stop(&context, &registry).unwrap());

    context.insert("next".to_string(), json!(""));
    assert!(mode.should_stop(&context, &registry).unwrap());
  }
}
