use serde::{Deserialize, Serialize};

use crate::request::{
  CheckpointDef, ConditionDef, OptionsDef, ProcessorDef, RepeatModeDef, TaskDef, TemplateExpr,
};

/// A chain of tasks executed head-first. Tasks that produce several
/// contexts fork the job into one child per context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDef {
  pub name: String,
  pub tasks: Vec<CceTaskDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CceTaskDef {
  /// Repeating HTTP request; yields one context per processed response.
  Http {
    name: String,
    request: OptionsDef,
    #[serde(default)]
    pre_process: ProcessorDef,
    #[serde(default)]
    post_process: ProcessorDef,
    #[serde(default)]
    iteration_mode: RepeatModeDef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    checkpoint: Option<CheckpointDef>,
  },
  /// Splits a rendered value into one context per element.
  Split {
    name: String,
    source: TemplateExpr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    delimiter: Option<String>,
    output: String,
  },
  /// Runs a gated pipeline once and yields the resulting context.
  Process {
    name: String,
    #[serde(default)]
    conditions: Vec<ConditionDef>,
    #[serde(default)]
    pipeline: Vec<TaskDef>,
  },
}

impl CceTaskDef {
  pub fn name(&self) -> &str {
    match self {
      CceTaskDef::Http { name, .. } => name,
      CceTaskDef::Split { name, .. } => name,
      CceTaskDef::Process { name, .. } => name,
    }
  }
}
