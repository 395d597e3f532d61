use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A template expression, rendered against the job context at runtime.
pub type TemplateExpr = String;

/// One configured request: how to send it, how to process the response,
/// when to stop repeating, and where to keep progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDef {
  /// Optional name used in logs and events.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  pub request: OptionsDef,
  #[serde(default)]
  pub pre_process: ProcessorDef,
  #[serde(default)]
  pub post_process: ProcessorDef,
  #[serde(default)]
  pub iteration_mode: RepeatModeDef,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub checkpoint: Option<CheckpointDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionsDef {
  pub url: TemplateExpr,
  #[serde(default = "default_method")]
  pub method: String,
  #[serde(default)]
  pub headers: HashMap<String, TemplateExpr>,
  #[serde(default)]
  pub body: HashMap<String, TemplateExpr>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub auth: Option<AuthDef>,
}

fn default_method() -> String {
  "GET".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "options", rename_all = "snake_case")]
pub enum AuthDef {
  BasicAuth {
    #[serde(default)]
    username: Option<TemplateExpr>,
    #[serde(default)]
    password: Option<TemplateExpr>,
  },
}

/// A gated pipeline of tasks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessorDef {
  #[serde(default)]
  pub conditions: Vec<ConditionDef>,
  #[serde(default)]
  pub pipeline: Vec<TaskDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDef {
  pub method: String,
  #[serde(default)]
  pub input: Vec<TemplateExpr>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub output: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionDef {
  pub method: String,
  #[serde(default)]
  pub input: Vec<TemplateExpr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatModeDef {
  /// "once" runs a single iteration; anything else loops until the stop
  /// conditions pass.
  #[serde(rename = "type", default = "default_repeat_type")]
  pub repeat_type: String,
  #[serde(default)]
  pub stop_conditions: Vec<ConditionDef>,
}

impl Default for RepeatModeDef {
  fn default() -> Self {
    Self {
      repeat_type: default_repeat_type(),
      stop_conditions: Vec::new(),
    }
  }
}

fn default_repeat_type() -> String {
  "once".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointDef {
  #[serde(default)]
  pub namespace: Vec<TemplateExpr>,
  #[serde(default)]
  pub content: HashMap<String, TemplateExpr>,
}
