//! Checkpoint descriptors.

use std::collections::HashMap;

use crate::context::Context;
use crate::error::CoreError;
use crate::template::Template;

/// Where and what to persist after a processed response.
///
/// The namespace may be empty, in which case the store's default scope is
/// used. The content must name at least one field.
#[derive(Debug, Clone)]
pub struct Checkpoint {
  namespace: Vec<Template>,
  content: Vec<(String, Template)>,
}

impl Checkpoint {
  pub fn new(namespace: &[String], content: &HashMap<String, String>) -> Result<Self, CoreError> {
    if content.is_empty() {
      return Err(CoreError::config("checkpoint content must not be empty"));
    }

    let namespace = namespace
      .iter()
      .map(|n| Template::compile(n.as_str()))
      .collect::<Result<Vec<_>, _>>()?;

    let mut content = content
      .iter()
      .map(|(k, v)| Ok((k.clone(), Template::compile(v.as_str())?)))
      .collect::<Result<Vec<_>, CoreError>>()?;
    content.sort_by(|a, b| a.0.cmp(&b.0));

    Ok(Self { namespace, content })
  }

  pub fn render_namespace(&self, context: &Context) -> Result<Vec<String>, CoreError> {
    self.namespace.iter().map(|n| n.render_string(context)).collect()
  }

  pub fn render_content(&self, context: &Context) -> Result<Context, CoreError> {
    self
      .content
      .iter()
      .map(|(k, v)| Ok((k.clone(), v.render(context)?)))
      .collect()
  }
}
