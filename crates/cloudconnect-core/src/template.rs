//! Template compilation and rendering.
//!
//! Every configurable string (URLs, headers, task inputs, checkpoint keys) is
//! a minijinja template rendered against the job context. Three shapes are
//! recognised when a template is compiled:
//!
//! - **Literal**: no template syntax, renders to itself.
//! - **Expression**: exactly one `{{ ... }}` spanning the whole string. The
//!   expression is evaluated and the JSON type of the result is preserved, so
//!   `"{{ items }}"` yields an array rather than its printed form.
//! - **Text**: anything else, rendered to a string.
//!
//! Undefined variables are always an error ([`CoreError::MissingVariable`]).
//! There is no empty-string fallback: a URL built from a missing page token
//! must fail loudly instead of silently requesting the first page again.

use std::fmt;
use std::sync::{Arc, LazyLock};

use minijinja::{Environment, ErrorKind, Expression, UndefinedBehavior};
use serde_json::Value;

use crate::context::{Context, value_to_string};
use crate::error::CoreError;

/// Name of the single template held by a text template's environment.
const TEXT_TEMPLATE: &str = "text";

static ENV: LazyLock<Environment<'static>> = LazyLock::new(strict_environment);

fn strict_environment() -> Environment<'static> {
  let mut env = Environment::new();
  env.set_undefined_behavior(UndefinedBehavior::Strict);
  env
}

#[derive(Clone)]
enum Kind {
  Literal,
  Expression {
    expr: String,
    compiled: Arc<Expression<'static, 'static>>,
  },
  Text(Arc<Environment<'static>>),
}

/// A compiled template expression.
///
/// Parsing happens once in [`Template::compile`]; rendering only evaluates.
#[derive(Clone)]
pub struct Template {
  source: String,
  kind: Kind,
}

impl Template {
  /// Compile a template. Syntax errors are reported here, not on render.
  pub fn compile(source: impl Into<String>) -> Result<Self, CoreError> {
    let source = source.into();

    if !has_template_syntax(&source) {
      return Ok(Self {
        source,
        kind: Kind::Literal,
      });
    }

    if let Some(expr) = sole_expression(&source) {
      let expr = expr.to_string();
      let compiled = ENV
        .compile_expression_owned(expr.clone())
        .map_err(|e| syntax_error(&source, e))?;
      return Ok(Self {
        source,
        kind: Kind::Expression {
          expr,
          compiled: Arc::new(compiled),
        },
      });
    }

    let mut env = strict_environment();
    env
      .add_template_owned(TEXT_TEMPLATE, source.clone())
      .map_err(|e| syntax_error(&source, e))?;

    Ok(Self {
      source,
      kind: Kind::Text(Arc::new(env)),
    })
  }

  /// The uncompiled template source.
  pub fn source(&self) -> &str {
    &self.source
  }

  /// Render against a context.
  pub fn render(&self, context: &Context) -> Result<Value, CoreError> {
    match &self.kind {
      Kind::Literal => Ok(Value::String(self.source.clone())),
      Kind::Expression { expr, compiled } => {
        let value = compiled
          .eval(minijinja::Value::from_serialize(context))
          .map_err(|e| self.render_error(e))?;

        if value.is_undefined() {
          return Err(CoreError::MissingVariable {
            template: self.source.clone(),
            message: format!("'{}' is undefined", expr),
          });
        }

        serde_json::to_value(&value).map_err(|e| CoreError::Template {
          template: self.source.clone(),
          message: format!("result is not representable as JSON: {}", e),
        })
      }
      Kind::Text(env) => env
        .get_template(TEXT_TEMPLATE)
        .and_then(|t| t.render(minijinja::Value::from_serialize(context)))
        .map(Value::String)
        .map_err(|e| self.render_error(e)),
    }
  }

  /// Render and convert the result to a string.
  pub fn render_string(&self, context: &Context) -> Result<String, CoreError> {
    self.render(context).map(|v| value_to_string(&v))
  }

  fn render_error(&self, e: minijinja::Error) -> CoreError {
    if e.kind() == ErrorKind::UndefinedError {
      CoreError::MissingVariable {
        template: self.source.clone(),
        message: e.to_string(),
      }
    } else {
      CoreError::Template {
        template: self.source.clone(),
        message: e.to_string(),
      }
    }
  }
}

impl PartialEq for Template {
  fn eq(&self, other: &Self) -> bool {
    self.source == other.source
  }
}

impl fmt::Debug for Template {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("Template").field(&self.source).finish()
  }
}

fn has_template_syntax(source: &str) -> bool {
  source.contains("{{") || source.contains("{%") || source.contains("{#")
}

/// Returns the inner expression if the whole string is one `{{ ... }}`.
/// Surrounding whitespace makes the template text.
fn sole_expression(source: &str) -> Option<&str> {
  let inner = source
    .strip_prefix("{{")?
    .strip_suffix("}}")?
    .trim_matches('-');

  if inner.contains("{{") || inner.contains("}}") || inner.contains("{%") {
    return None;
  }

  let inner = inner.trim();
  (!inner.is_empty()).then_some(inner)
}

fn syntax_error(source: &str, e: minijinja::Error) -> CoreError {
  CoreError::Template {
    template: source.to_string(),
    message: e.to_string(),
  }
}
