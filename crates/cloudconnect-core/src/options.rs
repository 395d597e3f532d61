//! Request options and authorizers.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::context::Context;
use crate::error::CoreError;
use crate::template::Template;

/// Mutates outgoing headers (and, if needed, the context) before a request.
pub trait Authorizer: Send + Sync + fmt::Debug {
  fn authorize(&self, headers: &mut HashMap<String, String>, context: &mut Context) -> Result<(), CoreError>;
}

/// HTTP basic authentication from templated credentials.
#[derive(Debug, Clone)]
pub struct BasicAuthorization {
  username: Template,
  password: Template,
}

impl BasicAuthorization {
  /// Both credentials are required.
  pub fn new(username: Option<&str>, password: Option<&str>) -> Result<Self, CoreError> {
    let username = username
      .filter(|u| !u.is_empty())
      .ok_or_else(|| CoreError::config("basic auth requires a username"))?;
    let password = password
      .filter(|p| !p.is_empty())
      .ok_or_else(|| CoreError::config("basic auth requires a password"))?;

    Ok(Self {
      username: Template::compile(username)?,
      password: Template::compile(password)?,
    })
  }
}

impl Authorizer for BasicAuthorization {
  fn authorize(&self, headers: &mut HashMap<String, String>, context: &mut Context) -> Result<(), CoreError> {
    let username = self.username.render_string(context)?;
    let password = self.password.render_string(context)?;
    let encoded = STANDARD.encode(format!("{}:{}", username, password));
    headers.insert("Authorization".to_string(), format!("Basic {}", encoded));
    Ok(())
  }
}

/// Templated request options.
#[derive(Debug, Clone)]
pub struct Options {
  url: Template,
  method: String,
  headers: HashMap<String, Template>,
  body: HashMap<String, Template>,
  auth: Option<Arc<dyn Authorizer>>,
}

impl Options {
  pub fn new(
    url: &str,
    method: &str,
    headers: &HashMap<String, String>,
    body: &HashMap<String, String>,
    auth: Option<Arc<dyn Authorizer>>,
  ) -> Result<Self, CoreError> {
    if url.trim().is_empty() {
      return Err(CoreError::config("request url must not be empty"));
    }
    Ok(Self {
      url: Template::compile(url)?,
      method: method.trim().to_uppercase(),
      headers: compile_map(headers)?,
      body: compile_map(body)?,
      auth,
    })
  }

  /// Upper-cased HTTP method.
  pub fn method(&self) -> &str {
    &self.method
  }

  pub fn auth(&self) -> Option<&Arc<dyn Authorizer>> {
    self.auth.as_ref()
  }

  pub fn normalize_url(&self, context: &Context) -> Result<String, CoreError> {
    self.url.render_string(context)
  }

  pub fn normalize_header(&self, context: &Context) -> Result<HashMap<String, String>, CoreError> {
    self
      .headers
      .iter()
      .map(|(k, v)| Ok((k.clone(), v.render_string(context)?)))
      .collect()
  }

  /// Rendered body fields. Values keep their JSON type.
  pub fn normalize_body(&self, context: &Context) -> Result<Context, CoreError> {
    self
      .body
      .iter()
      .map(|(k, v)| Ok((k.clone(), v.render(context)?)))
      .collect()
  }
}

fn compile_map(map: &HashMap<String, String>) -> Result<HashMap<String, Template>, CoreError> {
  map
    .iter()
    .map(|(k, v)| Ok((k.clone(), Template::compile(v.as_str())?)))
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn ctx(value: serde_json::Value) -> Context {
    value.as_object().cloned().unwrap()
  }

  #[test]
  fn test_basic_auth_header() {
    let auth = BasicAuthorization::new(Some("{{ user }}"), Some("s3cret")).unwrap();
    let mut headers = HashMap::new();
    let mut context = ctx(json!({"user": "alice"}));

    auth.authorize(&mut headers, &mut context).unwrap();
    assert_eq!(headers.get("Authorization").unwrap(), "Basic YWxpY2U6czNjcmV0");
  }

  #[test]
  fn test_basic_auth_requires_credentials() {
    assert!(matches!(
      BasicAuthorization::new(None, Some("p")),
      Err(CoreError::Config { .. })
    ));
    assert!(matches!(
      BasicAuthorization::new(Some("u"), None),
      Err(CoreError::Config { .. })
    ));
  }

  #[test]
  fn test_method_upper_cased() {
    let options = Options::new("http://x", "post", &HashMap::new(), &HashMap::new(), None).unwrap();
    assert_eq!(options.method(), "POST");
  }

  #[test]
  fn test_normalize_renders_fresh_each_call() {
    let headers = HashMap::from([("X-Page".to_string(), "{{ page }}".to_string())]);
    let body = HashMap::from([("ids".to_string(), "{{ ids }}".to_string())]);
    let options = Options::new("http://x/items?page={{ page }}", "GET", &headers, &body, None).unwrap();

    let first = ctx(json!({"page": 1, "ids": [1, 2]}));
    assert_eq!(options.normalize_url(&first).unwrap(), "http://x/items?page=1");
    assert_eq!(options.normalize_header(&first).unwrap()["X-Page"], "1");
    assert_eq!(options.normalize_body(&first).unwrap(), ctx(json!({"ids": [1, 2]})));

    let second = ctx(json!({"page": 2, "ids": []}));
    assert_eq!(options.normalize_url(&second).unwrap(), "http://x/items?page=2");
  }

  #[test]
  fn test_invalid_template_rejected_at_construction() {
    let err = Options::new("http://x/{{ page", "GET", &HashMap::new(), &HashMap::new(), None).unwrap_err();
    assert!(matches!(err, CoreError::Template { .. }));
  }
}
