use std::collections::HashMap;

/// A concrete request, fully rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
  pub url: String,
  pub method: String,
  pub headers: HashMap<String, String>,
  pub body: Option<String>,
}

impl Request {
  pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
    Self {
      url: url.into(),
      method: method.into(),
      headers: HashMap::new(),
      body: None,
    }
  }
}

/// A successful response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
  pub status: u16,
  pub headers: HashMap<String, String>,
  pub body: String,
}

impl Response {
  /// True only for a zero-length body; whitespace counts as content.
  pub fn is_empty(&self) -> bool {
    self.body.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_only_zero_length_body_is_empty() {
    assert!(Response::default().is_empty());

    let whitespace = Response {
      status: 200,
      body: " \n".to_string(),
      ..Default::default()
    };
    assert!(!whitespace.is_empty());
  }
}
