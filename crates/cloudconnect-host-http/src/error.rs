use thiserror::Error;

/// Errors returned by an [`HttpClient`](crate::HttpClient).
#[derive(Debug, Error)]
pub enum HttpError {
  /// The server answered with a non-success status.
  #[error("http status {status}: {body}")]
  Status { status: u16, body: String },

  /// The request URL could not be parsed.
  #[error("invalid url '{url}': {message}")]
  InvalidUrl { url: String, message: String },

  /// The request method is not a valid HTTP method.
  #[error("invalid http method: {0}")]
  InvalidMethod(String),

  /// Proxy settings could not be applied.
  #[error("invalid proxy: {0}")]
  InvalidProxy(String),

  /// Connection, TLS or body transfer failed.
  #[error("transport error: {0}")]
  Transport(#[from] reqwest::Error),
}

impl HttpError {
  /// Status code carried by the error, if the server responded.
  pub fn status(&self) -> Option<u16> {
    match self {
      HttpError::Status { status, .. } => Some(*status),
      HttpError::Transport(e) => e.status().map(|s| s.as_u16()),
      _ => None,
    }
  }

  /// Whether the server reported the resource as missing.
  pub fn is_not_found(&self) -> bool {
    self.status() == Some(404)
  }
}
