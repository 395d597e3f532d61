//! Core error types.

use cloudconnect_host_http::HttpError;
use cloudconnect_host_kv::StoreError;

use crate::registry::FunctionError;

/// Errors that can occur while loading or running jobs.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
  /// Malformed or incomplete configuration. Raised at construction.
  #[error("invalid configuration: {message}")]
  Config { message: String },

  /// Template failed to compile, or failed to render for a reason other
  /// than a missing variable.
  #[error("template error in '{template}': {message}")]
  Template { template: String, message: String },

  /// Template referenced a variable absent from the context.
  #[error("undefined variable in template '{template}': {message}")]
  MissingVariable { template: String, message: String },

  /// No function registered under the requested name.
  #[error("function not found: {name}")]
  FunctionNotFound { name: String },

  /// A task or condition function returned an error.
  #[error("task '{function}' (output: {}) failed: {source}", .output.as_deref().unwrap_or("-"))]
  TaskExecution {
    function: String,
    output: Option<String>,
    #[source]
    source: FunctionError,
  },

  /// The HTTP request failed with a status other than 404, or never got a
  /// response.
  #[error("http request failed: {0}")]
  Http(#[from] HttpError),

  /// Checkpoint store read or write failed.
  #[error("checkpoint store error: {0}")]
  Checkpoint(#[from] StoreError),

  /// Execution was cancelled.
  #[error("execution cancelled")]
  Cancelled,
}

impl CoreError {
  /// Create a configuration error.
  pub fn config(message: impl Into<String>) -> Self {
    Self::Config {
      message: message.into(),
    }
  }
}
