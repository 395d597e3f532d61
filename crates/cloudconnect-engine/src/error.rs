use cloudconnect_core::CoreError;
use cloudconnect_host_http::HttpError;
use cloudconnect_host_log::LogError;
use thiserror::Error;

/// Errors raised while building or running an engine.
#[derive(Debug, Error)]
pub enum EngineError {
  /// The connector as a whole is unusable.
  #[error("invalid connector: {message}")]
  Config { message: String },

  /// A request or job definition failed to load.
  #[error("failed to load '{name}': {source}")]
  Load {
    name: String,
    #[source]
    source: CoreError,
  },

  #[error(transparent)]
  Log(#[from] LogError),

  /// The HTTP client could not be built from the proxy settings.
  #[error("failed to build http client: {0}")]
  Client(#[from] HttpError),

  /// A request job failed. Remaining requests were not started.
  #[error("request '{name}' failed: {source}")]
  Job {
    name: String,
    #[source]
    source: CoreError,
  },
}
