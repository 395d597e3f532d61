//! Logging capability for CloudConnect.
//!
//! The engine never installs a global subscriber. Instead it builds a
//! [`Dispatch`] from the configured level and scopes every job to it, so two
//! engines in one process can log at different levels.

use std::str::FromStr;

use thiserror::Error;
use tracing::Dispatch;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error, PartialEq)]
pub enum LogError {
  #[error("unknown log level: {0}")]
  InvalidLevel(String),
}

/// A configured log level.
///
/// Accepts the level names found in connector files, case-insensitively:
/// `TRACE`, `DEBUG`, `INFO`, `WARN`/`WARNING`, `ERROR`/`CRITICAL`/`FATAL`
/// and `OFF`/`NONE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogLevel(LevelFilter);

impl LogLevel {
  pub fn filter(&self) -> LevelFilter {
    self.0
  }
}

impl Default for LogLevel {
  fn default() -> Self {
    Self(LevelFilter::INFO)
  }
}

impl FromStr for LogLevel {
  type Err = LogError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let filter = match s.trim().to_uppercase().as_str() {
      "TRACE" => LevelFilter::TRACE,
      "DEBUG" => LevelFilter::DEBUG,
      "INFO" => LevelFilter::INFO,
      "WARN" | "WARNING" => LevelFilter::WARN,
      "ERROR" | "CRITICAL" | "FATAL" => LevelFilter::ERROR,
      "OFF" | "NONE" => LevelFilter::OFF,
      _ => return Err(LogError::InvalidLevel(s.to_string())),
    };
    Ok(Self(filter))
  }
}

/// Build a subscriber dispatch writing human-readable logs to stderr.
///
/// `RUST_LOG` directives, when present, are layered on top of the
/// configured level.
pub fn build_dispatch(level: LogLevel) -> Dispatch {
  let filter = EnvFilter::builder()
    .with_default_directive(level.filter().into())
    .from_env_lossy();

  let subscriber = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_target(true)
    .with_writer(std::io::stderr)
    .finish();

  Dispatch::new(subscriber)
}
