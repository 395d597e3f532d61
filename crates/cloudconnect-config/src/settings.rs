use serde::{Deserialize, Serialize};

/// Settings shared by every request of a connector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalSettings {
  #[serde(default)]
  pub logging: LoggingDef,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub proxy: Option<ProxyDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingDef {
  /// Level name, e.g. "DEBUG", "INFO", "WARNING", "ERROR".
  #[serde(default = "default_level")]
  pub level: String,
}

impl Default for LoggingDef {
  fn default() -> Self {
    Self {
      level: default_level(),
    }
  }
}

fn default_level() -> String {
  "INFO".to_string()
}

/// Proxy settings. Handed to the HTTP client as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyDef {
  #[serde(default)]
  pub enabled: bool,
  /// Proxy scheme: "http", "https", "socks5" or "socks5h".
  #[serde(rename = "type", default = "default_proxy_type")]
  pub proxy_type: String,
  pub host: String,
  pub port: u16,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub username: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub password: Option<String>,
  /// Resolve host names through the proxy (socks only).
  #[serde(default)]
  pub rdns: bool,
}

fn default_proxy_type() -> String {
  "http".to_string()
}
