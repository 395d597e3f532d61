use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Client, Method, Proxy};
use tracing::debug;

use crate::error::HttpError;
use crate::types::{Request, Response};

/// Capability to send one HTTP request.
#[async_trait]
pub trait HttpClient: Send + Sync {
  /// Send the request. Non-2xx responses are returned as
  /// [`HttpError::Status`].
  async fn request(&self, request: Request) -> Result<Response, HttpError>;
}

/// Proxy settings passed through to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyConfig {
  /// "http", "https", "socks4" or "socks5".
  pub scheme: String,
  pub host: String,
  pub port: u16,
  pub username: Option<String>,
  pub password: Option<String>,
  /// Resolve host names on the proxy side (socks5h, socks4a).
  pub rdns: bool,
}

impl ProxyConfig {
  fn url(&self) -> String {
    let scheme = match (self.scheme.as_str(), self.rdns) {
      ("socks5", true) => "socks5h",
      ("socks4", true) => "socks4a",
      (scheme, _) => scheme,
    };
    format!("{}://{}:{}", scheme, self.host, self.port)
  }
}

/// Default [`HttpClient`] backed by reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
  client: Client,
}

impl ReqwestClient {
  /// Create a client, optionally routing all traffic through a proxy.
  pub fn new(proxy: Option<&ProxyConfig>) -> Result<Self, HttpError> {
    let mut builder = Client::builder();

    if let Some(proxy) = proxy {
      let mut p = Proxy::all(proxy.url()).map_err(|e| HttpError::InvalidProxy(e.to_string()))?;
      if let (Some(user), Some(pass)) = (&proxy.username, &proxy.password) {
        p = p.basic_auth(user, pass);
      }
      builder = builder.proxy(p);
    }

    let client = builder.build()?;
    Ok(Self { client })
  }
}

#[async_trait]
impl HttpClient for ReqwestClient {
  async fn request(&self, request: Request) -> Result<Response, HttpError> {
    let url = url::Url::parse(&request.url).map_err(|e| HttpError::InvalidUrl {
      url: request.url.clone(),
      message: e.to_string(),
    })?;
    let method = Method::from_bytes(request.method.to_uppercase().as_bytes())
      .map_err(|_| HttpError::InvalidMethod(request.method.clone()))?;

    debug!(url = %url, method = %method, "sending request");

    let mut builder = self.client.request(method, url);
    for (key, value) in &request.headers {
      builder = builder.header(key, value);
    }
    if let Some(body) = request.body {
      builder = builder.body(body);
    }

    let response = builder.send().await?;
    let status = response.status().as_u16();
    let headers: HashMap<String, String> = response
      .headers()
      .iter()
      .filter_map(|(k, v)| {
        v.to_str()
          .ok()
          .map(|val| (k.as_str().to_string(), val.to_string()))
      })
      .collect();
    let body = response.text().await?;

    if !(200..300).contains(&status) {
      return Err(HttpError::Status { status, body });
    }

    Ok(Response {
      status,
      headers,
      body,
    })
  }
}
