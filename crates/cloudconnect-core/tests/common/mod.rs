//! Shared test fixtures: a scripted HTTP client and context helpers.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cloudconnect_core::{Capabilities, Context, FunctionRegistry};
use cloudconnect_host_http::{HttpClient, HttpError, Request, Response};
use serde_json::Value;

/// Replays queued responses in order. Once the queue is empty it keeps
/// answering with `fallback`, or with an empty body if none is set.
#[derive(Default)]
pub struct ScriptedClient {
  responses: Mutex<VecDeque<Result<Response, HttpError>>>,
  fallback: Option<Response>,
  requests: Mutex<Vec<Request>>,
}

impl ScriptedClient {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn ok(self, body: &str) -> Self {
    self.push(Ok(Response {
      status: 200,
      headers: Default::default(),
      body: body.to_string(),
    }))
  }

  pub fn status(self, status: u16, body: &str) -> Self {
    self.push(Err(HttpError::Status {
      status,
      body: body.to_string(),
    }))
  }

  pub fn repeat_forever(mut self, body: &str) -> Self {
    self.fallback = Some(Response {
      status: 200,
      headers: Default::default(),
      body: body.to_string(),
    });
    self
  }

  fn push(self, response: Result<Response, HttpError>) -> Self {
    self.responses.lock().unwrap().push_back(response);
    self
  }

  pub fn requests(&self) -> Vec<Request> {
    self.requests.lock().unwrap().clone()
  }

  pub fn urls(&self) -> Vec<String> {
    self.requests().into_iter().map(|r| r.url).collect()
  }
}

#[async_trait]
impl HttpClient for ScriptedClient {
  async fn request(&self, request: Request) -> Result<Response, HttpError> {
    self.requests.lock().unwrap().push(request);
    tokio::task::yield_now().await;

    let next = self.responses.lock().unwrap().pop_front();
    match next {
      Some(response) => response,
      None => Ok(self.fallback.clone().unwrap_or_default()),
    }
  }
}

pub fn ctx(value: Value) -> Context {
  value.as_object().cloned().unwrap()
}

pub fn caps(client: Arc<ScriptedClient>) -> Capabilities {
  Capabilities::new(Arc::new(FunctionRegistry::with_builtins()), client)
}
