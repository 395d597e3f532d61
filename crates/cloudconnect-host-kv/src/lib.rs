//! Checkpoint storage capability.
//!
//! A checkpoint is a JSON object stored under a namespace, an ordered list of
//! key fragments such as `["my_input", "users"]`. How the store persists it
//! (file, KV collection, remote service) is up to the implementation.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

use serde_json::{Map, Value};
use thiserror::Error;

/// Namespace used when a checkpoint descriptor declares none.
pub const DEFAULT_NAMESPACE: &str = "__default__";

/// Boxed future returned by [`CheckpointStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("checkpoint store unavailable: {0}")]
  Unavailable(String),

  #[error("invalid checkpoint content: {0}")]
  InvalidContent(String),
}

/// Trait for checkpoint persistence.
///
/// This trait is async to support networked backends.
pub trait CheckpointStore: Send + Sync {
  /// Read the checkpoint stored under a namespace.
  fn get<'a>(&'a self, namespace: &'a [String]) -> StoreFuture<'a, Option<Map<String, Value>>>;

  /// Write (overwrite) the checkpoint for a namespace.
  fn set<'a>(&'a self, namespace: &'a [String], content: Map<String, Value>) -> StoreFuture<'a, ()>;

  /// Remove the checkpoint for a namespace.
  fn delete<'a>(&'a self, namespace: &'a [String]) -> StoreFuture<'a, ()>;
}

/// Flatten a namespace into a single storage key.
pub fn namespace_key(namespace: &[String]) -> String {
  if namespace.is_empty() {
    DEFAULT_NAMESPACE.to_string()
  } else {
    namespace.join("/")
  }
}

/// In-memory checkpoint store.
///
/// Suitable for one-shot runs or testing.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
  data: RwLock<HashMap<String, Map<String, Value>>>,
}

impl InMemoryCheckpointStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Snapshot of every stored checkpoint, keyed by flattened namespace.
  pub fn snapshot(&self) -> HashMap<String, Map<String, Value>> {
    self.data.read().map(|d| d.clone()).unwrap_or_default()
  }
}

fn poisoned<E>(_: E) -> StoreError {
  StoreError::Unavailable("lock poisoned".to_string())
}

impl CheckpointStore for InMemoryCheckpointStore {
  fn get<'a>(&'a self, namespace: &'a [String]) -> StoreFuture<'a, Option<Map<String, Value>>> {
    let value = self
      .data
      .read()
      .map(|d| d.get(&namespace_key(namespace)).cloned())
      .map_err(poisoned);
    Box::pin(async move { value })
  }

  fn set<'a>(&'a self, namespace: &'a [String], content: Map<String, Value>) -> StoreFuture<'a, ()> {
    let result = self
      .data
      .write()
      .map(|mut d| {
        d.insert(namespace_key(namespace), content);
      })
      .map_err(poisoned);
    Box::pin(async move { result })
  }

  fn delete<'a>(&'a self, namespace: &'a [String]) -> StoreFuture<'a, ()> {
    let result = self
      .data
      .write()
      .map(|mut d| {
        d.remove(&namespace_key(namespace));
      })
      .map_err(poisoned);
    Box::pin(async move { result })
  }
}
