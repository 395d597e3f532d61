use std::fmt;
use std::sync::Arc;

use cloudconnect_host_http::HttpClient;
use cloudconnect_host_kv::CheckpointStore;
use tracing::Dispatch;

use crate::events::{ExecutionNotifier, NoopNotifier};
use crate::registry::FunctionRegistry;

/// Host services a job runs against.
///
/// Cloned into every job and forked child; all members are shared.
#[derive(Clone)]
pub struct Capabilities {
  pub registry: Arc<FunctionRegistry>,
  pub client: Arc<dyn HttpClient>,
  /// Checkpoints are neither read nor written without a store.
  pub store: Option<Arc<dyn CheckpointStore>>,
  pub notifier: Arc<dyn ExecutionNotifier>,
  /// Subscriber that job logs are routed to. Falls back to the ambient
  /// default when unset.
  pub dispatch: Option<Dispatch>,
}

impl Capabilities {
  pub fn new(registry: Arc<FunctionRegistry>, client: Arc<dyn HttpClient>) -> Self {
    Self {
      registry,
      client,
      store: None,
      notifier: Arc::new(NoopNotifier),
      dispatch: None,
    }
  }

  pub fn with_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
    self.store = Some(store);
    self
  }

  pub fn with_notifier(mut self, notifier: Arc<dyn ExecutionNotifier>) -> Self {
    self.notifier = notifier;
    self
  }

  pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
    self.dispatch = Some(dispatch);
    self
  }
}

impl fmt::Debug for Capabilities {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Capabilities")
      .field("registry", &self.registry)
      .field("store", &self.store.is_some())
      .field("dispatch", &self.dispatch.is_some())
      .finish_non_exhaustive()
  }
}
