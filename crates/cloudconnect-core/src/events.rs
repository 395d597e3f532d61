//! Execution events and notifiers for observability.
//!
//! Jobs emit events as they progress so hosts can persist checkpoints, stream
//! output, or drive tests without scraping logs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

/// Events emitted while a job runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExecutionEvent {
  /// A job has started.
  JobStarted { job: String },

  /// A processor's conditions were not met, so its pipeline was skipped.
  ProcessorSkipped { job: String, processor: String },

  /// A response was post-processed. Carries the context as it stood after
  /// post-processing.
  IterationCompleted {
    job: String,
    iteration: usize,
    context: Value,
  },

  /// A checkpoint was written to the store.
  CheckpointWritten {
    job: String,
    namespace: Vec<String>,
    content: Value,
  },

  /// A forking job produced a child.
  JobForked { job: String, child: String },

  /// A job has finished.
  JobCompleted {
    job: String,
    outcome: String,
    iterations: usize,
  },

  /// A job has failed.
  JobFailed { job: String, error: String },
}

/// Trait for receiving execution events.
///
/// Jobs call `notify` for each event. Implementations decide what to do with
/// them.
pub trait ExecutionNotifier: Send + Sync {
  fn notify(&self, event: ExecutionEvent);
}

/// A notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// A notifier that sends events to an unbounded channel.
///
/// Sending never blocks the job. Event volume is bounded by the number of
/// responses processed.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}
