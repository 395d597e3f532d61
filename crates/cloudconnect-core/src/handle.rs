//! Job lifecycle state and the cooperative stop protocol.
//!
//! A running job owns a [`JobControl`]; anyone holding a [`JobHandle`] can
//! request a stop and observe the job's state. Stop requests are only
//! honoured at the job's check points, never by aborting in-flight work.

use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Lifecycle of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
  Idle,
  Running,
  Processing,
  Repeating,
  Stopped,
  Failed,
}

impl JobState {
  pub fn is_terminal(&self) -> bool {
    matches!(self, JobState::Stopped | JobState::Failed)
  }
}

/// The job-side end of the stop protocol.
#[derive(Debug)]
pub struct JobControl {
  cancel: CancellationToken,
  state: watch::Sender<JobState>,
}

impl JobControl {
  pub fn new() -> Self {
    Self::with_token(CancellationToken::new())
  }

  /// Use an existing token, e.g. a child of a parent job's token.
  pub fn with_token(cancel: CancellationToken) -> Self {
    let (state, _) = watch::channel(JobState::Idle);
    Self { cancel, state }
  }

  pub fn token(&self) -> &CancellationToken {
    &self.cancel
  }

  pub fn is_stop_requested(&self) -> bool {
    self.cancel.is_cancelled()
  }

  pub fn state(&self) -> JobState {
    *self.state.borrow()
  }

  pub fn set_state(&self, state: JobState) {
    self.state.send_replace(state);
  }

  pub fn handle(&self) -> JobHandle {
    JobHandle {
      cancel: self.cancel.clone(),
      state: self.state.subscribe(),
    }
  }
}

impl Default for JobControl {
  fn default() -> Self {
    Self::new()
  }
}

/// The caller-side end of the stop protocol.
#[derive(Debug, Clone)]
pub struct JobHandle {
  cancel: CancellationToken,
  state: watch::Receiver<JobState>,
}

impl JobHandle {
  pub fn state(&self) -> JobState {
    *self.state.borrow()
  }

  pub fn is_stop_requested(&self) -> bool {
    self.cancel.is_cancelled()
  }

  /// Request a stop.
  ///
  /// With `block`, waits until the job reaches a terminal state or `timeout`
  /// elapses. Returns `false` only when the wait timed out. A job that was
  /// dropped counts as stopped.
  pub async fn stop(&self, block: bool, timeout: Duration) -> bool {
    self.cancel.cancel();
    if !block {
      return true;
    }

    let mut state = self.state.clone();
    tokio::time::timeout(timeout, async move {
      // An Err means the job is gone, which is as good as stopped
      let _ = state.wait_for(JobState::is_terminal).await;
    })
    .await
    .is_ok()
  }

  /// Wait for the job to reach a terminal state.
  pub async fn wait(&self) -> JobState {
    let mut state = self.state.clone();
    let terminal = state.wait_for(JobState::is_terminal).await.map(|s| *s);
    terminal.unwrap_or_else(|_| *state.borrow())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_stop_without_block_returns_immediately() {
    let control = JobControl::new();
    let handle = control.handle();

    assert!(handle.stop(false, Duration::from_millis(10)).await);
    assert!(control.is_stop_requested());
    assert_eq!(handle.state(), JobState::Idle);
  }

  #[tokio::test]
  async fn test_blocking_stop_times_out() {
    let control = JobControl::new();
    control.set_state(JobState::Running);
    let handle = control.handle();

    assert!(!handle.stop(true, Duration::from_millis(20)).await);
  }

  #[tokio::test]
  async fn test_blocking_stop_observes_terminal_state() {
    let control = JobControl::new();
    control.set_state(JobState::Running);
    let handle = control.handle();

    let job = tokio::spawn(async move {
      control.token().cancelled().await;
      control.set_state(JobState::Stopped);
      control
    });

    assert!(handle.stop(true, Duration::from_secs(5)).await);
    assert_eq!(handle.state(), JobState::Stopped);
    job.await.unwrap();
  }

  #[tokio::test]
  async fn test_dropped_job_counts_as_stopped() {
    let control = JobControl::new();
    control.set_state(JobState::Running);
    let handle = control.handle();
    drop(control);

    assert!(handle.stop(true, Duration::from_secs(5)).await);
  }
}
