//! Work queue for forking jobs.
//!
//! The `JobScheduler` owns an mpsc channel of [`CceJob`]s. Running a job
//! yields its forks, which go to the back of the same queue, so a whole job
//! tree is driven breadth-first by one loop.

use std::time::Duration;

use cloudconnect_core::{CceJob, Context};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// A job that failed while the scheduler ran it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobFailure {
  pub job: String,
  pub error: String,
}

/// Summary of a scheduler run.
#[derive(Debug, Default, Serialize)]
pub struct SchedulerReport {
  /// Jobs that ran (successfully or not).
  pub executed: usize,
  /// Children queued by forking jobs.
  pub forked: usize,
  pub failures: Vec<JobFailure>,
  /// Outputs of leaf jobs, in completion order.
  pub outputs: Vec<Context>,
  /// The run was cancelled before the queue drained.
  pub cancelled: bool,
}

/// Sequential FIFO scheduler for job trees.
///
/// # Usage
///
/// ```ignore
/// let scheduler = JobScheduler::new();
/// scheduler.submit(job);
///
/// let cancel = CancellationToken::new();
/// let report = scheduler.run(cancel).await;
/// ```
pub struct JobScheduler {
  sender: mpsc::UnboundedSender<CceJob>,
  receiver: mpsc::UnboundedReceiver<CceJob>,
  stop_signal: Option<CancellationToken>,
  stop_timeout: Duration,
}

impl JobScheduler {
  pub fn new() -> Self {
    let (sender, receiver) = mpsc::unbounded_channel();
    Self {
      sender,
      receiver,
      stop_signal: None,
      stop_timeout: Duration::from_secs(30),
    }
  }

  /// How long a cancelled run waits for the running job to stop.
  pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
    self.stop_timeout = timeout;
    self
  }

  /// A signal checked before each queued job starts.
  ///
  /// Unlike the token passed to [`run`](Self::run), it never interrupts the
  /// running job: that job finishes and its forks are still queued, but no
  /// further job is started.
  pub fn with_stop_signal(mut self, signal: CancellationToken) -> Self {
    self.stop_signal = Some(signal);
    self
  }

  /// A sender for queueing jobs from elsewhere.
  pub fn sender(&self) -> mpsc::UnboundedSender<CceJob> {
    self.sender.clone()
  }

  pub fn submit(&self, job: CceJob) {
    // The receiver lives as long as self
    let _ = self.sender.send(job);
  }

  /// Number of jobs waiting to run.
  pub fn pending(&self) -> usize {
    self.receiver.len()
  }

  /// Run queued jobs until the queue is empty or `cancel` fires.
  ///
  /// A job failure is recorded and does not stop the other jobs. On
  /// cancellation the running job is asked to stop and allowed to reach its
  /// next check point.
  pub async fn run(mut self, cancel: CancellationToken) -> SchedulerReport {
    let mut report = SchedulerReport::default();
    info!(pending = self.pending(), "starting job scheduler");

    loop {
      if cancel.is_cancelled() {
        info!(pending = self.pending(), "job scheduler cancelled");
        report.cancelled = true;
        break;
      }

      if self.stop_signal.as_ref().is_some_and(|s| s.is_cancelled()) {
        if self.pending() > 0 {
          info!(pending = self.pending(), "job scheduler stopped before next job");
          report.cancelled = true;
        }
        break;
      }

      let Ok(job) = self.receiver.try_recv() else {
        break;
      };

      let name = job.name().to_string();
      let handle = job.handle();
      let run = job.run();
      tokio::pin!(run);

      let finished = tokio::select! {
        result = &mut run => Some(result),
        _ = cancel.cancelled() => None,
      };

      let result = match finished {
        Some(result) => result,
        None => {
          info!(job = %name, "stopping running job");
          handle.stop(false, self.stop_timeout).await;
          match tokio::time::timeout(self.stop_timeout, run).await {
            Ok(result) => result,
            Err(_) => {
              warn!(job = %name, timeout = ?self.stop_timeout, "job did not stop in time");
              report.executed += 1;
              report.cancelled = true;
              break;
            }
          }
        }
      };
      report.executed += 1;

      match result {
        Ok(forks) if forks.is_leaf() => {
          let outputs = forks.into_outputs();
          info!(job = %name, outputs = outputs.len(), "leaf job finished");
          report.outputs.extend(outputs);
        }
        Ok(forks) => {
          let mut children = 0;
          for child in forks {
            self.submit(child);
            children += 1;
          }
          info!(job = %name, children, "job forked");
          report.forked += children;
        }
        Err(e) => {
          error!(job = %name, error = %e, "job failed");
          report.failures.push(JobFailure {
            job: name,
            error: e.to_string(),
          });
        }
      }
    }

    info!(
      executed = report.executed,
      forked = report.forked,
      failed = report.failures.len(),
      "job scheduler finished"
    );
    report
  }
}

impl Default for JobScheduler {
  fn default() -> Self {
    Self::new()
  }
}
