//! Forking jobs.
//!
//! A [`CceJob`] holds a context and a chain of tasks. Running it performs the
//! head task, which yields zero or more output contexts, and hands back a
//! lazy [`Forks`] iterator. Each fork is a new job owning its own copy of one
//! output context and the remaining tasks, so a scheduler can drive the whole
//! tree one job at a time.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::instrument::WithSubscriber;
use tracing::{debug, error, info, instrument};

use crate::capabilities::Capabilities;
use crate::context::Context;
use crate::error::CoreError;
use crate::events::ExecutionEvent;
use crate::handle::{JobControl, JobHandle, JobState};
use crate::job::{Request, RequestLoop};
use crate::processor::{ProcessOutcome, Processor};
use crate::template::Template;

/// A unit of work inside a forking job.
#[async_trait]
pub trait CceTask: Send + Sync + fmt::Debug {
  fn name(&self) -> &str;

  /// Perform the task against a context. Each returned context becomes one
  /// child job.
  async fn perform(
    &self,
    context: &Context,
    caps: &Capabilities,
    cancel: &CancellationToken,
  ) -> Result<Vec<Context>, CoreError>;
}

/// Runs a request loop and yields the context after every processed response.
#[derive(Debug, Clone)]
pub struct HttpTask {
  name: String,
  request: Arc<Request>,
}

impl HttpTask {
  pub fn new(request: Arc<Request>) -> Self {
    Self {
      name: request.name().to_string(),
      request,
    }
  }
}

#[async_trait]
impl CceTask for HttpTask {
  fn name(&self) -> &str {
    &self.name
  }

  async fn perform(
    &self,
    context: &Context,
    caps: &Capabilities,
    cancel: &CancellationToken,
  ) -> Result<Vec<Context>, CoreError> {
    let control = JobControl::with_token(cancel.clone());
    let lp = RequestLoop {
      job: &self.name,
      request: &self.request,
      caps,
      control: &control,
    };

    let mut working = context.clone();
    let mut snapshots = Vec::new();
    let (outcome, iterations) = lp
      .run(&mut working, |snapshot| snapshots.push(snapshot.clone()))
      .await?;

    debug!(task = %self.name, outcome = %outcome, iterations, "http task finished");
    Ok(snapshots)
  }
}

/// Splits a rendered value into one context per element.
///
/// Arrays yield their elements, strings are split by the delimiter (or kept
/// whole without one), null yields nothing, and any other value yields
/// itself. The element is stored under `output`.
#[derive(Debug, Clone)]
pub struct SplitTask {
  name: String,
  source: Template,
  delimiter: Option<String>,
  output: String,
}

impl SplitTask {
  pub fn new(
    name: impl Into<String>,
    source: &str,
    delimiter: Option<String>,
    output: impl Into<String>,
  ) -> Result<Self, CoreError> {
    let output = output.into();
    if output.is_empty() {
      return Err(CoreError::config("split task requires an output name"));
    }
    if delimiter.as_deref() == Some("") {
      return Err(CoreError::config("split delimiter must not be empty"));
    }
    Ok(Self {
      name: name.into(),
      source: Template::compile(source)?,
      delimiter,
      output,
    })
  }

  fn elements(&self, value: Value) -> Vec<Value> {
    match value {
      Value::Null => Vec::new(),
      Value::Array(items) => items,
      Value::String(s) => match &self.delimiter {
        _ if s.is_empty() => Vec::new(),
        Some(delimiter) => s
          .split(delimiter.as_str())
          .map(|part| Value::String(part.to_string()))
          .collect(),
        None => vec![Value::String(s)],
      },
      other => vec![other],
    }
  }
}

#[async_trait]
impl CceTask for SplitTask {
  fn name(&self) -> &str {
    &self.name
  }

  async fn perform(
    &self,
    context: &Context,
    _caps: &Capabilities,
    _cancel: &CancellationToken,
  ) -> Result<Vec<Context>, CoreError> {
    let value = self.source.render(context)?;
    let outputs: Vec<Context> = self
      .elements(value)
      .into_iter()
      .map(|element| {
        let mut child = context.clone();
        child.insert(self.output.clone(), element);
        child
      })
      .collect();

    debug!(task = %self.name, elements = outputs.len(), "split task finished");
    Ok(outputs)
  }
}

/// Runs a processor and yields the processed context, or nothing when the
/// processor's conditions are not met.
#[derive(Debug, Clone)]
pub struct ProcessTask {
  name: String,
  processor: Processor,
}

impl ProcessTask {
  pub fn new(name: impl Into<String>, processor: Processor) -> Self {
    Self {
      name: name.into(),
      processor,
    }
  }
}

#[async_trait]
impl CceTask for ProcessTask {
  fn name(&self) -> &str {
    &self.name
  }

  async fn perform(
    &self,
    context: &Context,
    caps: &Capabilities,
    _cancel: &CancellationToken,
  ) -> Result<Vec<Context>, CoreError> {
    let mut working = context.clone();
    match self.processor.run(&mut working, &caps.registry)? {
      ProcessOutcome::Skipped => {
        caps.notifier.notify(ExecutionEvent::ProcessorSkipped {
          job: self.name.clone(),
          processor: self.processor.label().to_string(),
        });
        Ok(Vec::new())
      }
      ProcessOutcome::Ran { .. } => Ok(vec![working]),
    }
  }
}

/// A job made of a chain of tasks that forks after its head task.
pub struct CceJob {
  name: String,
  context: Context,
  tasks: Vec<Arc<dyn CceTask>>,
  caps: Capabilities,
  control: JobControl,
}

impl CceJob {
  pub fn new(name: impl Into<String>, context: Context, caps: Capabilities) -> Self {
    Self {
      name: name.into(),
      context,
      tasks: Vec::new(),
      caps,
      control: JobControl::new(),
    }
  }

  pub fn add_task(&mut self, task: Arc<dyn CceTask>) -> &mut Self {
    self.tasks.push(task);
    self
  }

  pub fn with_tasks(mut self, tasks: Vec<Arc<dyn CceTask>>) -> Self {
    self.tasks.extend(tasks);
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn context(&self) -> &Context {
    &self.context
  }

  pub fn context_mut(&mut self) -> &mut Context {
    &mut self.context
  }

  /// Names of the remaining tasks, head first.
  pub fn task_names(&self) -> Vec<&str> {
    self.tasks.iter().map(|t| t.name()).collect()
  }

  pub fn handle(&self) -> JobHandle {
    self.control.handle()
  }

  /// Perform the head task and return the forks it produced.
  ///
  /// Consumes the job. The returned [`Forks`] keeps the job in
  /// [`JobState::Processing`] until it is exhausted or dropped.
  pub async fn run(self) -> Result<Forks, CoreError> {
    match self.caps.dispatch.clone() {
      Some(dispatch) => self.execute().with_subscriber(dispatch).await,
      None => self.execute().await,
    }
  }

  #[instrument(name = "cce_job_run", skip(self), fields(job = %self.name))]
  async fn execute(self) -> Result<Forks, CoreError> {
    let CceJob {
      name,
      context,
      tasks,
      caps,
      control,
    } = self;

    control.set_state(JobState::Running);
    info!(job = %name, tasks = tasks.len(), "job_started");
    caps.notifier.notify(ExecutionEvent::JobStarted { job: name.clone() });

    let Some((head, rest)) = tasks.split_first() else {
      return Ok(Forks::finished(name, caps, control, "no_tasks"));
    };

    if control.is_stop_requested() {
      info!(job = %name, "stop requested before head task");
      return Ok(Forks::finished(name, caps, control, "cancelled"));
    }

    control.set_state(JobState::Processing);
    let task_cancel = control.token().child_token();
    let outputs = match head.perform(&context, &caps, &task_cancel).await {
      Ok(outputs) => outputs,
      Err(e) => {
        error!(job = %name, task = %head.name(), error = %e, "job_failed");
        caps.notifier.notify(ExecutionEvent::JobFailed {
          job: name,
          error: e.to_string(),
        });
        control.set_state(JobState::Failed);
        return Err(e);
      }
    };

    if control.is_stop_requested() {
      info!(job = %name, task = %head.name(), "stop requested after head task");
      return Ok(Forks::finished(name, caps, control, "cancelled"));
    }

    info!(job = %name, task = %head.name(), outputs = outputs.len(), "head task finished");
    Ok(Forks {
      parent: name,
      rest: rest.to_vec(),
      outputs: outputs.into(),
      produced: 0,
      caps,
      control,
      done: false,
    })
  }
}

impl fmt::Debug for CceJob {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CceJob")
      .field("name", &self.name)
      .field("tasks", &self.task_names())
      .field("state", &self.control.state())
      .finish_non_exhaustive()
  }
}

/// Lazily produced children of a [`CceJob`].
///
/// Children are created one at a time. A stop request on the parent is
/// checked before each child, and ends the iteration.
pub struct Forks {
  parent: String,
  rest: Vec<Arc<dyn CceTask>>,
  outputs: VecDeque<Context>,
  produced: usize,
  caps: Capabilities,
  control: JobControl,
  done: bool,
}

impl Forks {
  fn finished(parent: String, caps: Capabilities, control: JobControl, outcome: &str) -> Self {
    let mut forks = Self {
      parent,
      rest: Vec::new(),
      outputs: VecDeque::new(),
      produced: 0,
      caps,
      control,
      done: false,
    };
    forks.finish(outcome);
    forks
  }

  /// True when the job ran its last task, so its outputs are final results
  /// rather than children.
  pub fn is_leaf(&self) -> bool {
    self.rest.is_empty()
  }

  /// Output contexts not yet turned into children.
  pub fn remaining(&self) -> usize {
    self.outputs.len()
  }

  /// Take the outputs of a leaf job. Returns nothing for a job with tasks
  /// left, whose outputs are only reachable as children.
  pub fn into_outputs(mut self) -> Vec<Context> {
    if !self.is_leaf() {
      return Vec::new();
    }
    let outputs: Vec<Context> = std::mem::take(&mut self.outputs).into();
    self.finish("completed");
    outputs
  }

  fn finish(&mut self, outcome: &str) {
    if self.done {
      return;
    }
    self.done = true;
    self.outputs.clear();

    let outcome = if self.control.is_stop_requested() {
      "cancelled"
    } else {
      outcome
    };
    self.caps.notifier.notify(ExecutionEvent::JobCompleted {
      job: self.parent.clone(),
      outcome: outcome.to_string(),
      iterations: self.produced,
    });
    self.control.set_state(JobState::Stopped);
  }
}

impl Iterator for Forks {
  type Item = CceJob;

  fn next(&mut self) -> Option<CceJob> {
    if self.done {
      return None;
    }
    if self.is_leaf() {
      self.finish("completed");
      return None;
    }
    if self.control.is_stop_requested() {
      self.finish("cancelled");
      return None;
    }

    let Some(context) = self.outputs.pop_front() else {
      self.finish("forked");
      return None;
    };

    self.produced += 1;
    let child = CceJob {
      name: format!("{}#{}", self.parent, self.produced),
      context,
      tasks: self.rest.clone(),
      caps: self.caps.clone(),
      control: JobControl::with_token(self.control.token().child_token()),
    };

    self.caps.notifier.notify(ExecutionEvent::JobForked {
      job: self.parent.clone(),
      child: child.name.clone(),
    });
    Some(child)
  }
}

impl Drop for Forks {
  fn drop(&mut self) {
    self.finish("dropped");
  }
}

impl fmt::Debug for Forks {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Forks")
      .field("parent", &self.parent)
      .field("remaining", &self.outputs.len())
      .field("produced", &self.produced)
      .finish_non_exhaustive()
  }
}
