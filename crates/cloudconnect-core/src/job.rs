//! Request jobs.
//!
//! A [`Job`] drives one [`Request`] through its loop: render the options,
//! authorize, pre-process, send, post-process, checkpoint, and repeat until
//! the repeat policy, a 404, an empty body or a stop request ends it.

use std::fmt;
use std::sync::Arc;

use cloudconnect_host_http::Request as HttpRequest;
use serde_json::Value;
use tracing::instrument::WithSubscriber;
use tracing::{debug, error, info, instrument, warn};

use crate::capabilities::Capabilities;
use crate::checkpoint::Checkpoint;
use crate::context::{Context, RESPONSE_KEY, response_value};
use crate::error::CoreError;
use crate::events::ExecutionEvent;
use crate::handle::{JobControl, JobHandle, JobState};
use crate::options::Options;
use crate::processor::{Processor, RepeatMode};

/// A loaded request descriptor.
#[derive(Debug, Clone)]
pub struct Request {
  name: String,
  options: Options,
  pre_process: Processor,
  post_process: Processor,
  repeat_mode: RepeatMode,
  checkpoint: Option<Checkpoint>,
}

impl Request {
  pub fn new(name: impl Into<String>, options: Options) -> Self {
    Self {
      name: name.into(),
      options,
      pre_process: Processor::default(),
      post_process: Processor::default(),
      repeat_mode: RepeatMode::once(),
      checkpoint: None,
    }
  }

  pub fn with_pre_process(mut self, processor: Processor) -> Self {
    self.pre_process = processor;
    self
  }

  pub fn with_post_process(mut self, processor: Processor) -> Self {
    self.post_process = processor;
    self
  }

  pub fn with_repeat_mode(mut self, repeat_mode: RepeatMode) -> Self {
    self.repeat_mode = repeat_mode;
    self
  }

  pub fn with_checkpoint(mut self, checkpoint: Checkpoint) -> Self {
    self.checkpoint = Some(checkpoint);
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn options(&self) -> &Options {
    &self.options
  }

  pub fn repeat_mode(&self) -> &RepeatMode {
    &self.repeat_mode
  }

  pub fn checkpoint(&self) -> Option<&Checkpoint> {
    self.checkpoint.as_ref()
  }
}

/// Why a job ran out of data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndOfData {
  /// The endpoint answered 404.
  NotFound,
  /// The endpoint answered with an empty body.
  EmptyBody,
}

/// How a job finished. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
  /// The repeat policy said stop.
  StopConditionMet,
  EndOfData(EndOfData),
  /// A stop was requested.
  Cancelled,
}

impl fmt::Display for JobOutcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      JobOutcome::StopConditionMet => "stop_condition_met",
      JobOutcome::EndOfData(EndOfData::NotFound) => "not_found",
      JobOutcome::EndOfData(EndOfData::EmptyBody) => "empty_body",
      JobOutcome::Cancelled => "cancelled",
    };
    f.write_str(s)
  }
}

/// Result of a finished job.
#[derive(Debug, Clone)]
pub struct JobReport {
  pub name: String,
  pub outcome: JobOutcome,
  /// Number of responses that were post-processed.
  pub iterations: usize,
  /// Context as the job left it.
  pub context: Context,
}

/// One request's loop, shared by [`Job`] and the HTTP task of a forking job.
pub(crate) struct RequestLoop<'a> {
  pub job: &'a str,
  pub request: &'a Request,
  pub caps: &'a Capabilities,
  pub control: &'a JobControl,
}

impl RequestLoop<'_> {
  /// Run until the loop ends. `on_iteration` sees the context after each
  /// processed response.
  pub async fn run<F>(&self, context: &mut Context, mut on_iteration: F) -> Result<(JobOutcome, usize), CoreError>
  where
    F: FnMut(&Context) + Send,
  {
    self.resume(context).await?;

    let options = &self.request.options;
    let mut iterations = 0;

    loop {
      self.control.set_state(JobState::Running);

      let url = options.normalize_url(context)?;
      let mut headers = options.normalize_header(context)?;
      let body = options.normalize_body(context)?;

      if let Some(auth) = options.auth() {
        auth.authorize(&mut headers, context)?;
      }

      self.control.set_state(JobState::Processing);
      self.process(&self.request.pre_process, context)?;

      if self.control.is_stop_requested() {
        info!(job = %self.job, iterations, "stop requested, exiting before next request");
        return Ok((JobOutcome::Cancelled, iterations));
      }

      let mut request = HttpRequest::new(options.method(), url.as_str());
      request.headers = headers;
      if !body.is_empty() {
        if !request.headers.keys().any(|k| k.eq_ignore_ascii_case("content-type")) {
          request
            .headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        }
        request.body = Some(Value::Object(body).to_string());
      }

      debug!(job = %self.job, method = %options.method(), url = %url, "sending request");
      let response = match self.caps.client.request(request).await {
        Ok(response) => response,
        Err(e) if e.is_not_found() => {
          warn!(job = %self.job, url = %url, "request returned 404, stop repeating");
          return Ok((JobOutcome::EndOfData(EndOfData::NotFound), iterations));
        }
        Err(e) => {
          error!(job = %self.job, url = %url, method = %options.method(), error = %e, "request failed");
          return Err(e.into());
        }
      };

      if response.is_empty() {
        warn!(job = %self.job, url = %url, "request returned an empty body, stop repeating");
        return Ok((JobOutcome::EndOfData(EndOfData::EmptyBody), iterations));
      }

      context.insert(RESPONSE_KEY.to_string(), response_value(&response));

      self.control.set_state(JobState::Processing);
      self.process(&self.request.post_process, context)?;
      iterations += 1;

      self.write_checkpoint(context).await?;

      self.caps.notifier.notify(ExecutionEvent::IterationCompleted {
        job: self.job.to_string(),
        iteration: iterations,
        context: Value::Object(context.clone()),
      });
      on_iteration(context);

      if self.request.repeat_mode.should_stop(context, &self.caps.registry)? {
        info!(job = %self.job, iterations, "stop condition reached");
        return Ok((JobOutcome::StopConditionMet, iterations));
      }

      self.control.set_state(JobState::Repeating);
    }
  }

  fn process(&self, processor: &Processor, context: &mut Context) -> Result<(), CoreError> {
    let outcome = processor.run(context, &self.caps.registry)?;
    if outcome.is_skipped() {
      self.caps.notifier.notify(ExecutionEvent::ProcessorSkipped {
        job: self.job.to_string(),
        processor: processor.label().to_string(),
      });
    }
    Ok(())
  }

  /// Merge the stored checkpoint, if any, into the context.
  async fn resume(&self, context: &mut Context) -> Result<(), CoreError> {
    let (Some(checkpoint), Some(store)) = (&self.request.checkpoint, &self.caps.store) else {
      return Ok(());
    };

    let namespace = match checkpoint.render_namespace(context) {
      Ok(namespace) => namespace,
      Err(CoreError::MissingVariable { message, .. }) => {
        debug!(job = %self.job, reason = %message, "checkpoint namespace not resolvable, starting fresh");
        return Ok(());
      }
      Err(e) => return Err(e),
    };

    if let Some(saved) = store.get(&namespace).await? {
      info!(job = %self.job, namespace = ?namespace, "resuming from checkpoint");
      context.extend(saved);
    }
    Ok(())
  }

  async fn write_checkpoint(&self, context: &Context) -> Result<(), CoreError> {
    let Some(checkpoint) = &self.request.checkpoint else {
      return Ok(());
    };

    let namespace = checkpoint.render_namespace(context)?;
    let content = checkpoint.render_content(context)?;

    if let Some(store) = &self.caps.store {
      store.set(&namespace, content.clone()).await?;
    }
    debug!(job = %self.job, namespace = ?namespace, "checkpoint written");

    self.caps.notifier.notify(ExecutionEvent::CheckpointWritten {
      job: self.job.to_string(),
      namespace,
      content: Value::Object(content),
    });
    Ok(())
  }
}

/// A single-use execution of one request.
pub struct Job {
  request: Arc<Request>,
  context: Context,
  caps: Capabilities,
  control: JobControl,
}

impl Job {
  pub fn new(request: Arc<Request>, context: Context, caps: Capabilities) -> Self {
    Self {
      request,
      context,
      caps,
      control: JobControl::new(),
    }
  }

  pub fn name(&self) -> &str {
    self.request.name()
  }

  /// A handle for stopping the job from another task.
  pub fn handle(&self) -> JobHandle {
    self.control.handle()
  }

  /// Run the job to completion. Consumes the job; it cannot be re-run.
  pub async fn run(self) -> Result<JobReport, CoreError> {
    match self.caps.dispatch.clone() {
      Some(dispatch) => self.execute().with_subscriber(dispatch).await,
      None => self.execute().await,
    }
  }

  #[instrument(name = "job_run", skip(self), fields(job = %self.request.name()))]
  async fn execute(mut self) -> Result<JobReport, CoreError> {
    let name = self.request.name().to_string();
    info!(job = %name, "job_started");
    self.caps.notifier.notify(ExecutionEvent::JobStarted { job: name.clone() });

    let result = if self.control.is_stop_requested() {
      info!(job = %name, "stop requested before start");
      Ok((JobOutcome::Cancelled, 0))
    } else {
      let lp = RequestLoop {
        job: &name,
        request: &self.request,
        caps: &self.caps,
        control: &self.control,
      };
      lp.run(&mut self.context, |_| {}).await
    };

    match result {
      Ok((outcome, iterations)) => {
        info!(job = %name, outcome = %outcome, iterations, "job_completed");
        self.caps.notifier.notify(ExecutionEvent::JobCompleted {
          job: name.clone(),
          outcome: outcome.to_string(),
          iterations,
        });
        self.control.set_state(JobState::Stopped);
        Ok(JobReport {
          name,
          outcome,
          iterations,
          context: self.context,
        })
      }
      Err(e) => {
        error!(job = %name, error = %e, "job_failed");
        self.caps.notifier.notify(ExecutionEvent::JobFailed {
          job: name,
          error: e.to_string(),
        });
        self.control.set_state(JobState::Failed);
        Err(e)
      }
    }
  }
}

impl fmt::Debug for Job {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Job")
      .field("request", &self.request.name())
      .field("state", &self.control.state())
      .finish_non_exhaustive()
  }
}
