//! Loading configuration descriptors into runtime models.
//!
//! All templates are compiled here, so a malformed connector fails before any
//! request is sent.

use std::sync::Arc;

use cloudconnect_config::{
  AuthDef, CceTaskDef, CheckpointDef, ConditionDef, JobDef, OptionsDef, ProcessorDef,
  RepeatModeDef, RequestDef, TaskDef,
};

use crate::capabilities::Capabilities;
use crate::cce::{CceJob, CceTask, HttpTask, ProcessTask, SplitTask};
use crate::checkpoint::Checkpoint;
use crate::context::Context;
use crate::error::CoreError;
use crate::job::Request;
use crate::node::{Condition, Task};
use crate::options::{Authorizer, BasicAuthorization, Options};
use crate::processor::{Conditional, Processor, RepeatMode};

pub fn load_options(def: &OptionsDef) -> Result<Options, CoreError> {
  let auth = def.auth.as_ref().map(load_auth).transpose()?;
  Options::new(&def.url, &def.method, &def.headers, &def.body, auth)
}

fn load_auth(def: &AuthDef) -> Result<Arc<dyn Authorizer>, CoreError> {
  match def {
    AuthDef::BasicAuth { username, password } => Ok(Arc::new(BasicAuthorization::new(
      username.as_deref(),
      password.as_deref(),
    )?)),
  }
}

fn load_conditions(defs: &[ConditionDef]) -> Result<Conditional, CoreError> {
  let conditions = defs
    .iter()
    .map(|c| Condition::new(c.method.as_str(), &c.input))
    .collect::<Result<Vec<_>, _>>()?;
  Ok(Conditional::new(conditions))
}

fn load_pipeline(defs: &[TaskDef]) -> Result<Vec<Task>, CoreError> {
  defs
    .iter()
    .map(|t| Task::new(t.method.as_str(), &t.input, t.output.clone()))
    .collect()
}

pub fn load_processor(label: &str, def: &ProcessorDef) -> Result<Processor, CoreError> {
  Ok(Processor::new(
    label,
    load_conditions(&def.conditions)?,
    load_pipeline(&def.pipeline)?,
  ))
}

pub fn load_repeat_mode(def: &RepeatModeDef) -> Result<RepeatMode, CoreError> {
  let mode = RepeatMode::new(&def.repeat_type, load_conditions(&def.stop_conditions)?);
  if !mode.is_once() && def.stop_conditions.is_empty() {
    return Err(CoreError::config(format!(
      "repeat type '{}' requires at least one stop condition",
      mode.repeat_type()
    )));
  }
  Ok(mode)
}

pub fn load_checkpoint(def: &CheckpointDef) -> Result<Checkpoint, CoreError> {
  Checkpoint::new(&def.namespace, &def.content)
}

fn build_request(
  name: String,
  options: &OptionsDef,
  pre_process: &ProcessorDef,
  post_process: &ProcessorDef,
  iteration_mode: &RepeatModeDef,
  checkpoint: Option<&CheckpointDef>,
) -> Result<Request, CoreError> {
  let mut request = Request::new(name, load_options(options)?)
    .with_pre_process(load_processor("pre_process", pre_process)?)
    .with_post_process(load_processor("post_process", post_process)?)
    .with_repeat_mode(load_repeat_mode(iteration_mode)?);
  if let Some(checkpoint) = checkpoint {
    request = request.with_checkpoint(load_checkpoint(checkpoint)?);
  }
  Ok(request)
}

/// Load a request. Unnamed requests are called `request_<index>`.
pub fn load_request(def: &RequestDef, index: usize) -> Result<Request, CoreError> {
  let name = def
    .name
    .clone()
    .unwrap_or_else(|| format!("request_{}", index));
  build_request(
    name,
    &def.request,
    &def.pre_process,
    &def.post_process,
    &def.iteration_mode,
    def.checkpoint.as_ref(),
  )
}

pub fn load_task(def: &CceTaskDef) -> Result<Arc<dyn CceTask>, CoreError> {
  let task: Arc<dyn CceTask> = match def {
    CceTaskDef::Http {
      name,
      request,
      pre_process,
      post_process,
      iteration_mode,
      checkpoint,
    } => Arc::new(HttpTask::new(Arc::new(build_request(
      name.clone(),
      request,
      pre_process,
      post_process,
      iteration_mode,
      checkpoint.as_ref(),
    )?))),
    CceTaskDef::Split {
      name,
      source,
      delimiter,
      output,
    } => Arc::new(SplitTask::new(name.as_str(), source, delimiter.clone(), output.as_str())?),
    CceTaskDef::Process {
      name,
      conditions,
      pipeline,
    } => Arc::new(ProcessTask::new(
      name.as_str(),
      Processor::new(name.as_str(), load_conditions(conditions)?, load_pipeline(pipeline)?),
    )),
  };
  Ok(task)
}

/// Load every task of a job definition.
pub fn load_tasks(def: &JobDef) -> Result<Vec<Arc<dyn CceTask>>, CoreError> {
  if def.tasks.is_empty() {
    return Err(CoreError::config(format!("job '{}' has no tasks", def.name)));
  }
  def.tasks.iter().map(load_task).collect()
}

/// Load a root forking job ready to run.
pub fn load_job(def: &JobDef, context: Context, caps: Capabilities) -> Result<CceJob, CoreError> {
  Ok(CceJob::new(def.name.as_str(), context, caps).with_tasks(load_tasks(def)?))
}
