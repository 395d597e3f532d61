//! CloudConnect Core
//!
//! Runtime models for connector execution: templates, the function registry
//! and its built-ins, functional nodes, processors, request options, repeat
//! policies and checkpoints, plus the two job forms that drive them.
//!
//! - [`Job`] runs one request in a loop until its repeat policy, a 404, an
//!   empty body or a stop request ends it.
//! - [`CceJob`] runs the head of a task chain and forks one child job per
//!   output context.
//!
//! Both are single-use: `run` consumes the job. Use the [`JobHandle`] taken
//! before running to stop it from another task.

pub mod builtins;
mod capabilities;
mod cce;
mod checkpoint;
mod context;
mod error;
mod events;
mod handle;
mod job;
pub mod load;
mod node;
mod options;
mod processor;
mod registry;
mod template;

pub use capabilities::Capabilities;
pub use cce::{CceJob, CceTask, Forks, HttpTask, ProcessTask, SplitTask};
pub use checkpoint::Checkpoint;
pub use context::{Context, RESPONSE_KEY, is_truthy, response_value, value_to_string};
pub use error::CoreError;
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier};
pub use handle::{JobControl, JobHandle, JobState};
pub use job::{EndOfData, Job, JobOutcome, JobReport, Request};
pub use node::{Condition, Task};
pub use options::{Authorizer, BasicAuthorization, Options};
pub use processor::{Conditional, ProcessOutcome, Processor, RepeatMode};
pub use registry::{Function, FunctionError, FunctionRegistry, FunctionResult, arg, str_arg};
pub use template::Template;
