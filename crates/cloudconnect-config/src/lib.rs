//! CloudConnect Config
//!
//! This crate contains the serializable connector configuration types for
//! CloudConnect. These types describe requests and jobs before they are
//! loaded into runtime models by `cloudconnect-core`.
//!
//! Configuration is usually read from a JSON file:
//!
//! ```json
//! {
//!   "global_settings": { "logging": { "level": "INFO" } },
//!   "requests": [
//!     {
//!       "request": { "url": "https://api.example.com/items?page={{ page }}", "method": "GET" },
//!       "post_process": {
//!         "pipeline": [{ "method": "json_path", "input": ["{{ __response__.body }}", "next"], "output": "page" }]
//!       },
//!       "iteration_mode": {
//!         "type": "loop",
//!         "stop_conditions": [{ "method": "json_empty", "input": ["{{ page }}"] }]
//!       }
//!     }
//!   ]
//! }
//! ```
//!
//! Every string that ends up in a request, task input, or checkpoint is a
//! template expression and is compiled once when the configuration is loaded.

mod connector;
mod job;
mod request;
mod settings;

pub use connector::ConnectorDef;
pub use job::{CceTaskDef, JobDef};
pub use request::{
  AuthDef, CheckpointDef, ConditionDef, OptionsDef, ProcessorDef, RepeatModeDef, RequestDef,
  TaskDef, TemplateExpr,
};
pub use settings::{GlobalSettings, LoggingDef, ProxyDef};
