//! CloudConnect Engine
//!
//! This crate runs a loaded connector: request jobs in sequence, then forking
//! jobs through a queue.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Engine                             │
//! │  - new(connector, context, registry) compiles everything    │
//! │  - start() runs request jobs in order, threading context    │
//! │  - stop() prevents the next job from starting               │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       JobScheduler                          │
//! │  - owns an mpsc queue of forking jobs                       │
//! │  - runs each job, queues its forks, records leaf outputs    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use cloudconnect_engine::Engine;
//!
//! let engine = Engine::new(connector, context, Arc::new(FunctionRegistry::with_builtins()))?
//!   .with_store(Arc::new(InMemoryCheckpointStore::new()));
//!
//! let report = engine.start().await?;
//! ```

mod engine;
mod error;
mod scheduler;

pub use engine::{Engine, EngineReport};
pub use error::EngineError;
pub use scheduler::{JobFailure, JobScheduler, SchedulerReport};

// Re-exported so hosts can observe runs without depending on the core crate.
pub use cloudconnect_core::{
  ChannelNotifier, ExecutionEvent, ExecutionNotifier, JobOutcome, NoopNotifier,
};
