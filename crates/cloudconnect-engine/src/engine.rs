//! Connector engine.
//!
//! The `Engine` loads a connector once, then runs its requests one after the
//! other and finally drives its forking jobs through a [`JobScheduler`].

use std::fmt;
use std::sync::Arc;

use cloudconnect_config::{ConnectorDef, ProxyDef};
use cloudconnect_core::load::{load_request, load_tasks};
use cloudconnect_core::{
  Capabilities, CceJob, CceTask, Context, ExecutionNotifier, FunctionRegistry, Job, JobReport,
  NoopNotifier, Request,
};
use cloudconnect_host_http::{HttpClient, ProxyConfig, ReqwestClient};
use cloudconnect_host_kv::CheckpointStore;
use cloudconnect_host_log::{LogLevel, build_dispatch};
use tokio_util::sync::CancellationToken;
use tracing::instrument::WithSubscriber;
use tracing::{error, info};

use crate::error::EngineError;
use crate::scheduler::{JobScheduler, SchedulerReport};

/// A forking job definition with its tasks compiled.
struct LoadedJob {
  name: String,
  tasks: Vec<Arc<dyn CceTask>>,
}

/// Result of an engine run.
#[derive(Debug)]
pub struct EngineReport {
  /// One report per request job that ran, in order.
  pub requests: Vec<JobReport>,
  /// Present when the connector defines forking jobs and they ran.
  pub jobs: Option<SchedulerReport>,
  /// Context as the last request job left it.
  pub context: Context,
  /// A stop request prevented some work from starting.
  pub stopped: bool,
}

/// Drives every request and job of one connector.
pub struct Engine {
  requests: Vec<Arc<Request>>,
  jobs: Vec<LoadedJob>,
  level: LogLevel,
  proxy: Option<ProxyConfig>,
  context: Context,
  registry: Arc<FunctionRegistry>,
  client: Option<Arc<dyn HttpClient>>,
  store: Option<Arc<dyn CheckpointStore>>,
  notifier: Arc<dyn ExecutionNotifier>,
  stop: CancellationToken,
}

impl Engine {
  /// Load a connector. Every template is compiled here.
  pub fn new(
    connector: ConnectorDef,
    context: Context,
    registry: Arc<FunctionRegistry>,
  ) -> Result<Self, EngineError> {
    if connector.requests.is_empty() && connector.jobs.is_empty() {
      return Err(EngineError::Config {
        message: "connector defines no requests and no jobs".to_string(),
      });
    }

    let level = connector.global_settings.logging.level.parse::<LogLevel>()?;
    let proxy = connector
      .global_settings
      .proxy
      .as_ref()
      .filter(|p| p.enabled)
      .map(proxy_config);

    let requests = connector
      .requests
      .iter()
      .enumerate()
      .map(|(index, def)| {
        load_request(def, index).map(Arc::new).map_err(|source| EngineError::Load {
          name: def.name.clone().unwrap_or_else(|| format!("request_{}", index)),
          source,
        })
      })
      .collect::<Result<Vec<_>, _>>()?;

    let jobs = connector
      .jobs
      .iter()
      .map(|def| {
        load_tasks(def)
          .map(|tasks| LoadedJob {
            name: def.name.clone(),
            tasks,
          })
          .map_err(|source| EngineError::Load {
            name: def.name.clone(),
            source,
          })
      })
      .collect::<Result<Vec<_>, _>>()?;

    Ok(Self {
      requests,
      jobs,
      level,
      proxy,
      context,
      registry,
      client: None,
      store: None,
      notifier: Arc::new(NoopNotifier),
      stop: CancellationToken::new(),
    })
  }

  /// Use a specific HTTP client instead of one built from the proxy settings.
  pub fn with_client(mut self, client: Arc<dyn HttpClient>) -> Self {
    self.client = Some(client);
    self
  }

  /// Read and write checkpoints through a store.
  pub fn with_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
    self.store = Some(store);
    self
  }

  pub fn with_notifier(mut self, notifier: Arc<dyn ExecutionNotifier>) -> Self {
    self.notifier = notifier;
    self
  }

  pub fn request_names(&self) -> Vec<&str> {
    self.requests.iter().map(|r| r.name()).collect()
  }

  pub fn job_names(&self) -> Vec<&str> {
    self.jobs.iter().map(|j| j.name.as_str()).collect()
  }

  /// Stop the engine. The running request job finishes; no further job is
  /// started.
  pub fn stop(&self) {
    info!("engine stop requested");
    self.stop.cancel();
  }

  pub fn is_stopped(&self) -> bool {
    self.stop.is_cancelled()
  }

  /// Run every request, then every forking job.
  ///
  /// Logs go to a subscriber built from the connector's log level, scoped to
  /// this call.
  pub async fn start(&self) -> Result<EngineReport, EngineError> {
    let dispatch = build_dispatch(self.level);
    let client = match &self.client {
      Some(client) => client.clone(),
      None => Arc::new(ReqwestClient::new(self.proxy.as_ref())?) as Arc<dyn HttpClient>,
    };

    let mut caps = Capabilities::new(self.registry.clone(), client)
      .with_notifier(self.notifier.clone())
      .with_dispatch(dispatch.clone());
    if let Some(store) = &self.store {
      caps = caps.with_store(store.clone());
    }

    self.run(caps).with_subscriber(dispatch).await
  }

  async fn run(&self, caps: Capabilities) -> Result<EngineReport, EngineError> {
    info!(
      requests = self.requests.len(),
      jobs = self.jobs.len(),
      "engine_started"
    );

    let mut context = self.context.clone();
    let mut reports = Vec::with_capacity(self.requests.len());

    for request in &self.requests {
      if self.is_stopped() {
        info!(request = %request.name(), "engine stopped, skipping remaining requests");
        return Ok(EngineReport {
          requests: reports,
          jobs: None,
          context,
          stopped: true,
        });
      }

      let job = Job::new(request.clone(), context.clone(), caps.clone());
      match job.run().await {
        Ok(report) => {
          context = report.context.clone();
          reports.push(report);
        }
        Err(source) => {
          error!(request = %request.name(), error = %source, "request job failed");
          return Err(EngineError::Job {
            name: request.name().to_string(),
            source,
          });
        }
      }
    }

    let jobs = if self.jobs.is_empty() {
      None
    } else if self.is_stopped() {
      info!("engine stopped, skipping jobs");
      return Ok(EngineReport {
        requests: reports,
        jobs: None,
        context,
        stopped: true,
      });
    } else {
      Some(self.run_jobs(&context, &caps).await)
    };

    let stopped = self.is_stopped() || jobs.as_ref().is_some_and(|j| j.cancelled);
    info!(requests = reports.len(), stopped, "engine_finished");
    Ok(EngineReport {
      requests: reports,
      jobs,
      context,
      stopped,
    })
  }

  /// A stop request lets the running job finish and skips the queued ones.
  async fn run_jobs(&self, context: &Context, caps: &Capabilities) -> SchedulerReport {
    let scheduler = JobScheduler::new();
    for job in &self.jobs {
      scheduler.submit(
        CceJob::new(job.name.as_str(), context.clone(), caps.clone()).with_tasks(job.tasks.clone()),
      );
    }
    scheduler
      .with_stop_signal(self.stop.clone())
      .run(CancellationToken::new())
      .await
  }
}

impl fmt::Debug for Engine {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Engine")
      .field("requests", &self.request_names())
      .field("jobs", &self.job_names())
      .field("level", &self.level)
      .field("stopped", &self.is_stopped())
      .finish_non_exhaustive()
  }
}

fn proxy_config(def: &ProxyDef) -> ProxyConfig {
  ProxyConfig {
    scheme: def.proxy_type.trim().to_lowercase(),
    host: def.host.clone(),
    port: def.port,
    username: def.username.clone(),
    password: def.password.clone(),
    rdns: def.rdns,
  }
}
