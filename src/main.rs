use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value, json};

use cloudconnect_config::ConnectorDef;
use cloudconnect_core::FunctionRegistry;
use cloudconnect_engine::Engine;
use cloudconnect_host_kv::InMemoryCheckpointStore;

/// CloudConnect - run templated HTTP connectors
#[derive(Parser)]
#[command(name = "cloudconnect")]
#[command(version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a connector. The initial context is read from stdin as JSON.
  Run {
    /// Path to the connector file (JSON)
    connector_file: PathBuf,
  },

  /// Load a connector and report what it defines, without running it
  Check {
    /// Path to the connector file (JSON)
    connector_file: PathBuf,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  match cli.command {
    Some(Commands::Run { connector_file }) => run_connector(connector_file)?,
    Some(Commands::Check { connector_file }) => check_connector(connector_file)?,
    None => {
      println!("cloudconnect - use --help to see available commands");
    }
  }

  Ok(())
}

fn load_connector(connector_file: &PathBuf) -> Result<ConnectorDef> {
  let content = std::fs::read_to_string(connector_file)
    .with_context(|| format!("failed to read connector file: {}", connector_file.display()))?;

  serde_json::from_str(&content)
    .with_context(|| format!("failed to parse connector file: {}", connector_file.display()))
}

fn check_connector(connector_file: PathBuf) -> Result<()> {
  let connector = load_connector(&connector_file)?;
  let engine = Engine::new(
    connector,
    Map::new(),
    Arc::new(FunctionRegistry::with_builtins()),
  )
  .context("failed to load connector")?;

  let summary = json!({
    "requests": engine.request_names(),
    "jobs": engine.job_names(),
  });
  println!("{}", serde_json::to_string_pretty(&summary)?);
  Ok(())
}

fn run_connector(connector_file: PathBuf) -> Result<()> {
  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async { run_connector_async(connector_file).await })
}

async fn run_connector_async(connector_file: PathBuf) -> Result<()> {
  let connector = load_connector(&connector_file)?;
  eprintln!(
    "Loaded connector: {} request(s), {} job(s)",
    connector.requests.len(),
    connector.jobs.len()
  );

  let context = read_context_from_stdin()?;
  let store = Arc::new(InMemoryCheckpointStore::new());

  let engine = Engine::new(
    connector,
    context,
    Arc::new(FunctionRegistry::with_builtins()),
  )
  .context("failed to load connector")?
  .with_store(store.clone());
  let engine = Arc::new(engine);

  // Ctrl-C lets the running request finish, then stops.
  let stopper = engine.clone();
  let signal = tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      eprintln!("Stopping after the current request...");
      stopper.stop();
    }
  });

  let result = engine.start().await;
  signal.abort();
  let report = result.context("connector execution failed")?;

  eprintln!(
    "Execution completed: {} request(s){}",
    report.requests.len(),
    if report.stopped { ", stopped early" } else { "" }
  );

  let requests: Vec<Value> = report
    .requests
    .iter()
    .map(|r| {
      json!({
        "name": r.name,
        "outcome": r.outcome.to_string(),
        "iterations": r.iterations,
      })
    })
    .collect();

  let output = json!({
    "requests": requests,
    "jobs": report.jobs,
    "checkpoints": store.snapshot(),
    "context": report.context,
  });
  println!("{}", serde_json::to_string_pretty(&output)?);

  Ok(())
}

fn read_context_from_stdin() -> Result<Map<String, Value>> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    return Ok(Map::new());
  }

  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read context from stdin")?;

  if input.trim().is_empty() {
    return Ok(Map::new());
  }

  match serde_json::from_str(&input).context("failed to parse context JSON from stdin")? {
    Value::Object(map) => Ok(map),
    other => anyhow::bail!("context must be a JSON object, got: {}", other),
  }
}
