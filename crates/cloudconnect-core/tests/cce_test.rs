//! Integration tests for forking jobs.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cloudconnect_config::JobDef;
use cloudconnect_core::load::{load_job, load_tasks};
use cloudconnect_core::{
  Capabilities, CceJob, CceTask, Context, CoreError, JobState, SplitTask,
};
use common::{ScriptedClient, caps, ctx};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

fn job_def(value: Value) -> JobDef {
  serde_json::from_value(value).unwrap()
}

/// Always fails.
#[derive(Debug)]
struct FailingTask;

#[async_trait]
impl CceTask for FailingTask {
  fn name(&self) -> &str {
    "failing"
  }

  async fn perform(
    &self,
    _context: &Context,
    _caps: &Capabilities,
    _cancel: &CancellationToken,
  ) -> Result<Vec<Context>, CoreError> {
    Err(CoreError::config("task exploded"))
  }
}

#[tokio::test]
async fn test_split_forks_one_child_per_element() {
  let client = Arc::new(ScriptedClient::new());
  let def = job_def(json!({
    "name": "users",
    "tasks": [
      {"type": "split", "name": "ids", "source": "{{ ids }}", "output": "id"},
      {"type": "process", "name": "mark", "pipeline": [{"method": "set_var", "input": ["{{ id }}"], "output": "seen"}]}
    ]
  }));

  let job = load_job(&def, ctx(json!({"ids": [10, 20, 30]})), caps(client)).unwrap();
  let handle = job.handle();
  let mut forks = job.run().await.unwrap();

  assert!(!forks.is_leaf());
  assert_eq!(forks.remaining(), 3);
  assert_eq!(handle.state(), JobState::Processing);

  let children: Vec<CceJob> = forks.by_ref().collect();
  assert_eq!(
    children.iter().map(|c| c.name().to_string()).collect::<Vec<_>>(),
    vec!["users#1", "users#2", "users#3"]
  );
  assert_eq!(children[1].context()["id"], json!(20));
  assert_eq!(children[1].task_names(), vec!["mark"]);
  assert_eq!(handle.state(), JobState::Stopped);
}

#[tokio::test]
async fn test_children_own_their_context() {
  let client = Arc::new(ScriptedClient::new());
  let job = CceJob::new("parent", ctx(json!({"list": "a,b"})), caps(client))
    .with_tasks(vec![
      Arc::new(SplitTask::new("split", "{{ list }}", Some(",".to_string()), "item").unwrap()),
      Arc::new(SplitTask::new("again", "{{ item }}", None, "copy").unwrap()),
    ]);

  let mut children: Vec<CceJob> = job.run().await.unwrap().collect();
  children[0].context_mut().insert("item".to_string(), json!("changed"));

  assert_eq!(children[1].context()["item"], json!("b"));
  assert_eq!(children[0].context()["list"], json!("a,b"));
}

#[tokio::test]
async fn test_leaf_job_produces_no_children() {
  let client = Arc::new(ScriptedClient::new());
  let job = CceJob::new("leaf", ctx(json!({"ids": [1, 2]})), caps(client)).with_tasks(vec![Arc::new(
    SplitTask::new("ids", "{{ ids }}", None, "id").unwrap(),
  )]);
  let handle = job.handle();

  let forks = job.run().await.unwrap();
  assert!(forks.is_leaf());

  let outputs = forks.into_outputs();
  assert_eq!(outputs.len(), 2);
  assert_eq!(outputs[0]["id"], json!(1));
  assert_eq!(handle.state(), JobState::Stopped);
}

#[tokio::test]
async fn test_leaf_iterator_is_empty() {
  let client = Arc::new(ScriptedClient::new());
  let job = CceJob::new("leaf", ctx(json!({"ids": [1]})), caps(client)).with_tasks(vec![Arc::new(
    SplitTask::new("ids", "{{ ids }}", None, "id").unwrap(),
  )]);

  assert_eq!(job.run().await.unwrap().count(), 0);
}

#[tokio::test]
async fn test_stop_between_children() {
  let client = Arc::new(ScriptedClient::new());
  let def = job_def(json!({
    "name": "many",
    "tasks": [
      {"type": "split", "name": "ids", "source": "{{ ids }}", "output": "id"},
      {"type": "process", "name": "noop"}
    ]
  }));

  let job = load_job(&def, ctx(json!({"ids": [1, 2, 3, 4]})), caps(client)).unwrap();
  let handle = job.handle();
  let mut forks = job.run().await.unwrap();

  let first = forks.next().unwrap();
  assert_eq!(first.name(), "many#1");

  assert!(handle.stop(false, Duration::from_secs(1)).await);
  assert!(forks.next().is_none());
  assert_eq!(handle.state(), JobState::Stopped);

  // Children inherit the stop through their token.
  assert!(first.handle().is_stop_requested());
}

#[tokio::test]
async fn test_stop_before_run() {
  let client = Arc::new(ScriptedClient::new());
  let job = CceJob::new("early", ctx(json!({"ids": [1, 2]})), caps(client)).with_tasks(vec![
    Arc::new(SplitTask::new("ids", "{{ ids }}", None, "id").unwrap()),
    Arc::new(SplitTask::new("next", "{{ id }}", None, "x").unwrap()),
  ]);
  let handle = job.handle();
  handle.stop(false, Duration::from_secs(1)).await;

  let forks = job.run().await.unwrap();
  assert_eq!(forks.count(), 0);
  assert_eq!(handle.state(), JobState::Stopped);
}

#[tokio::test]
async fn test_blocking_stop_waits_for_forks_to_drain() {
  let client = Arc::new(ScriptedClient::new());
  let job = CceJob::new("drain", ctx(json!({"ids": [1, 2]})), caps(client)).with_tasks(vec![
    Arc::new(SplitTask::new("ids", "{{ ids }}", None, "id").unwrap()),
    Arc::new(SplitTask::new("next", "{{ id }}", None, "x").unwrap()),
  ]);
  let handle = job.handle();
  let forks = job.run().await.unwrap();

  assert!(!handle.stop(true, Duration::from_millis(20)).await);
  drop(forks);
  assert!(handle.stop(true, Duration::from_secs(1)).await);
}

#[tokio::test]
async fn test_http_task_yields_snapshot_per_response() {
  let client = Arc::new(
    ScriptedClient::new()
      .ok(r#"{"users": [{"id": "a"}], "next": "p2"}"#)
      .ok(r#"{"users": [{"id": "b"}, {"id": "c"}], "next": ""}"#),
  );
  let def = job_def(json!({
    "name": "sync",
    "tasks": [
      {
        "type": "http",
        "name": "list",
        "request": {"url": "https://api.test/users?cursor={{ cursor }}"},
        "post_process": {
          "pipeline": [
            {"method": "json_path", "input": ["{{ __response__.body }}", "users[*].id"], "output": "ids"},
            {"method": "json_path", "input": ["{{ __response__.body }}", "next"], "output": "cursor"}
          ]
        },
        "iteration_mode": {
          "type": "loop",
          "stop_conditions": [{"method": "json_empty", "input": ["{{ cursor }}"]}]
        }
      },
      {"type": "split", "name": "each", "source": "{{ ids }}", "output": "id"}
    ]
  }));

  let job = load_job(&def, ctx(json!({"cursor": "p1"})), caps(client.clone())).unwrap();
  let pages: Vec<CceJob> = job.run().await.unwrap().collect();

  assert_eq!(client.urls().len(), 2);
  assert_eq!(pages.len(), 2);
  assert_eq!(pages[0].context()["ids"], json!(["a"]));
  assert_eq!(pages[1].context()["ids"], json!(["b", "c"]));

  let mut ids = Vec::new();
  for page in pages {
    for item in page.run().await.unwrap().into_outputs() {
      ids.push(item["id"].clone());
    }
  }
  assert_eq!(ids, vec![json!("a"), json!("b"), json!("c")]);
}

#[tokio::test]
async fn test_process_task_skipped_yields_nothing() {
  let client = Arc::new(ScriptedClient::new());
  let def = job_def(json!({
    "name": "gate",
    "tasks": [
      {"type": "process", "name": "check",
       "conditions": [{"method": "is_true", "input": ["{{ enabled }}"]}],
       "pipeline": [{"method": "set_var", "input": ["1"], "output": "ran"}]}
    ]
  }));

  let off = load_job(&def, ctx(json!({"enabled": "false"})), caps(client.clone())).unwrap();
  assert!(off.run().await.unwrap().into_outputs().is_empty());

  let on = load_job(&def, ctx(json!({"enabled": "true"})), caps(client)).unwrap();
  let outputs = on.run().await.unwrap().into_outputs();
  assert_eq!(outputs.len(), 1);
  assert_eq!(outputs[0]["ran"], json!("1"));
}

#[tokio::test]
async fn test_head_task_failure_marks_job_failed() {
  let client = Arc::new(ScriptedClient::new());
  let job = CceJob::new("bad", Context::new(), caps(client)).with_tasks(vec![Arc::new(FailingTask)]);
  let handle = job.handle();

  assert!(matches!(job.run().await, Err(CoreError::Config { .. })));
  assert_eq!(handle.state(), JobState::Failed);
}

#[test]
fn test_load_tasks_keeps_order() {
  let def = job_def(json!({
    "name": "x",
    "tasks": [
      {"type": "split", "name": "a", "source": "{{ s }}", "output": "o"},
      {"type": "process", "name": "b"}
    ]
  }));
  let names: Vec<String> = load_tasks(&def).unwrap().iter().map(|t| t.name().to_string()).collect();
  assert_eq!(names, vec!["a", "b"]);
}
