// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use agentloop::chat::{
    run_session, CompletionReason, Session, SessionDeps, SessionOptions, SessionStatus,
};
use agentloop::checkpoint::CheckpointManager;
use agentloop::llm::message::{Message, Part};
use agentloop::llm::ScriptedModelService;
use agentloop::output::{prefix, BufferSink};
use agentloop::tools::{
    InMemoryToolRegistry, SchemaBuilder, Tool, ToolDefinition, ToolInvocation, ToolResult,
};
use agentloop::{AgentError, Result};

/// Cancels the session token from inside the tool phase
struct InterruptTool {
    releases: Arc<AtomicUsize>,
}

struct InterruptInvocation;

#[async_trait]
impl ToolInvocation for InterruptInvocation {
    fn description(&self) -> String {
        "simulate Ctrl+C".to_string()
    }

    async fn execute(&self, cancel: &CancellationToken) -> Result<ToolResult> {
        cancel.cancel();
        Ok(ToolResult::success("interrupted"))
    }
}

#[async_trait]
impl Tool for InterruptTool {
    fn name(&self) -> &str {
        "interrupt"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "interrupt".to_string(),
            description: "Cancels the session".to_string(),
            input_schema: SchemaBuilder::new().build(),
        }
    }

    fn build(&self, _args: &Value) -> Result<Box<dyn ToolInvocation>> {
        Ok(Box::new(InterruptInvocation))
    }

    async fn release(&self) -> Result<()> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Workspace {
    dir: TempDir,
    releases: Arc<AtomicUsize>,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "alpha\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "remember the milk").unwrap();
        Self {
            dir,
            releases: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn script(&self, content: &str) -> ScriptedModelService {
        let path = self.root().join("turns.jsonl");
        std::fs::write(&path, content).unwrap();
        ScriptedModelService::from_jsonl(&path).unwrap()
    }

    fn options(&self) -> SessionOptions {
        SessionOptions {
            working_directory: self.root().to_path_buf(),
            ..SessionOptions::default()
        }
    }

    fn deps(&self, model: &ScriptedModelService) -> SessionDeps {
        let mut registry = InMemoryToolRegistry::with_builtins(self.root());
        registry.register(Arc::new(InterruptTool {
            releases: Arc::clone(&self.releases),
        }));
        SessionDeps {
            model: Arc::new(model.clone()),
            tools: Arc::new(registry),
            checkpoints: CheckpointManager::new(self.root().join(".checkpoints")),
        }
    }
}

fn tool_responses(message: &Message) -> Vec<(String, Value)> {
    message
        .parts
        .iter()
        .filter_map(|part| match part {
            Part::ToolResponse { name, response, .. } => Some((name.clone(), response.clone())),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_list_files_scenario() {
    let ws = Workspace::new();
    let model = ws.script(
        r#"{"type": "tool_call_request", "value": {"id": "c1", "name": "list_dir", "args": {"path": "."}}}
{"type": "end_turn"}
{"type": "content", "value": "done"}
"#,
    );
    let deps = ws.deps(&model);
    let mut sink = BufferSink::new();

    let report = Session::new(&ws.options(), &deps)
        .run("list files", &mut sink, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(model.call_count(), 2);
    assert_eq!(report.outcome.turn_count, 2);
    assert_eq!(
        report.outcome.status,
        SessionStatus::Completed(CompletionReason::Finished)
    );
    assert_eq!(sink.content(), "done\n");
    assert!(sink
        .diagnostics()
        .iter()
        .any(|(p, text)| p == prefix::TOOL && text.starts_with("list_dir")));

    // user, model call, tool response, final answer
    assert_eq!(report.history.len(), 4);
    let responses = tool_responses(&report.history[2]);
    assert_eq!(responses.len(), 1);
    assert!(responses[0].1["output"].as_str().unwrap().contains("a.txt"));
}

#[tokio::test]
async fn test_model_error_scenario_exits_zero() {
    let ws = Workspace::new();
    let model = ws.script(r#"{"type": "error", "value": {"message": "quota exceeded"}}"#);
    let deps = ws.deps(&model);
    let mut sink = BufferSink::new();

    let code = run_session(
        "hello",
        &ws.options(),
        &deps,
        &mut sink,
        &CancellationToken::new(),
    )
    .await;

    assert_eq!(code, 0);
    assert_eq!(sink.content(), "");
    assert!(sink
        .diagnostics()
        .contains(&(prefix::ERROR.to_string(), "quota exceeded".to_string())));
}

#[tokio::test]
async fn test_error_chunk_without_message_ends_session() {
    let ws = Workspace::new();
    let model = ws.script(
        r#"{"type": "error"}
{"type": "content", "value": "never streamed"}
"#,
    );
    let deps = ws.deps(&model);
    let mut sink = BufferSink::new();

    let code = run_session("hello", &ws.options(), &deps, &mut sink, &CancellationToken::new()).await;

    assert_eq!(code, 0);
    assert_eq!(sink.content(), "");
    assert!(sink
        .diagnostics()
        .contains(&(prefix::ERROR.to_string(), "unknown model error".to_string())));
}

#[tokio::test]
async fn test_unknown_tool_does_not_stop_batch() {
    let ws = Workspace::new();
    let model = ws.script(
        r#"{"type": "tool_call_request", "value": {"id": "c1", "name": "nonexistent", "args": {}}}
{"type": "tool_call_request", "value": {"id": "c2", "name": "read_file", "args": {"path": "a.txt"}}}
{"type": "end_turn"}
{"type": "content", "value": "ok"}
"#,
    );
    let deps = ws.deps(&model);
    let mut sink = BufferSink::new();

    let report = Session::new(&ws.options(), &deps)
        .run("go", &mut sink, &CancellationToken::new())
        .await
        .unwrap();

    let responses = tool_responses(&report.history[2]);
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0].0, "nonexistent");
    assert!(responses[0].1["error"]
        .as_str()
        .unwrap()
        .contains("not found in registry"));
    assert!(responses[1].1["output"].as_str().unwrap().contains("alpha"));
    assert!(sink.diagnostic_text().contains("nonexistent failed"));
}

#[tokio::test]
async fn test_turn_limit_scenario_exits_one() {
    let ws = Workspace::new();
    let model = ws.script(
        r#"{"type": "tool_call_request", "value": {"name": "list_dir", "args": {}}}"#,
    );
    let deps = ws.deps(&model);
    let options = SessionOptions {
        max_turns: 2,
        ..ws.options()
    };
    let mut sink = BufferSink::new();

    let code = run_session("loop", &options, &deps, &mut sink, &CancellationToken::new()).await;

    assert_eq!(code, 1);
    assert_eq!(model.call_count(), 2);
    assert!(sink.diagnostic_text().contains("Reached max session turns (2)"));
    assert_eq!(ws.releases.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_interrupt_during_tool_phase() {
    let ws = Workspace::new();
    let model = ws.script(
        r#"{"type": "tool_call_request", "value": {"name": "interrupt"}}
{"type": "end_turn"}
{"type": "content", "value": "never streamed"}
"#,
    );
    let deps = ws.deps(&model);
    let mut sink = BufferSink::new();

    let report = Session::new(&ws.options(), &deps)
        .run("go", &mut sink, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.outcome.status, SessionStatus::Aborted);
    assert_eq!(model.call_count(), 1);
    assert!(!sink.content().contains("never streamed"));
    assert!(sink.diagnostic_text().contains("Session cancelled."));
    assert_eq!(ws.releases.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_file_reference_reaches_model() {
    let ws = Workspace::new();
    let model = ws.script(r#"{"type": "content", "value": "buy milk"}"#);
    let deps = ws.deps(&model);
    let mut sink = BufferSink::new();

    let code = run_session(
        "summarise @notes.txt",
        &ws.options(),
        &deps,
        &mut sink,
        &CancellationToken::new(),
    )
    .await;

    assert_eq!(code, 0);
    let request = model.last_request().unwrap();
    let first = request[0].text();
    assert!(first.starts_with("summarise notes.txt"));
    assert!(first.contains("Content from @notes.txt:\nremember the milk"));
}

#[tokio::test]
async fn test_missing_reference_exits_one_without_model_call() {
    let ws = Workspace::new();
    let model = ws.script(r#"{"type": "content", "value": "unused"}"#);
    let deps = ws.deps(&model);
    let mut sink = BufferSink::new();

    let code = run_session(
        "read @ghost.txt",
        &ws.options(),
        &deps,
        &mut sink,
        &CancellationToken::new(),
    )
    .await;

    assert_eq!(code, 1);
    assert_eq!(model.call_count(), 0);
    assert!(sink.diagnostic_text().contains("File not found: @ghost.txt"));
}

#[tokio::test]
async fn test_checkpoint_and_resume_across_sessions() {
    let ws = Workspace::new();
    let first = ws.script(
        r#"{"type": "tool_call_request", "value": {"name": "read_file", "args": {"path": "a.txt"}}}
{"type": "end_turn"}
{"type": "content", "value": "it says alpha"}
"#,
    );
    let deps = ws.deps(&first);
    let options = SessionOptions {
        auto_checkpoint: true,
        checkpoint_tag: Some("feature/login flow".to_string()),
        ..ws.options()
    };
    let mut sink = BufferSink::new();

    let code = run_session("read a.txt", &options, &deps, &mut sink, &CancellationToken::new()).await;
    assert_eq!(code, 0);
    assert!(sink
        .diagnostic_text()
        .contains("Checkpoint saved as 'feature/login flow'."));

    let saved = deps.checkpoints.list().await.unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].tag, "feature/login flow");

    let second = ws.script(r#"{"type": "content", "value": "still alpha"}"#);
    let resume_deps = ws.deps(&second);
    let resume_options = SessionOptions {
        resume_tag: Some("feature/login flow".to_string()),
        ..ws.options()
    };
    let mut sink = BufferSink::new();

    let report = Session::new(&resume_options, &resume_deps)
        .run("and now?", &mut sink, &CancellationToken::new())
        .await
        .unwrap();

    let request = second.last_request().unwrap();
    assert_eq!(request.len(), 5);
    assert_eq!(request[0].text(), "read a.txt");
    assert_eq!(request[4].text(), "and now?");
    assert_eq!(report.history.len(), 6);
    assert_eq!(sink.content(), "still alpha\n");
}

#[tokio::test]
async fn test_resume_unknown_checkpoint_is_input_error() {
    let ws = Workspace::new();
    let model = ws.script(r#"{"type": "content", "value": "unused"}"#);
    let deps = ws.deps(&model);
    let options = SessionOptions {
        resume_tag: Some("missing".to_string()),
        ..ws.options()
    };
    let mut sink = BufferSink::new();

    let err = Session::new(&options, &deps)
        .run("hi", &mut sink, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::InvalidInput(_)));
    assert_eq!(model.call_count(), 0);
}
