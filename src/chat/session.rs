// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Task session entry point
//!
//! Wraps [`TurnController`] with everything around a single run: resolving
//! the prompt, resuming a checkpoint, releasing tool resources, and mapping
//! the result to a process exit status.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::chat::engine::{NoopTurnObserver, SessionOutcome, SessionStatus, TurnController};
use crate::chat::input::resolve_input;
use crate::checkpoint::CheckpointManager;
use crate::config::Settings;
use crate::error::{AgentError, Result};
use crate::llm::message::Message;
use crate::llm::provider::ModelService;
use crate::output::{prefix, OutputSink};
use crate::tools::{ToolCallExecutor, ToolRegistry};

/// Per-session options, resolved once before the session starts
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    /// -1 for unlimited
    pub max_turns: i32,
    /// Checkpoint to continue from
    pub resume_tag: Option<String>,
    pub auto_checkpoint: bool,
    /// Tag for the automatic checkpoint (generated when absent)
    pub checkpoint_tag: Option<String>,
    pub suppress_tools_on_safety_stop: bool,
    pub report_tool_errors: bool,
    /// Base for `@` references in the prompt
    pub working_directory: PathBuf,
}

impl SessionOptions {
    pub fn from_settings(settings: &Settings, working_directory: PathBuf) -> Self {
        let session = &settings.session;
        Self {
            max_turns: session.max_turns,
            resume_tag: None,
            auto_checkpoint: session.auto_checkpoint,
            checkpoint_tag: session.checkpoint_tag.clone(),
            suppress_tools_on_safety_stop: session.suppress_tools_on_safety_stop,
            report_tool_errors: session.report_tool_errors,
            working_directory,
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default(), PathBuf::from("."))
    }
}

/// Collaborators a session runs against
#[derive(Clone)]
pub struct SessionDeps {
    pub model: Arc<dyn ModelService>,
    pub tools: Arc<dyn ToolRegistry>,
    pub checkpoints: CheckpointManager,
}

/// What a finished session leaves behind
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub outcome: SessionOutcome,
    pub history: Vec<Message>,
}

/// One task session
pub struct Session<'a> {
    options: &'a SessionOptions,
    deps: &'a SessionDeps,
}

impl<'a> Session<'a> {
    pub fn new(options: &'a SessionOptions, deps: &'a SessionDeps) -> Self {
        Self { options, deps }
    }

    /// Run the session. Tools are released however it ends.
    pub async fn run(
        &self,
        input: &str,
        sink: &mut dyn OutputSink,
        cancel: &CancellationToken,
    ) -> Result<SessionReport> {
        let result = self.run_inner(input, sink, cancel).await;
        self.release_tools().await;
        result
    }

    async fn run_inner(
        &self,
        input: &str,
        sink: &mut dyn OutputSink,
        cancel: &CancellationToken,
    ) -> Result<SessionReport> {
        let initial = resolve_input(input, &self.options.working_directory).await?;
        let history = self.resume_history(sink).await?;

        let executor = ToolCallExecutor::new(Arc::clone(&self.deps.tools))
            .with_error_reporting(self.options.report_tool_errors);
        let mut controller = TurnController::new(Arc::clone(&self.deps.model), executor)
            .with_history(history)
            .with_max_turns(self.options.max_turns)
            .with_safety_stop_suppression(self.options.suppress_tools_on_safety_stop);
        if self.options.auto_checkpoint {
            controller = controller.with_auto_checkpoint(
                self.deps.checkpoints.clone(),
                self.options.checkpoint_tag.clone(),
            );
        }

        let outcome = controller
            .run(initial, sink, cancel, &mut NoopTurnObserver)
            .await?;
        if outcome.status == SessionStatus::Aborted {
            sink.write_diagnostic(prefix::INFO, "Session cancelled.")?;
        }

        Ok(SessionReport {
            outcome,
            history: controller.into_history(),
        })
    }

    async fn resume_history(&self, sink: &mut dyn OutputSink) -> Result<Vec<Message>> {
        let Some(tag) = &self.options.resume_tag else {
            return Ok(Vec::new());
        };

        let history = self.deps.checkpoints.load(tag).await?;
        if history.is_empty() {
            return Err(AgentError::InvalidInput(format!(
                "No checkpoint found with tag '{}'",
                tag
            )));
        }

        tracing::info!(
            target: "agentloop.session",
            tag = %tag,
            messages = history.len(),
            "resuming checkpoint"
        );
        sink.write_diagnostic(
            prefix::INFO,
            &format!("Resumed checkpoint '{}' ({} messages).", tag, history.len()),
        )?;
        Ok(history)
    }

    async fn release_tools(&self) {
        for tool in self.deps.tools.tools() {
            if let Err(e) = tool.release().await {
                tracing::warn!(
                    target: "agentloop.session",
                    tool = %tool.name(),
                    error = %e,
                    "failed to release tool"
                );
            }
        }
    }
}

/// Run a session and map the result to an exit status: `0` when the session
/// completed or was cancelled, `1` when an error surfaced.
pub async fn run_session(
    input: &str,
    options: &SessionOptions,
    deps: &SessionDeps,
    sink: &mut dyn OutputSink,
    cancel: &CancellationToken,
) -> i32 {
    match Session::new(options, deps).run(input, sink, cancel).await {
        Ok(report) => {
            tracing::debug!(
                target: "agentloop.session",
                status = ?report.outcome.status,
                turns = report.outcome.turn_count,
                "session finished"
            );
            0
        }
        Err(e) => {
            if let Err(write_err) = sink.write_diagnostic(prefix::ERROR, &e.to_string()) {
                tracing::warn!(
                    target: "agentloop.session",
                    error = %write_err,
                    "could not report session error"
                );
            }
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::engine::CompletionReason;
    use crate::llm::provider::StreamEvent;
    use crate::llm::ScriptedModelService;
    use crate::output::BufferSink;
    use crate::tools::{InMemoryToolRegistry, Tool, ToolDefinition, ToolInvocation, SchemaBuilder};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Counts release calls
    struct TrackedTool {
        releases: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Tool for TrackedTool {
        fn name(&self) -> &str {
            "tracked"
        }

        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "tracked".to_string(),
                description: "Holds a resource".to_string(),
                input_schema: SchemaBuilder::new().build(),
            }
        }

        fn build(&self, _args: &Value) -> Result<Box<dyn ToolInvocation>> {
            Err(AgentError::ToolExecution("not runnable".to_string()))
        }

        async fn release(&self) -> Result<()> {
            self.releases.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Fixture {
        dir: TempDir,
        releases: Arc<AtomicUsize>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            std::fs::write(dir.path().join("a.txt"), "alpha").unwrap();
            Self {
                dir,
                releases: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn options(&self) -> SessionOptions {
            SessionOptions {
                working_directory: self.dir.path().to_path_buf(),
                ..SessionOptions::default()
            }
        }

        fn deps(&self, model: ScriptedModelService) -> SessionDeps {
            let mut registry = InMemoryToolRegistry::with_builtins(self.dir.path());
            registry.register(Arc::new(TrackedTool {
                releases: Arc::clone(&self.releases),
            }));
            SessionDeps {
                model: Arc::new(model),
                tools: Arc::new(registry),
                checkpoints: CheckpointManager::new(self.dir.path().join("checkpoints")),
            }
        }
    }

    #[test]
    fn test_options_from_settings() {
        let mut settings = Settings::default();
        settings.session.max_turns = 4;
        settings.session.report_tool_errors = false;

        let options = SessionOptions::from_settings(&settings, PathBuf::from("/work"));
        assert_eq!(options.max_turns, 4);
        assert!(!options.report_tool_errors);
        assert_eq!(options.working_directory, PathBuf::from("/work"));
        assert!(options.resume_tag.is_none());
    }

    #[tokio::test]
    async fn test_model_error_exits_zero() {
        let fixture = Fixture::new();
        let model = ScriptedModelService::new()
            .with_turns(vec![vec![StreamEvent::Error("quota exceeded".to_string())]]);
        let deps = fixture.deps(model);
        let mut sink = BufferSink::new();

        let code = run_session(
            "hi",
            &fixture.options(),
            &deps,
            &mut sink,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(code, 0);
        assert!(sink.diagnostic_text().contains("quota exceeded"));
        assert_eq!(fixture.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_turn_limit_exits_one() {
        let fixture = Fixture::new();
        let model = ScriptedModelService::new().with_tool_call("list_dir", json!({}));
        let deps = fixture.deps(model);
        let options = SessionOptions {
            max_turns: 1,
            ..fixture.options()
        };
        let mut sink = BufferSink::new();

        let code = run_session("go", &options, &deps, &mut sink, &CancellationToken::new()).await;

        assert_eq!(code, 1);
        assert!(sink.diagnostic_text().contains("Reached max session turns (1)"));
        assert_eq!(fixture.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_reference_fails_before_model_call() {
        let fixture = Fixture::new();
        let model = ScriptedModelService::new();
        let deps = fixture.deps(model.clone());
        let mut sink = BufferSink::new();

        let code = run_session(
            "read @nope.txt",
            &fixture.options(),
            &deps,
            &mut sink,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(code, 1);
        assert_eq!(model.call_count(), 0);
        assert!(sink.diagnostic_text().contains("@nope.txt"));
        assert_eq!(fixture.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_session_exits_zero() {
        let fixture = Fixture::new();
        let deps = fixture.deps(ScriptedModelService::new());
        let mut sink = BufferSink::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let code = run_session("hi", &fixture.options(), &deps, &mut sink, &cancel).await;

        assert_eq!(code, 0);
        assert!(sink.diagnostic_text().contains("Session cancelled."));
        assert_eq!(fixture.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_checkpoint_then_resume() {
        let fixture = Fixture::new();
        let model = ScriptedModelService::new().with_turns(vec![
            vec![StreamEvent::ToolCallRequest(crate::llm::message::ToolCallRequest {
                id: "c1".to_string(),
                name: "read_file".to_string(),
                args: json!({"path": "a.txt"}),
            })],
            vec![StreamEvent::Content("it says alpha".to_string())],
        ]);
        let deps = fixture.deps(model);
        let options = SessionOptions {
            auto_checkpoint: true,
            checkpoint_tag: Some("first".to_string()),
            ..fixture.options()
        };
        let mut sink = BufferSink::new();

        let report = Session::new(&options, &deps)
            .run("what is in a.txt?", &mut sink, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            report.outcome.status,
            SessionStatus::Completed(CompletionReason::Finished)
        );
        assert_eq!(report.outcome.checkpoint_tag.as_deref(), Some("first"));

        let follow_up = ScriptedModelService::new();
        let resume_deps = SessionDeps {
            model: Arc::new(follow_up.clone()),
            ..deps.clone()
        };
        let resume_options = SessionOptions {
            resume_tag: Some("first".to_string()),
            ..fixture.options()
        };
        let mut sink = BufferSink::new();
        let resumed = Session::new(&resume_options, &resume_deps)
            .run("and now?", &mut sink, &CancellationToken::new())
            .await
            .unwrap();

        // Four saved messages, the new prompt, and the new answer
        assert_eq!(resumed.history.len(), 6);
        assert_eq!(follow_up.last_request().unwrap()[0], report.history[0]);
        assert!(sink.diagnostic_text().contains("Resumed checkpoint 'first'"));
    }

    #[tokio::test]
    async fn test_resume_unknown_tag() {
        let fixture = Fixture::new();
        let model = ScriptedModelService::new();
        let deps = fixture.deps(model.clone());
        let options = SessionOptions {
            resume_tag: Some("ghost".to_string()),
            ..fixture.options()
        };
        let mut sink = BufferSink::new();

        let err = Session::new(&options, &deps)
            .run("hi", &mut sink, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.is_input_error());
        assert_eq!(model.call_count(), 0);
        assert_eq!(fixture.releases.load(Ordering::SeqCst), 1);
    }
}
