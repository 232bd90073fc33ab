// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Turn loop.
//!
//! [`TurnController`] drives one session: send the history to the model,
//! dispatch the streamed events, run any requested tool calls, feed the
//! results back, and repeat until the model finishes, a limit is hit, or the
//! session is cancelled.

use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::chat::streaming::classify_item;
use crate::checkpoint::CheckpointManager;
use crate::error::{AgentError, Result};
use crate::llm::message::{Message, ToolCallRequest};
use crate::llm::provider::{ModelService, StreamEvent};
use crate::output::{prefix, OutputSink};
use crate::tools::{outcomes_to_message, ToolCallExecutor, ToolCallOutcome};

/// Why a session completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionReason {
    /// The model answered without requesting tools
    Finished,
    /// The conversation no longer fits the model's context window
    TokenLimitExceeded,
    /// The model service detected a repetitive loop
    LoopDetected,
    /// The model service's own session turn limit was reached
    TurnLimitReached,
    /// The model service reported a generation error
    ModelError,
    /// The model stopped for a safety reason and pending tools were dropped
    SafetyStop,
}

/// Terminal state of a session that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Completed(CompletionReason),
    Aborted,
}

/// Counters owned by the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    /// Model invocations attempted so far
    pub turn_count: u32,
    pub aborted: bool,
    /// -1 for unlimited
    pub max_turns: i32,
}

/// Result of [`TurnController::run`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub status: SessionStatus,
    pub turn_count: u32,
    /// Tag of the checkpoint written at completion, if any
    pub checkpoint_tag: Option<String>,
}

/// Hooks for callers that want to follow the loop.
pub trait TurnObserver: Send {
    fn on_turn_start(&mut self, _turn: u32) {}

    fn on_tool_outcomes(&mut self, _outcomes: &[ToolCallOutcome]) {}

    fn on_complete(&mut self, _outcome: &SessionOutcome) {}
}

/// No-op observer for callers that don't need hooks.
#[derive(Debug, Default)]
pub struct NoopTurnObserver;

impl TurnObserver for NoopTurnObserver {}

struct AutoCheckpoint {
    manager: CheckpointManager,
    tag: Option<String>,
}

/// How one model turn ended
enum TurnEnd {
    /// Stream drained; run these tool calls (possibly none)
    Drained {
        text: String,
        calls: Vec<ToolCallRequest>,
        safety_stop: bool,
    },
    /// A terminal event ended the session
    Stopped {
        text: String,
        reason: CompletionReason,
    },
    Aborted,
}

/// Session state machine
pub struct TurnController {
    model: Arc<dyn ModelService>,
    executor: ToolCallExecutor,
    history: Vec<Message>,
    state: SessionState,
    auto_checkpoint: Option<AutoCheckpoint>,
    suppress_tools_on_safety_stop: bool,
}

impl TurnController {
    pub fn new(model: Arc<dyn ModelService>, executor: ToolCallExecutor) -> Self {
        Self {
            model,
            executor,
            history: Vec::new(),
            state: SessionState {
                turn_count: 0,
                aborted: false,
                max_turns: -1,
            },
            auto_checkpoint: None,
            suppress_tools_on_safety_stop: false,
        }
    }

    /// Start from a previously saved conversation
    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    /// Limit model invocations (-1 = unlimited)
    pub fn with_max_turns(mut self, max_turns: i32) -> Self {
        self.state.max_turns = max_turns;
        self
    }

    /// Save a checkpoint when the session finishes normally
    pub fn with_auto_checkpoint(mut self, manager: CheckpointManager, tag: Option<String>) -> Self {
        self.auto_checkpoint = Some(AutoCheckpoint { manager, tag });
        self
    }

    /// Drop pending tool calls when the model stops for a safety reason
    pub fn with_safety_stop_suppression(mut self, suppress: bool) -> Self {
        self.suppress_tools_on_safety_stop = suppress;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn into_history(self) -> Vec<Message> {
        self.history
    }

    /// Run the session to a terminal state.
    ///
    /// Returns `Err` only for the configured turn limit, an unreachable tool
    /// registry, a model stream that cannot be opened, or a failing sink.
    pub async fn run(
        &mut self,
        initial: Message,
        sink: &mut dyn OutputSink,
        cancel: &CancellationToken,
        observer: &mut dyn TurnObserver,
    ) -> Result<SessionOutcome> {
        tracing::info!(
            target: "agentloop.chat.engine",
            model = %self.model.name(),
            starting_messages = self.history.len(),
            max_turns = self.state.max_turns,
            "session start"
        );

        self.history.push(initial);
        let outcome = self.run_inner(sink, cancel, observer).await;

        match &outcome {
            Ok(outcome) => {
                tracing::info!(
                    target: "agentloop.chat.engine",
                    status = ?outcome.status,
                    turns = outcome.turn_count,
                    final_messages = self.history.len(),
                    "session end"
                );
                observer.on_complete(outcome);
            }
            Err(e) => tracing::warn!(
                target: "agentloop.chat.engine",
                error = %e,
                turns = self.state.turn_count,
                "session failed"
            ),
        }
        outcome
    }

    async fn run_inner(
        &mut self,
        sink: &mut dyn OutputSink,
        cancel: &CancellationToken,
        observer: &mut dyn TurnObserver,
    ) -> Result<SessionOutcome> {
        loop {
            if cancel.is_cancelled() {
                return Ok(self.abort());
            }

            self.state.turn_count += 1;
            let turn = self.state.turn_count;
            if self.state.max_turns >= 0 && i64::from(turn) > i64::from(self.state.max_turns) {
                return Err(AgentError::TurnLimitExceeded {
                    max_turns: self.state.max_turns,
                });
            }

            tracing::debug!(
                target: "agentloop.chat.engine",
                turn,
                messages = self.history.len(),
                "turn start"
            );
            observer.on_turn_start(turn);

            let (text, calls, safety_stop) = match self.stream_turn(sink, cancel).await? {
                TurnEnd::Aborted => return Ok(self.abort()),
                TurnEnd::Stopped { text, reason } => {
                    // Calls from a stopped turn are never answered; keep only the text
                    if !text.is_empty() {
                        self.history.push(Message::model(text));
                    }
                    return Ok(self.complete(reason, None));
                }
                TurnEnd::Drained {
                    text,
                    calls,
                    safety_stop,
                } => (text, calls, safety_stop),
            };

            // Suppression only applies to a turn that actually requested tools
            if safety_stop && self.suppress_tools_on_safety_stop && !calls.is_empty() {
                sink.write_diagnostic(
                    prefix::WARNING,
                    &format!(
                        "Dropped {} pending tool call(s) after a safety stop.",
                        calls.len()
                    ),
                )?;
                self.history.push(Message::model_turn(&text, &[]));
                return Ok(self.complete(CompletionReason::SafetyStop, None));
            }

            self.history.push(Message::model_turn(&text, &calls));

            if calls.is_empty() {
                sink.write_content("\n")?;
                if cancel.is_cancelled() {
                    return Ok(self.abort());
                }
                let checkpoint_tag = self.save_checkpoint(sink).await?;
                return Ok(self.complete(CompletionReason::Finished, checkpoint_tag));
            }

            tracing::debug!(
                target: "agentloop.chat.engine",
                turn,
                tool_calls = calls.len(),
                "tool phase start"
            );
            let outcomes = self.executor.execute(&calls, sink, cancel).await?;
            tracing::debug!(
                target: "agentloop.chat.engine",
                turn,
                failed = outcomes.iter().filter(|o| !o.succeeded).count(),
                "tool phase end"
            );
            observer.on_tool_outcomes(&outcomes);
            self.history.push(outcomes_to_message(outcomes));
        }
    }

    /// Consume one model stream, dispatching events in arrival order
    async fn stream_turn(
        &self,
        sink: &mut dyn OutputSink,
        cancel: &CancellationToken,
    ) -> Result<TurnEnd> {
        let mut stream = self.model.stream_turn(&self.history, cancel).await?;

        let mut text = String::new();
        let mut calls = Vec::new();
        let mut safety_stop = false;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                item = stream.next() => Some(item),
            };
            let Some(item) = next else {
                return Ok(TurnEnd::Aborted);
            };
            let Some(item) = item else {
                break;
            };

            let stopped = match classify_item(item) {
                StreamEvent::Content(chunk) => {
                    sink.write_content(&chunk)?;
                    text.push_str(&chunk);
                    None
                }
                StreamEvent::ToolCallRequest(call) => {
                    calls.push(call);
                    None
                }
                StreamEvent::Thought {
                    subject,
                    description,
                } => {
                    let thought = match (subject.is_empty(), description.is_empty()) {
                        (false, false) => format!("{}: {}", subject, description),
                        (false, true) => subject,
                        _ => description,
                    };
                    sink.write_diagnostic(prefix::THOUGHT, &thought)?;
                    None
                }
                StreamEvent::Retry => {
                    tracing::debug!(target: "agentloop.chat.engine", "model request retried");
                    sink.write_diagnostic(prefix::RETRY, "Model request was retried.")?;
                    None
                }
                StreamEvent::ContextCompressed {
                    before_tokens,
                    after_tokens,
                } => {
                    sink.write_diagnostic(
                        prefix::INFO,
                        &format!(
                            "Context compressed from {} to {} tokens.",
                            before_tokens, after_tokens
                        ),
                    )?;
                    None
                }
                StreamEvent::TokenLimitExceeded(message) => {
                    sink.write_diagnostic(prefix::ERROR, &message)?;
                    Some(CompletionReason::TokenLimitExceeded)
                }
                StreamEvent::LoopDetected => {
                    sink.write_diagnostic(
                        prefix::WARNING,
                        "Loop detected by the model service; stopping the session.",
                    )?;
                    Some(CompletionReason::LoopDetected)
                }
                StreamEvent::TurnLimitReached => {
                    sink.write_diagnostic(
                        prefix::WARNING,
                        "The model service's session turn limit was reached.",
                    )?;
                    Some(CompletionReason::TurnLimitReached)
                }
                StreamEvent::Error(message) => {
                    sink.write_diagnostic(prefix::ERROR, &message)?;
                    Some(CompletionReason::ModelError)
                }
                StreamEvent::Finished(reason) => {
                    tracing::debug!(
                        target: "agentloop.chat.engine",
                        reason = %reason,
                        "generation finished"
                    );
                    if let Some(advisory) = reason.advisory() {
                        sink.write_diagnostic(prefix::WARNING, advisory)?;
                    }
                    safety_stop |= reason.is_safety_stop();
                    None
                }
                StreamEvent::Ignored { kind } => {
                    tracing::debug!(
                        target: "agentloop.chat.engine",
                        kind = %kind,
                        "ignored stream event"
                    );
                    None
                }
            };

            if let Some(reason) = stopped {
                return Ok(TurnEnd::Stopped { text, reason });
            }
        }

        Ok(TurnEnd::Drained {
            text,
            calls,
            safety_stop,
        })
    }

    /// Auto-save failures are reported, never surfaced
    async fn save_checkpoint(&self, sink: &mut dyn OutputSink) -> Result<Option<String>> {
        let Some(auto) = &self.auto_checkpoint else {
            return Ok(None);
        };

        match auto.manager.save(&self.history, auto.tag.as_deref()).await {
            Ok(Some(tag)) => {
                sink.write_diagnostic(prefix::INFO, &format!("Checkpoint saved as '{}'.", tag))?;
                Ok(Some(tag))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                tracing::warn!(
                    target: "agentloop.chat.engine",
                    error = %e,
                    "automatic checkpoint failed"
                );
                sink.write_diagnostic(prefix::WARNING, &format!("Failed to save checkpoint: {}", e))?;
                Ok(None)
            }
        }
    }

    fn complete(&self, reason: CompletionReason, checkpoint_tag: Option<String>) -> SessionOutcome {
        SessionOutcome {
            status: SessionStatus::Completed(reason),
            turn_count: self.state.turn_count,
            checkpoint_tag,
        }
    }

    fn abort(&mut self) -> SessionOutcome {
        self.state.aborted = true;
        SessionOutcome {
            status: SessionStatus::Aborted,
            turn_count: self.state.turn_count,
            checkpoint_tag: None,
        }
    }
}
