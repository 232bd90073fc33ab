// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool call execution
//!
//! Runs one turn's batch of tool-call requests strictly in order. Every
//! request yields exactly one [`ToolCallOutcome`], whether the tool ran,
//! failed, was unknown or was skipped because the session was cancelled.
//! Only a registry that cannot be consulted escapes as an error.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::llm::message::{Message, Part, ToolCallRequest};
use crate::output::{prefix, OutputSink};

use super::{ToolRegistry, ToolResult};

/// Free-form fields summarised in the plan preview
const REDACTED_FIELDS: &[&str] = &[
    "content",
    "file_content",
    "new_content",
    "old_string",
    "new_string",
    "search",
    "replace",
    "patch",
    "diff",
];

const MAX_PREVIEW_CHARS: usize = 200;

const CANCELLED_MESSAGE: &str = "Cancelled by user";

/// Result of one tool-call request
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallOutcome {
    /// Id of the request this outcome answers
    pub request_id: String,
    pub tool_name: String,
    pub succeeded: bool,
    /// The call was skipped, or gave up, because the session was cancelled
    pub cancelled: bool,
    pub error_message: Option<String>,
    pub display: Option<String>,
    /// Parts fed back to the model; always a single `ToolResponse`
    pub response_parts: Vec<Part>,
}

impl ToolCallOutcome {
    fn from_result(request: &ToolCallRequest, result: ToolResult) -> Self {
        let succeeded = !result.is_error();
        let text = result.output_text().to_string();
        let (error_message, response) = if succeeded {
            (None, json!({ "output": text }))
        } else {
            (Some(text.clone()), json!({ "error": text }))
        };
        let ToolResult {
            display,
            attachments,
            ..
        } = result;

        Self {
            request_id: request.id.clone(),
            tool_name: request.name.clone(),
            succeeded,
            cancelled: false,
            error_message,
            display,
            response_parts: vec![Part::ToolResponse {
                id: request.id.clone(),
                name: request.name.clone(),
                response,
                attachments,
            }],
        }
    }

    fn failure(request: &ToolCallRequest, message: impl Into<String>) -> Self {
        Self::from_result(request, ToolResult::error(message))
    }

    fn cancelled(request: &ToolCallRequest) -> Self {
        Self {
            cancelled: true,
            ..Self::failure(request, CANCELLED_MESSAGE)
        }
    }
}

/// Executes tool-call batches against a registry
pub struct ToolCallExecutor {
    registry: Arc<dyn ToolRegistry>,
    report_errors: bool,
}

impl ToolCallExecutor {
    pub fn new(registry: Arc<dyn ToolRegistry>) -> Self {
        Self {
            registry,
            report_errors: true,
        }
    }

    /// Whether failed calls are written to diagnostics (default: true)
    pub fn with_error_reporting(mut self, report_errors: bool) -> Self {
        self.report_errors = report_errors;
        self
    }

    /// Execute `requests` in order, one outcome per request
    pub async fn execute(
        &self,
        requests: &[ToolCallRequest],
        sink: &mut dyn OutputSink,
        cancel: &CancellationToken,
    ) -> Result<Vec<ToolCallOutcome>> {
        tracing::debug!(
            target: "agentloop.tools",
            requested_tool_calls = requests.len(),
            "starting tool execution batch"
        );

        let mut outcomes = Vec::with_capacity(requests.len());
        for request in requests {
            if cancel.is_cancelled() {
                outcomes.push(ToolCallOutcome::cancelled(request));
                continue;
            }

            let outcome = self.execute_one(request, sink, cancel).await?;
            if !outcome.succeeded && !outcome.cancelled {
                tracing::debug!(
                    target: "agentloop.tools",
                    tool_name = %request.name,
                    call_id = %request.id,
                    error = outcome.error_message.as_deref().unwrap_or_default(),
                    "tool call failed"
                );
                if self.report_errors {
                    sink.write_diagnostic(
                        prefix::ERROR,
                        &format!(
                            "{} failed: {}",
                            request.name,
                            outcome.error_message.as_deref().unwrap_or_default()
                        ),
                    )?;
                }
            }
            outcomes.push(outcome);
        }

        tracing::debug!(
            target: "agentloop.tools",
            outcomes = outcomes.len(),
            failed = outcomes.iter().filter(|o| !o.succeeded).count(),
            "tool execution batch completed"
        );

        Ok(outcomes)
    }

    async fn execute_one(
        &self,
        request: &ToolCallRequest,
        sink: &mut dyn OutputSink,
        cancel: &CancellationToken,
    ) -> Result<ToolCallOutcome> {
        let Some(tool) = self.registry.get(&request.name)? else {
            return Ok(ToolCallOutcome::failure(
                request,
                format!("Tool \"{}\" not found in registry.", request.name),
            ));
        };

        let invocation = match tool.build(&request.args) {
            Ok(invocation) => invocation,
            Err(e) => return Ok(ToolCallOutcome::failure(request, e.to_string())),
        };

        sink.write_diagnostic(
            prefix::TOOL,
            &format!(
                "{}: {} {}",
                request.name,
                invocation.description(),
                truncate_preview(&redact_args(&request.args).to_string(), MAX_PREVIEW_CHARS)
            ),
        )?;

        // Cancellation is cooperative: a running tool is never dropped
        let mut outcome = match invocation.execute(cancel).await {
            Ok(result) => ToolCallOutcome::from_result(request, result),
            Err(e) => ToolCallOutcome::failure(request, e.to_string()),
        };
        // A tool that gave up after noticing the token is not a tool failure
        outcome.cancelled = !outcome.succeeded && cancel.is_cancelled();
        Ok(outcome)
    }
}

/// Concatenate outcome responses, in order, into the next user message
pub fn outcomes_to_message(outcomes: Vec<ToolCallOutcome>) -> Message {
    Message::tool_responses(
        outcomes
            .into_iter()
            .flat_map(|outcome| outcome.response_parts)
            .collect(),
    )
}

/// Copy of `args` with large free-form fields replaced by a size summary
pub fn redact_args(args: &Value) -> Value {
    match args {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| {
                    let redacted = match value {
                        Value::String(text) if REDACTED_FIELDS.contains(&key.as_str()) => {
                            Value::String(format!(
                                "<{} lines, {} chars>",
                                text.lines().count(),
                                text.chars().count()
                            ))
                        }
                        other => redact_args(other),
                    };
                    (key.clone(), redacted)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_args).collect()),
        other => other.clone(),
    }
}

/// Truncate a preview line with ellipsis, on a char boundary
fn truncate_preview(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars.saturating_sub(3)) {
        Some((cut, _)) if s.chars().count() > max_chars => format!("{}...", &s[..cut]),
        _ => s.to_string(),
    }
}
