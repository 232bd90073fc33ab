// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Stream event classification
//!
//! Maps raw model-stream chunks to typed [`StreamEvent`]s. Classification is
//! total: a chunk with an unknown type or an unexpected payload becomes
//! [`StreamEvent::Ignored`] so one malformed chunk cannot end a session.
//! Error chunks are the exception and always classify as errors.

use serde_json::Value;

use crate::error::Result;
use crate::llm::message::ToolCallRequest;
use crate::llm::provider::{FinishReason, RawStreamEvent, StreamEvent};

const UNKNOWN_ERROR: &str = "unknown model error";

/// Classify one raw chunk
pub fn classify(raw: RawStreamEvent) -> StreamEvent {
    let RawStreamEvent { kind, value } = raw;

    let classified = match kind.as_str() {
        "content" => value.as_str().map(|text| StreamEvent::Content(text.to_string())),
        "tool_call_request" => classify_tool_call(&value),
        "thought" => classify_thought(&value),
        "retry" => Some(StreamEvent::Retry),
        "chat_compressed" => classify_compression(&value),
        "max_session_turns" => Some(StreamEvent::TurnLimitReached),
        "token_limit_exceeded" | "context_window_will_overflow" => {
            message_of(&value).map(StreamEvent::TokenLimitExceeded)
        }
        "finished" => classify_finished(&value),
        "loop_detected" => Some(StreamEvent::LoopDetected),
        // An error chunk always ends the turn, even without a readable message
        "error" => Some(StreamEvent::Error(
            message_of(&value).unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
        )),
        _ => None,
    };

    classified.unwrap_or_else(|| {
        tracing::debug!(
            target: "agentloop.chat.streaming",
            kind = %kind,
            "ignoring unrecognised stream chunk"
        );
        StreamEvent::Ignored { kind }
    })
}

/// Classify a stream item, turning transport errors into `Error` events
pub fn classify_item(item: Result<RawStreamEvent>) -> StreamEvent {
    match item {
        Ok(raw) => classify(raw),
        Err(e) => StreamEvent::Error(e.to_string()),
    }
}

fn classify_tool_call(value: &Value) -> Option<StreamEvent> {
    let name = value.get("name")?.as_str()?.trim();
    if name.is_empty() {
        return None;
    }

    let id = value
        .get("id")
        .or_else(|| value.get("callId"))
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));

    let args = match value.get("args") {
        None | Some(Value::Null) => Value::Object(serde_json::Map::new()),
        Some(args) => args.clone(),
    };

    Some(StreamEvent::ToolCallRequest(ToolCallRequest {
        id,
        name: name.to_string(),
        args,
    }))
}

fn classify_thought(value: &Value) -> Option<StreamEvent> {
    let subject = value.get("subject").and_then(Value::as_str);
    let description = value.get("description").and_then(Value::as_str);
    if subject.is_none() && description.is_none() {
        return None;
    }
    Some(StreamEvent::Thought {
        subject: subject.unwrap_or_default().to_string(),
        description: description.unwrap_or_default().to_string(),
    })
}

fn classify_compression(value: &Value) -> Option<StreamEvent> {
    let before = value.get("original_token_count")?.as_u64()?;
    let after = value.get("new_token_count")?.as_u64()?;
    Some(StreamEvent::ContextCompressed {
        before_tokens: before,
        after_tokens: after,
    })
}

fn classify_finished(value: &Value) -> Option<StreamEvent> {
    let reason = match value {
        Value::String(reason) => reason.as_str(),
        Value::Object(map) => map.get("reason")?.as_str()?,
        _ => return None,
    };
    Some(StreamEvent::Finished(FinishReason::parse(reason)))
}

/// Accept either a bare string or `{"message": "..."}`
fn message_of(value: &Value) -> Option<String> {
    match value {
        Value::String(message) => Some(message.clone()),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}
