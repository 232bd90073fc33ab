// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Model service trait and stream event types
//!
//! The model service hands back raw `{type, value}` chunks. The turn loop
//! classifies each one into a [`StreamEvent`] before acting on it.

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::llm::message::{Message, ToolCallRequest};

/// Stream of raw events produced by a single model invocation
pub type RawEventStream = Pin<Box<dyn Stream<Item = Result<RawStreamEvent>> + Send>>;

/// Main trait for model services
#[async_trait]
pub trait ModelService: Send + Sync {
    /// Get the service name (e.g., "scripted", "gemini")
    fn name(&self) -> &str;

    /// Start one model turn over the given conversation.
    ///
    /// Every stream returned for a call that is not cancelled must terminate.
    async fn stream_turn(
        &self,
        messages: &[Message],
        cancel: &CancellationToken,
    ) -> Result<RawEventStream>;
}

/// An unclassified chunk from the model service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawStreamEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub value: Value,
}

impl RawStreamEvent {
    pub fn new(kind: impl Into<String>, value: Value) -> Self {
        Self {
            kind: kind.into(),
            value,
        }
    }
}

/// Classified stream event
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// User-facing content token
    Content(String),

    /// The model wants a tool to run
    ToolCallRequest(ToolCallRequest),

    /// Model narration of what it is thinking about
    Thought { subject: String, description: String },

    /// The service retried the request
    Retry,

    /// Conversation context was compressed by the service
    ContextCompressed { before_tokens: u64, after_tokens: u64 },

    /// The service refused to start another turn
    TurnLimitReached,

    /// The context window cannot fit the request
    TokenLimitExceeded(String),

    /// Generation finished for the given reason
    Finished(FinishReason),

    /// The service detected a repetitive loop
    LoopDetected,

    /// Generation failed
    Error(String),

    /// Unrecognised chunk, dropped
    Ignored { kind: String },
}

/// Why generation finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinishReason {
    FinishReasonUnspecified,
    Stop,
    MaxTokens,
    Safety,
    Recitation,
    Language,
    Other,
    Blocklist,
    ProhibitedContent,
    Spii,
    MalformedFunctionCall,
    ImageSafety,
    UnexpectedToolCall,
    #[serde(other)]
    Unknown,
}

impl FinishReason {
    /// Parse a wire reason, falling back to `Unknown`
    pub fn parse(reason: &str) -> Self {
        serde_json::from_value(Value::String(reason.trim().to_ascii_uppercase()))
            .unwrap_or(FinishReason::Unknown)
    }

    /// Wire name of the reason
    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::FinishReasonUnspecified => "FINISH_REASON_UNSPECIFIED",
            FinishReason::Stop => "STOP",
            FinishReason::MaxTokens => "MAX_TOKENS",
            FinishReason::Safety => "SAFETY",
            FinishReason::Recitation => "RECITATION",
            FinishReason::Language => "LANGUAGE",
            FinishReason::Other => "OTHER",
            FinishReason::Blocklist => "BLOCKLIST",
            FinishReason::ProhibitedContent => "PROHIBITED_CONTENT",
            FinishReason::Spii => "SPII",
            FinishReason::MalformedFunctionCall => "MALFORMED_FUNCTION_CALL",
            FinishReason::ImageSafety => "IMAGE_SAFETY",
            FinishReason::UnexpectedToolCall => "UNEXPECTED_TOOL_CALL",
            FinishReason::Unknown => "UNKNOWN",
        }
    }

    /// Human-readable advisory for reasons worth surfacing
    pub fn advisory(&self) -> Option<&'static str> {
        match self {
            FinishReason::FinishReasonUnspecified | FinishReason::Stop | FinishReason::Unknown => {
                None
            }
            FinishReason::MaxTokens => Some("Response truncated due to token limits."),
            FinishReason::Safety => Some("Response stopped due to safety reasons."),
            FinishReason::Recitation => Some("Response stopped due to recitation policy."),
            FinishReason::Language => Some("Response stopped due to unsupported language."),
            FinishReason::Blocklist => Some("Response stopped due to forbidden terms."),
            FinishReason::ProhibitedContent => {
                Some("Response stopped due to prohibited content.")
            }
            FinishReason::Spii => Some(
                "Response stopped due to sensitive personally identifiable information.",
            ),
            FinishReason::Other => Some("Response stopped for other reasons."),
            FinishReason::MalformedFunctionCall => {
                Some("Response stopped due to malformed function call.")
            }
            FinishReason::ImageSafety => Some("Response stopped due to image safety violations."),
            FinishReason::UnexpectedToolCall => {
                Some("Response stopped due to unexpected tool call.")
            }
        }
    }

    /// Reasons that indicate the content itself was blocked
    pub fn is_safety_stop(&self) -> bool {
        matches!(
            self,
            FinishReason::Safety
                | FinishReason::ImageSafety
                | FinishReason::ProhibitedContent
                | FinishReason::Blocklist
                | FinishReason::Spii
        )
    }
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<StreamEvent> for RawStreamEvent {
    fn from(event: StreamEvent) -> Self {
        match event {
            StreamEvent::Content(text) => RawStreamEvent::new("content", Value::String(text)),
            StreamEvent::ToolCallRequest(call) => RawStreamEvent::new(
                "tool_call_request",
                json!({"id": call.id, "name": call.name, "args": call.args}),
            ),
            StreamEvent::Thought {
                subject,
                description,
            } => RawStreamEvent::new(
                "thought",
                json!({"subject": subject, "description": description}),
            ),
            StreamEvent::Retry => RawStreamEvent::new("retry", Value::Null),
            StreamEvent::ContextCompressed {
                before_tokens,
                after_tokens,
            } => RawStreamEvent::new(
                "chat_compressed",
                json!({
                    "original_token_count": before_tokens,
                    "new_token_count": after_tokens,
                }),
            ),
            StreamEvent::TurnLimitReached => RawStreamEvent::new("max_session_turns", Value::Null),
            StreamEvent::TokenLimitExceeded(message) => {
                RawStreamEvent::new("token_limit_exceeded", json!({"message": message}))
            }
            StreamEvent::Finished(reason) => {
                RawStreamEvent::new("finished", Value::String(reason.as_str().to_string()))
            }
            StreamEvent::LoopDetected => RawStreamEvent::new("loop_detected", Value::Null),
            StreamEvent::Error(message) => {
                RawStreamEvent::new("error", json!({"message": message}))
            }
            StreamEvent::Ignored { kind } => RawStreamEvent::new(kind, Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_reason_parse() {
        assert_eq!(FinishReason::parse("STOP"), FinishReason::Stop);
        assert_eq!(FinishReason::parse("max_tokens"), FinishReason::MaxTokens);
        assert_eq!(
            FinishReason::parse("MALFORMED_FUNCTION_CALL"),
            FinishReason::MalformedFunctionCall
        );
        assert_eq!(FinishReason::parse("NOT_A_REASON"), FinishReason::Unknown);
        assert_eq!(FinishReason::parse(""), FinishReason::Unknown);
    }

    #[test]
    fn test_finish_reason_advisories() {
        assert!(FinishReason::Stop.advisory().is_none());
        assert!(FinishReason::FinishReasonUnspecified.advisory().is_none());
        assert_eq!(
            FinishReason::MaxTokens.advisory(),
            Some("Response truncated due to token limits.")
        );
        assert!(FinishReason::Recitation
            .advisory()
            .unwrap()
            .contains("recitation"));
    }

    #[test]
    fn test_safety_class() {
        assert!(FinishReason::Safety.is_safety_stop());
        assert!(FinishReason::Spii.is_safety_stop());
        assert!(!FinishReason::MaxTokens.is_safety_stop());
        assert!(!FinishReason::Stop.is_safety_stop());
    }

    #[test]
    fn test_as_str_matches_parse() {
        for reason in [
            FinishReason::Stop,
            FinishReason::Safety,
            FinishReason::ImageSafety,
            FinishReason::UnexpectedToolCall,
        ] {
            assert_eq!(FinishReason::parse(reason.as_str()), reason);
        }
    }

    #[test]
    fn test_raw_event_deserializes_without_value() {
        let raw: RawStreamEvent = serde_json::from_str(r#"{"type":"retry"}"#).unwrap();
        assert_eq!(raw.kind, "retry");
        assert!(raw.value.is_null());
    }

    #[test]
    fn test_encode_content_event() {
        let raw = RawStreamEvent::from(StreamEvent::Content("hi".to_string()));
        assert_eq!(raw.kind, "content");
        assert_eq!(raw.value, Value::String("hi".to_string()));
    }
}
