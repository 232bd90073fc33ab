// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Message types for model interactions
//!
//! A conversation is an ordered list of [`Message`]s, each made of ordered
//! [`Part`]s. These are the values persisted in checkpoints, so every type
//! here round-trips through serde unchanged.

use serde::{Deserialize, Serialize};

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: Role,

    /// Ordered content of the message
    pub parts: Vec<Part>,
}

/// Role of the message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User (or tool results fed back on the user's behalf)
    User,
    /// Model response
    Model,
}

/// A single piece of message content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    /// Text fragment
    Text { text: String },

    /// Inline binary payload, e.g. an image
    InlineData(InlineData),

    /// Tool call requested by the model
    ToolCall {
        id: String,
        name: String,
        args: serde_json::Value,
    },

    /// Tool response fed back to the model
    ToolResponse {
        id: String,
        name: String,
        response: serde_json::Value,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        attachments: Vec<InlineData>,
    },
}

/// Base64-encoded binary content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineData {
    pub mime_type: String, // "image/png", "application/pdf", etc.
    pub data: String,      // base64 encoded
}

/// A tool call as emitted by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub args: serde_json::Value,
}

impl Part {
    /// Create a text part
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    /// Get the text if this is a text part
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } => Some(text),
            _ => None,
        }
    }
}

impl Message {
    /// Create a new user message with a single text part
    pub fn user(content: impl Into<String>) -> Self {
        Self::user_parts(vec![Part::text(content)])
    }

    /// Create a user message from parts
    pub fn user_parts(parts: Vec<Part>) -> Self {
        Self {
            role: Role::User,
            parts,
        }
    }

    /// Create a new model message with a single text part
    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part::text(content)],
        }
    }

    /// Build the model's side of a turn: streamed text first, then the
    /// tool calls it requested, in request order.
    pub fn model_turn(text: &str, tool_calls: &[ToolCallRequest]) -> Self {
        let mut parts = Vec::with_capacity(tool_calls.len() + 1);
        if !text.is_empty() {
            parts.push(Part::text(text));
        }
        parts.extend(tool_calls.iter().map(|call| Part::ToolCall {
            id: call.id.clone(),
            name: call.name.clone(),
            args: call.args.clone(),
        }));
        Self {
            role: Role::Model,
            parts,
        }
    }

    /// Create the user message carrying tool responses
    pub fn tool_responses(parts: Vec<Part>) -> Self {
        Self::user_parts(parts)
    }

    /// Concatenated text of all text parts
    pub fn text(&self) -> String {
        self.parts.iter().filter_map(Part::as_text).collect()
    }

    /// Check if message has any tool call
    pub fn has_tool_calls(&self) -> bool {
        self.parts
            .iter()
            .any(|part| matches!(part, Part::ToolCall { .. }))
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Model => write!(f, "model"),
        }
    }
}
