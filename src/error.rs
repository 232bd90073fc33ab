// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for agentloop
//!
//! Only orchestration-level failures are represented here. Model-reported
//! generation errors and individual tool failures never become an
//! `AgentError`; they are turned into diagnostics and terminal states.

use thiserror::Error;

/// Main error type for agentloop operations
#[derive(Error, Debug)]
pub enum AgentError {
    /// Model service errors
    #[error("Model service error: {0}")]
    Model(#[from] ModelError),

    /// The session exceeded its configured turn budget
    #[error(
        "Reached max session turns ({max_turns}) for this session. \
         Increase the number of turns by setting session.max_turns in settings.json."
    )]
    TurnLimitExceeded { max_turns: i32 },

    /// The tool registry could not be consulted
    #[error("Tool registry error: {0}")]
    ToolRegistry(String),

    /// Tool execution errors
    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    /// Checkpoint storage errors
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The downstream reader of primary output went away
    #[error("Output stream closed")]
    OutputClosed,

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Model-service specific error types
#[derive(Error, Debug)]
pub enum ModelError {
    /// Network connectivity error
    #[error("Network error: {0}")]
    Network(String),

    /// Streaming error
    #[error("Streaming error: {0}")]
    StreamError(String),

    /// Scripted service could not be loaded
    #[error("Invalid script: {0}")]
    InvalidScript(String),
}

impl AgentError {
    /// Whether this error belongs to the "bad input" category, reported
    /// before any model call is made.
    pub fn is_input_error(&self) -> bool {
        matches!(self, AgentError::InvalidInput(_))
    }
}

/// Result type alias for agentloop operations
pub type Result<T> = std::result::Result<T, AgentError>;
