// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool system for agentloop
//!
//! The turn loop knows a tool only by its name, its declared schema and a
//! uniform two-step contract: [`Tool::build`] validates arguments into a
//! [`ToolInvocation`], which can describe itself for the plan preview and
//! then execute. Tools are looked up through a [`ToolRegistry`].

pub mod builtin;
pub mod definition;
pub mod executor;
pub mod registry;

pub use definition::*;
pub use executor::*;
pub use registry::InMemoryToolRegistry;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::llm::message::InlineData;

/// Result of tool execution
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    /// The output of the tool
    pub output: ToolOutput,
    /// Short human-readable rendering of the result
    pub display: Option<String>,
    /// Binary payloads returned alongside the output
    pub attachments: Vec<InlineData>,
}

/// Output from a tool
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// Successful output
    Success(String),
    /// Error output
    Error(String),
}

impl ToolResult {
    /// Create a successful result
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: ToolOutput::Success(output.into()),
            display: None,
            attachments: Vec::new(),
        }
    }

    /// Create an error result
    pub fn error(error: impl Into<String>) -> Self {
        Self {
            output: ToolOutput::Error(error.into()),
            display: None,
            attachments: Vec::new(),
        }
    }

    /// Attach a display string
    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    /// Check if this is an error
    pub fn is_error(&self) -> bool {
        matches!(self.output, ToolOutput::Error(_))
    }

    /// Get the output text
    pub fn output_text(&self) -> &str {
        match &self.output {
            ToolOutput::Success(s) => s,
            ToolOutput::Error(s) => s,
        }
    }
}

/// Trait for implementing tools
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool name
    fn name(&self) -> &str;

    /// Get the tool definition advertised to the model
    fn definition(&self) -> ToolDefinition;

    /// Validate arguments and prepare an invocation
    fn build(&self, args: &Value) -> Result<Box<dyn ToolInvocation>>;

    /// Release resources held by the tool. Called once when the session ends.
    async fn release(&self) -> Result<()> {
        Ok(())
    }
}

/// A validated, ready-to-run tool call
#[async_trait]
pub trait ToolInvocation: Send + Sync {
    /// One-line description of what this invocation will do
    fn description(&self) -> String;

    /// Run the invocation
    async fn execute(&self, cancel: &CancellationToken) -> Result<ToolResult>;
}

/// Source of tools for a session
pub trait ToolRegistry: Send + Sync {
    /// Look up a tool by name. `Ok(None)` means no such tool; `Err` means the
    /// registry itself could not be consulted.
    fn get(&self, name: &str) -> Result<Option<Arc<dyn Tool>>>;

    /// All registered tools
    fn tools(&self) -> Vec<Arc<dyn Tool>>;
}
