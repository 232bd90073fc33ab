// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! File read tool
//!
//! Reads contents of a file with line numbers.

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use crate::error::{AgentError, Result};
use crate::tools::{SchemaBuilder, Tool, ToolDefinition, ToolInvocation, ToolResult};

use super::resolve_within;

const DEFAULT_LIMIT: usize = 2000;
const MAX_LINE_CHARS: usize = 500;

/// Tool for reading file contents
pub struct ReadFileTool {
    root: PathBuf,
}

impl ReadFileTool {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "read_file".to_string(),
            description: "Read the contents of a file. Returns the file contents with line numbers."
                .to_string(),
            input_schema: SchemaBuilder::new()
                .string("path", "Path to the file, relative to the working directory", true)
                .integer("offset", "Line number to start reading from (1-indexed, default: 1)", false)
                .integer("limit", "Maximum number of lines to read (default: 2000)", false)
                .build(),
        }
    }

    fn build(&self, args: &Value) -> Result<Box<dyn ToolInvocation>> {
        self.definition().input_schema.check(args)?;

        let path = args["path"].as_str().unwrap_or_default().to_string();
        // Out-of-range counts saturate; the read clamps them to the file
        let offset = args["offset"]
            .as_u64()
            .map_or(1, |o| usize::try_from(o).unwrap_or(usize::MAX))
            .max(1);
        let limit = args["limit"]
            .as_u64()
            .map_or(DEFAULT_LIMIT, |l| usize::try_from(l).unwrap_or(usize::MAX));

        Ok(Box::new(ReadFile {
            root: self.root.clone(),
            path,
            offset,
            limit,
        }))
    }
}

struct ReadFile {
    root: PathBuf,
    path: String,
    offset: usize,
    limit: usize,
}

#[async_trait]
impl ToolInvocation for ReadFile {
    fn description(&self) -> String {
        if self.offset > 1 || self.limit != DEFAULT_LIMIT {
            format!(
                "Read {} (lines {}-{})",
                self.path,
                self.offset,
                self.offset.saturating_add(self.limit.saturating_sub(1))
            )
        } else {
            format!("Read {}", self.path)
        }
    }

    async fn execute(&self, cancel: &CancellationToken) -> Result<ToolResult> {
        if cancel.is_cancelled() {
            return Ok(ToolResult::error("Cancelled by user"));
        }

        let path = resolve_within(&self.root, &self.path)?;
        if !path.is_file() {
            return Ok(ToolResult::error(format!("Not a file: {}", self.path)));
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| AgentError::ToolExecution(format!("Failed to read {}: {}", self.path, e)))?;

        let lines: Vec<&str> = content.lines().collect();
        let start = (self.offset - 1).min(lines.len());
        let end = start.saturating_add(self.limit).min(lines.len());

        let mut output = String::new();
        for (i, line) in lines[start..end].iter().enumerate() {
            let line = match line.char_indices().nth(MAX_LINE_CHARS) {
                Some((cut, _)) => format!("{}... (truncated)", &line[..cut]),
                None => line.to_string(),
            };
            output.push_str(&format!("{:>6}\t{}\n", start + i + 1, line));
        }

        let display = format!("{} lines of {}", end - start, lines.len());
        Ok(ToolResult::success(output).with_display(display))
    }
}
