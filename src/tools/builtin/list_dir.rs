// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Directory listing tool

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::tools::{SchemaBuilder, Tool, ToolDefinition, ToolInvocation, ToolResult};

use super::resolve_within;

/// Tool for listing a directory's entries
pub struct ListDirTool {
    root: PathBuf,
}

impl ListDirTool {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "list_dir".to_string(),
            description: "List the entries of a directory. Directories are suffixed with '/'."
                .to_string(),
            input_schema: SchemaBuilder::new()
                .string("path", "Directory to list (default: working directory)", false)
                .boolean("hidden", "Include entries starting with '.' (default: false)", false)
                .build(),
        }
    }

    fn build(&self, args: &Value) -> Result<Box<dyn ToolInvocation>> {
        self.definition().input_schema.check(args)?;

        Ok(Box::new(ListDir {
            root: self.root.clone(),
            path: args["path"].as_str().unwrap_or(".").to_string(),
            hidden: args["hidden"].as_bool().unwrap_or(false),
        }))
    }
}

struct ListDir {
    root: PathBuf,
    path: String,
    hidden: bool,
}

#[async_trait]
impl ToolInvocation for ListDir {
    fn description(&self) -> String {
        format!("List {}", self.path)
    }

    async fn execute(&self, cancel: &CancellationToken) -> Result<ToolResult> {
        let dir = resolve_within(&self.root, &self.path)?;
        if !dir.is_dir() {
            return Ok(ToolResult::error(format!("Not a directory: {}", self.path)));
        }

        let mut entries = Vec::new();
        let mut reader = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = reader.next_entry().await? {
            if cancel.is_cancelled() {
                return Ok(ToolResult::error("Cancelled by user"));
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if !self.hidden && name.starts_with('.') {
                continue;
            }
            if entry.file_type().await?.is_dir() {
                entries.push(format!("{}/", name));
            } else {
                entries.push(name);
            }
        }
        entries.sort();

        let display = format!("{} entries", entries.len());
        let output = if entries.is_empty() {
            "(empty directory)".to_string()
        } else {
            entries.join("\n")
        };
        Ok(ToolResult::success(output).with_display(display))
    }
}
