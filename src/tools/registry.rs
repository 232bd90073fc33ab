// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! In-memory tool registry

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::Result;

use super::{builtin, Tool, ToolRegistry};

/// Registry of tools held in memory
#[derive(Default)]
pub struct InMemoryToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    /// Aliases mapping alternate names to canonical tool names
    aliases: HashMap<String, String>,
}

impl InMemoryToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in tools rooted at `root`
    pub fn with_builtins(root: &Path) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(builtin::ListDirTool::new(root)));
        registry.register(Arc::new(builtin::ReadFileTool::new(root)));

        registry.alias("ls", "list_dir");
        registry.alias("cat", "read_file");
        registry.alias("file_read", "read_file");

        registry
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Add an alternate name for a registered tool
    pub fn alias(&mut self, alias: &str, canonical: &str) {
        self.aliases
            .insert(alias.to_string(), canonical.to_string());
    }

    /// Resolve an alias to the canonical tool name
    pub fn resolve_alias<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(|s| s.as_str()).unwrap_or(name)
    }
}

impl ToolRegistry for InMemoryToolRegistry {
    fn get(&self, name: &str) -> Result<Option<Arc<dyn Tool>>> {
        // Direct names take precedence over aliases
        let tool = self
            .tools
            .get(name)
            .or_else(|| self.tools.get(self.resolve_alias(name)));
        Ok(tool.cloned())
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        self.tools.values().cloned().collect()
    }
}
