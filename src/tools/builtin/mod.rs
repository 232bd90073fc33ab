// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Built-in tools for agentloop
//!
//! Both tools are read-only and confined to the directory they were created
//! with.

mod list_dir;
mod read_file;

pub use list_dir::ListDirTool;
pub use read_file::ReadFileTool;

use std::path::{Path, PathBuf};

use crate::error::{AgentError, Result};

/// Resolve `path` against `root`, refusing anything that lands outside it.
pub(crate) fn resolve_within(root: &Path, path: &str) -> Result<PathBuf> {
    let candidate = if Path::new(path).is_absolute() {
        PathBuf::from(path)
    } else {
        root.join(path)
    };

    let resolved = candidate
        .canonicalize()
        .map_err(|_| AgentError::InvalidInput(format!("Path not found: {}", path)))?;
    let root = root.canonicalize()?;

    if !resolved.starts_with(&root) {
        return Err(AgentError::InvalidInput(format!(
            "Path is outside the working directory: {}",
            path
        )));
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_relative() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("a.txt"), "a").unwrap();

        let resolved = resolve_within(temp_dir.path(), "a.txt").unwrap();
        assert!(resolved.ends_with("a.txt"));
    }

    #[test]
    fn test_resolve_missing() {
        let temp_dir = TempDir::new().unwrap();
        let err = resolve_within(temp_dir.path(), "missing.txt").unwrap_err();
        assert!(err.to_string().contains("Path not found"));
    }

    #[test]
    fn test_resolve_escape_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let inner = temp_dir.path().join("inner");
        std::fs::create_dir(&inner).unwrap();

        let err = resolve_within(&inner, "..").unwrap_err();
        assert!(err.to_string().contains("outside the working directory"));
    }
}
