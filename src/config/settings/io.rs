// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::path::{Path, PathBuf};

use crate::error::Result;

use super::Settings;

impl Settings {
    /// Get the default settings file path.
    pub fn default_path() -> PathBuf {
        Self::home().join("settings.json")
    }

    /// Load settings from the default path and apply environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_at(None)
    }

    /// Like [`Settings::load`], reading `path` instead when given.
    pub fn load_at(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::load_from(path)?,
            None => Self::load_from(&Self::default_path())?,
        };
        settings.apply_env_overrides(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a specific path. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the agentloop home directory (~/.agentloop or $AGENTLOOP_HOME).
    pub fn home() -> PathBuf {
        if let Ok(home) = std::env::var("AGENTLOOP_HOME") {
            return PathBuf::from(home);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".agentloop")
    }

    /// Get the default checkpoints directory.
    pub fn checkpoints_dir() -> PathBuf {
        Self::home().join("checkpoints")
    }
}
