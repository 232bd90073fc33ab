// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings management for agentloop
//!
//! Handles loading and saving settings from ~/.agentloop/settings.json.
//! Settings are resolved once at startup (file, then environment overrides)
//! and handed to the session by value; nothing re-reads them mid-session.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

mod io;
mod validation;

pub use validation::{ENV_AUTO_CHECKPOINT, ENV_MAX_TURNS};

/// Main settings structure, stored in ~/.agentloop/settings.json
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    /// Turn loop behaviour
    #[serde(default)]
    pub session: SessionConfig,

    /// Appearance settings
    #[serde(default)]
    pub appearance: AppearanceConfig,

    /// Checkpoint storage settings
    #[serde(default)]
    pub checkpoints: CheckpointConfig,
}

/// Turn loop configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// Maximum model turns per session (-1 = unlimited)
    #[serde(default = "default_max_turns")]
    pub max_turns: i32,

    /// Save a checkpoint when a session completes normally
    #[serde(default)]
    pub auto_checkpoint: bool,

    /// Tag for automatic checkpoints (generated when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_tag: Option<String>,

    /// Drop pending tool calls when the model stops for a safety reason
    #[serde(default)]
    pub suppress_tools_on_safety_stop: bool,

    /// Write failed tool calls to diagnostics
    #[serde(default = "default_true")]
    pub report_tool_errors: bool,
}

/// Appearance settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppearanceConfig {
    /// When to colorize diagnostic output
    #[serde(default)]
    pub color: ColorChoice,
}

/// Color mode for diagnostic output
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ColorChoice {
    /// Color when writing to a terminal
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    /// Whether to emit color given the target's terminal status
    pub fn enabled(&self, is_terminal: bool) -> bool {
        match self {
            ColorChoice::Auto => is_terminal,
            ColorChoice::Always => true,
            ColorChoice::Never => false,
        }
    }
}

/// Checkpoint storage settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CheckpointConfig {
    /// Custom checkpoint directory (defaults to ~/.agentloop/checkpoints)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

impl CheckpointConfig {
    /// Get the effective checkpoint directory
    pub fn directory(&self) -> PathBuf {
        self.directory
            .clone()
            .unwrap_or_else(Settings::checkpoints_dir)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            auto_checkpoint: false,
            checkpoint_tag: None,
            suppress_tools_on_safety_stop: false,
            report_tool_errors: true,
        }
    }
}

fn default_max_turns() -> i32 {
    -1
}

fn default_true() -> bool {
    true
}
