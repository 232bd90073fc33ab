// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use crate::error::{AgentError, Result};

use super::{ColorChoice, Settings};

/// Overrides `session.max_turns`
pub const ENV_MAX_TURNS: &str = "AGENTLOOP_MAX_TURNS";
/// Overrides `session.auto_checkpoint`
pub const ENV_AUTO_CHECKPOINT: &str = "AGENTLOOP_AUTO_CHECKPOINT";
const ENV_NO_COLOR: &str = "NO_COLOR";

impl Settings {
    /// Apply environment overrides.
    ///
    /// `lookup` abstracts the environment so tests don't mutate process state.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_MAX_TURNS) {
            self.session.max_turns = raw.trim().parse().map_err(|_| {
                AgentError::Config(format!("{} must be an integer, got '{}'", ENV_MAX_TURNS, raw))
            })?;
        }

        if let Some(raw) = lookup(ENV_AUTO_CHECKPOINT) {
            self.session.auto_checkpoint = parse_bool(&raw).ok_or_else(|| {
                AgentError::Config(format!(
                    "{} must be true/false/1/0, got '{}'",
                    ENV_AUTO_CHECKPOINT, raw
                ))
            })?;
        }

        // https://no-color.org: any non-empty value disables color
        if lookup(ENV_NO_COLOR).is_some_and(|v| !v.is_empty()) {
            self.appearance.color = ColorChoice::Never;
        }

        Ok(())
    }

    /// Reject settings the session cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.session.max_turns < -1 {
            return Err(AgentError::Config(format!(
                "session.max_turns must be -1 (unlimited) or >= 0, got {}",
                self.session.max_turns
            )));
        }

        if let Some(tag) = &self.session.checkpoint_tag {
            if tag.trim().is_empty() {
                return Err(AgentError::Config(
                    "session.checkpoint_tag must not be blank".to_string(),
                ));
            }
        }

        Ok(())
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
