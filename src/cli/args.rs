// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI argument definitions using Clap
//!
//! Defines all command-line arguments and subcommands for agentloop.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::chat::SessionOptions;
use crate::config::ColorChoice;

/// agentloop - run a tool-using model session to completion
#[derive(Parser, Debug)]
#[command(name = "agentloop")]
#[command(version, about = "Run a tool-using model session to completion")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Working directory (defaults to current)
    #[arg(short = 'C', long, global = true)]
    pub directory: Option<PathBuf>,

    /// Settings file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// When to color diagnostics
    #[arg(long, global = true)]
    pub color: Option<ColorArg>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one task session
    Run(RunArgs),

    /// Checkpoint management
    #[command(alias = "cp")]
    Checkpoints(CheckpointsArgs),
}

/// Arguments for the run subcommand
#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// The task prompt; `@path` pulls in file contents
    pub prompt: String,

    /// JSONL file scripting the model's turns
    #[arg(long, value_name = "FILE")]
    pub script: PathBuf,

    /// Maximum model turns (-1 for unlimited)
    #[arg(long, allow_negative_numbers = true)]
    pub max_turns: Option<i32>,

    /// Continue from a saved checkpoint
    #[arg(long, value_name = "TAG")]
    pub resume: Option<String>,

    /// Save a checkpoint when the session finishes
    #[arg(long)]
    pub checkpoint: bool,

    /// Tag for the saved checkpoint (implies --checkpoint)
    #[arg(long, value_name = "TAG")]
    pub tag: Option<String>,

    /// Drop pending tool calls when generation stops for safety
    #[arg(long)]
    pub suppress_tools_on_safety_stop: bool,
}

impl RunArgs {
    /// Layer the command-line flags over options resolved from settings
    pub fn apply_to(&self, options: &mut SessionOptions) {
        if let Some(max_turns) = self.max_turns {
            options.max_turns = max_turns;
        }
        if self.resume.is_some() {
            options.resume_tag = self.resume.clone();
        }
        if self.checkpoint || self.tag.is_some() {
            options.auto_checkpoint = true;
        }
        if self.tag.is_some() {
            options.checkpoint_tag = self.tag.clone();
        }
        if self.suppress_tools_on_safety_stop {
            options.suppress_tools_on_safety_stop = true;
        }
    }
}

/// Arguments for the checkpoints subcommand
#[derive(clap::Args, Debug)]
pub struct CheckpointsArgs {
    #[command(subcommand)]
    pub command: CheckpointCommands,
}

/// Checkpoint subcommands
#[derive(Subcommand, Debug)]
pub enum CheckpointCommands {
    /// List saved checkpoints, newest first
    List,

    /// Show the conversation stored in a checkpoint
    Show {
        /// Checkpoint tag
        tag: String,
    },

    /// Delete a checkpoint
    Delete {
        /// Checkpoint tag
        tag: String,
    },
}

/// Color mode flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorArg {
    Auto,
    Always,
    Never,
}

impl From<ColorArg> for ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => ColorChoice::Auto,
            ColorArg::Always => ColorChoice::Always,
            ColorArg::Never => ColorChoice::Never,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn run_args(cli: Cli) -> RunArgs {
        match cli.command {
            Commands::Run(args) => args,
            other => panic!("Expected Run command, got {:?}", other),
        }
    }

    // ==================== CLI Global Arguments ====================

    #[test]
    fn test_cli_requires_command() {
        assert!(Cli::try_parse_from(["agentloop"]).is_err());
    }

    #[test]
    fn test_cli_verbose_multiple() {
        let cli = Cli::parse_from(["agentloop", "-vv", "checkpoints", "list"]);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_cli_directory_after_subcommand() {
        let cli = Cli::parse_from([
            "agentloop", "run", "hi", "--script", "s.jsonl", "-C", "/some/path",
        ]);
        assert_eq!(cli.directory, Some(PathBuf::from("/some/path")));
    }

    #[test]
    fn test_cli_color() {
        let cli = Cli::parse_from(["agentloop", "--color", "never", "checkpoints", "list"]);
        assert_eq!(cli.color.map(ColorChoice::from), Some(ColorChoice::Never));
    }

    // ==================== Run Command ====================

    #[test]
    fn test_run_minimal() {
        let args = run_args(Cli::parse_from([
            "agentloop",
            "run",
            "list the files",
            "--script",
            "turns.jsonl",
        ]));
        assert_eq!(args.prompt, "list the files");
        assert_eq!(args.script, PathBuf::from("turns.jsonl"));
        assert!(args.max_turns.is_none());
        assert!(!args.checkpoint);
    }

    #[test]
    fn test_run_requires_script() {
        assert!(Cli::try_parse_from(["agentloop", "run", "hi"]).is_err());
    }

    #[test]
    fn test_run_unlimited_turns() {
        let args = run_args(Cli::parse_from([
            "agentloop",
            "run",
            "hi",
            "--script",
            "s.jsonl",
            "--max-turns",
            "-1",
        ]));
        assert_eq!(args.max_turns, Some(-1));
    }

    #[test]
    fn test_apply_overrides_settings() {
        let args = run_args(Cli::parse_from([
            "agentloop",
            "run",
            "hi",
            "--script",
            "s.jsonl",
            "--max-turns",
            "3",
            "--resume",
            "old",
            "--tag",
            "new",
        ]));
        let mut options = SessionOptions::default();
        args.apply_to(&mut options);

        assert_eq!(options.max_turns, 3);
        assert_eq!(options.resume_tag.as_deref(), Some("old"));
        assert!(options.auto_checkpoint);
        assert_eq!(options.checkpoint_tag.as_deref(), Some("new"));
    }

    #[test]
    fn test_apply_keeps_settings_when_unset() {
        let args = run_args(Cli::parse_from(["agentloop", "run", "hi", "--script", "s.jsonl"]));
        let mut options = SessionOptions {
            max_turns: 7,
            auto_checkpoint: true,
            ..SessionOptions::default()
        };
        args.apply_to(&mut options);

        assert_eq!(options.max_turns, 7);
        assert!(options.auto_checkpoint);
        assert!(options.resume_tag.is_none());
    }

    // ==================== Checkpoints Command ====================

    #[test]
    fn test_checkpoints_show() {
        let cli = Cli::parse_from(["agentloop", "checkpoints", "show", "task-1"]);
        match cli.command {
            Commands::Checkpoints(CheckpointsArgs {
                command: CheckpointCommands::Show { tag },
            }) => assert_eq!(tag, "task-1"),
            other => panic!("Expected Show subcommand, got {:?}", other),
        }
    }

    #[test]
    fn test_checkpoints_alias() {
        let cli = Cli::parse_from(["agentloop", "cp", "delete", "task-1"]);
        assert!(matches!(
            cli.command,
            Commands::Checkpoints(CheckpointsArgs {
                command: CheckpointCommands::Delete { .. }
            })
        ));
    }
}
