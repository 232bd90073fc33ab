// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! agentloop - run a tool-using model session to completion
//!
//! Entry point for the agentloop CLI application.

use std::path::PathBuf;

use clap::Parser;

use agentloop::checkpoint::CheckpointManager;
use agentloop::cli::{Cli, Commands};
use agentloop::config::Settings;
use agentloop::error::Result;

#[path = "main/cli_commands.rs"]
mod cli_commands;

use cli_commands::{run_checkpoints_command, run_task};

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());

    // `-v` turns on session diagnostics without knowing target names.
    // `RUST_LOG` still takes precedence.
    if cli.verbose > 0 {
        for directive in [
            "agentloop.chat.engine=debug",
            "agentloop.chat.streaming=debug",
            "agentloop.tools=debug",
            "agentloop.checkpoint=debug",
            "agentloop.session=debug",
        ] {
            if let Ok(parsed) = directive.parse() {
                env_filter = env_filter.add_directive(parsed);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let code = match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            1
        }
    };
    std::process::exit(code);
}

async fn dispatch(cli: Cli) -> Result<i32> {
    // Load settings
    let mut settings = Settings::load_at(cli.config.as_deref())?;
    if let Some(color) = cli.color {
        settings.appearance.color = color.into();
    }

    let working_directory = match cli.directory {
        Some(dir) => dir,
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };

    match cli.command {
        Commands::Run(args) => run_task(args, &settings, working_directory).await,
        Commands::Checkpoints(args) => {
            let manager = CheckpointManager::from_settings(&settings);
            run_checkpoints_command(args, &manager, &mut std::io::stdout()).await?;
            Ok(0)
        }
    }
}
