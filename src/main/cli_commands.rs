// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use agentloop::chat::{run_session, SessionDeps, SessionOptions};
use agentloop::checkpoint::CheckpointManager;
use agentloop::cli::{CheckpointCommands, CheckpointsArgs, RunArgs};
use agentloop::config::Settings;
use agentloop::error::{AgentError, Result};
use agentloop::llm::message::{Message, Part, Role};
use agentloop::llm::ScriptedModelService;
use agentloop::output::TerminalSink;
use agentloop::tools::InMemoryToolRegistry;

/// Run one task session and return its exit status
pub(super) async fn run_task(
    args: RunArgs,
    settings: &Settings,
    working_directory: PathBuf,
) -> Result<i32> {
    let mut options = SessionOptions::from_settings(settings, working_directory);
    args.apply_to(&mut options);
    if options.max_turns < -1 {
        return Err(AgentError::InvalidInput(format!(
            "--max-turns must be -1 (unlimited) or >= 0, got {}",
            options.max_turns
        )));
    }

    let model = ScriptedModelService::from_jsonl(&args.script)?;
    let registry = InMemoryToolRegistry::with_builtins(&options.working_directory);
    let deps = SessionDeps {
        model: Arc::new(model),
        tools: Arc::new(registry),
        checkpoints: CheckpointManager::from_settings(settings),
    };

    // Ctrl+C cancels the session; the loop notices at its next checkpoint
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!(target: "agentloop.session", "interrupt received");
            signal_token.cancel();
        }
    });

    let mut sink = TerminalSink::stdio(settings.appearance.color);
    Ok(run_session(&args.prompt, &options, &deps, &mut sink, &cancel).await)
}

pub(super) async fn run_checkpoints_command(
    args: CheckpointsArgs,
    manager: &CheckpointManager,
    out: &mut impl Write,
) -> Result<()> {
    match args.command {
        CheckpointCommands::List => {
            let checkpoints = manager.list().await?;

            if checkpoints.is_empty() {
                writeln!(out, "\nNo checkpoints saved.\n")?;
                return Ok(());
            }

            writeln!(out, "\nSaved checkpoints:\n")?;
            for checkpoint in checkpoints {
                let date = checkpoint.saved_at.format("%Y-%m-%d %H:%M");
                writeln!(out, "  {} | {}", checkpoint.tag, date)?;
            }
            writeln!(out)?;
        }

        CheckpointCommands::Show { tag } => {
            let history = manager.load(&tag).await?;
            if history.is_empty() {
                return Err(AgentError::InvalidInput(format!(
                    "No checkpoint found with tag '{}'",
                    tag
                )));
            }

            writeln!(out, "\nCheckpoint: {}", tag)?;
            writeln!(out, "Messages: {}\n", history.len())?;
            for message in &history {
                write_message(out, message)?;
            }
        }

        CheckpointCommands::Delete { tag } => {
            if !manager.delete(&tag).await? {
                return Err(AgentError::InvalidInput(format!(
                    "No checkpoint found with tag '{}'",
                    tag
                )));
            }
            writeln!(out, "Deleted checkpoint '{}'.", tag)?;
        }
    }

    Ok(())
}

fn write_message(out: &mut impl Write, message: &Message) -> Result<()> {
    let role = match message.role {
        Role::User => "user",
        Role::Model => "model",
    };

    for part in &message.parts {
        match part {
            Part::Text { text } => writeln!(out, "[{}] {}", role, text)?,
            Part::InlineData(data) => writeln!(out, "[{}] <{} attachment>", role, data.mime_type)?,
            Part::ToolCall { name, args, .. } => {
                writeln!(out, "[{}] call {}({})", role, name, args)?
            }
            Part::ToolResponse { name, response, .. } => {
                writeln!(out, "[{}] {} -> {}", role, name, response)?
            }
        }
    }
    Ok(())
}
