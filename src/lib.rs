// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! agentloop - turn-loop orchestrator for tool-using AI coding sessions.
//!
//! This crate exposes the runtime used by the `agentloop` CLI (`src/main.rs`).
//!
//! Architecture highlights:
//! - `chat`: stream classification, the turn loop, prompt resolution, sessions
//! - `llm`: message model, the model service abstraction, a scripted service
//! - `tools`: tool contracts, the registry, built-in tools, batch execution
//! - `checkpoint`: tagged conversation snapshots on disk
//! - `output`: content and diagnostic streams
//! - `config`: settings file and environment overrides

pub mod chat;
pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod output;
pub mod tools;

pub use error::{AgentError, Result};
