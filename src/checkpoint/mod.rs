// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Checkpoints for agentloop sessions
//!
//! A checkpoint is a tagged snapshot of a conversation history that a later
//! session can resume from.

pub mod store;

pub use store::{generate_tag, CheckpointInfo, CheckpointManager};
