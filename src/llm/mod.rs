// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Model service module
//!
//! Message types, the model service abstraction, and a scripted service.

pub mod message;
pub mod provider;
pub mod scripted;

pub use message::*;
pub use provider::*;
pub use scripted::ScriptedModelService;
