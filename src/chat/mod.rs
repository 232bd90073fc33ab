// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Task sessions
//!
//! Stream classification, the turn loop, prompt resolution, and the session
//! entry point that ties them to a model service and tool registry.

pub mod engine;
pub mod input;
pub mod session;
pub mod streaming;

pub use engine::{
    CompletionReason, NoopTurnObserver, SessionOutcome, SessionState, SessionStatus,
    TurnController, TurnObserver,
};
pub use input::{parse_references, resolve_input, ParsedInput};
pub use session::{run_session, Session, SessionDeps, SessionOptions, SessionReport};
