// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Scripted model service
//!
//! Replays pre-recorded turns of raw stream events. Used by the test suite
//! and by the CLI's `--script` mode to drive a session without a live model.
//!
//! # Script format
//!
//! One JSON object per line, each a raw event (`{"type": ..., "value": ...}`).
//! A line `{"type": "end_turn"}` closes the current turn. Blank lines and
//! lines starting with `#` are skipped.

use async_trait::async_trait;
use futures::stream;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::error::{ModelError, Result};
use crate::llm::message::{Message, ToolCallRequest};
use crate::llm::provider::{ModelService, RawEventStream, RawStreamEvent, StreamEvent};

const END_TURN: &str = "end_turn";

/// A model service that replays scripted turns
#[derive(Clone)]
pub struct ScriptedModelService {
    /// Service name
    name: String,
    /// One entry per model invocation
    turns: Arc<Mutex<Vec<Vec<RawStreamEvent>>>>,
    /// Call counter
    call_count: Arc<AtomicUsize>,
    /// History snapshot seen by each call
    recorded_requests: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl Default for ScriptedModelService {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedModelService {
    /// Create a service that answers every turn with a single content event
    pub fn new() -> Self {
        Self {
            name: "scripted".to_string(),
            turns: Arc::new(Mutex::new(vec![vec![RawStreamEvent::from(
                StreamEvent::Content("Scripted response".to_string()),
            )]])),
            call_count: Arc::new(AtomicUsize::new(0)),
            recorded_requests: Arc::new(Mutex::new(vec![])),
        }
    }

    /// Create a service with a custom name
    pub fn with_name(name: impl Into<String>) -> Self {
        let mut service = Self::new();
        service.name = name.into();
        service
    }

    /// Queue typed turns (returned in order, last one repeats)
    pub fn with_turns(self, turns: Vec<Vec<StreamEvent>>) -> Self {
        let raw = turns
            .into_iter()
            .map(|turn| turn.into_iter().map(RawStreamEvent::from).collect())
            .collect();
        self.with_raw_turns(raw)
    }

    /// Queue raw turns (returned in order, last one repeats)
    pub fn with_raw_turns(self, turns: Vec<Vec<RawStreamEvent>>) -> Self {
        *lock(&self.turns) = turns;
        self
    }

    /// Answer every turn with one tool call, never finishing on its own
    pub fn with_tool_call(self, name: impl Into<String>, args: serde_json::Value) -> Self {
        self.with_turns(vec![vec![StreamEvent::ToolCallRequest(ToolCallRequest {
            id: format!("call_{}", uuid::Uuid::new_v4().simple()),
            name: name.into(),
            args,
        })]])
    }

    /// Load a JSONL script from disk
    pub fn from_jsonl(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let turns = parse_script(&content)?;
        Ok(Self::with_name("script").with_raw_turns(turns))
    }

    /// Get the number of times stream_turn() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Get every history snapshot passed to stream_turn()
    pub fn recorded_requests(&self) -> Vec<Vec<Message>> {
        lock(&self.recorded_requests).clone()
    }

    /// Get the last history snapshot
    pub fn last_request(&self) -> Option<Vec<Message>> {
        lock(&self.recorded_requests).last().cloned()
    }

    fn next_turn(&self) -> Vec<RawStreamEvent> {
        let count = self.call_count.fetch_add(1, Ordering::SeqCst);
        let turns = lock(&self.turns);
        // Walk through the turns, then keep repeating the last one
        if turns.is_empty() {
            Vec::new()
        } else {
            turns[count.min(turns.len() - 1)].clone()
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Scripted model service lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

/// Parse a JSONL script into turns
pub fn parse_script(content: &str) -> Result<Vec<Vec<RawStreamEvent>>> {
    let mut turns = Vec::new();
    let mut current = Vec::new();

    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let event: RawStreamEvent = serde_json::from_str(line).map_err(|e| {
            ModelError::InvalidScript(format!("line {}: {}", index + 1, e))
        })?;
        if event.kind == END_TURN {
            turns.push(std::mem::take(&mut current));
        } else {
            current.push(event);
        }
    }

    if !current.is_empty() {
        turns.push(current);
    }

    if turns.is_empty() {
        return Err(ModelError::InvalidScript("script contains no turns".to_string()).into());
    }

    Ok(turns)
}

#[async_trait]
impl ModelService for ScriptedModelService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream_turn(
        &self,
        messages: &[Message],
        _cancel: &CancellationToken,
    ) -> Result<RawEventStream> {
        lock(&self.recorded_requests).push(messages.to_vec());

        let events: Vec<Result<RawStreamEvent>> = self.next_turn().into_iter().map(Ok).collect();
        Ok(Box::pin(stream::iter(events)))
    }
}
