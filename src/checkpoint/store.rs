// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Checkpoint store implementation
//!
//! One JSON file per tag, `checkpoint-<encoded tag>.json`, holding
//! `{tag, saved_at, history}`. Writes go through a temp file in the same
//! directory and a rename, so readers never observe a partial checkpoint and
//! concurrent saves to one tag are last-write-wins.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::config::Settings;
use crate::error::{AgentError, Result};
use crate::llm::message::Message;

const FILE_PREFIX: &str = "checkpoint-";
const FILE_SUFFIX: &str = ".json";

/// Histories this short hold nothing worth resuming
const MIN_SAVED_MESSAGES: usize = 3;

/// Summary of a stored checkpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointInfo {
    pub tag: String,
    pub saved_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct CheckpointFile {
    tag: String,
    saved_at: DateTime<Utc>,
    history: Vec<Message>,
}

/// Saves, loads, lists and deletes tagged conversation histories
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Store checkpoints under `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store checkpoints where the settings say to
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.checkpoints.directory())
    }

    pub fn directory(&self) -> &Path {
        &self.dir
    }

    /// File that holds the checkpoint for `tag`
    pub fn path_for(&self, tag: &str) -> PathBuf {
        self.dir
            .join(format!("{}{}{}", FILE_PREFIX, encode_tag(tag), FILE_SUFFIX))
    }

    /// Save `history` under `tag` (generated when `None`).
    ///
    /// Returns the tag written, or `None` when the history was too short to
    /// be worth saving. An existing checkpoint with the same tag is replaced.
    pub async fn save(&self, history: &[Message], tag: Option<&str>) -> Result<Option<String>> {
        if history.len() < MIN_SAVED_MESSAGES {
            tracing::debug!(
                target: "agentloop.checkpoint",
                messages = history.len(),
                "history too short; checkpoint skipped"
            );
            return Ok(None);
        }

        let tag = match tag {
            Some(tag) if tag.trim().is_empty() => {
                return Err(AgentError::Checkpoint("tag must not be blank".to_string()))
            }
            Some(tag) => tag.to_string(),
            None => generate_tag(),
        };

        let file = CheckpointFile {
            tag: tag.clone(),
            saved_at: Utc::now(),
            history: history.to_vec(),
        };
        let content = serde_json::to_vec_pretty(&file)?;

        let dir = self.dir.clone();
        let path = self.path_for(&tag);
        tokio::task::spawn_blocking(move || write_atomic(&dir, &path, &content))
            .await
            .map_err(|e| AgentError::Checkpoint(format!("save task failed: {}", e)))?
            .map_err(|e| {
                AgentError::Checkpoint(format!("failed to write checkpoint '{}': {}", tag, e))
            })?;

        tracing::info!(
            target: "agentloop.checkpoint",
            tag = %tag,
            messages = history.len(),
            "checkpoint saved"
        );
        Ok(Some(tag))
    }

    /// Load the history saved under `tag`. A missing checkpoint yields an
    /// empty history.
    pub async fn load(&self, tag: &str) -> Result<Vec<Message>> {
        let content = match tokio::fs::read(self.path_for(tag)).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(AgentError::Checkpoint(format!(
                    "failed to read checkpoint '{}': {}",
                    tag, e
                )))
            }
        };

        let file: CheckpointFile = serde_json::from_slice(&content).map_err(|e| {
            AgentError::Checkpoint(format!("checkpoint '{}' is corrupt: {}", tag, e))
        })?;
        Ok(file.history)
    }

    /// List stored checkpoints, newest first
    pub async fn list(&self) -> Result<Vec<CheckpointInfo>> {
        let mut reader = match tokio::fs::read_dir(&self.dir).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut checkpoints = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let file_name = entry.file_name().to_string_lossy().to_string();
            let Some(encoded) = file_name
                .strip_prefix(FILE_PREFIX)
                .and_then(|rest| rest.strip_suffix(FILE_SUFFIX))
            else {
                continue;
            };
            if decode_tag(encoded).is_none() {
                continue;
            }

            // Only the header is parsed; the history is skipped over
            let header = tokio::fs::read(entry.path())
                .await
                .map_err(AgentError::from)
                .and_then(|content| {
                    serde_json::from_slice::<CheckpointInfo>(&content).map_err(AgentError::from)
                });
            match header {
                Ok(info) => checkpoints.push(info),
                Err(e) => tracing::warn!(
                    target: "agentloop.checkpoint",
                    file = %file_name,
                    error = %e,
                    "skipping unreadable checkpoint"
                ),
            }
        }

        checkpoints.sort_by(|a, b| {
            b.saved_at
                .cmp(&a.saved_at)
                .then_with(|| a.tag.cmp(&b.tag))
        });
        Ok(checkpoints)
    }

    /// Delete the checkpoint saved under `tag`. Returns whether one existed.
    pub async fn delete(&self, tag: &str) -> Result<bool> {
        match tokio::fs::remove_file(self.path_for(tag)).await {
            Ok(()) => {
                tracing::info!(target: "agentloop.checkpoint", tag = %tag, "checkpoint deleted");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AgentError::Checkpoint(format!(
                "failed to delete checkpoint '{}': {}",
                tag, e
            ))),
        }
    }
}

/// Generate a tag of the form `task-<8 lowercase alnum>-<unix millis>`
pub fn generate_tag() -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("task-{}-{}", suffix, Utc::now().timestamp_millis())
}

fn write_atomic(dir: &Path, path: &Path, content: &[u8]) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let mut temp_file = NamedTempFile::new_in(dir)?;
    temp_file.write_all(content)?;
    temp_file.as_file().sync_all()?;
    temp_file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn is_safe_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-')
}

/// Percent-encode every byte outside `[A-Za-z0-9_.-]`
fn encode_tag(tag: &str) -> String {
    let mut encoded = String::with_capacity(tag.len());
    for b in tag.bytes() {
        if is_safe_byte(b) {
            encoded.push(char::from(b));
        } else {
            encoded.push_str(&format!("%{:02X}", b));
        }
    }
    encoded
}

fn decode_tag(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(decoded).ok()
}
