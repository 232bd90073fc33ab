// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Initial prompt resolution
//!
//! `@path` in the prompt pulls a file (or every regular file directly inside
//! a directory) into the first message. `\@` is a literal `@`, and `\ `
//! continues a path across a space.

use std::path::Path;

use crate::error::{AgentError, Result};
use crate::llm::message::{Message, Part};

const CONTENT_HEADER: &str = "\n--- Content from referenced files ---";
const CONTENT_FOOTER: &str = "\n--- End of content ---";

/// Prompt text with its `@` references pulled out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedInput {
    /// Query text with escapes removed and `@path` rendered as `path`
    pub text: String,
    /// Referenced paths, in order of appearance, without duplicates
    pub references: Vec<String>,
}

/// Split `@` references out of a prompt
pub fn parse_references(input: &str) -> ParsedInput {
    let chars: Vec<char> = input.chars().collect();
    let mut text = String::with_capacity(input.len());
    let mut references: Vec<String> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && chars.get(i + 1) == Some(&'@') {
            text.push('@');
            i += 2;
            continue;
        }

        let at_word_start = i == 0 || chars[i - 1].is_whitespace();
        if c == '@' && at_word_start {
            let path = extract_path(&chars, &mut i);
            if path.is_empty() {
                text.push('@');
            } else {
                text.push_str(&path);
                if !references.contains(&path) {
                    references.push(path);
                }
            }
            continue;
        }

        text.push(c);
        i += 1;
    }

    ParsedInput { text, references }
}

/// Read a path after `@`, honouring `\ ` escapes. Leaves `i` after the path.
fn extract_path(chars: &[char], i: &mut usize) -> String {
    let mut path = String::new();
    *i += 1;
    while *i < chars.len() {
        match chars[*i] {
            '\\' if chars.get(*i + 1).is_some_and(|c| c.is_whitespace()) => {
                path.push(chars[*i + 1]);
                *i += 2;
            }
            c if c.is_whitespace() => break,
            c => {
                path.push(c);
                *i += 1;
            }
        }
    }
    path
}

/// Turn the raw prompt into the session's first message
pub async fn resolve_input(input: &str, working_directory: &Path) -> Result<Message> {
    if input.trim().is_empty() {
        return Err(AgentError::InvalidInput("prompt is empty".to_string()));
    }

    let parsed = parse_references(input);
    let mut parts = vec![Part::text(parsed.text)];
    if parsed.references.is_empty() {
        return Ok(Message::user_parts(parts));
    }

    let mut files = Vec::new();
    for reference in &parsed.references {
        files.extend(read_reference(reference, working_directory).await?);
    }

    tracing::debug!(
        target: "agentloop.session",
        references = parsed.references.len(),
        files = files.len(),
        "resolved @ references"
    );

    parts.push(Part::text(CONTENT_HEADER));
    for (display, content) in files {
        parts.push(Part::text(format!("\nContent from @{}:\n", display)));
        parts.push(Part::text(content));
    }
    parts.push(Part::text(CONTENT_FOOTER));

    Ok(Message::user_parts(parts))
}

/// Read one reference as `(display path, content)` pairs
async fn read_reference(reference: &str, working_directory: &Path) -> Result<Vec<(String, String)>> {
    let path = working_directory.join(reference);
    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|_| AgentError::InvalidInput(format!("File not found: @{}", reference)))?;

    if metadata.is_file() {
        let content = read_lossy(&path).await?;
        return Ok(vec![(reference.to_string(), content)]);
    }

    let mut names = Vec::new();
    let mut reader = tokio::fs::read_dir(&path).await?;
    while let Some(entry) = reader.next_entry().await? {
        if entry.file_type().await?.is_file() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    names.sort();

    let mut files = Vec::with_capacity(names.len());
    for name in names {
        let content = read_lossy(&path.join(&name)).await?;
        let display = format!("{}/{}", reference.trim_end_matches('/'), name);
        files.push((display, content));
    }
    Ok(files)
}

async fn read_lossy(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
