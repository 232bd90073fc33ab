// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Session output
//!
//! Model content goes to the primary stream and nothing else does: it may be
//! piped into another program. Progress, thoughts, tool previews and errors
//! go to a separate diagnostic stream.

use std::io::{self, ErrorKind, IsTerminal, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use crossterm::style::Stylize;

use crate::config::ColorChoice;
use crate::error::{AgentError, Result};

/// Diagnostic prefixes used across the session
pub mod prefix {
    pub const ERROR: &str = "error";
    pub const WARNING: &str = "warning";
    pub const THOUGHT: &str = "thought";
    pub const RETRY: &str = "retry";
    pub const TOOL: &str = "tool";
    pub const INFO: &str = "info";
}

/// Where a session writes its output
pub trait OutputSink: Send {
    /// Write user-facing model content to the primary stream
    fn write_content(&mut self, text: &str) -> Result<()>;

    /// Write a diagnostic line to the secondary stream
    fn write_diagnostic(&mut self, prefix: &str, text: &str) -> Result<()>;
}

/// What to do when the primary stream's reader has gone away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokenPipePolicy {
    /// Exit the process with status 0
    ExitProcess,
    /// Return [`AgentError::OutputClosed`]
    Report,
}

/// Sink over a pair of writers
pub struct WriterSink<C: Write + Send, D: Write + Send> {
    content: C,
    diagnostics: D,
    color: bool,
    broken_pipe: BrokenPipePolicy,
}

/// Sink over the process's stdout and stderr
pub type TerminalSink = WriterSink<io::Stdout, io::Stderr>;

impl TerminalSink {
    /// Content to stdout, diagnostics to stderr
    pub fn stdio(color: ColorChoice) -> Self {
        let stderr = io::stderr();
        let color = color.enabled(stderr.is_terminal());
        WriterSink::new(io::stdout(), stderr, color, BrokenPipePolicy::ExitProcess)
    }
}

impl<C: Write + Send, D: Write + Send> WriterSink<C, D> {
    pub fn new(content: C, diagnostics: D, color: bool, broken_pipe: BrokenPipePolicy) -> Self {
        Self {
            content,
            diagnostics,
            color,
            broken_pipe,
        }
    }

    fn styled_prefix(&self, prefix: &str) -> String {
        if !self.color {
            return prefix.to_string();
        }
        match prefix {
            prefix::ERROR => prefix.red().bold().to_string(),
            prefix::WARNING => prefix.yellow().to_string(),
            prefix::THOUGHT => prefix.dark_grey().to_string(),
            prefix::TOOL => prefix.cyan().to_string(),
            _ => prefix.blue().to_string(),
        }
    }
}

impl<C: Write + Send, D: Write + Send> OutputSink for WriterSink<C, D> {
    fn write_content(&mut self, text: &str) -> Result<()> {
        let written = self
            .content
            .write_all(text.as_bytes())
            .and_then(|_| self.content.flush());

        match written {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::BrokenPipe => match self.broken_pipe {
                BrokenPipePolicy::ExitProcess => {
                    tracing::debug!(
                        target: "agentloop.output",
                        "primary output closed by reader; exiting"
                    );
                    std::process::exit(0)
                }
                BrokenPipePolicy::Report => Err(AgentError::OutputClosed),
            },
            Err(e) => Err(e.into()),
        }
    }

    fn write_diagnostic(&mut self, prefix: &str, text: &str) -> Result<()> {
        let line = if prefix.is_empty() {
            format!("{}\n", text)
        } else {
            format!("{}: {}\n", self.styled_prefix(prefix), text)
        };

        match self.diagnostics.write_all(line.as_bytes()) {
            Ok(()) => Ok(()),
            // Nobody is reading diagnostics; that must not end the session
            Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory sink capturing both streams
#[derive(Clone, Default)]
pub struct BufferSink {
    content: Arc<Mutex<String>>,
    diagnostics: Arc<Mutex<Vec<(String, String)>>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written to the primary stream
    pub fn content(&self) -> String {
        lock(&self.content).clone()
    }

    /// Every `(prefix, text)` diagnostic, in order
    pub fn diagnostics(&self) -> Vec<(String, String)> {
        lock(&self.diagnostics).clone()
    }

    /// All diagnostics rendered as `prefix: text` lines
    pub fn diagnostic_text(&self) -> String {
        lock(&self.diagnostics)
            .iter()
            .map(|(prefix, text)| format!("{}: {}\n", prefix, text))
            .collect()
    }
}

impl OutputSink for BufferSink {
    fn write_content(&mut self, text: &str) -> Result<()> {
        lock(&self.content).push_str(text);
        Ok(())
    }

    fn write_diagnostic(&mut self, prefix: &str, text: &str) -> Result<()> {
        lock(&self.diagnostics).push((prefix.to_string(), text.to_string()));
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
