//! Outbound notifications: confirmed spreads, batched tier logs and operator
//! errors.

/// Console sink
pub mod console;
/// Message text
pub mod format;
/// Slack sink
pub mod slack;

use std::mem;

use async_trait::async_trait;
use eyre::Result;
use itertools::Itertools;
use log::warn;
use parking_lot::Mutex;

use crate::engine::types::CycleOutcome;

pub use console::ConsoleSink;
pub use slack::SlackNotifier;

/// Where the engine pushes its results.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Delivers a confirmed profitable cycle
    ///
    /// # Errors
    /// If the message could not be delivered
    async fn report_cycle(&self, outcome: &CycleOutcome) -> Result<()>;

    /// Delivers one chunk of batched tier logs
    ///
    /// # Errors
    /// If the message could not be delivered
    async fn report_log(&self, text: &str) -> Result<()>;

    /// Delivers an operator-facing error
    ///
    /// # Errors
    /// If the message could not be delivered
    async fn report_error(&self, text: &str) -> Result<()>;
}

/// Tier log lines collected during one scan cycle and flushed at its end.
#[derive(Debug, Default)]
pub struct LogBatch {
    /// Pending lines
    lines: Mutex<Vec<String>>,
}

impl LogBatch {
    /// Creates an empty batch
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a line
    pub fn push(&self, line: String) {
        self.lines.lock().push(line);
    }

    /// Number of pending lines
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    /// Whether nothing is pending
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }

    /// Copy of the pending lines
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Takes every pending line, packed greedily into messages of at most
    /// `max_chars` characters. Each line is newline-terminated; a line that
    /// alone exceeds the limit is split across messages.
    #[must_use]
    pub fn drain_chunks(&self, max_chars: usize) -> Vec<String> {
        let lines = mem::take(&mut *self.lines.lock());
        pack(&lines, max_chars.max(1))
    }

    /// Sends every pending line through `sink`.
    ///
    /// # Returns
    /// Number of messages delivered
    pub async fn flush(&self, sink: &dyn NotificationSink, max_chars: usize) -> usize {
        let mut delivered = 0;
        for chunk in self.drain_chunks(max_chars) {
            match sink.report_log(&chunk).await {
                Ok(()) => delivered += 1,
                Err(err) => warn!("notify: failed to deliver log batch: {err}"),
            }
        }
        delivered
    }
}

fn pack(lines: &[String], max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in lines {
        let needed = line.chars().count() + 1;
        if current_len > 0 && current_len + needed > max_chars {
            chunks.push(mem::take(&mut current));
            current_len = 0;
        }
        if needed > max_chars {
            for piece in &line.chars().chunks(max_chars) {
                chunks.push(piece.collect());
            }
            continue;
        }
        current.push_str(line);
        current.push('\n');
        current_len += needed;
    }

    if !current.trim().is_empty() {
        chunks.push(current);
    }
    chunks
}
