//! Stock compaction strategies
//!
//! Both build a fresh sequence from a scratchpad snapshot and swap it in.

use super::CompactionStrategy;
use crate::context::ExecutionContext;
use crate::data::ScratchpadEntry;
use async_trait::async_trait;
use forgeloop_foundation::{Error, Result};
use std::sync::Arc;
use tracing::debug;

// ============================================================================
// Sliding window
// ============================================================================

/// Keeps only the most recent `window` entries.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    window: usize,
}

impl SlidingWindow {
    pub fn new(window: usize) -> Self {
        Self { window }
    }

    /// Pure transform over a snapshot.
    pub fn apply(&self, entries: &[ScratchpadEntry]) -> Vec<ScratchpadEntry> {
        let start = entries.len().saturating_sub(self.window);
        entries[start..].to_vec()
    }
}

#[async_trait]
impl CompactionStrategy for SlidingWindow {
    fn name(&self) -> &str {
        "sliding_window"
    }

    async fn compact(&self, ctx: &ExecutionContext) -> Result<()> {
        if self.window == 0 {
            return Err(Error::Compaction("sliding window size must be positive".into()));
        }
        let snapshot = ctx.scratchpad();
        let compacted = self.apply(&snapshot);
        debug!(
            context = %ctx.name(),
            before = snapshot.len(),
            after = compacted.len(),
            "Sliding window applied"
        );
        ctx.replace_scratchpad(compacted);
        Ok(())
    }
}

// ============================================================================
// Summarization
// ============================================================================

/// Produces a synopsis of older scratchpad entries.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, entries: &[ScratchpadEntry]) -> Result<String>;
}

/// Offline summarizer: one line per entry, each thought cut to
/// `max_chars_per_entry` characters.
#[derive(Debug, Clone)]
pub struct DigestSummarizer {
    pub max_chars_per_entry: usize,
}

impl Default for DigestSummarizer {
    fn default() -> Self {
        Self {
            max_chars_per_entry: 80,
        }
    }
}

impl DigestSummarizer {
    fn shorten(&self, text: &str) -> String {
        if text.chars().count() <= self.max_chars_per_entry {
            return text.to_string();
        }
        let cut: String = text.chars().take(self.max_chars_per_entry).collect();
        format!("{cut}...")
    }
}

#[async_trait]
impl Summarizer for DigestSummarizer {
    async fn summarize(&self, entries: &[ScratchpadEntry]) -> Result<String> {
        let lines: Vec<String> = entries
            .iter()
            .map(|entry| {
                let mut line = format!("[{}] {}", entry.iteration, self.shorten(&entry.thought));
                if let Some(action) = &entry.action {
                    line.push_str(&format!(" -> {action}"));
                }
                line
            })
            .collect();
        Ok(format!(
            "Summary of {} earlier steps:\n{}",
            entries.len(),
            lines.join("\n")
        ))
    }
}

/// Replaces everything but the `keep_recent` newest entries with a single
/// summary entry produced by a `Summarizer`.
pub struct SummarizingStrategy {
    keep_recent: usize,
    summarizer: Arc<dyn Summarizer>,
}

impl SummarizingStrategy {
    pub fn new(keep_recent: usize, summarizer: Arc<dyn Summarizer>) -> Self {
        Self {
            keep_recent,
            summarizer,
        }
    }
}

#[async_trait]
impl CompactionStrategy for SummarizingStrategy {
    fn name(&self) -> &str {
        "summarize"
    }

    async fn compact(&self, ctx: &ExecutionContext) -> Result<()> {
        let snapshot = ctx.scratchpad();
        // A single older entry is not worth a summary.
        if snapshot.len() <= self.keep_recent + 1 {
            return Ok(());
        }

        let split = snapshot.len() - self.keep_recent;
        let (older, recent) = snapshot.split_at(split);
        let synopsis = self.summarizer.summarize(older).await?;
        let covered = older.last().map(|e| e.iteration).unwrap_or_default();

        let mut compacted = Vec::with_capacity(recent.len() + 1);
        compacted.push(ScratchpadEntry::summary(covered, synopsis));
        compacted.extend_from_slice(recent);

        debug!(
            context = %ctx.name(),
            summarized = older.len(),
            kept = recent.len(),
            "Scratchpad summarized"
        );
        ctx.replace_scratchpad(compacted);
        Ok(())
    }
}
