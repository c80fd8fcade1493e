//! Working memory owned by each execution context
//!
//! The scratchpad is held behind an `Arc` and treated as copy-on-write:
//! appends clone the sequence only when a snapshot is still shared, and
//! compaction swaps in a freshly built sequence. Readers holding a snapshot
//! never observe a mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Kind of a scratchpad record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// One iteration's record.
    Step,
    /// A synopsis that replaced older records.
    Summary,
}

/// One record of iteration history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScratchpadEntry {
    pub iteration: u64,
    pub kind: EntryKind,
    pub thought: String,
    pub action: Option<String>,
    pub observation: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ScratchpadEntry {
    pub fn step(iteration: u64, thought: impl Into<String>) -> Self {
        Self {
            iteration,
            kind: EntryKind::Step,
            thought: thought.into(),
            action: None,
            observation: None,
            created_at: Utc::now(),
        }
    }

    /// A synopsis covering iterations up to `iteration`.
    pub fn summary(iteration: u64, synopsis: impl Into<String>) -> Self {
        Self {
            kind: EntryKind::Summary,
            ..Self::step(iteration, synopsis)
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_observation(mut self, observation: impl Into<String>) -> Self {
        self.observation = Some(observation.into());
        self
    }

    pub fn is_summary(&self) -> bool {
        self.kind == EntryKind::Summary
    }
}

/// Task plus scratchpad history, exclusively owned by one context.
#[derive(Debug, Clone, Default)]
pub struct AgentData {
    pub task: String,
    scratchpad: Arc<Vec<ScratchpadEntry>>,
    pub metadata: HashMap<String, Value>,
}

impl AgentData {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            ..Self::default()
        }
    }

    pub fn with_scratchpad(mut self, entries: Vec<ScratchpadEntry>) -> Self {
        self.scratchpad = Arc::new(entries);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Shared snapshot of the scratchpad.
    pub fn scratchpad(&self) -> Arc<Vec<ScratchpadEntry>> {
        Arc::clone(&self.scratchpad)
    }

    pub fn scratchpad_len(&self) -> usize {
        self.scratchpad.len()
    }

    /// Append a record, cloning the sequence first if a snapshot is shared.
    pub fn push_entry(&mut self, entry: ScratchpadEntry) {
        Arc::make_mut(&mut self.scratchpad).push(entry);
    }

    /// Swap in a new sequence and return the previous one.
    pub fn replace_scratchpad(&mut self, entries: Vec<ScratchpadEntry>) -> Arc<Vec<ScratchpadEntry>> {
        std::mem::replace(&mut self.scratchpad, Arc::new(entries))
    }
}
