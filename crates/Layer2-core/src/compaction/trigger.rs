//! Stock compaction triggers

use super::CompactionTrigger;
use crate::context::ExecutionContext;
use std::sync::atomic::{AtomicU64, Ordering};

/// Fires once every `n` completed iterations.
#[derive(Debug)]
pub struct EveryNIterations {
    n: u64,
    last_compacted_at: AtomicU64,
}

impl EveryNIterations {
    pub fn new(n: u64) -> Self {
        Self {
            n: n.max(1),
            last_compacted_at: AtomicU64::new(0),
        }
    }
}

impl CompactionTrigger for EveryNIterations {
    fn name(&self) -> &str {
        "every_n_iterations"
    }

    fn should_compact(&self, ctx: &ExecutionContext) -> bool {
        let iteration = ctx.iteration();
        iteration > 0
            && iteration % self.n == 0
            && iteration != self.last_compacted_at.load(Ordering::SeqCst)
    }

    fn notify_compacted(&self, ctx: &ExecutionContext) {
        self.last_compacted_at.store(ctx.iteration(), Ordering::SeqCst);
    }
}

/// Fires when the scratchpad holds more than `max` entries.
#[derive(Debug)]
pub struct ScratchpadLengthTrigger {
    max: usize,
}

impl ScratchpadLengthTrigger {
    pub fn new(max: usize) -> Self {
        Self { max }
    }
}

impl CompactionTrigger for ScratchpadLengthTrigger {
    fn name(&self) -> &str {
        "scratchpad_length"
    }

    fn should_compact(&self, ctx: &ExecutionContext) -> bool {
        ctx.scratchpad_len() > self.max
    }
}

/// Fires when a local gauge is strictly above `threshold`.
///
/// Evaluated between iterations, so it sees the gauge as the previous
/// iteration left it (e.g. `last_call.input_tokens`).
#[derive(Debug)]
pub struct GaugeThreshold {
    key: String,
    threshold: f64,
}

impl GaugeThreshold {
    pub fn new(key: impl Into<String>, threshold: f64) -> Self {
        Self {
            key: key.into(),
            threshold,
        }
    }
}

impl CompactionTrigger for GaugeThreshold {
    fn name(&self) -> &str {
        "gauge_threshold"
    }

    fn should_compact(&self, ctx: &ExecutionContext) -> bool {
        ctx.get_gauge(&self.key) > self.threshold
    }
}
