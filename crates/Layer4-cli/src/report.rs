//! Run report printed as JSON

use forgeloop_core::{ExecutionContext, Termination};
use forgeloop_foundation::{EventOrder, ExceededLimit, TerminationReason};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Outcome of one `forgeloop run`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub reason: TerminationReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exceeded_limit: Option<ExceededLimit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    pub iterations: u64,
    pub children: usize,
    pub events: usize,
    pub scratchpad_length: usize,
    pub counters: BTreeMap<String, i64>,
}

impl RunReport {
    pub fn new(root: &ExecutionContext, termination: Termination) -> Self {
        Self {
            reason: termination.reason,
            error: termination.error,
            exceeded_limit: termination.exceeded_limit,
            result: termination.result,
            iterations: root.iteration(),
            children: root.children().len(),
            events: root.collect_events(EventOrder::Arrival).len(),
            scratchpad_length: root.scratchpad_len(),
            counters: root.counters(),
        }
    }
}
