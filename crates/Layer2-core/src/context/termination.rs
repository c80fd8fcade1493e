//! Execution outcome

use forgeloop_foundation::{Error, ExceededLimit, TerminationReason};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Final outcome of an execution. Recorded at most once per context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Termination {
    pub reason: TerminationReason,

    /// Payload of a successful `Terminate` step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exceeded_limit: Option<ExceededLimit>,
}

impl Termination {
    fn new(reason: TerminationReason) -> Self {
        Self {
            reason,
            result: None,
            error: None,
            exceeded_limit: None,
        }
    }

    pub fn success(result: Option<Value>) -> Self {
        Self {
            result,
            ..Self::new(TerminationReason::Success)
        }
    }

    pub fn limit_exceeded(exceeded: ExceededLimit) -> Self {
        Self {
            error: Some(exceeded.message()),
            exceeded_limit: Some(exceeded),
            ..Self::new(TerminationReason::LimitExceeded)
        }
    }

    pub fn canceled() -> Self {
        Self {
            error: Some(Error::Cancelled.to_string()),
            ..Self::new(TerminationReason::ContextCanceled)
        }
    }

    pub fn hook_abort(error: &Error) -> Self {
        Self::failure(TerminationReason::HookAbort, error)
    }

    pub fn error(error: &Error) -> Self {
        Self::failure(TerminationReason::Error, error)
    }

    pub fn compaction_failed(error: &Error) -> Self {
        Self::failure(TerminationReason::CompactionFailed, error)
    }

    fn failure(reason: TerminationReason, error: &Error) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(reason)
        }
    }

    pub fn is_success(&self) -> bool {
        self.reason.is_success()
    }
}
