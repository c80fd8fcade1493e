//! Loop lifecycle types shared by every layer
//!
//! 실행 루프의 종료 사유와 단계별 액션

use serde::{Deserialize, Serialize};
use std::fmt;

/// What the step function wants after an iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopAction {
    Continue,
    Terminate,
}

impl fmt::Display for LoopAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopAction::Continue => write!(f, "continue"),
            LoopAction::Terminate => write!(f, "terminate"),
        }
    }
}

/// The single outcome classification of a finished execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// The step function asked to terminate.
    Success,
    /// A configured limit was breached.
    LimitExceeded,
    /// The token was cancelled without a recorded limit breach.
    ContextCanceled,
    /// A hook vetoed continuation.
    HookAbort,
    /// The step function failed.
    Error,
    /// A compaction strategy failed.
    CompactionFailed,
}

impl TerminationReason {
    /// 정상 종료 여부
    pub fn is_success(&self) -> bool {
        matches!(self, TerminationReason::Success)
    }

    /// 실패 여부 (제한 초과/취소는 실패가 아님)
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            TerminationReason::HookAbort
                | TerminationReason::Error
                | TerminationReason::CompactionFailed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationReason::Success => "success",
            TerminationReason::LimitExceeded => "limit_exceeded",
            TerminationReason::ContextCanceled => "context_canceled",
            TerminationReason::HookAbort => "hook_abort",
            TerminationReason::Error => "error",
            TerminationReason::CompactionFailed => "compaction_failed",
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
