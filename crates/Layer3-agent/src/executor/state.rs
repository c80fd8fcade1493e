//! Executor State - 실행 상태 머신
//!
//! `Idle → BeforeExecution → (Compacting? → Running)* → Terminated`

use forgeloop_foundation::TerminationReason;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Executor 실행 상태
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ExecutorState {
    /// 아직 실행 전
    #[default]
    Idle,

    /// BeforeExecution 훅 실행 중
    BeforeExecution,

    /// 반복 실행 중
    Running { iteration: u64 },

    /// 반복 사이 컴팩션 중
    Compacting,

    /// 종료됨
    Terminated { reason: TerminationReason },
}

impl ExecutorState {
    /// 활성 상태 여부
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ExecutorState::BeforeExecution | ExecutorState::Running { .. } | ExecutorState::Compacting
        )
    }

    /// 종료 상태 여부
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutorState::Terminated { .. })
    }
}

impl fmt::Display for ExecutorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorState::Idle => write!(f, "Idle"),
            ExecutorState::BeforeExecution => write!(f, "BeforeExecution"),
            ExecutorState::Running { iteration } => write!(f, "Running({iteration})"),
            ExecutorState::Compacting => write!(f, "Compacting"),
            ExecutorState::Terminated { reason } => write!(f, "Terminated({reason})"),
        }
    }
}
