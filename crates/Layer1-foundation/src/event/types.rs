//! Event Types - 실행 트리에서 발생하는 이벤트 타입 정의
//!
//! 실행/반복/모델 호출/도구 호출 생명주기, 파싱 에러, 컴팩션 결과,
//! 제한 초과를 하나의 tagged union으로 표현합니다.

use crate::lifecycle::{LoopAction, TerminationReason};
use crate::limit::ExceededLimit;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide arrival counter, stamped on every event at creation.
static EVENT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

// ============================================================================
// Event ID
// ============================================================================

/// 이벤트 고유 ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub String);

impl EventId {
    /// 새 이벤트 ID 생성
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Event Category / Severity
// ============================================================================

/// 이벤트 카테고리
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// 실행 시작/종료
    Execution,
    /// 반복 시작/종료
    Iteration,
    /// 모델 호출
    Model,
    /// 도구 호출
    Tool,
    /// 파싱 에러
    Parse,
    /// 컨텍스트 컴팩션
    Compaction,
    /// 리소스 제한
    Limit,
    /// 자식 컨텍스트
    Child,
}

impl EventCategory {
    /// 카테고리 문자열 반환
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Execution => "execution",
            Self::Iteration => "iteration",
            Self::Model => "model",
            Self::Tool => "tool",
            Self::Parse => "parse",
            Self::Compaction => "compaction",
            Self::Limit => "limit",
            Self::Child => "child",
        }
    }
}

/// 이벤트 심각도
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// EventKind - 이벤트 본문
// ============================================================================

/// 이벤트 종류와 종류별 데이터
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    ExecutionStarted,
    ExecutionFinished {
        reason: TerminationReason,
        error: Option<String>,
    },
    IterationStarted {
        iteration: u64,
    },
    IterationFinished {
        iteration: u64,
        action: LoopAction,
        duration_ms: u64,
    },
    ModelCallStarted {
        model: String,
    },
    ModelCallFinished {
        model: String,
        input_tokens: u64,
        output_tokens: u64,
        duration_ms: u64,
        error: Option<String>,
    },
    ToolCallStarted {
        tool: String,
    },
    ToolCallFinished {
        tool: String,
        duration_ms: u64,
        error: Option<String>,
    },
    ParseError {
        message: String,
        consecutive: i64,
    },
    Compaction {
        before_len: usize,
        after_len: usize,
        duration_ms: u64,
    },
    LimitExceeded {
        exceeded: ExceededLimit,
    },
    ChildSpawned {
        child_id: String,
        name: String,
    },
    ChildCompleted {
        child_id: String,
        name: String,
    },
}

impl EventKind {
    /// 이벤트 카테고리
    pub fn category(&self) -> EventCategory {
        match self {
            Self::ExecutionStarted | Self::ExecutionFinished { .. } => EventCategory::Execution,
            Self::IterationStarted { .. } | Self::IterationFinished { .. } => {
                EventCategory::Iteration
            }
            Self::ModelCallStarted { .. } | Self::ModelCallFinished { .. } => EventCategory::Model,
            Self::ToolCallStarted { .. } | Self::ToolCallFinished { .. } => EventCategory::Tool,
            Self::ParseError { .. } => EventCategory::Parse,
            Self::Compaction { .. } => EventCategory::Compaction,
            Self::LimitExceeded { .. } => EventCategory::Limit,
            Self::ChildSpawned { .. } | Self::ChildCompleted { .. } => EventCategory::Child,
        }
    }

    /// 이벤트 심각도
    pub fn severity(&self) -> EventSeverity {
        match self {
            Self::LimitExceeded { .. } | Self::ParseError { .. } => EventSeverity::Warning,
            Self::ModelCallFinished { error: Some(_), .. }
            | Self::ToolCallFinished { error: Some(_), .. } => EventSeverity::Error,
            Self::ExecutionFinished { reason, .. } if reason.is_failure() => EventSeverity::Error,
            Self::ExecutionStarted | Self::ExecutionFinished { .. } => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// 이벤트 타입 문자열 (예: "model_call_finished")
    pub fn name(&self) -> &'static str {
        match self {
            Self::ExecutionStarted => "execution_started",
            Self::ExecutionFinished { .. } => "execution_finished",
            Self::IterationStarted { .. } => "iteration_started",
            Self::IterationFinished { .. } => "iteration_finished",
            Self::ModelCallStarted { .. } => "model_call_started",
            Self::ModelCallFinished { .. } => "model_call_finished",
            Self::ToolCallStarted { .. } => "tool_call_started",
            Self::ToolCallFinished { .. } => "tool_call_finished",
            Self::ParseError { .. } => "parse_error",
            Self::Compaction { .. } => "compaction",
            Self::LimitExceeded { .. } => "limit_exceeded",
            Self::ChildSpawned { .. } => "child_spawned",
            Self::ChildCompleted { .. } => "child_completed",
        }
    }
}

// ============================================================================
// Event - 로그에 추가되는 불변 레코드
// ============================================================================

/// 실행 컨텍스트 로그의 이벤트
///
/// 생성 이후 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// 이벤트 ID
    pub id: EventId,

    /// 프로세스 전역 도착 순서
    pub seq: u64,

    /// 이벤트 발생 시간
    pub timestamp: DateTime<Utc>,

    /// 이벤트를 기록한 컨텍스트 ID
    pub context_id: String,

    /// 이벤트를 기록한 컨텍스트 이름
    pub context_name: String,

    /// 이벤트 본문
    pub kind: EventKind,
}

impl Event {
    /// 새 이벤트 생성
    pub fn new(
        context_id: impl Into<String>,
        context_name: impl Into<String>,
        kind: EventKind,
    ) -> Self {
        Self {
            id: EventId::new(),
            seq: EVENT_SEQUENCE.fetch_add(1, Ordering::SeqCst),
            timestamp: Utc::now(),
            context_id: context_id.into(),
            context_name: context_name.into(),
            kind,
        }
    }

    pub fn category(&self) -> EventCategory {
        self.kind.category()
    }

    pub fn severity(&self) -> EventSeverity {
        self.kind.severity()
    }
}

/// 트리 전체 이벤트 수집 순서
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventOrder {
    /// 부모 로그 다음에 각 자식 로그 (깊이 우선)
    #[default]
    ParentFirst,
    /// 도착 순서 (`seq` 기준)
    Arrival,
}
