//! Event System - 실행 컨텍스트별 이벤트 로그
//!
//! 각 실행 컨텍스트는 자신만의 append-only 이벤트 로그를 가집니다.
//! 한 번 추가된 이벤트는 수정/삭제되지 않습니다.
//!
//! ## 구조
//!
//! ```text
//! root ─┬─ [ExecutionStarted, IterationStarted, ChildSpawned, ...]
//!       ├─ child-0 ─ [ModelCallStarted, ModelCallFinished]
//!       └─ child-1 ─ [ModelCallStarted, LimitExceeded]
//! ```
//!
//! 전체 트리의 이벤트는 `ExecutionContext::collect_events`로 수집합니다.

pub mod types;

pub use types::{Event, EventCategory, EventId, EventKind, EventOrder, EventSeverity};
