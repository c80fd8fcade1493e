//! # forgeloop-foundation
//!
//! Foundation layer for ForgeLoop:
//! - Error: 통합 에러 타입
//! - Config: 제한 및 컴팩션 설정 (JSON/TOML)
//! - Stats: 노드별 counter/gauge 저장소
//! - Limit: 제한 정의와 평가 (first match wins)
//! - Event: 실행 트리 이벤트 타입
//! - Buffer: 생산자를 절대 막지 않는 큐
//!
//! ## 아키텍처
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │  Layer3-agent   Executor · AgentLoop · call recording  │
//! │  Layer2-core    ExecutionContext tree · hooks · compaction │
//! │  Layer1-foundation  Stats · Limit · Event · Buffer      │
//! └────────────────────────────────────────────────────────┘
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod limit;
pub mod stats;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config (설정)
// ============================================================================
pub use config::{CompactionConfig, ForgeLoopConfig, LimitsConfig, StrategyConfig, TriggerConfig};

// ============================================================================
// Stats & Limits
// ============================================================================
pub use limit::{evaluate as evaluate_limits, ExceededLimit, Limit, LimitType};
pub use stats::{keys, Stats};

// ============================================================================
// Event (이벤트)
// ============================================================================
pub use event::{Event, EventCategory, EventId, EventKind, EventOrder, EventSeverity};

// ============================================================================
// Lifecycle
// ============================================================================
pub use lifecycle::{LoopAction, TerminationReason};

// ============================================================================
// Buffer
// ============================================================================
pub use buffer::NonBlockingBuffer;
