//! forgeloop-core: Core Runtime for ForgeLoop
//!
//! Layer2 - 실행 트리와 확장 지점
//!
//! # 주요 모듈
//!
//! - `context`: 실행 컨텍스트 트리 (stats 전파, 제한, 종료, 이벤트, 취소)
//! - `data`: 작업 메모리 (task + copy-on-write 스크래치패드)
//! - `stream`: 논블로킹 pub/sub 토픽
//! - `hook`: 생명주기 훅 capability 트레이트와 레지스트리
//! - `compaction`: Trigger/Strategy 컴팩션
//! - `types`: 루프 결과, 모델/도구 호출 타입
//!
//! # 사용 예시
//!
//! ```ignore
//! use forgeloop_core::{AgentData, ExecutionContext};
//! use forgeloop_foundation::{keys, Limit};
//!
//! let root = ExecutionContext::builder("root")
//!     .data(AgentData::new("summarize the repo"))
//!     .limits(vec![Limit::max_iterations(20)])
//!     .build();
//!
//! let worker = root.spawn_child("worker", AgentData::new("read src/"));
//! worker.incr_counter(keys::INPUT_TOKENS, 120);
//! root.complete_child(&worker)?;
//! ```

pub mod compaction;
pub mod context;
pub mod data;
pub mod hook;
pub mod stream;
pub mod types;

// Re-exports: Context
pub use context::{ExecutionContext, ExecutionContextBuilder, Termination};

// Re-exports: Working memory
pub use data::{AgentData, EntryKind, ScratchpadEntry};

// Re-exports: Streams
pub use stream::{StreamChunk, StreamHub, Unsubscribe, MODEL_TOPIC};

// Re-exports: Hooks
pub use hook::{
    AfterExecutionHook, AfterIterationHook, AfterModelCallHook, AfterToolCallHook,
    BeforeExecutionHook, BeforeIterationHook, BeforeModelCallHook, BeforeToolCallHook, ErrorHook,
    Hook, HookRegistry,
};

// Re-exports: Compaction
pub use compaction::{
    Compaction, CompactionStrategy, CompactionTrigger, DigestSummarizer, EveryNIterations,
    GaugeThreshold, ScratchpadLengthTrigger, SlidingWindow, Summarizer, SummarizingStrategy,
};

// Re-exports: Types
pub use types::{AgentLoopResult, ModelRequest, ModelResponse, ModelUsage, ToolCall, ToolOutput};
