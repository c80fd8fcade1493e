//! # forgeloop-agent
//!
//! Agent loop for ForgeLoop - 실행 트리 위에서 step 함수를 반복 실행합니다.
//!
//! ## 핵심 컴포넌트
//!
//! - **Executor**: 반복 상태 머신 (취소 → limits → 컴팩션 → 훅 → step → 훅)
//! - **AgentLoop**: 반복마다 호출되는 step 함수 트레이트
//! - **calls**: 모델/도구 호출 기록 (훅, 이벤트, 토큰 counter, 취소 처리)
//! - **fanout**: 자식 컨텍스트 병렬 실행
//! - **Hook**: 기본 제공 `LoggingHook`
//!
//! ## 사용 예
//!
//! ```ignore
//! use forgeloop_agent::{call_model, loop_fn, Executor, LoggingHook};
//! use forgeloop_core::{AgentLoopResult, ExecutionContext, HookRegistry, ModelRequest};
//! use forgeloop_foundation::Limit;
//!
//! let hooks = Arc::new(HookRegistry::new().with_hook(Arc::new(LoggingHook::new())));
//! let root = ExecutionContext::builder("root")
//!     .limits(vec![Limit::max_input_tokens(10_000)])
//!     .hooks(hooks)
//!     .build();
//!
//! let client = Arc::new(my_client);
//! let executor = Executor::new(loop_fn(move |ctx| {
//!     let client = Arc::clone(&client);
//!     async move {
//!         call_model(&ctx, client.as_ref(), &ModelRequest::new("model-a", "next step")).await?;
//!         Ok(AgentLoopResult::next())
//!     }
//! }));
//!
//! let termination = executor.run(&root).await;
//! ```

pub mod agent_loop;
pub mod calls;
pub mod executor;
pub mod fanout;
pub mod hook;

// ============================================================================
// Primary Exports
// ============================================================================

pub use agent_loop::{loop_fn, AgentLoop, FnLoop};
pub use executor::{Executor, ExecutorState};

// Call recording
pub use calls::{
    call_model, call_tool, record_parse_error, record_parse_success, ChunkSink, ModelClient,
    ToolHandler,
};

// Fan-out
pub use fanout::{fan_out, ChildJob};

// Hook system
pub use hook::LoggingHook;
