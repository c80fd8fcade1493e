//! Hook System - 실행 생명주기 훅
//!
//! 훅은 이벤트 종류별 capability 트레이트를 선택적으로 구현합니다.
//! `Hook::as_*` 메서드가 구현한 capability를 노출하고, `HookRegistry`는
//! 각 이벤트를 해당 capability를 가진 훅에게만 등록 순서대로 전달합니다.
//!
//! ## 사용 예시
//! ```ignore
//! struct Guard;
//!
//! #[async_trait]
//! impl BeforeIterationHook for Guard {
//!     async fn before_iteration(&self, ctx: &ExecutionContext, iteration: u64) -> Result<()> {
//!         if iteration > 3 { return Err(Error::hook("guard", "too many")); }
//!         Ok(())
//!     }
//! }
//!
//! impl Hook for Guard {
//!     fn name(&self) -> &str { "guard" }
//!     fn as_before_iteration(&self) -> Option<&dyn BeforeIterationHook> { Some(self) }
//! }
//!
//! registry.register(Arc::new(Guard));
//! ```

use crate::context::{ExecutionContext, Termination};
use crate::types::{AgentLoopResult, ModelRequest, ModelResponse, ToolCall, ToolOutput};
use async_trait::async_trait;
use forgeloop_foundation::{Error, Result};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

// ============================================================================
// Capability traits
// ============================================================================

/// 실행 시작 전. 에러는 실행을 시작하지 않고 `HookAbort`로 끝냅니다.
#[async_trait]
pub trait BeforeExecutionHook: Send + Sync {
    async fn before_execution(&self, ctx: &ExecutionContext) -> Result<()>;
}

/// 실행 종료 후. 에러는 에러 훅에만 보고되고 결과를 바꾸지 않습니다.
#[async_trait]
pub trait AfterExecutionHook: Send + Sync {
    async fn after_execution(&self, ctx: &ExecutionContext, termination: &Termination)
        -> Result<()>;
}

#[async_trait]
pub trait BeforeIterationHook: Send + Sync {
    async fn before_iteration(&self, ctx: &ExecutionContext, iteration: u64) -> Result<()>;
}

#[async_trait]
pub trait AfterIterationHook: Send + Sync {
    async fn after_iteration(
        &self,
        ctx: &ExecutionContext,
        iteration: u64,
        result: &AgentLoopResult,
    ) -> Result<()>;
}

/// 에러 관찰자
#[async_trait]
pub trait ErrorHook: Send + Sync {
    async fn on_error(&self, ctx: &ExecutionContext, error: &Error);
}

#[async_trait]
pub trait BeforeModelCallHook: Send + Sync {
    async fn before_model_call(&self, ctx: &ExecutionContext, request: &ModelRequest)
        -> Result<()>;
}

#[async_trait]
pub trait AfterModelCallHook: Send + Sync {
    async fn after_model_call(
        &self,
        ctx: &ExecutionContext,
        request: &ModelRequest,
        response: &ModelResponse,
        duration: Duration,
    ) -> Result<()>;
}

#[async_trait]
pub trait BeforeToolCallHook: Send + Sync {
    async fn before_tool_call(&self, ctx: &ExecutionContext, call: &ToolCall) -> Result<()>;
}

#[async_trait]
pub trait AfterToolCallHook: Send + Sync {
    async fn after_tool_call(
        &self,
        ctx: &ExecutionContext,
        call: &ToolCall,
        output: &ToolOutput,
    ) -> Result<()>;
}

// ============================================================================
// Hook
// ============================================================================

/// 등록 단위
///
/// 구현한 capability에 대해서만 `Some(self)`를 반환합니다.
pub trait Hook: Send + Sync {
    /// Hook 이름 (디버깅/로깅용)
    fn name(&self) -> &str;

    fn as_before_execution(&self) -> Option<&dyn BeforeExecutionHook> {
        None
    }

    fn as_after_execution(&self) -> Option<&dyn AfterExecutionHook> {
        None
    }

    fn as_before_iteration(&self) -> Option<&dyn BeforeIterationHook> {
        None
    }

    fn as_after_iteration(&self) -> Option<&dyn AfterIterationHook> {
        None
    }

    fn as_error(&self) -> Option<&dyn ErrorHook> {
        None
    }

    fn as_before_model_call(&self) -> Option<&dyn BeforeModelCallHook> {
        None
    }

    fn as_after_model_call(&self) -> Option<&dyn AfterModelCallHook> {
        None
    }

    fn as_before_tool_call(&self) -> Option<&dyn BeforeToolCallHook> {
        None
    }

    fn as_after_tool_call(&self) -> Option<&dyn AfterToolCallHook> {
        None
    }
}

/// Attach the failing hook's name unless the error already names one.
fn attribute(hook: &dyn Hook, error: Error) -> Error {
    match error {
        Error::Hook { .. } => error,
        other => Error::hook(hook.name(), other.to_string()),
    }
}

// ============================================================================
// HookRegistry
// ============================================================================

/// Hook 레지스트리
///
/// 여러 Hook을 등록 순서대로 실행합니다. `before_*`/`after_*` 디스패치는
/// 첫 번째 에러에서 멈추고 그 에러를 반환합니다.
#[derive(Default)]
pub struct HookRegistry {
    hooks: RwLock<Vec<Arc<dyn Hook>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hook 등록
    pub fn register(&self, hook: Arc<dyn Hook>) {
        debug!(hook = hook.name(), "Hook registered");
        self.hooks.write().push(hook);
    }

    pub fn with_hook(self, hook: Arc<dyn Hook>) -> Self {
        self.register(hook);
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.read().is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.hooks.read().iter().map(|h| h.name().to_string()).collect()
    }

    /// Snapshot so no lock is held across an await.
    fn snapshot(&self) -> Vec<Arc<dyn Hook>> {
        self.hooks.read().clone()
    }

    pub async fn run_before_execution(&self, ctx: &ExecutionContext) -> Result<()> {
        for hook in self.snapshot() {
            if let Some(h) = hook.as_before_execution() {
                h.before_execution(ctx)
                    .await
                    .map_err(|e| attribute(hook.as_ref(), e))?;
            }
        }
        Ok(())
    }

    /// 모든 훅을 실행하고 실패들을 모아 반환
    pub async fn run_after_execution(
        &self,
        ctx: &ExecutionContext,
        termination: &Termination,
    ) -> Vec<Error> {
        let mut failures = Vec::new();
        for hook in self.snapshot() {
            if let Some(h) = hook.as_after_execution() {
                if let Err(e) = h.after_execution(ctx, termination).await {
                    warn!(hook = hook.name(), error = %e, "AfterExecution hook failed");
                    failures.push(attribute(hook.as_ref(), e));
                }
            }
        }
        failures
    }

    pub async fn run_before_iteration(&self, ctx: &ExecutionContext, iteration: u64) -> Result<()> {
        for hook in self.snapshot() {
            if let Some(h) = hook.as_before_iteration() {
                h.before_iteration(ctx, iteration)
                    .await
                    .map_err(|e| attribute(hook.as_ref(), e))?;
            }
        }
        Ok(())
    }

    pub async fn run_after_iteration(
        &self,
        ctx: &ExecutionContext,
        iteration: u64,
        result: &AgentLoopResult,
    ) -> Result<()> {
        for hook in self.snapshot() {
            if let Some(h) = hook.as_after_iteration() {
                h.after_iteration(ctx, iteration, result)
                    .await
                    .map_err(|e| attribute(hook.as_ref(), e))?;
            }
        }
        Ok(())
    }

    /// 모든 에러 훅에 전달
    pub async fn run_on_error(&self, ctx: &ExecutionContext, error: &Error) {
        for hook in self.snapshot() {
            if let Some(h) = hook.as_error() {
                h.on_error(ctx, error).await;
            }
        }
    }

    pub async fn run_before_model_call(
        &self,
        ctx: &ExecutionContext,
        request: &ModelRequest,
    ) -> Result<()> {
        for hook in self.snapshot() {
            if let Some(h) = hook.as_before_model_call() {
                h.before_model_call(ctx, request)
                    .await
                    .map_err(|e| attribute(hook.as_ref(), e))?;
            }
        }
        Ok(())
    }

    pub async fn run_after_model_call(
        &self,
        ctx: &ExecutionContext,
        request: &ModelRequest,
        response: &ModelResponse,
        duration: Duration,
    ) -> Result<()> {
        for hook in self.snapshot() {
            if let Some(h) = hook.as_after_model_call() {
                h.after_model_call(ctx, request, response, duration)
                    .await
                    .map_err(|e| attribute(hook.as_ref(), e))?;
            }
        }
        Ok(())
    }

    pub async fn run_before_tool_call(&self, ctx: &ExecutionContext, call: &ToolCall) -> Result<()> {
        for hook in self.snapshot() {
            if let Some(h) = hook.as_before_tool_call() {
                h.before_tool_call(ctx, call)
                    .await
                    .map_err(|e| attribute(hook.as_ref(), e))?;
            }
        }
        Ok(())
    }

    pub async fn run_after_tool_call(
        &self,
        ctx: &ExecutionContext,
        call: &ToolCall,
        output: &ToolOutput,
    ) -> Result<()> {
        for hook in self.snapshot() {
            if let Some(h) = hook.as_after_tool_call() {
                h.after_tool_call(ctx, call, output)
                    .await
                    .map_err(|e| attribute(hook.as_ref(), e))?;
            }
        }
        Ok(())
    }
}
