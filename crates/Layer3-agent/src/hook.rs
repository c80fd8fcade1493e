//! Built-in Hooks
//!
//! 기본 제공 훅입니다. `HookRegistry`에 등록해 사용합니다.

use async_trait::async_trait;
use forgeloop_core::{
    AfterExecutionHook, AfterIterationHook, AfterModelCallHook, AfterToolCallHook,
    AgentLoopResult, BeforeExecutionHook, BeforeIterationHook, BeforeModelCallHook,
    BeforeToolCallHook, ErrorHook, ExecutionContext, Hook, ModelRequest, ModelResponse,
    Termination, ToolCall, ToolOutput,
};
use forgeloop_foundation::{keys, Error, Result};
use std::time::Duration;

// ============================================================================
// LoggingHook
// ============================================================================

/// 로깅 Hook
///
/// 모든 생명주기 이벤트를 tracing으로 로깅합니다.
#[derive(Debug, Clone, Default)]
pub struct LoggingHook {
    log_tool_args: bool,
    log_prompts: bool,
}

impl LoggingHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool_args(mut self) -> Self {
        self.log_tool_args = true;
        self
    }

    pub fn with_prompts(mut self) -> Self {
        self.log_prompts = true;
        self
    }
}

impl Hook for LoggingHook {
    fn name(&self) -> &str {
        "logging"
    }

    fn as_before_execution(&self) -> Option<&dyn BeforeExecutionHook> {
        Some(self)
    }

    fn as_after_execution(&self) -> Option<&dyn AfterExecutionHook> {
        Some(self)
    }

    fn as_before_iteration(&self) -> Option<&dyn BeforeIterationHook> {
        Some(self)
    }

    fn as_after_iteration(&self) -> Option<&dyn AfterIterationHook> {
        Some(self)
    }

    fn as_error(&self) -> Option<&dyn ErrorHook> {
        Some(self)
    }

    fn as_before_model_call(&self) -> Option<&dyn BeforeModelCallHook> {
        Some(self)
    }

    fn as_after_model_call(&self) -> Option<&dyn AfterModelCallHook> {
        Some(self)
    }

    fn as_before_tool_call(&self) -> Option<&dyn BeforeToolCallHook> {
        Some(self)
    }

    fn as_after_tool_call(&self) -> Option<&dyn AfterToolCallHook> {
        Some(self)
    }
}

#[async_trait]
impl BeforeExecutionHook for LoggingHook {
    async fn before_execution(&self, ctx: &ExecutionContext) -> Result<()> {
        tracing::info!(
            context = %ctx.name(),
            limits = ctx.limits().len(),
            scratchpad = ctx.scratchpad_len(),
            "Agent loop starting"
        );
        Ok(())
    }
}

#[async_trait]
impl AfterExecutionHook for LoggingHook {
    async fn after_execution(&self, ctx: &ExecutionContext, termination: &Termination) -> Result<()> {
        tracing::info!(
            context = %ctx.name(),
            reason = %termination.reason,
            iterations = ctx.iteration(),
            input_tokens = ctx.get_counter(keys::INPUT_TOKENS),
            output_tokens = ctx.get_counter(keys::OUTPUT_TOKENS),
            "Agent loop completed"
        );
        if let Some(exceeded) = &termination.exceeded_limit {
            tracing::warn!(
                context = %ctx.name(),
                key = %exceeded.key,
                value = exceeded.value,
                max = exceeded.limit.max_value,
                "Stopped by limit"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl BeforeIterationHook for LoggingHook {
    async fn before_iteration(&self, ctx: &ExecutionContext, iteration: u64) -> Result<()> {
        tracing::debug!(context = %ctx.name(), iteration, "Iteration starting");
        Ok(())
    }
}

#[async_trait]
impl AfterIterationHook for LoggingHook {
    async fn after_iteration(
        &self,
        ctx: &ExecutionContext,
        iteration: u64,
        result: &AgentLoopResult,
    ) -> Result<()> {
        tracing::debug!(
            context = %ctx.name(),
            iteration,
            action = %result.action,
            "Iteration completed"
        );
        Ok(())
    }
}

#[async_trait]
impl ErrorHook for LoggingHook {
    async fn on_error(&self, ctx: &ExecutionContext, error: &Error) {
        tracing::error!(context = %ctx.name(), error = %error, "Agent error occurred");
    }
}

#[async_trait]
impl BeforeModelCallHook for LoggingHook {
    async fn before_model_call(&self, ctx: &ExecutionContext, request: &ModelRequest) -> Result<()> {
        if self.log_prompts {
            tracing::debug!(
                context = %ctx.name(),
                model = %request.model,
                prompt = %request.prompt,
                "Calling model"
            );
        } else {
            tracing::debug!(context = %ctx.name(), model = %request.model, "Calling model");
        }
        Ok(())
    }
}

#[async_trait]
impl AfterModelCallHook for LoggingHook {
    async fn after_model_call(
        &self,
        ctx: &ExecutionContext,
        request: &ModelRequest,
        response: &ModelResponse,
        duration: Duration,
    ) -> Result<()> {
        tracing::debug!(
            context = %ctx.name(),
            model = %request.model,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            duration_ms = duration.as_millis() as u64,
            "Model call completed"
        );
        Ok(())
    }
}

#[async_trait]
impl BeforeToolCallHook for LoggingHook {
    async fn before_tool_call(&self, ctx: &ExecutionContext, call: &ToolCall) -> Result<()> {
        if self.log_tool_args {
            tracing::debug!(
                context = %ctx.name(),
                tool = %call.name,
                id = %call.id,
                args = %call.arguments,
                "Executing tool"
            );
        } else {
            tracing::debug!(context = %ctx.name(), tool = %call.name, id = %call.id, "Executing tool");
        }
        Ok(())
    }
}

#[async_trait]
impl AfterToolCallHook for LoggingHook {
    async fn after_tool_call(
        &self,
        ctx: &ExecutionContext,
        call: &ToolCall,
        output: &ToolOutput,
    ) -> Result<()> {
        tracing::debug!(
            context = %ctx.name(),
            tool = %call.name,
            duration_ms = output.duration_ms,
            "Tool completed"
        );
        Ok(())
    }
}
