//! Model / Tool 호출 기록
//!
//! 외부 모델/도구 호출을 감싸서 훅 실행, 이벤트 기록, limit 대상
//! stat 키 갱신을 처리합니다. 취소를 관측한 호출은 `Error::Cancelled`를
//! 반환하고 이후 아무것도 발행하지 않습니다.

use async_trait::async_trait;
use forgeloop_core::{
    ExecutionContext, ModelRequest, ModelResponse, StreamChunk, StreamHub, ToolCall, ToolOutput,
    MODEL_TOPIC,
};
use forgeloop_foundation::{keys, Error, EventKind, Result};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, warn};

// ============================================================================
// Collaborator traits
// ============================================================================

/// 모델 제공자. 부분 출력은 도착하는 대로 `sink`로 스트리밍합니다.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, request: &ModelRequest, sink: &ChunkSink) -> Result<ModelResponse>;
}

/// 도구 구현
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn name(&self) -> &str;

    async fn call(&self, ctx: &ExecutionContext, call: &ToolCall) -> Result<Value>;
}

/// 컨텍스트의 한 토픽으로 청크를 발행 (절대 블로킹하지 않음)
#[derive(Clone)]
pub struct ChunkSink {
    hub: StreamHub,
    topic: String,
    source: String,
}

impl ChunkSink {
    pub fn new(ctx: &ExecutionContext, topic: impl Into<String>) -> Self {
        Self {
            hub: ctx.streams().clone(),
            topic: topic.into(),
            source: ctx.name().to_string(),
        }
    }

    pub fn send(&self, content: impl Into<String>) {
        self.hub.publish(StreamChunk {
            topic: self.topic.clone(),
            source: self.source.clone(),
            content: content.into(),
        });
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

// ============================================================================
// Model calls
// ============================================================================

/// `ctx`에서 모델 호출 실행
///
/// `model_calls`, 토큰 counter(전체/모델별), `last_call.*` gauge를 기록합니다.
/// counter 기록이 limit을 넘기면 완료 이벤트와 `AfterModelCall`을 건너뛰고
/// `Error::Cancelled`를 반환합니다.
pub async fn call_model(
    ctx: &ExecutionContext,
    client: &dyn ModelClient,
    request: &ModelRequest,
) -> Result<ModelResponse> {
    if ctx.is_cancelled() {
        return Err(Error::Cancelled);
    }

    ctx.hooks().run_before_model_call(ctx, request).await?;
    ctx.append_event(EventKind::ModelCallStarted {
        model: request.model.clone(),
    });
    debug!(context = %ctx.name(), model = %request.model, "Model call started");

    let sink = ChunkSink::new(ctx, MODEL_TOPIC);
    let started = Instant::now();
    let outcome = tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(Error::Cancelled),
        response = client.complete(request, &sink) => response,
    };
    let duration = started.elapsed();
    let duration_ms = duration.as_millis() as u64;

    let response = match outcome {
        Ok(response) => response,
        Err(Error::Cancelled) => {
            debug!(context = %ctx.name(), model = %request.model, "Model call cancelled");
            return Err(Error::Cancelled);
        }
        Err(e) => {
            ctx.incr_counter(keys::MODEL_CALLS, 1);
            ctx.incr_counter(keys::MODEL_ERRORS, 1);
            ctx.append_event(EventKind::ModelCallFinished {
                model: request.model.clone(),
                input_tokens: 0,
                output_tokens: 0,
                duration_ms,
                error: Some(e.to_string()),
            });
            warn!(context = %ctx.name(), model = %request.model, error = %e, "Model call failed");
            ctx.hooks().run_on_error(ctx, &e).await;
            return Err(e);
        }
    };

    let usage = response.usage;
    ctx.incr_counter(keys::MODEL_CALLS, 1);
    ctx.incr_counter(keys::INPUT_TOKENS, usage.input_tokens as i64);
    ctx.incr_counter(keys::OUTPUT_TOKENS, usage.output_tokens as i64);
    ctx.incr_counter(keys::TOTAL_TOKENS, usage.total() as i64);
    ctx.incr_counter(&keys::model_tokens(&request.model), usage.total() as i64);
    ctx.set_gauge(keys::LAST_CALL_INPUT_TOKENS, usage.input_tokens as f64);
    ctx.set_gauge(keys::LAST_CALL_OUTPUT_TOKENS, usage.output_tokens as f64);
    ctx.set_gauge(keys::LAST_CALL_DURATION_MS, duration_ms as f64);

    // This call may have breached a limit and torn the tree down.
    if ctx.is_cancelled() {
        debug!(context = %ctx.name(), model = %request.model, "Cancelled after recording usage");
        return Err(Error::Cancelled);
    }

    ctx.append_event(EventKind::ModelCallFinished {
        model: request.model.clone(),
        input_tokens: usage.input_tokens,
        output_tokens: usage.output_tokens,
        duration_ms,
        error: None,
    });
    ctx.hooks()
        .run_after_model_call(ctx, request, &response, duration)
        .await?;

    Ok(response)
}

// ============================================================================
// Tool calls
// ============================================================================

/// `ctx`에서 도구 호출 실행 ([`call_model`]과 같은 흐름)
pub async fn call_tool(
    ctx: &ExecutionContext,
    handler: &dyn ToolHandler,
    call: &ToolCall,
) -> Result<ToolOutput> {
    if ctx.is_cancelled() {
        return Err(Error::Cancelled);
    }

    ctx.hooks().run_before_tool_call(ctx, call).await?;
    ctx.append_event(EventKind::ToolCallStarted {
        tool: call.name.clone(),
    });

    let started = Instant::now();
    let outcome = tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(Error::Cancelled),
        content = handler.call(ctx, call) => content,
    };
    let duration_ms = started.elapsed().as_millis() as u64;

    let content = match outcome {
        Ok(content) => content,
        Err(Error::Cancelled) => return Err(Error::Cancelled),
        Err(e) => {
            let e = match e {
                Error::Tool { .. } => e,
                other => Error::tool(call.name.clone(), other.to_string()),
            };
            ctx.incr_counter(keys::TOOL_CALLS, 1);
            ctx.incr_counter(keys::TOOL_ERRORS, 1);
            ctx.append_event(EventKind::ToolCallFinished {
                tool: call.name.clone(),
                duration_ms,
                error: Some(e.to_string()),
            });
            warn!(context = %ctx.name(), tool = %call.name, error = %e, "Tool call failed");
            ctx.hooks().run_on_error(ctx, &e).await;
            return Err(e);
        }
    };

    ctx.incr_counter(keys::TOOL_CALLS, 1);
    if ctx.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let output = ToolOutput::new(call.id.clone(), content, duration_ms);
    ctx.append_event(EventKind::ToolCallFinished {
        tool: call.name.clone(),
        duration_ms,
        error: None,
    });
    ctx.hooks().run_after_tool_call(ctx, call, &output).await?;
    debug!(context = %ctx.name(), tool = %call.name, duration_ms, "Tool call completed");

    Ok(output)
}

// ============================================================================
// Parse errors
// ============================================================================

/// step 출력 파싱 실패 기록. 이 노드의 연속 실패 횟수를 반환합니다.
pub fn record_parse_error(ctx: &ExecutionContext, message: impl Into<String>) -> i64 {
    let message = message.into();
    ctx.incr_counter(keys::PARSE_ERRORS_TOTAL, 1);
    let consecutive = ctx.incr_counter(keys::PARSE_ERRORS_CONSECUTIVE, 1);
    warn!(context = %ctx.name(), consecutive, error = %message, "Parse error");
    ctx.append_event(EventKind::ParseError {
        message,
        consecutive,
    });
    consecutive
}

/// 이 노드와 조상의 연속 파싱 실패 횟수 리셋
pub fn record_parse_success(ctx: &ExecutionContext) {
    ctx.reset_counter(keys::PARSE_ERRORS_CONSECUTIVE);
}
