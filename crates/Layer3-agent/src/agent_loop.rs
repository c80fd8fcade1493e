//! Step function contract

use async_trait::async_trait;
use forgeloop_core::{AgentLoopResult, ExecutionContext};
use forgeloop_foundation::Result;
use std::future::Future;
use std::sync::Arc;

/// The algorithm the executor invokes once per iteration.
///
/// Receives the context explicitly; it may spawn children and hand them to
/// concurrent tasks.
#[async_trait]
pub trait AgentLoop: Send + Sync {
    async fn next(&self, ctx: &Arc<ExecutionContext>) -> Result<AgentLoopResult>;
}

/// `AgentLoop` backed by a closure.
pub struct FnLoop<F> {
    f: F,
}

/// Wrap an async closure as an `AgentLoop`.
///
/// ```ignore
/// let step = loop_fn(|ctx| async move {
///     ctx.push_scratchpad(ScratchpadEntry::step(ctx.iteration(), "thinking"));
///     Ok(AgentLoopResult::next())
/// });
/// ```
pub fn loop_fn<F, Fut>(f: F) -> FnLoop<F>
where
    F: Fn(Arc<ExecutionContext>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<AgentLoopResult>> + Send + 'static,
{
    FnLoop { f }
}

#[async_trait]
impl<F, Fut> AgentLoop for FnLoop<F>
where
    F: Fn(Arc<ExecutionContext>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<AgentLoopResult>> + Send + 'static,
{
    async fn next(&self, ctx: &Arc<ExecutionContext>) -> Result<AgentLoopResult> {
        (self.f)(Arc::clone(ctx)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_loop_fn_sees_context() {
        let step = loop_fn(|ctx: Arc<ExecutionContext>| async move {
            Ok(AgentLoopResult::terminate(json!(ctx.name())))
        });
        let ctx = ExecutionContext::builder("root").build();

        let result = tokio_test::block_on(step.next(&ctx)).unwrap();
        assert_eq!(result.result, Some(json!("root")));
    }
}
