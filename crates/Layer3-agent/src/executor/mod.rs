//! Executor - 반복 상태 머신
//!
//! 하나의 루트 컨텍스트에서 step 함수를 반복 호출합니다.
//!
//! ## 반복 순서
//! 1. 토큰 취소 확인 (기록된 제한 초과가 있으면 `LimitExceeded`, 없으면 `ContextCanceled`)
//! 2. 현재 스냅샷으로 limits 재평가
//! 3. 컴팩션 (Trigger → Strategy → counter/event → notify)
//! 4. `start_iteration`
//! 5. BeforeIteration 훅
//! 6. step 함수
//! 7. `end_iteration`
//! 8. AfterIteration 훅
//! 9. `Terminate`면 성공 종료, 아니면 1로
//!
//! 컴팩션은 이전 반복의 AfterIteration 이후, 다음 반복의 BeforeIteration
//! 이전에 실행되므로 Trigger는 직전 반복이 남긴 게이지를 봅니다.
//!
//! 정리 단계는 항상 실행됩니다: 스트림을 닫고, BeforeExecution이 성공했다면
//! AfterExecution을 호출합니다. AfterExecution 실패는 에러 훅에만 전달되고
//! 이미 결정된 결과를 바꾸지 않습니다.

mod state;

pub use state::ExecutorState;

use crate::agent_loop::AgentLoop;
use forgeloop_core::{Compaction, ExecutionContext, Termination};
use forgeloop_foundation::{keys, Error, EventKind, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Step 함수를 구동하는 Executor
pub struct Executor {
    agent: Arc<dyn AgentLoop>,
    state: Mutex<ExecutorState>,
    outcome: Mutex<Option<Termination>>,
}

impl Executor {
    pub fn new(agent: impl AgentLoop + 'static) -> Self {
        Self::from_arc(Arc::new(agent))
    }

    pub fn from_arc(agent: Arc<dyn AgentLoop>) -> Self {
        Self {
            agent,
            state: Mutex::new(ExecutorState::Idle),
            outcome: Mutex::new(None),
        }
    }

    /// 현재 상태
    pub fn state(&self) -> ExecutorState {
        *self.state.lock()
    }

    fn set_state(&self, state: ExecutorState) {
        debug!(%state, "Executor state");
        *self.state.lock() = state;
    }

    /// 기록된 종료 결과 (종료 전에는 `None`)
    pub fn outcome(&self) -> Option<Termination> {
        self.outcome.lock().clone()
    }

    /// 종료될 때까지 실행
    ///
    /// 이미 종료된 Executor는 다시 실행하지 않고 기록된 결과를 반환합니다.
    pub async fn run(&self, ctx: &Arc<ExecutionContext>) -> Termination {
        {
            let mut state = self.state.lock();
            if let Some(done) = self.outcome.lock().clone() {
                return done;
            }
            let current = *state;
            if current != ExecutorState::Idle {
                warn!(context = %ctx.name(), state = %current, "Executor is already running");
                return Termination::error(&Error::Internal("executor is already running".into()));
            }
            *state = ExecutorState::BeforeExecution;
        }

        let hooks = Arc::clone(ctx.hooks());
        info!(context = %ctx.name(), task = %ctx.task(), "Execution started");
        ctx.append_event(EventKind::ExecutionStarted);

        let started = match hooks.run_before_execution(ctx).await {
            Ok(()) => true,
            Err(e) => {
                warn!(context = %ctx.name(), error = %e, "BeforeExecution hook aborted");
                hooks.run_on_error(ctx, &e).await;
                ctx.set_termination(Termination::hook_abort(&e));
                false
            }
        };

        if started {
            let termination = self.iterate(ctx).await;
            ctx.set_termination(termination);
        }

        // 다른 쪽이 먼저 기록했다면 그 결과가 우선
        let termination = ctx.termination().unwrap_or_else(Termination::canceled);

        // Cleanup
        ctx.close_streams();
        if started {
            for failure in hooks.run_after_execution(ctx, &termination).await {
                hooks.run_on_error(ctx, &failure).await;
            }
        }

        ctx.append_event(EventKind::ExecutionFinished {
            reason: termination.reason,
            error: termination.error.clone(),
        });
        info!(
            context = %ctx.name(),
            reason = %termination.reason,
            iterations = ctx.iteration(),
            "Execution finished"
        );

        // outcome은 Terminated 상태보다 먼저 기록
        *self.outcome.lock() = Some(termination.clone());
        self.set_state(ExecutorState::Terminated {
            reason: termination.reason,
        });
        termination
    }

    async fn iterate(&self, ctx: &Arc<ExecutionContext>) -> Termination {
        let hooks = Arc::clone(ctx.hooks());

        loop {
            // 1. 취소
            if ctx.is_cancelled() {
                return cancelled_outcome(ctx);
            }

            // 2. 쓰기 시점 검사를 거치지 않은 값까지 재평가
            if let Some(exceeded) = ctx.evaluate_limits() {
                return Termination::limit_exceeded(exceeded);
            }

            // 3. 컴팩션
            if let Some(compaction) = ctx.compaction() {
                if compaction.trigger.should_compact(ctx) {
                    self.set_state(ExecutorState::Compacting);
                    if let Err(e) = compact(ctx, &compaction).await {
                        warn!(context = %ctx.name(), error = %e, "Compaction failed");
                        hooks.run_on_error(ctx, &e).await;
                        return Termination::compaction_failed(&e);
                    }
                }
            }

            // 4.
            let iteration = ctx.start_iteration();
            self.set_state(ExecutorState::Running { iteration });

            // 5.
            if let Err(e) = hooks.run_before_iteration(ctx, iteration).await {
                warn!(context = %ctx.name(), iteration, error = %e, "BeforeIteration hook aborted");
                hooks.run_on_error(ctx, &e).await;
                return Termination::hook_abort(&e);
            }

            // 6.
            let step_started = Instant::now();
            let result = match self.agent.next(ctx).await {
                Ok(result) => result,
                Err(e) => {
                    hooks.run_on_error(ctx, &e).await;
                    // 진행 중이던 호출은 취소되면 Cancelled로 끝나므로 원인 쪽으로 분류
                    if ctx.is_cancelled() {
                        debug!(context = %ctx.name(), iteration, error = %e, "Step aborted by cancellation");
                        return cancelled_outcome(ctx);
                    }
                    warn!(context = %ctx.name(), iteration, error = %e, "Step failed");
                    return Termination::error(&e);
                }
            };

            // 7.
            ctx.end_iteration(result.action, step_started.elapsed());

            // 8.
            if let Err(e) = hooks.run_after_iteration(ctx, iteration, &result).await {
                warn!(context = %ctx.name(), iteration, error = %e, "AfterIteration hook aborted");
                hooks.run_on_error(ctx, &e).await;
                return Termination::hook_abort(&e);
            }

            // 9.
            if result.is_terminate() {
                return Termination::success(result.result);
            }
        }
    }
}

/// Classify an observed cancellation.
fn cancelled_outcome(ctx: &ExecutionContext) -> Termination {
    match ctx.exceeded_limit() {
        Some(exceeded) => Termination::limit_exceeded(exceeded),
        None => Termination::canceled(),
    }
}

async fn compact(ctx: &ExecutionContext, compaction: &Compaction) -> Result<()> {
    let before_len = ctx.scratchpad_len();
    let started = Instant::now();

    compaction.strategy.compact(ctx).await?;

    let after_len = ctx.scratchpad_len();
    let duration_ms = started.elapsed().as_millis() as u64;
    ctx.incr_counter(keys::COMPACTIONS, 1);
    ctx.append_event(EventKind::Compaction {
        before_len,
        after_len,
        duration_ms,
    });
    compaction.trigger.notify_compacted(ctx);

    info!(
        context = %ctx.name(),
        strategy = compaction.strategy.name(),
        before_len,
        after_len,
        duration_ms,
        "Scratchpad compacted"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_loop::loop_fn;
    use forgeloop_core::{AgentLoopResult, Hook, HookRegistry};
    use forgeloop_foundation::{Limit, TerminationReason};
    use serde_json::json;

    fn terminate_at(n: u64) -> impl AgentLoop {
        loop_fn(move |ctx: Arc<ExecutionContext>| async move {
            if ctx.iteration() >= n {
                Ok(AgentLoopResult::terminate(json!({ "done": n })))
            } else {
                Ok(AgentLoopResult::next())
            }
        })
    }

    #[tokio::test]
    async fn test_success_carries_result() {
        let ctx = ExecutionContext::builder("root").build();
        let executor = Executor::new(terminate_at(3));
        assert_eq!(executor.state(), ExecutorState::Idle);

        let termination = executor.run(&ctx).await;

        assert_eq!(termination.reason, TerminationReason::Success);
        assert_eq!(termination.result, Some(json!({ "done": 3 })));
        assert_eq!(ctx.iteration(), 3);
        assert_eq!(
            executor.state(),
            ExecutorState::Terminated {
                reason: TerminationReason::Success
            }
        );
        assert!(ctx.streams().is_closed());
    }

    #[tokio::test]
    async fn test_rerun_returns_recorded_outcome() {
        let ctx = ExecutionContext::builder("root").build();
        let executor = Executor::new(terminate_at(2));

        let first = executor.run(&ctx).await;
        let second = executor.run(&ctx).await;

        assert_eq!(first, second);
        assert_eq!(ctx.iteration(), 2);
    }

    #[tokio::test]
    async fn test_step_error_terminates_error() {
        let ctx = ExecutionContext::builder("root").build();
        let executor = Executor::new(loop_fn(|_ctx: Arc<ExecutionContext>| async move {
            Err(Error::Step("bad output".into()))
        }));

        let termination = executor.run(&ctx).await;
        assert_eq!(termination.reason, TerminationReason::Error);
        assert!(termination.error.unwrap().contains("bad output"));
    }

    #[tokio::test]
    async fn test_outer_cancel_terminates_canceled() {
        let ctx = ExecutionContext::builder("root").build();
        ctx.cancel();
        let executor = Executor::new(terminate_at(10));

        let termination = executor.run(&ctx).await;
        assert_eq!(termination.reason, TerminationReason::ContextCanceled);
        assert_eq!(ctx.iteration(), 0);
    }

    #[tokio::test]
    async fn test_external_counter_caught_before_iteration() {
        let ctx = ExecutionContext::builder("root").build();
        ctx.incr_counter("custom", 10);
        // 쓰기 이후에 설정된 limit는 쓰기 시점 검사를 거치지 않음
        ctx.set_limits(vec![Limit::exact("custom", 5.0)]);
        assert!(ctx.exceeded_limit().is_none());
        let executor = Executor::new(terminate_at(10));

        let termination = executor.run(&ctx).await;
        assert_eq!(termination.reason, TerminationReason::LimitExceeded);
        assert_eq!(termination.exceeded_limit.unwrap().key, "custom");
    }

    /// Vetoes the execution before it starts.
    struct Veto;

    #[async_trait::async_trait]
    impl forgeloop_core::BeforeExecutionHook for Veto {
        async fn before_execution(&self, _ctx: &ExecutionContext) -> Result<()> {
            Err(Error::hook("veto", "not today"))
        }
    }

    #[async_trait::async_trait]
    impl forgeloop_core::AfterExecutionHook for Veto {
        async fn after_execution(
            &self,
            _ctx: &ExecutionContext,
            _termination: &Termination,
        ) -> Result<()> {
            panic!("AfterExecution must not run when BeforeExecution failed");
        }
    }

    impl Hook for Veto {
        fn name(&self) -> &str {
            "veto"
        }

        fn as_before_execution(&self) -> Option<&dyn forgeloop_core::BeforeExecutionHook> {
            Some(self)
        }

        fn as_after_execution(&self) -> Option<&dyn forgeloop_core::AfterExecutionHook> {
            Some(self)
        }
    }

    #[tokio::test]
    async fn test_before_execution_abort_skips_after_execution() {
        let hooks = Arc::new(HookRegistry::new().with_hook(Arc::new(Veto)));
        let ctx = ExecutionContext::builder("root").hooks(hooks).build();
        let executor = Executor::new(terminate_at(1));

        let termination = executor.run(&ctx).await;
        assert_eq!(termination.reason, TerminationReason::HookAbort);
        assert_eq!(ctx.iteration(), 0);
    }

    /// Fails the iteration hooks at a chosen iteration.
    struct FailAt {
        before: Option<u64>,
        after: Option<u64>,
    }

    #[async_trait::async_trait]
    impl forgeloop_core::BeforeIterationHook for FailAt {
        async fn before_iteration(&self, _ctx: &ExecutionContext, iteration: u64) -> Result<()> {
            if self.before == Some(iteration) {
                return Err(Error::hook("fail_at", format!("before {iteration}")));
            }
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl forgeloop_core::AfterIterationHook for FailAt {
        async fn after_iteration(
            &self,
            _ctx: &ExecutionContext,
            iteration: u64,
            _result: &AgentLoopResult,
        ) -> Result<()> {
            if self.after == Some(iteration) {
                return Err(Error::hook("fail_at", format!("after {iteration}")));
            }
            Ok(())
        }
    }

    impl Hook for FailAt {
        fn name(&self) -> &str {
            "fail_at"
        }

        fn as_before_iteration(&self) -> Option<&dyn forgeloop_core::BeforeIterationHook> {
            Some(self)
        }

        fn as_after_iteration(&self) -> Option<&dyn forgeloop_core::AfterIterationHook> {
            Some(self)
        }
    }

    /// Never self-terminates and records which iterations it ran in.
    fn counting_step(calls: Arc<Mutex<Vec<u64>>>) -> impl AgentLoop {
        loop_fn(move |ctx: Arc<ExecutionContext>| {
            let calls = Arc::clone(&calls);
            async move {
                calls.lock().push(ctx.iteration());
                Ok(AgentLoopResult::next())
            }
        })
    }

    #[tokio::test]
    async fn test_before_iteration_failure_skips_step() {
        let hooks = Arc::new(HookRegistry::new().with_hook(Arc::new(FailAt {
            before: Some(2),
            after: None,
        })));
        let ctx = ExecutionContext::builder("root").hooks(hooks).build();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let executor = Executor::new(counting_step(Arc::clone(&calls)));

        let termination = executor.run(&ctx).await;

        assert_eq!(termination.reason, TerminationReason::HookAbort);
        assert!(termination.error.unwrap().contains("before 2"));
        assert_eq!(ctx.iteration(), 2);
        assert_eq!(*calls.lock(), vec![1]);
    }

    #[tokio::test]
    async fn test_after_iteration_failure_stops_loop() {
        let hooks = Arc::new(HookRegistry::new().with_hook(Arc::new(FailAt {
            before: None,
            after: Some(3),
        })));
        let ctx = ExecutionContext::builder("root").hooks(hooks).build();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let executor = Executor::new(counting_step(Arc::clone(&calls)));

        let termination = executor.run(&ctx).await;

        assert_eq!(termination.reason, TerminationReason::HookAbort);
        assert!(termination.error.unwrap().contains("after 3"));
        assert_eq!(ctx.iteration(), 3);
        assert_eq!(*calls.lock(), vec![1, 2, 3]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_outcome_visible_once_terminated() {
        let ctx = ExecutionContext::builder("root").build();
        let executor = Arc::new(Executor::new(terminate_at(50)));

        let running = {
            let executor = Arc::clone(&executor);
            let ctx = Arc::clone(&ctx);
            tokio::spawn(async move { executor.run(&ctx).await })
        };

        while !executor.state().is_terminal() {
            tokio::task::yield_now().await;
        }
        // 종료 상태가 보이면 기록된 결과도 보여야 함
        let recorded = executor.outcome().unwrap();
        assert_eq!(recorded.reason, TerminationReason::Success);
        assert_eq!(executor.run(&ctx).await, recorded);
        assert_eq!(running.await.unwrap(), recorded);
    }
}
