//! End-to-end executor scenarios over a full context tree.

use async_trait::async_trait;
use forgeloop_agent::{call_model, fan_out, loop_fn, ChildJob, ChunkSink, Executor, ModelClient};
use forgeloop_core::{
    AfterExecutionHook, AfterIterationHook, AgentLoopResult, BeforeIterationHook, Compaction,
    CompactionStrategy, CompactionTrigger, ErrorHook, EveryNIterations, ExecutionContext, Hook,
    HookRegistry, ModelRequest, ModelResponse, ModelUsage, ScratchpadEntry, SlidingWindow,
    Termination,
};
use forgeloop_foundation::{
    keys, Error, EventKind, EventOrder, Limit, LimitType, Result, TerminationReason,
};
use parking_lot::Mutex;
use std::sync::Arc;

// ============================================================================
// Fixtures
// ============================================================================

/// Reports `input` tokens per call, no output.
struct FixedUsage {
    input: u64,
}

#[async_trait]
impl ModelClient for FixedUsage {
    async fn complete(&self, request: &ModelRequest, sink: &ChunkSink) -> Result<ModelResponse> {
        sink.send(format!("{} says hi", request.model));
        Ok(ModelResponse::new("ok", ModelUsage::new(self.input, 0)))
    }
}

fn root(limits: Vec<Limit>) -> Arc<ExecutionContext> {
    ExecutionContext::builder("root").limits(limits).build()
}

fn never_terminates() -> Executor {
    Executor::new(loop_fn(|_ctx: Arc<ExecutionContext>| async move {
        Ok(AgentLoopResult::next())
    }))
}

fn limit_events(ctx: &ExecutionContext) -> usize {
    ctx.collect_events(EventOrder::Arrival)
        .iter()
        .filter(|e| matches!(e.kind, EventKind::LimitExceeded { .. }))
        .count()
}

// ============================================================================
// Limits
// ============================================================================

#[tokio::test]
async fn test_iteration_limit_stops_after_sixth_iteration() {
    let ctx = root(vec![Limit::max_iterations(5)]);

    let termination = never_terminates().run(&ctx).await;

    assert_eq!(termination.reason, TerminationReason::LimitExceeded);
    let exceeded = termination.exceeded_limit.unwrap();
    assert_eq!(exceeded.key, keys::ITERATIONS);
    assert_eq!(exceeded.limit.max_value, 5.0);
    assert_eq!(exceeded.value, 6.0);
    assert_eq!(ctx.iteration(), 6);
    assert_eq!(limit_events(&ctx), 1);
}

#[tokio::test]
async fn test_input_token_limit_breached_in_third_iteration() {
    let ctx = root(vec![Limit::max_input_tokens(1000)]);
    let client = Arc::new(FixedUsage { input: 500 });

    let executor = Executor::new(loop_fn(move |ctx: Arc<ExecutionContext>| {
        let client = Arc::clone(&client);
        async move {
            call_model(&ctx, client.as_ref(), &ModelRequest::new("model-a", "go")).await?;
            Ok(AgentLoopResult::next())
        }
    }));
    let termination = executor.run(&ctx).await;

    assert_eq!(termination.reason, TerminationReason::LimitExceeded);
    let exceeded = termination.exceeded_limit.unwrap();
    assert_eq!(exceeded.key, keys::INPUT_TOKENS);
    assert_eq!(exceeded.value, 1500.0);
    assert_eq!(ctx.iteration(), 3);
    assert_eq!(ctx.get_counter(keys::INPUT_TOKENS), 1500);
}

#[tokio::test]
async fn test_prefix_limit_names_the_model() {
    let ctx = root(vec![Limit::max_tokens_per_model(2500)]);
    let big = Arc::new(FixedUsage { input: 1000 });
    let small = Arc::new(FixedUsage { input: 500 });

    let executor = Executor::new(loop_fn(move |ctx: Arc<ExecutionContext>| {
        let (model, client) = if ctx.iteration() % 2 == 1 {
            ("big-model", Arc::clone(&big))
        } else {
            ("small-model", Arc::clone(&small))
        };
        async move {
            call_model(&ctx, client.as_ref(), &ModelRequest::new(model, "go")).await?;
            Ok(AgentLoopResult::next())
        }
    }));
    let termination = executor.run(&ctx).await;

    assert_eq!(termination.reason, TerminationReason::LimitExceeded);
    let exceeded = termination.exceeded_limit.unwrap();
    assert_eq!(exceeded.limit.limit_type, LimitType::KeyPrefix);
    assert_eq!(exceeded.key, keys::model_tokens("big-model"));
    assert_eq!(exceeded.value, 3000.0);
    assert_eq!(ctx.get_counter(&keys::model_tokens("small-model")), 1000);
    assert_eq!(ctx.iteration(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_children_breach_once() {
    let ctx = root(vec![Limit::max_input_tokens(1000)]);
    let client = Arc::new(FixedUsage { input: 100 });

    let executor = Executor::new(loop_fn(move |ctx: Arc<ExecutionContext>| {
        let client = Arc::clone(&client);
        async move {
            let jobs = (0..50).map(|i| ChildJob::new(format!("worker-{i}"), ())).collect();
            let results = fan_out(&ctx, jobs, move |child, _| {
                let client = Arc::clone(&client);
                async move {
                    call_model(&child, client.as_ref(), &ModelRequest::new("m", "go")).await
                }
            })
            .await;
            for result in results {
                result?;
            }
            Ok(AgentLoopResult::next())
        }
    }));
    let termination = executor.run(&ctx).await;

    assert_eq!(termination.reason, TerminationReason::LimitExceeded);
    assert_eq!(limit_events(&ctx), 1);
    assert_eq!(ctx.iteration(), 1);
    assert!(ctx.get_counter(keys::INPUT_TOKENS) > 1000);
    assert!(ctx.children().iter().all(|c| c.is_cancelled()));
}

// ============================================================================
// Aggregation
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_five_children_aggregate_to_parent() {
    let ctx = root(vec![]);
    let client = Arc::new(FixedUsage { input: 500 });

    let executor = Executor::new(loop_fn(move |ctx: Arc<ExecutionContext>| {
        let client = Arc::clone(&client);
        async move {
            let jobs = (0..5).map(|i| ChildJob::new(format!("child-{i}"), i)).collect();
            let results = fan_out(&ctx, jobs, move |child, _| {
                let client = Arc::clone(&client);
                async move {
                    call_model(&child, client.as_ref(), &ModelRequest::new("m", "go")).await
                }
            })
            .await;
            assert!(results.iter().all(|r| r.is_ok()));
            Ok(AgentLoopResult::terminate(serde_json::json!(
                ctx.get_counter(keys::INPUT_TOKENS)
            )))
        }
    }));
    let termination = executor.run(&ctx).await;

    assert_eq!(termination.reason, TerminationReason::Success);
    assert_eq!(termination.result, Some(serde_json::json!(2500)));
    assert_eq!(ctx.get_counter(keys::INPUT_TOKENS), 2500);
    assert_eq!(ctx.get_counter(keys::CHILDREN_COMPLETED), 5);
    for child in ctx.children() {
        assert_eq!(child.get_counter(keys::INPUT_TOKENS), 500);
        assert_eq!(child.get_gauge(keys::LAST_CALL_INPUT_TOKENS), 500.0);
    }
    // 게이지는 전파되지 않음
    assert_eq!(ctx.get_gauge(keys::LAST_CALL_INPUT_TOKENS), 0.0);
}

// ============================================================================
// Compaction ordering
// ============================================================================

/// Snapshots scratchpad length and compaction count at each iteration hook.
struct Journal {
    entries: Mutex<Vec<String>>,
}

#[async_trait]
impl BeforeIterationHook for Journal {
    async fn before_iteration(&self, ctx: &ExecutionContext, iteration: u64) -> Result<()> {
        self.entries.lock().push(format!(
            "before({iteration}) len={} compactions={}",
            ctx.scratchpad_len(),
            ctx.get_counter(keys::COMPACTIONS)
        ));
        Ok(())
    }
}

#[async_trait]
impl AfterIterationHook for Journal {
    async fn after_iteration(
        &self,
        ctx: &ExecutionContext,
        iteration: u64,
        _result: &AgentLoopResult,
    ) -> Result<()> {
        self.entries.lock().push(format!(
            "after({iteration}) len={} compactions={}",
            ctx.scratchpad_len(),
            ctx.get_counter(keys::COMPACTIONS)
        ));
        Ok(())
    }
}

impl Hook for Journal {
    fn name(&self) -> &str {
        "journal"
    }

    fn as_before_iteration(&self) -> Option<&dyn BeforeIterationHook> {
        Some(self)
    }

    fn as_after_iteration(&self) -> Option<&dyn AfterIterationHook> {
        Some(self)
    }
}

fn scratchpad_writer(stop_at: u64) -> Executor {
    Executor::new(loop_fn(move |ctx: Arc<ExecutionContext>| async move {
        let iteration = ctx.iteration();
        ctx.push_scratchpad(ScratchpadEntry::step(iteration, format!("step {iteration}")));
        if iteration >= stop_at {
            Ok(AgentLoopResult::terminate(serde_json::Value::Null))
        } else {
            Ok(AgentLoopResult::next())
        }
    }))
}

#[tokio::test]
async fn test_sliding_window_runs_between_iterations() {
    let journal = Arc::new(Journal {
        entries: Mutex::new(Vec::new()),
    });
    let hooks = Arc::new(HookRegistry::new().with_hook(journal.clone()));
    let ctx = ExecutionContext::builder("root")
        .hooks(hooks)
        .compaction(Compaction::new(
            Arc::new(EveryNIterations::new(5)),
            Arc::new(SlidingWindow::new(3)),
        ))
        .build();

    let termination = scratchpad_writer(6).run(&ctx).await;
    assert_eq!(termination.reason, TerminationReason::Success);

    let entries = journal.entries.lock().clone();
    assert_eq!(entries[9], "after(5) len=5 compactions=0");
    assert_eq!(entries[10], "before(6) len=3 compactions=1");
    assert_eq!(ctx.scratchpad_len(), 4);

    let events = ctx.events();
    let position = |pred: &dyn Fn(&EventKind) -> bool| events.iter().position(|e| pred(&e.kind));
    let finished_5 = position(&|k| {
        matches!(k, EventKind::IterationFinished { iteration: 5, .. })
    })
    .unwrap();
    let compaction = position(&|k| matches!(k, EventKind::Compaction { .. })).unwrap();
    let started_6 = position(&|k| matches!(k, EventKind::IterationStarted { iteration: 6 })).unwrap();
    assert!(finished_5 < compaction && compaction < started_6);
    assert!(matches!(
        events[compaction].kind,
        EventKind::Compaction {
            before_len: 5,
            after_len: 3,
            ..
        }
    ));
}

/// Records the gauge it sees each time it is asked.
struct GaugeProbe {
    seen: Mutex<Vec<f64>>,
}

impl CompactionTrigger for GaugeProbe {
    fn name(&self) -> &str {
        "gauge_probe"
    }

    fn should_compact(&self, ctx: &ExecutionContext) -> bool {
        self.seen.lock().push(ctx.get_gauge(keys::LAST_CALL_INPUT_TOKENS));
        false
    }
}

#[tokio::test]
async fn test_trigger_sees_previous_iteration_gauges() {
    let probe = Arc::new(GaugeProbe {
        seen: Mutex::new(Vec::new()),
    });
    let ctx = ExecutionContext::builder("root")
        .compaction(Compaction::new(probe.clone(), Arc::new(SlidingWindow::new(1))))
        .build();

    let executor = Executor::new(loop_fn(|ctx: Arc<ExecutionContext>| async move {
        let iteration = ctx.iteration();
        let client = FixedUsage {
            input: iteration * 100,
        };
        call_model(&ctx, &client, &ModelRequest::new("m", "go")).await?;
        if iteration >= 4 {
            Ok(AgentLoopResult::terminate(serde_json::Value::Null))
        } else {
            Ok(AgentLoopResult::next())
        }
    }));
    executor.run(&ctx).await;

    // 반복 K+1 이전 검사는 반복 K의 값을 봄
    assert_eq!(*probe.seen.lock(), vec![0.0, 100.0, 200.0, 300.0]);
}

struct BrokenStrategy;

#[async_trait]
impl CompactionStrategy for BrokenStrategy {
    fn name(&self) -> &str {
        "broken"
    }

    async fn compact(&self, _ctx: &ExecutionContext) -> Result<()> {
        Err(Error::Compaction("disk full".into()))
    }
}

#[tokio::test]
async fn test_compaction_failure_stops_immediately() {
    let ctx = ExecutionContext::builder("root")
        .compaction(Compaction::new(
            Arc::new(EveryNIterations::new(2)),
            Arc::new(BrokenStrategy),
        ))
        .build();

    let termination = scratchpad_writer(10).run(&ctx).await;

    assert_eq!(termination.reason, TerminationReason::CompactionFailed);
    assert!(termination.error.unwrap().contains("disk full"));
    assert_eq!(ctx.iteration(), 2);
    assert_eq!(ctx.get_counter(keys::COMPACTIONS), 0);
}

// ============================================================================
// Cleanup
// ============================================================================

/// Fails on AfterExecution and records what the error hook receives.
struct FlakyCleanup {
    errors: Mutex<Vec<String>>,
}

#[async_trait]
impl AfterExecutionHook for FlakyCleanup {
    async fn after_execution(&self, _ctx: &ExecutionContext, _t: &Termination) -> Result<()> {
        Err(Error::Internal("flush failed".into()))
    }
}

#[async_trait]
impl ErrorHook for FlakyCleanup {
    async fn on_error(&self, _ctx: &ExecutionContext, error: &Error) {
        self.errors.lock().push(error.to_string());
    }
}

impl Hook for FlakyCleanup {
    fn name(&self) -> &str {
        "flaky"
    }

    fn as_after_execution(&self) -> Option<&dyn AfterExecutionHook> {
        Some(self)
    }

    fn as_error(&self) -> Option<&dyn ErrorHook> {
        Some(self)
    }
}

#[tokio::test]
async fn test_after_execution_failure_keeps_outcome() {
    let flaky = Arc::new(FlakyCleanup {
        errors: Mutex::new(Vec::new()),
    });
    let hooks = Arc::new(HookRegistry::new().with_hook(flaky.clone()));
    let ctx = ExecutionContext::builder("root").hooks(hooks).build();
    let (mut rx, _unsubscribe) = ctx.subscribe_to_topic("progress");

    let termination = scratchpad_writer(2).run(&ctx).await;

    assert_eq!(termination.reason, TerminationReason::Success);
    assert_eq!(ctx.termination().unwrap().reason, TerminationReason::Success);
    let errors = flaky.errors.lock().clone();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("flush failed"));
    // 정리 단계에서 스트림이 닫힘
    assert!(rx.recv().await.is_none());
}
