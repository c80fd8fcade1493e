//! Execution Context - 실행 트리 노드
//!
//! 루트 컨텍스트는 Executor가 구동하고, step 함수는 `spawn_child`로
//! 자식 컨텍스트를 만들어 병렬 작업을 맡깁니다.
//!
//! ## 동시성 규칙
//! - 노드마다 하나의 `Mutex`가 stats, limits, 초과 기록, 종료 기록, 이벤트 로그를 보호
//! - counter 쓰기는 자기 노드부터 부모 방향으로 한 노드씩 전파하며,
//!   다음 노드의 락을 잡기 전에 현재 노드의 락을 놓음 (락 순서 사이클 없음)
//! - 제한 초과와 종료 기록은 락 안에서 한 번만 설정됨
//! - 취소는 부모 → 자식 방향으로만 전파됨
//!
//! ## 사용 예시
//! ```ignore
//! let root = ExecutionContext::builder("root")
//!     .limits(vec![Limit::max_input_tokens(1000)])
//!     .build();
//!
//! let child = root.spawn_child("worker-1", AgentData::new("sub task"));
//! child.incr_counter(keys::INPUT_TOKENS, 500);
//! assert_eq!(root.get_counter(keys::INPUT_TOKENS), 500);
//! root.complete_child(&child)?;
//! ```

mod builder;
mod termination;

pub use builder::ExecutionContextBuilder;
pub use termination::Termination;

use crate::compaction::Compaction;
use crate::data::{AgentData, ScratchpadEntry};
use crate::hook::HookRegistry;
use crate::stream::{StreamChunk, StreamHub, Unsubscribe};
use forgeloop_foundation::{
    evaluate_limits, keys, Error, Event, EventKind, EventOrder, ExceededLimit, Limit, LoopAction,
    Result, Stats,
};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, trace, warn};

// ============================================================================
// Node state
// ============================================================================

/// Everything guarded by the node lock.
#[derive(Default)]
struct NodeState {
    stats: Stats,
    limits: Vec<Limit>,
    exceeded_limit: Option<ExceededLimit>,
    termination: Option<Termination>,
    events: Vec<Event>,
}

// ============================================================================
// ExecutionContext
// ============================================================================

/// 실행 트리의 노드
///
/// 항상 `Arc`로 다룹니다. 부모는 `Weak`로만 참조하고, 자식 목록은
/// 부모가 소유합니다.
pub struct ExecutionContext {
    id: String,
    name: String,
    depth: usize,
    parent: Weak<ExecutionContext>,
    children: Mutex<Vec<Arc<ExecutionContext>>>,
    state: Mutex<NodeState>,
    data: RwLock<AgentData>,
    iteration: AtomicU64,
    cancel_token: CancellationToken,
    compaction: RwLock<Option<Compaction>>,
    hooks: Arc<HookRegistry>,
    streams: StreamHub,
    completed: AtomicBool,
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("depth", &self.depth)
            .field("iteration", &self.iteration())
            .finish_non_exhaustive()
    }
}

impl ExecutionContext {
    /// 루트 컨텍스트 빌더
    pub fn builder(name: impl Into<String>) -> ExecutionContextBuilder {
        ExecutionContextBuilder::new(name)
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new_node(
        name: String,
        parent: Weak<ExecutionContext>,
        depth: usize,
        data: AgentData,
        limits: Vec<Limit>,
        hooks: Arc<HookRegistry>,
        cancel_token: CancellationToken,
        compaction: Option<Compaction>,
    ) -> Self {
        let mut stats = Stats::new();
        stats.set_gauge(keys::SCRATCHPAD_LENGTH, data.scratchpad_len() as f64);

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            depth,
            parent,
            children: Mutex::new(Vec::new()),
            state: Mutex::new(NodeState {
                stats,
                limits,
                ..NodeState::default()
            }),
            data: RwLock::new(data),
            iteration: AtomicU64::new(0),
            cancel_token,
            compaction: RwLock::new(compaction),
            hooks,
            streams: StreamHub::new(),
            completed: AtomicBool::new(false),
        }
    }

    // ========================================================================
    // Identity & tree
    // ========================================================================

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 루트는 0
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_root(&self) -> bool {
        self.depth == 0
    }

    pub fn parent(&self) -> Option<Arc<ExecutionContext>> {
        self.parent.upgrade()
    }

    /// 현재 자식 목록의 스냅샷
    pub fn children(&self) -> Vec<Arc<ExecutionContext>> {
        self.children.lock().clone()
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    /// 자식 컨텍스트 생성
    ///
    /// 자식의 취소 토큰은 이 노드의 토큰에서 파생되므로 부모 취소는
    /// 자식에게 전파되고, 자식 취소는 부모에 영향을 주지 않습니다.
    /// 자식은 훅 레지스트리를 공유하고 limits는 물려받지 않습니다.
    pub fn spawn_child(self: &Arc<Self>, name: impl Into<String>, data: AgentData) -> Arc<Self> {
        let child = Arc::new(Self::new_node(
            name.into(),
            Arc::downgrade(self),
            self.depth + 1,
            data,
            Vec::new(),
            Arc::clone(&self.hooks),
            self.cancel_token.child_token(),
            None,
        ));

        self.children.lock().push(Arc::clone(&child));
        self.append_event(EventKind::ChildSpawned {
            child_id: child.id.clone(),
            name: child.name.clone(),
        });
        self.incr_counter(keys::CHILDREN_SPAWNED, 1);

        debug!(context = %self.name, child = %child.name, depth = child.depth, "Spawned child context");
        child
    }

    /// 자식 완료 처리
    ///
    /// 통계는 쓰기 시점에 이미 전파되었으므로 집계는 하지 않습니다.
    /// 자식의 스트림을 닫고 완료 이벤트를 남깁니다. 두 번째 호출은 무시됩니다.
    pub fn complete_child(&self, child: &Arc<ExecutionContext>) -> Result<()> {
        let is_own_child = child
            .parent
            .upgrade()
            .is_some_and(|parent| std::ptr::eq(Arc::as_ptr(&parent), self));
        if !is_own_child {
            return Err(Error::InvalidInput(format!(
                "context '{}' is not a child of '{}'",
                child.name, self.name
            )));
        }

        if child.completed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        child.close_streams();
        self.append_event(EventKind::ChildCompleted {
            child_id: child.id.clone(),
            name: child.name.clone(),
        });
        self.incr_counter(keys::CHILDREN_COMPLETED, 1);

        debug!(context = %self.name, child = %child.name, "Completed child context");
        Ok(())
    }

    // ========================================================================
    // Stats
    // ========================================================================

    /// counter 증가 후 모든 조상에 같은 delta를 전파
    ///
    /// 반환 전까지 모든 조상에 반영됩니다. 각 노드에서 쓰기 직후 해당
    /// 노드의 limits를 평가합니다. 반환값은 이 노드의 새 값입니다.
    pub fn incr_counter(&self, key: &str, delta: i64) -> i64 {
        let value = self.apply_counter(key, delta);

        let mut ancestor = self.parent.upgrade();
        while let Some(node) = ancestor {
            node.apply_counter(key, delta);
            ancestor = node.parent.upgrade();
        }

        value
    }

    /// One node's share of a propagating write. Holds only this node's lock.
    fn apply_counter(&self, key: &str, delta: i64) -> i64 {
        let (value, breached) = {
            let mut state = self.state.lock();
            let value = state.stats.incr_counter(key, delta);
            (value, self.check_limits_locked(&mut state))
        };
        if breached {
            self.cancel_token.cancel();
        }
        value
    }

    /// 게이지 설정 (로컬 전용, 전파 없음)
    pub fn set_gauge(&self, key: &str, value: f64) {
        let breached = {
            let mut state = self.state.lock();
            state.stats.set_gauge(key, value);
            self.check_limits_locked(&mut state)
        };
        if breached {
            self.cancel_token.cancel();
        }
    }

    /// 게이지 증가 (로컬 전용, 전파 없음)
    pub fn incr_gauge(&self, key: &str, delta: f64) -> f64 {
        let (value, breached) = {
            let mut state = self.state.lock();
            let value = state.stats.incr_gauge(key, delta);
            (value, self.check_limits_locked(&mut state))
        };
        if breached {
            self.cancel_token.cancel();
        }
        value
    }

    /// counter를 0으로 되돌리고 제거된 양을 모든 조상에서 차감
    ///
    /// 조상 값은 0 아래로 내려가지 않습니다. 제거된 양을 반환합니다.
    pub fn reset_counter(&self, key: &str) -> i64 {
        let removed = self.state.lock().stats.reset_counter(key);
        if removed == 0 {
            return 0;
        }

        let mut ancestor = self.parent.upgrade();
        while let Some(node) = ancestor {
            node.state.lock().stats.withdraw_counter(key, removed);
            ancestor = node.parent.upgrade();
        }

        trace!(context = %self.name, key, removed, "Reset counter");
        removed
    }

    pub fn get_counter(&self, key: &str) -> i64 {
        self.state.lock().stats.counter(key)
    }

    pub fn get_gauge(&self, key: &str) -> f64 {
        self.state.lock().stats.gauge(key)
    }

    pub fn counters(&self) -> BTreeMap<String, i64> {
        self.state.lock().stats.counters().clone()
    }

    pub fn gauges(&self) -> BTreeMap<String, f64> {
        self.state.lock().stats.gauges().clone()
    }

    /// 전체 stats 스냅샷
    pub fn stats(&self) -> Stats {
        self.state.lock().stats.clone()
    }

    // ========================================================================
    // Limits
    // ========================================================================

    /// Evaluate this node's limits against its stats and record the first
    /// breach. Returns true only for the write that recorded it; the caller
    /// cancels the token after releasing the lock.
    fn check_limits_locked(&self, state: &mut NodeState) -> bool {
        if state.exceeded_limit.is_some() || state.limits.is_empty() {
            return false;
        }
        match evaluate_limits(&state.limits, &state.stats) {
            Some(exceeded) => {
                self.record_breach_locked(state, exceeded);
                true
            }
            None => false,
        }
    }

    fn record_breach_locked(&self, state: &mut NodeState, exceeded: ExceededLimit) {
        warn!(
            context = %self.name,
            key = %exceeded.key,
            value = exceeded.value,
            max = exceeded.limit.max_value,
            "Limit exceeded"
        );
        state.events.push(Event::new(
            self.id.as_str(),
            self.name.as_str(),
            EventKind::LimitExceeded {
                exceeded: exceeded.clone(),
            },
        ));
        state.exceeded_limit = Some(exceeded);
    }

    /// 이 노드의 limits 교체 (자식은 명시적으로 설정한 경우에만 평가)
    ///
    /// 기존 값은 다음 쓰기 또는 `evaluate_limits` 때 평가됩니다.
    pub fn set_limits(&self, limits: Vec<Limit>) {
        self.state.lock().limits = limits;
    }

    pub fn limits(&self) -> Vec<Limit> {
        self.state.lock().limits.clone()
    }

    /// 기록된 첫 번째 제한 초과
    pub fn exceeded_limit(&self) -> Option<ExceededLimit> {
        self.state.lock().exceeded_limit.clone()
    }

    /// 현재 스냅샷으로 limits를 다시 평가
    ///
    /// 쓰기 시점 검사를 거치지 않고 바뀐 값도 잡아냅니다. 새 초과면 기록하고
    /// 토큰을 취소합니다. 이미 기록된 초과가 있으면 그것을 반환합니다.
    pub fn evaluate_limits(&self) -> Option<ExceededLimit> {
        let (exceeded, breached) = {
            let mut state = self.state.lock();
            if let Some(existing) = &state.exceeded_limit {
                (Some(existing.clone()), false)
            } else {
                match evaluate_limits(&state.limits, &state.stats) {
                    Some(exceeded) => {
                        self.record_breach_locked(&mut state, exceeded.clone());
                        (Some(exceeded), true)
                    }
                    None => (None, false),
                }
            }
        };
        if breached {
            self.cancel_token.cancel();
        }
        exceeded
    }

    // ========================================================================
    // Termination
    // ========================================================================

    /// 종료 기록 (첫 번째 호출만 반영, 반영 여부 반환)
    pub fn set_termination(&self, termination: Termination) -> bool {
        let mut state = self.state.lock();
        if state.termination.is_some() {
            return false;
        }
        debug!(context = %self.name, reason = %termination.reason, "Termination recorded");
        state.termination = Some(termination);
        true
    }

    pub fn termination(&self) -> Option<Termination> {
        self.state.lock().termination.clone()
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// 이 노드의 로그에 이벤트 추가
    pub fn append_event(&self, kind: EventKind) -> Event {
        let event = Event::new(self.id.as_str(), self.name.as_str(), kind);
        trace!(context = %self.name, event = event.kind.name(), seq = event.seq, "Event appended");
        self.state.lock().events.push(event.clone());
        event
    }

    /// 이 노드 자신의 로그
    pub fn events(&self) -> Vec<Event> {
        self.state.lock().events.clone()
    }

    /// 서브트리 전체 로그 수집
    pub fn collect_events(&self, order: EventOrder) -> Vec<Event> {
        let mut events = Vec::new();
        self.collect_into(&mut events);
        if order == EventOrder::Arrival {
            events.sort_by_key(|event| event.seq);
        }
        events
    }

    fn collect_into(&self, out: &mut Vec<Event>) {
        out.extend(self.events());
        for child in self.children() {
            child.collect_into(out);
        }
    }

    // ========================================================================
    // Iteration
    // ========================================================================

    pub fn iteration(&self) -> u64 {
        self.iteration.load(Ordering::SeqCst)
    }

    /// 반복 시작: iteration 증가, `iterations` counter 증가, 시작 이벤트 기록
    pub fn start_iteration(&self) -> u64 {
        let iteration = self.iteration.fetch_add(1, Ordering::SeqCst) + 1;
        self.append_event(EventKind::IterationStarted { iteration });
        self.incr_counter(keys::ITERATIONS, 1);
        debug!(context = %self.name, iteration, "Iteration started");
        iteration
    }

    /// 반복 종료 이벤트 기록
    pub fn end_iteration(&self, action: LoopAction, duration: Duration) {
        let iteration = self.iteration();
        self.append_event(EventKind::IterationFinished {
            iteration,
            action,
            duration_ms: duration.as_millis() as u64,
        });
        debug!(context = %self.name, iteration, %action, "Iteration finished");
    }

    // ========================================================================
    // Working memory
    // ========================================================================

    /// 작업 메모리 읽기
    pub fn with_data<R>(&self, f: impl FnOnce(&AgentData) -> R) -> R {
        f(&self.data.read())
    }

    /// 작업 메모리 수정 (스크래치패드 길이 게이지 갱신)
    pub fn with_data_mut<R>(&self, f: impl FnOnce(&mut AgentData) -> R) -> R {
        let (result, len) = {
            let mut data = self.data.write();
            let result = f(&mut data);
            (result, data.scratchpad_len())
        };
        self.set_gauge(keys::SCRATCHPAD_LENGTH, len as f64);
        result
    }

    pub fn task(&self) -> String {
        self.data.read().task.clone()
    }

    /// 스크래치패드 스냅샷 (이후 쓰기와 무관하게 유지됨)
    pub fn scratchpad(&self) -> Arc<Vec<ScratchpadEntry>> {
        self.data.read().scratchpad()
    }

    pub fn scratchpad_len(&self) -> usize {
        self.data.read().scratchpad_len()
    }

    pub fn push_scratchpad(&self, entry: ScratchpadEntry) {
        self.with_data_mut(|data| data.push_entry(entry));
    }

    /// 스크래치패드를 새 시퀀스로 교체하고 이전 시퀀스를 반환
    pub fn replace_scratchpad(&self, entries: Vec<ScratchpadEntry>) -> Arc<Vec<ScratchpadEntry>> {
        self.with_data_mut(|data| data.replace_scratchpad(entries))
    }

    // ========================================================================
    // Compaction & hooks
    // ========================================================================

    pub fn set_compaction(&self, compaction: Compaction) {
        debug!(
            context = %self.name,
            trigger = compaction.trigger.name(),
            strategy = compaction.strategy.name(),
            "Compaction configured"
        );
        *self.compaction.write() = Some(compaction);
    }

    pub fn clear_compaction(&self) {
        *self.compaction.write() = None;
    }

    pub fn compaction(&self) -> Option<Compaction> {
        self.compaction.read().clone()
    }

    pub fn hooks(&self) -> &Arc<HookRegistry> {
        &self.hooks
    }

    // ========================================================================
    // Cancellation
    // ========================================================================

    /// 이 노드와 모든 후손을 취소
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// 취소될 때 완료되는 future
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel_token.cancelled()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    // ========================================================================
    // Streams
    // ========================================================================

    pub fn subscribe_to_topic(&self, topic: &str) -> (mpsc::Receiver<StreamChunk>, Unsubscribe) {
        self.streams.subscribe(topic)
    }

    /// 토픽에 청크 발행 (구독자와 무관하게 즉시 반환)
    pub fn publish(&self, topic: &str, content: impl Into<String>) {
        self.streams.publish(StreamChunk {
            topic: topic.to_string(),
            source: self.name.clone(),
            content: content.into(),
        });
    }

    pub fn close_streams(&self) {
        self.streams.close_all();
    }

    pub fn streams(&self) -> &StreamHub {
        &self.streams
    }
}
