//! Stats - 노드별 counter/gauge 저장소
//!
//! - **Counter**: 누적값. 소유한 실행 컨텍스트가 모든 조상으로 전파합니다.
//! - **Gauge**: 시점값. 기록된 노드에만 남습니다.
//!
//! 이 모듈은 저장만 담당합니다. 잠금, 전파, limit 검사는
//! `ExecutionContext`에서 처리합니다.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 엔진이 기록하는 기본 stat 키
pub mod keys {
    /// Executor 루프를 실행하는 노드가 시작한 반복 수
    pub const ITERATIONS: &str = "iterations";

    pub const INPUT_TOKENS: &str = "input_tokens";
    pub const OUTPUT_TOKENS: &str = "output_tokens";
    pub const TOTAL_TOKENS: &str = "total_tokens";

    pub const MODEL_CALLS: &str = "model_calls";
    pub const MODEL_ERRORS: &str = "model_errors";

    /// 모델별 토큰 사용량 prefix (`model_tokens.<model>`)
    pub const MODEL_TOKENS_PREFIX: &str = "model_tokens.";

    pub const TOOL_CALLS: &str = "tool_calls";
    pub const TOOL_ERRORS: &str = "tool_errors";

    /// 파싱이 성공하면 0으로 리셋
    pub const PARSE_ERRORS_CONSECUTIVE: &str = "parse_errors.consecutive";
    pub const PARSE_ERRORS_TOTAL: &str = "parse_errors.total";

    pub const COMPACTIONS: &str = "compactions";

    pub const CHILDREN_SPAWNED: &str = "children_spawned";
    pub const CHILDREN_COMPLETED: &str = "children_completed";

    // Gauges
    pub const LAST_CALL_INPUT_TOKENS: &str = "last_call.input_tokens";
    pub const LAST_CALL_OUTPUT_TOKENS: &str = "last_call.output_tokens";
    pub const LAST_CALL_DURATION_MS: &str = "last_call.duration_ms";
    pub const SCRATCHPAD_LENGTH: &str = "scratchpad.length";

    /// `model`의 모델별 토큰 키
    pub fn model_tokens(model: &str) -> String {
        format!("{}{}", MODEL_TOKENS_PREFIX, model)
    }
}

/// 단일 노드의 counter와 gauge
///
/// 정렬된 맵이므로 prefix limit 평가 순서가 결정적입니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    counters: BTreeMap<String, i64>,
    gauges: BTreeMap<String, f64>,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// counter에 `delta`를 더하고 새 값을 반환
    pub fn incr_counter(&mut self, key: &str, delta: i64) -> i64 {
        let value = self.counters.entry(key.to_string()).or_insert(0);
        *value += delta;
        *value
    }

    /// counter를 0으로 만들고 제거된 양을 반환
    pub fn reset_counter(&mut self, key: &str) -> i64 {
        match self.counters.get_mut(key) {
            Some(value) => std::mem::replace(value, 0),
            None => 0,
        }
    }

    /// counter에서 최대 `amount`만큼 빼고 (0 미만 없음) 새 값을 반환
    pub fn withdraw_counter(&mut self, key: &str, amount: i64) -> i64 {
        match self.counters.get_mut(key) {
            Some(value) => {
                *value = (*value - amount).max(0);
                *value
            }
            None => 0,
        }
    }

    pub fn set_gauge(&mut self, key: &str, value: f64) {
        self.gauges.insert(key.to_string(), value);
    }

    /// gauge에 `delta`를 더하고 새 값을 반환
    pub fn incr_gauge(&mut self, key: &str, delta: f64) -> f64 {
        let value = self.gauges.entry(key.to_string()).or_insert(0.0);
        *value += delta;
        *value
    }

    pub fn counter(&self, key: &str) -> i64 {
        self.counters.get(key).copied().unwrap_or(0)
    }

    pub fn gauge(&self, key: &str) -> f64 {
        self.gauges.get(key).copied().unwrap_or(0.0)
    }

    pub fn counters(&self) -> &BTreeMap<String, i64> {
        &self.counters
    }

    pub fn gauges(&self) -> &BTreeMap<String, f64> {
        &self.gauges
    }

    /// `key`의 값 (counter 우선, 없으면 gauge)
    pub fn value(&self, key: &str) -> Option<f64> {
        self.counters
            .get(key)
            .map(|v| *v as f64)
            .or_else(|| self.gauges.get(key).copied())
    }

    /// 키가 `prefix`로 시작하는 모든 counter와 gauge (counter 먼저, 각각 키 순서)
    pub fn values_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, f64)> + 'a {
        let counters = self
            .counters
            .range(prefix.to_string()..)
            .take_while(move |(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.as_str(), *v as f64));
        let gauges = self
            .gauges
            .range(prefix.to_string()..)
            .take_while(move |(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.as_str(), *v));
        counters.chain(gauges)
    }
}
