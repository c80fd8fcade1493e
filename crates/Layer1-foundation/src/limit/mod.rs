//! Limits - 리소스 상한과 평가
//!
//! 각 limit은 stat 키(정확히 일치 또는 prefix)와 최대값을 가집니다.
//! 평가는 설정된 순서대로 진행하며, 값이 최대값보다 **엄격히 큰**
//! 첫 번째 limit을 보고합니다 (first match wins).

use crate::stats::{keys, Stats};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// limit 키와 stat 키의 매칭 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitType {
    /// stat 키가 limit 키와 같아야 함
    ExactKey,
    /// limit 키로 시작하는 모든 stat 키
    KeyPrefix,
}

impl LimitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExactKey => "exact_key",
            Self::KeyPrefix => "key_prefix",
        }
    }
}

/// 설정된 상한 하나
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Limit {
    #[serde(rename = "type")]
    pub limit_type: LimitType,
    pub key: String,
    /// 값이 이보다 클 때만 초과 (같으면 초과 아님)
    pub max_value: f64,
}

impl Limit {
    pub fn exact(key: impl Into<String>, max_value: f64) -> Self {
        Self {
            limit_type: LimitType::ExactKey,
            key: key.into(),
            max_value,
        }
    }

    pub fn prefix(prefix: impl Into<String>, max_value: f64) -> Self {
        Self {
            limit_type: LimitType::KeyPrefix,
            key: prefix.into(),
            max_value,
        }
    }

    /// 반복 횟수 상한
    pub fn max_iterations(max: u64) -> Self {
        Self::exact(keys::ITERATIONS, max as f64)
    }

    pub fn max_input_tokens(max: u64) -> Self {
        Self::exact(keys::INPUT_TOKENS, max as f64)
    }

    pub fn max_output_tokens(max: u64) -> Self {
        Self::exact(keys::OUTPUT_TOKENS, max as f64)
    }

    /// 모델별로 따로 적용되는 토큰 상한
    pub fn max_tokens_per_model(max: u64) -> Self {
        Self::prefix(keys::MODEL_TOKENS_PREFIX, max as f64)
    }

    pub fn max_consecutive_parse_errors(max: u64) -> Self {
        Self::exact(keys::PARSE_ERRORS_CONSECUTIVE, max as f64)
    }

    pub fn validate(&self) -> Result<()> {
        if self.key.is_empty() {
            return Err(Error::InvalidInput("limit key must not be empty".to_string()));
        }
        if self.max_value.is_nan() || self.max_value < 0.0 {
            return Err(Error::InvalidInput(format!(
                "limit '{}' has invalid max value {}",
                self.key, self.max_value
            )));
        }
        Ok(())
    }

    /// 스냅샷에 대해 이 limit 검사
    ///
    /// prefix limit은 prefix가 아니라 실제로 매칭된 키를 반환합니다.
    pub fn check(&self, stats: &Stats) -> Option<ExceededLimit> {
        match self.limit_type {
            LimitType::ExactKey => stats
                .value(&self.key)
                .filter(|value| *value > self.max_value)
                .map(|value| ExceededLimit::new(self.clone(), self.key.clone(), value)),
            LimitType::KeyPrefix => stats
                .values_with_prefix(&self.key)
                .find(|(_, value)| *value > self.max_value)
                .map(|(key, value)| ExceededLimit::new(self.clone(), key.to_string(), value)),
        }
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.limit_type {
            LimitType::ExactKey => write!(f, "{} <= {}", self.key, self.max_value),
            LimitType::KeyPrefix => write!(f, "{}* <= {}", self.key, self.max_value),
        }
    }
}

/// 기록된 초과: limit, 넘어선 stat 키, 당시 관측값
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceededLimit {
    pub limit: Limit,
    pub key: String,
    pub value: f64,
}

impl ExceededLimit {
    pub fn new(limit: Limit, key: String, value: f64) -> Self {
        Self { limit, key, value }
    }

    pub fn message(&self) -> String {
        format!(
            "Limit exceeded: {} ({} > {})",
            self.key, self.value, self.limit.max_value
        )
    }
}

impl fmt::Display for ExceededLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// 설정 순서상 `stats`가 처음으로 초과한 limit
pub fn evaluate(limits: &[Limit], stats: &Stats) -> Option<ExceededLimit> {
    limits.iter().find_map(|limit| limit.check(stats))
}
