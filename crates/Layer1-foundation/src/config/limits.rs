//! Limits Configuration - 리소스 제한 설정
//!
//! 순서가 있는 제한 목록입니다. 평가 시 먼저 설정된 제한이 우선합니다.

use crate::limit::{Limit, LimitType};
use crate::Result;
use serde::{Deserialize, Serialize};

/// 통합 제한 설정
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitsConfig {
    /// 제한 목록 (설정 순서대로 평가)
    #[serde(default)]
    pub limits: Vec<Limit>,
}

impl LimitsConfig {
    /// 제한 없음
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// 개발용 (관대한 제한)
    pub fn development() -> Self {
        Self {
            limits: vec![
                Limit::max_iterations(200),
                Limit::max_input_tokens(5_000_000),
                Limit::max_output_tokens(1_000_000),
                Limit::max_tokens_per_model(5_000_000),
                Limit::max_consecutive_parse_errors(10),
            ],
        }
    }

    /// 프로덕션용 (엄격한 제한)
    pub fn production() -> Self {
        Self {
            limits: vec![
                Limit::max_iterations(50),
                Limit::max_input_tokens(500_000),
                Limit::max_output_tokens(100_000),
                Limit::max_tokens_per_model(400_000),
                Limit::max_consecutive_parse_errors(3),
            ],
        }
    }

    /// 제한 추가
    pub fn with_limit(mut self, limit: Limit) -> Self {
        self.limits.push(limit);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.limits.is_empty()
    }

    /// 모든 제한 검증
    pub fn validate(&self) -> Result<()> {
        self.limits.iter().try_for_each(Limit::validate)
    }

    /// 두 설정 병합
    ///
    /// 같은 (type, key)의 제한은 project 값이 global 값을 대체하고,
    /// project에만 있는 제한은 뒤에 추가됩니다.
    pub fn merge(global: Self, project: Self) -> Self {
        let mut limits = global.limits;
        for limit in project.limits {
            match limits
                .iter_mut()
                .find(|l| Self::same_target(l, &limit))
            {
                Some(existing) => *existing = limit,
                None => limits.push(limit),
            }
        }
        Self { limits }
    }

    fn same_target(a: &Limit, b: &Limit) -> bool {
        a.limit_type == b.limit_type && a.key == b.key
    }

    /// Exact-key 제한 조회
    pub fn find_exact(&self, key: &str) -> Option<&Limit> {
        self.limits
            .iter()
            .find(|l| l.limit_type == LimitType::ExactKey && l.key == key)
    }
}

impl From<Vec<Limit>> for LimitsConfig {
    fn from(limits: Vec<Limit>) -> Self {
        Self { limits }
    }
}
