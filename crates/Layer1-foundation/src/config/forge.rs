//! ForgeLoop Config - 통합 설정
//!
//! 제한과 컴팩션 설정을 하나의 파일로 관리합니다.
//! 확장자가 `.toml`이면 TOML, 그 외에는 JSON으로 읽고 씁니다.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use super::LimitsConfig;

// ============================================================================
// Compaction Config
// ============================================================================

/// 컴팩션 트리거 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TriggerConfig {
    /// N번째 반복마다
    EveryIterations { n: u64 },
    /// 스크래치패드 길이가 max를 넘으면
    ScratchpadLength { max: usize },
    /// 게이지 값이 threshold를 넘으면
    Gauge { key: String, threshold: f64 },
}

/// 컴팩션 전략 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StrategyConfig {
    /// 최근 window개 엔트리만 유지
    SlidingWindow { window: usize },
    /// 오래된 엔트리를 요약하고 최근 keep_recent개는 그대로 유지
    Summarize {
        #[serde(rename = "keepRecent")]
        keep_recent: usize,
    },
}

/// 컴팩션 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactionConfig {
    pub trigger: TriggerConfig,
    pub strategy: StrategyConfig,
}

impl CompactionConfig {
    /// 설정 검증
    pub fn validate(&self) -> Result<()> {
        match &self.trigger {
            TriggerConfig::EveryIterations { n: 0 } => {
                return Err(Error::InvalidInput(
                    "compaction trigger interval must be positive".to_string(),
                ))
            }
            TriggerConfig::Gauge { key, .. } if key.is_empty() => {
                return Err(Error::InvalidInput(
                    "compaction gauge key must not be empty".to_string(),
                ))
            }
            _ => {}
        }
        if let StrategyConfig::SlidingWindow { window: 0 } = self.strategy {
            return Err(Error::InvalidInput(
                "sliding window size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// ForgeLoop Config (통합)
// ============================================================================

/// ForgeLoop 통합 설정
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgeLoopConfig {
    /// 리소스 제한
    #[serde(default)]
    pub limits: LimitsConfig,

    /// 컴팩션 (없으면 비활성화)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compaction: Option<CompactionConfig>,
}

impl ForgeLoopConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load / Save
    // ========================================================================

    /// 파일에서 로드 (확장자로 형식 결정)
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: Self = if is_toml(path) {
            toml::from_str(&content)?
        } else {
            serde_json::from_str(&content)?
        };
        config.validate()?;

        debug!(
            path = %path.display(),
            limits = config.limits.limits.len(),
            compaction = config.compaction.is_some(),
            "Loaded config"
        );
        Ok(config)
    }

    /// 파일이 없으면 기본값
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// 파일로 저장
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_toml(path) {
            toml::to_string_pretty(self)?
        } else {
            serde_json::to_string_pretty(self)?
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// 전체 검증
    pub fn validate(&self) -> Result<()> {
        self.limits
            .validate()
            .map_err(|e| Error::Config(e.to_string()))?;
        if let Some(compaction) = &self.compaction {
            compaction
                .validate()
                .map_err(|e| Error::Config(e.to_string()))?;
        }
        Ok(())
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limit::Limit;

    fn sample() -> ForgeLoopConfig {
        ForgeLoopConfig {
            limits: LimitsConfig::unlimited()
                .with_limit(Limit::max_iterations(5))
                .with_limit(Limit::max_tokens_per_model(2500)),
            compaction: Some(CompactionConfig {
                trigger: TriggerConfig::EveryIterations { n: 5 },
                strategy: StrategyConfig::SlidingWindow { window: 3 },
            }),
        }
    }

    #[test]
    fn test_json_roundtrip_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forgeloop.json");

        sample().save(&path).unwrap();
        let loaded = ForgeLoopConfig::load(&path).unwrap();
        assert_eq!(loaded, sample());
    }

    #[test]
    fn test_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forgeloop.toml");
        std::fs::write(
            &path,
            r#"
[[limits.limits]]
type = "exact_key"
key = "input_tokens"
maxValue = 1000.0

[compaction.trigger]
type = "everyIterations"
n = 5

[compaction.strategy]
type = "summarize"
keepRecent = 2
"#,
        )
        .unwrap();

        let config = ForgeLoopConfig::load(&path).unwrap();
        assert_eq!(config.limits.limits, vec![Limit::max_input_tokens(1000)]);
        let compaction = config.compaction.unwrap();
        assert_eq!(compaction.trigger, TriggerConfig::EveryIterations { n: 5 });
        assert_eq!(
            compaction.strategy,
            StrategyConfig::Summarize { keep_recent: 2 }
        );
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = ForgeLoopConfig::load_or_default(dir.path().join("none.json")).unwrap();
        assert_eq!(config, ForgeLoopConfig::default());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(
            &path,
            r#"{"compaction":{"trigger":{"type":"everyIterations","n":0},"strategy":{"type":"slidingWindow","window":3}}}"#,
        )
        .unwrap();

        let err = ForgeLoopConfig::load(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            ForgeLoopConfig::load(&path).unwrap_err(),
            Error::Json(_)
        ));
    }
}
