//! Compaction - 스크래치패드 축소
//!
//! 반복 사이에 Trigger가 컴팩션 여부를 결정하고 Strategy가 새 스크래치패드를
//! 만들어 한 번에 교체합니다. 기존 시퀀스를 제자리에서 수정하지 않으므로
//! 다른 태스크가 들고 있는 스냅샷은 그대로 유지됩니다.

mod strategy;
mod trigger;

pub use strategy::{DigestSummarizer, SlidingWindow, Summarizer, SummarizingStrategy};
pub use trigger::{EveryNIterations, GaugeThreshold, ScratchpadLengthTrigger};

use crate::context::ExecutionContext;
use async_trait::async_trait;
use forgeloop_foundation::{CompactionConfig, Result, StrategyConfig, TriggerConfig};
use std::sync::Arc;

// ============================================================================
// Traits
// ============================================================================

/// 컴팩션 시점 결정
///
/// 상태를 가질 수 있습니다 (예: 마지막으로 컴팩션한 반복 번호).
pub trait CompactionTrigger: Send + Sync {
    fn name(&self) -> &str;

    /// 다음 반복 시작 전에 호출됨
    fn should_compact(&self, ctx: &ExecutionContext) -> bool;

    /// 컴팩션 성공 후 호출됨
    fn notify_compacted(&self, _ctx: &ExecutionContext) {}
}

/// 스크래치패드 축소 방법
#[async_trait]
pub trait CompactionStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// 현재 스크래치패드에서 새 시퀀스를 만들어 컨텍스트에 교체해 넣음
    async fn compact(&self, ctx: &ExecutionContext) -> Result<()>;
}

// ============================================================================
// Compaction (Trigger + Strategy)
// ============================================================================

/// 컨텍스트에 붙는 Trigger/Strategy 쌍
#[derive(Clone)]
pub struct Compaction {
    pub trigger: Arc<dyn CompactionTrigger>,
    pub strategy: Arc<dyn CompactionStrategy>,
}

impl std::fmt::Debug for Compaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compaction")
            .field("trigger", &self.trigger.name())
            .field("strategy", &self.strategy.name())
            .finish()
    }
}

impl Compaction {
    pub fn new(trigger: Arc<dyn CompactionTrigger>, strategy: Arc<dyn CompactionStrategy>) -> Self {
        Self { trigger, strategy }
    }

    /// 설정에서 생성 (요약 전략은 `DigestSummarizer` 사용)
    pub fn from_config(config: &CompactionConfig) -> Self {
        let trigger: Arc<dyn CompactionTrigger> = match &config.trigger {
            TriggerConfig::EveryIterations { n } => Arc::new(EveryNIterations::new(*n)),
            TriggerConfig::ScratchpadLength { max } => Arc::new(ScratchpadLengthTrigger::new(*max)),
            TriggerConfig::Gauge { key, threshold } => {
                Arc::new(GaugeThreshold::new(key.clone(), *threshold))
            }
        };
        let strategy: Arc<dyn CompactionStrategy> = match &config.strategy {
            StrategyConfig::SlidingWindow { window } => Arc::new(SlidingWindow::new(*window)),
            StrategyConfig::Summarize { keep_recent } => Arc::new(SummarizingStrategy::new(
                *keep_recent,
                Arc::new(DigestSummarizer::default()),
            )),
        };
        Self { trigger, strategy }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config() {
        let config = CompactionConfig {
            trigger: TriggerConfig::EveryIterations { n: 5 },
            strategy: StrategyConfig::SlidingWindow { window: 3 },
        };
        let compaction = Compaction::from_config(&config);
        assert_eq!(compaction.trigger.name(), "every_n_iterations");
        assert_eq!(compaction.strategy.name(), "sliding_window");

        let config = CompactionConfig {
            trigger: TriggerConfig::Gauge {
                key: "last_call.input_tokens".into(),
                threshold: 100.0,
            },
            strategy: StrategyConfig::Summarize { keep_recent: 2 },
        };
        let compaction = Compaction::from_config(&config);
        assert_eq!(compaction.trigger.name(), "gauge_threshold");
        assert_eq!(compaction.strategy.name(), "summarize");
    }
}
