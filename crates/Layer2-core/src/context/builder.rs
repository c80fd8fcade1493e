//! Root context builder

use super::ExecutionContext;
use crate::compaction::Compaction;
use crate::data::AgentData;
use crate::hook::HookRegistry;
use forgeloop_foundation::{Limit, LimitsConfig};
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;

/// 루트 `ExecutionContext` 빌더
pub struct ExecutionContextBuilder {
    name: String,
    data: AgentData,
    limits: Vec<Limit>,
    hooks: Option<Arc<HookRegistry>>,
    cancel_token: Option<CancellationToken>,
    compaction: Option<Compaction>,
}

impl ExecutionContextBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: AgentData::default(),
            limits: Vec::new(),
            hooks: None,
            cancel_token: None,
            compaction: None,
        }
    }

    /// 작업 메모리
    pub fn data(mut self, data: AgentData) -> Self {
        self.data = data;
        self
    }

    /// 제한 목록 (설정 순서대로 평가)
    pub fn limits(mut self, limits: Vec<Limit>) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits_config(mut self, config: LimitsConfig) -> Self {
        self.limits = config.limits;
        self
    }

    pub fn limit(mut self, limit: Limit) -> Self {
        self.limits.push(limit);
        self
    }

    /// 훅 레지스트리 (자식과 공유됨)
    pub fn hooks(mut self, hooks: Arc<HookRegistry>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// 호출자의 외부 취소 토큰
    ///
    /// 루트 토큰은 여기서 파생되므로 외부 취소는 트리 전체로 전파되고,
    /// 제한 초과로 인한 취소는 외부 토큰에 영향을 주지 않습니다.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    pub fn compaction(mut self, compaction: Compaction) -> Self {
        self.compaction = Some(compaction);
        self
    }

    pub fn build(self) -> Arc<ExecutionContext> {
        let token = match self.cancel_token {
            Some(outer) => outer.child_token(),
            None => CancellationToken::new(),
        };

        Arc::new(ExecutionContext::new_node(
            self.name,
            Weak::new(),
            0,
            self.data,
            self.limits,
            self.hooks.unwrap_or_default(),
            token,
            self.compaction,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ScratchpadEntry;
    use forgeloop_foundation::keys;

    #[test]
    fn test_build_root() {
        let data = AgentData::new("plan a trip").with_scratchpad(vec![ScratchpadEntry::step(1, "start")]);
        let root = ExecutionContextBuilder::new("root")
            .data(data)
            .limits_config(LimitsConfig::production())
            .limit(Limit::exact("custom", 1.0))
            .build();

        assert!(root.is_root());
        assert!(root.parent().is_none());
        assert_eq!(root.task(), "plan a trip");
        assert_eq!(root.limits().len(), LimitsConfig::production().limits.len() + 1);
        assert_eq!(root.get_gauge(keys::SCRATCHPAD_LENGTH), 1.0);
        assert!(root.hooks().is_empty());
    }
}
