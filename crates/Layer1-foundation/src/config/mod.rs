//! Config - 통합 설정 관리
//!
//! - `limits.rs` - 리소스 제한 목록
//! - `forge.rs` - ForgeLoopConfig 통합 설정 (제한 + 컴팩션)

mod forge;
mod limits;

pub use forge::{CompactionConfig, ForgeLoopConfig, StrategyConfig, TriggerConfig};
pub use limits::LimitsConfig;
