//! `forgeloop config --init`

use forgeloop_foundation::{CompactionConfig, ForgeLoopConfig, LimitsConfig, StrategyConfig, TriggerConfig};
use std::path::Path;

/// Starting configuration: development limits plus a sliding window every
/// 10 iterations.
pub fn default_config() -> ForgeLoopConfig {
    ForgeLoopConfig {
        limits: LimitsConfig::development(),
        compaction: Some(CompactionConfig {
            trigger: TriggerConfig::EveryIterations { n: 10 },
            strategy: StrategyConfig::SlidingWindow { window: 5 },
        }),
    }
}

/// Write the default configuration to `path` (TOML or JSON by extension).
pub fn init_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        println!("✓ Config already exists at {}", path.display());
        println!("  Use --force to overwrite.");
        return Ok(());
    }

    default_config().save(path)?;
    println!("✓ Wrote default config to {}", path.display());
    Ok(())
}
