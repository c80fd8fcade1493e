//! ForgeLoop CLI - Main entry point

mod init;
mod report;
mod simulate;

use clap::{Parser, Subcommand};
use forgeloop_agent::{Executor, LoggingHook};
use forgeloop_core::{
    Compaction, CompactionStrategy, EveryNIterations, ExecutionContext, HookRegistry, SlidingWindow,
};
use forgeloop_foundation::{CompactionConfig, ForgeLoopConfig, StrategyConfig, TriggerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::report::RunReport;
use crate::simulate::{simulated_loop, SimulationConfig};

/// ForgeLoop - run a fan-out agent loop under hierarchical limits
#[derive(Parser, Debug)]
#[command(name = "forgeloop")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a simulated agent loop and print the outcome as JSON
    Run {
        /// Limits/compaction config file (.toml or .json)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Workers spawned per iteration
        #[arg(long, default_value = "5")]
        children: usize,

        /// Input tokens reported by each simulated model call
        #[arg(long, default_value = "500")]
        tokens_per_call: u64,

        /// Iteration at which the loop asks to terminate
        #[arg(long, default_value = "10")]
        max_iterations: u64,

        /// Simulated model latency in milliseconds
        #[arg(long, default_value = "20")]
        latency_ms: u64,

        /// Compact every N iterations (overrides the config file)
        #[arg(long)]
        compact_every: Option<u64>,

        /// Sliding window kept by --compact-every
        #[arg(long, default_value = "3")]
        window: usize,
    },
    /// Manage configuration files
    Config {
        /// Write a default config to PATH
        #[arg(long, value_name = "PATH")]
        init: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    match args.command {
        Command::Config { init, force } => init::init_config(&init, force),
        Command::Run {
            config,
            children,
            tokens_per_call,
            max_iterations,
            latency_ms,
            compact_every,
            window,
        } => {
            let file_config = match &config {
                Some(path) => ForgeLoopConfig::load(path)?,
                None => ForgeLoopConfig::default(),
            };
            let compaction = resolve_compaction(&file_config, compact_every, window)?;
            let simulation = SimulationConfig {
                children,
                tokens_per_call,
                max_iterations,
                latency: Duration::from_millis(latency_ms),
            };

            let report = run(file_config, compaction, simulation).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

/// CLI flags win over the config file's compaction section.
fn resolve_compaction(
    config: &ForgeLoopConfig,
    compact_every: Option<u64>,
    window: usize,
) -> anyhow::Result<Option<Compaction>> {
    if let Some(n) = compact_every {
        let flags = CompactionConfig {
            trigger: TriggerConfig::EveryIterations { n },
            strategy: StrategyConfig::SlidingWindow { window },
        };
        flags.validate()?;
        let strategy: Arc<dyn CompactionStrategy> = Arc::new(SlidingWindow::new(window));
        return Ok(Some(Compaction::new(
            Arc::new(EveryNIterations::new(n)),
            strategy,
        )));
    }
    Ok(config.compaction.as_ref().map(Compaction::from_config))
}

async fn run(
    config: ForgeLoopConfig,
    compaction: Option<Compaction>,
    simulation: SimulationConfig,
) -> RunReport {
    let outer = CancellationToken::new();
    let interrupt = outer.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling run");
            interrupt.cancel();
        }
    });

    let hooks = Arc::new(HookRegistry::new().with_hook(Arc::new(LoggingHook::new())));
    let mut builder = ExecutionContext::builder("root")
        .limits_config(config.limits)
        .hooks(hooks)
        .cancel_token(outer);
    if let Some(compaction) = compaction {
        builder = builder.compaction(compaction);
    }
    let root = builder.build();

    let executor = Executor::new(simulated_loop(simulation));
    let termination = executor.run(&root).await;
    RunReport::new(&root, termination)
}
