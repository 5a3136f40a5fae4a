//! @ai:module:intent CLI for the crank runner
//! @ai:module:layer presentation

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use crank_runner::{
    bridge::{CorrelationTable, MessageBridge},
    config::RunnerConfig,
    engine::{CallPolicy, Engine, QueueEngine},
    metrics::BenchmarkSummary,
    report::ReportGenerator,
    runner::{BatchOutcome, CrankCounter, Orchestrator},
    store::{open_store, HostStore, StorageMode},
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "crank-runner")]
#[command(about = "Drive a step-based engine in checkpointed blocks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that opens the engine.
#[derive(Args, Clone)]
struct OpenArgs {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Units of work per block
    #[arg(long)]
    block_size: Option<u64>,

    /// Wipe persisted state before starting
    #[arg(long)]
    force_reset: bool,

    /// Keep state in memory only
    #[arg(long)]
    memory: bool,

    /// Database directory for file storage
    #[arg(long)]
    db_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine until it drains or the step limit is reached
    Run {
        #[command(flatten)]
        open: OpenArgs,

        /// Step limit; 0 runs until drained
        #[arg(short, long)]
        limit: Option<u64>,

        /// Queue this many calls to the benchmark target before running
        #[arg(long, default_value = "0")]
        calls: u32,

        /// Write a state dump here after every block
        #[arg(long)]
        dump_dir: Option<PathBuf>,

        /// Audit engine reference counts after every block
        #[arg(long)]
        audit: bool,

        /// Record per-block memory, disk and engine statistics
        #[arg(long)]
        stats: bool,

        /// Output directory for reports
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run benchmark rounds against the configured target
    Bench {
        #[command(flatten)]
        open: OpenArgs,

        /// Number of rounds (overrides config)
        #[arg(short, long)]
        rounds: Option<u32>,

        /// Output directory for reports
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Deliver JSON payloads as inbound messages and print each reply
    Send {
        #[command(flatten)]
        open: OpenArgs,

        /// Payloads; anything that is not valid JSON is sent as a string
        #[arg(required = true)]
        payloads: Vec<String>,
    },

    /// Show the persisted crank number and disk usage
    Status {
        #[command(flatten)]
        open: OpenArgs,
    },

    /// Generate reports from an existing stats.json
    Report {
        /// Path to stats JSON file
        #[arg(short, long)]
        stats: PathBuf,

        /// Output directory for reports
        #[arg(short, long, default_value = "reports")]
        output: PathBuf,
    },

    /// Initialize default configuration
    Init {
        /// Output path for config file
        #[arg(short, long, default_value = "crank-runner.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("crank_runner=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            open,
            limit,
            calls,
            dump_dir,
            audit,
            stats,
            output,
        } => {
            let mut config = load_config(&open)?;
            if let Some(limit) = limit {
                config.run.step_limit = limit;
            }
            if dump_dir.is_some() {
                config.diagnostics.dump_dir = dump_dir;
            }
            config.diagnostics.audit_refcounts |= audit;
            if stats {
                config.stats.log_blocks = true;
                config.stats.log_memory = true;
                config.stats.log_disk = true;
                config.stats.log_engine_stats = true;
            }
            if output.is_some() {
                config.stats.output_dir = output;
            }
            run(config, calls).await
        }
        Commands::Bench {
            open,
            rounds,
            output,
        } => {
            let mut config = load_config(&open)?;
            if let Some(rounds) = rounds {
                config.benchmark.rounds = rounds;
            }
            if output.is_some() {
                config.stats.output_dir = output;
            }
            bench(config).await
        }
        Commands::Send { open, payloads } => send(load_config(&open)?, payloads).await,
        Commands::Status { open } => status(load_config(&open)?),
        Commands::Report { stats, output } => generate_reports(stats, output),
        Commands::Init { output } => init_config(output),
    }
}

/// @ai:intent Load config, apply shared CLI overrides and validate
/// @ai:effects fs:read
fn load_config(open: &OpenArgs) -> Result<RunnerConfig> {
    let mut config = match &open.config {
        Some(path) => RunnerConfig::load(path)?,
        None => {
            let default_path = PathBuf::from("crank-runner.toml");
            if default_path.exists() {
                RunnerConfig::load(&default_path)?
            } else {
                RunnerConfig::default()
            }
        }
    };

    if let Some(block_size) = open.block_size {
        config.run.block_size = block_size;
    }
    config.run.force_reset |= open.force_reset;
    if open.memory {
        config.run.storage = StorageMode::Memory;
    }
    if let Some(dir) = &open.db_dir {
        config.run.db_dir = dir.clone();
    }

    config.validate()?;
    Ok(config)
}

/// @ai:intent Open the configured store and hand it with `engine` to a new orchestrator
/// @ai:effects fs:read, fs:write
fn open_orchestrator(
    config: &RunnerConfig,
    engine: QueueEngine,
) -> Result<Orchestrator<QueueEngine, Box<dyn HostStore>>> {
    let store = open_store(config.run.storage, &config.run.db_dir, config.run.force_reset)
        .with_context(|| format!("Failed to open store at {}", config.run.db_dir.display()))?;
    let orchestrator = Orchestrator::open(engine, store, config)?;
    Ok(orchestrator)
}

/// @ai:intent Run until drained or the step limit, then report
/// @ai:effects fs:write
async fn run(config: RunnerConfig, calls: u32) -> Result<()> {
    let mut orch = open_orchestrator(&config, QueueEngine::new(config.engine.clone()))?;

    for _ in 0..calls {
        orch.engine_mut().queue_external_call(
            &config.benchmark.target,
            &config.benchmark.method,
            json!([]),
            CallPolicy::LogFailure,
        )?;
    }

    let outcome = orch.run(config.run.step_limit, true).await?;
    print_run_summary(&outcome, orch.crank_number());

    write_reports(&orch, &config)?;
    orch.close().await?;
    Ok(())
}

/// @ai:intent Drain leftover work, then run the benchmark rounds
/// @ai:effects fs:write
async fn bench(config: RunnerConfig) -> Result<()> {
    if config.benchmark.rounds == 0 {
        anyhow::bail!("No benchmark rounds requested (use --rounds or benchmark.rounds)");
    }

    let mut orch = open_orchestrator(&config, QueueEngine::new(config.engine.clone()))?;

    let warmup = orch.run(0, true).await?;
    if warmup.units > 0 {
        tracing::info!("Drained {} leftover units before benchmarking", warmup.units);
    }

    let summary = orch.run_benchmark(config.benchmark.rounds).await?;
    print_benchmark_summary(&summary);

    write_reports(&orch, &config)?;
    orch.close().await?;
    Ok(())
}

/// @ai:intent Route every payload through the message bridge and print replies in order
/// @ai:effects fs:write, io
async fn send(config: RunnerConfig, payloads: Vec<String>) -> Result<()> {
    let table = Arc::new(CorrelationTable::new());
    let engine = QueueEngine::new(config.engine.clone()).with_outbound(table.clone());
    let port = engine.inbound_port();

    let orch = open_orchestrator(&config, engine)?;
    let bridge = MessageBridge::new(orch, Arc::new(port), table);

    // Engine futures are not Send, so the handles share one local task set.
    let local = tokio::task::LocalSet::new();
    let handles: Vec<_> = payloads
        .into_iter()
        .map(|raw| {
            let payload = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
            let bridge = bridge.clone();
            local.spawn_local(async move { bridge.handle(payload).await })
        })
        .collect();

    let replies = local
        .run_until(async move {
            let mut replies = Vec::with_capacity(handles.len());
            for handle in handles {
                replies.push(handle.await);
            }
            replies
        })
        .await;

    for (i, reply) in replies.into_iter().enumerate() {
        let value = reply.context("Message task panicked")??;
        println!("[{}] {}", i + 1, value);
    }

    let mut orch = bridge.orchestrator().lock().await;
    println!("Crank number: {}", orch.crank_number());
    orch.close().await?;
    Ok(())
}

/// @ai:intent Print the persisted crank number without running anything
/// @ai:effects fs:read
fn status(config: RunnerConfig) -> Result<()> {
    let store = open_store(config.run.storage, &config.run.db_dir, false)
        .with_context(|| format!("Failed to open store at {}", config.run.db_dir.display()))?;
    let crank = CrankCounter::load(&store)?;

    println!();
    println!("Crank Runner Status");
    println!("===================");
    println!();
    println!("{:<20} {:?}", "Storage:", config.run.storage);
    println!("{:<20} {}", "Directory:", config.run.db_dir.display());
    println!("{:<20} {}", "Crank number:", crank.value());
    match store.disk_usage() {
        Some(bytes) => println!("{:<20} {} bytes", "Disk usage:", bytes),
        None => println!("{:<20} -", "Disk usage:"),
    }
    println!();

    Ok(())
}

/// @ai:intent Write reports when an output directory is configured
/// @ai:effects fs:write
fn write_reports<E: Engine, S: HostStore>(
    orch: &Orchestrator<E, S>,
    config: &RunnerConfig,
) -> Result<()> {
    if let Some(dir) = &config.stats.output_dir {
        ReportGenerator::new().generate_all(&orch.report(), dir)?;
    }
    Ok(())
}

/// @ai:intent Regenerate reports from a saved stats.json
/// @ai:effects fs:read, fs:write
fn generate_reports(stats_path: PathBuf, output_dir: PathBuf) -> Result<()> {
    let reporter = ReportGenerator::new();
    let report = reporter.load(&stats_path)?;
    reporter.generate_all(&report, &output_dir)?;

    println!("Reports generated in {}", output_dir.display());
    Ok(())
}

/// @ai:intent Initialize default configuration file
/// @ai:effects fs:write
fn init_config(output: PathBuf) -> Result<()> {
    let config = RunnerConfig::default();
    config.save(&output)?;
    println!("Configuration saved to {}", output.display());
    Ok(())
}

/// @ai:intent Print batch totals to console
/// @ai:effects io
fn print_run_summary(outcome: &BatchOutcome, crank: u64) {
    println!();
    println!("Crank Runner Results");
    println!("====================");
    println!();
    println!("{:<20} {:>12}", "Units executed:", outcome.units);
    println!("{:<20} {:>12}", "Blocks:", outcome.blocks);
    println!(
        "{:<20} {:>10.1}ms",
        "Elapsed:",
        outcome.elapsed.as_secs_f64() * 1000.0
    );
    println!("{:<20} {:>12}", "Crank number:", crank);
    println!(
        "{:<20} {:>12}",
        "Drained:",
        if outcome.drained { "yes" } else { "no" }
    );
    println!();
}

/// @ai:intent Print benchmark summary table to console
/// @ai:effects io
fn print_benchmark_summary(summary: &BenchmarkSummary) {
    println!();
    println!("Benchmark Results");
    println!("=================");
    println!();
    println!(
        "{:<25} {:>12}",
        "Rounds:", summary.rounds
    );
    println!(
        "{:<25} {:>12}",
        "Cranks:",
        format!("{}..{}", summary.crank_before, summary.crank_after)
    );
    println!("{:<25} {:>12}", "Total units:", summary.total_units);
    println!("{:<25} {:>12.1}", "Units per round:", summary.avg_units_per_round);
    println!("{:<25} {:>10.2}ms", "Time per round:", summary.avg_ms_per_round);
    println!(
        "{:<25} {:>12}",
        "Fulfilled/rejected:",
        format!("{}/{}", summary.fulfilled, summary.rejected)
    );
    if summary.inconclusive > 0 {
        println!("{:<25} {:>12}", "Inconclusive:", summary.inconclusive);
    }
    println!();

    if !summary.per_round.is_empty() {
        println!("{:<25} {:>12} {:>12}", "Stat", "Delta", "Per round");
        println!("{}", "-".repeat(51));
        for (name, delta) in &summary.stat_deltas {
            let per_round = summary.per_round.get(name).copied().unwrap_or(0.0);
            println!("{:<25} {:>+12} {:>12.2}", name, delta, per_round);
        }
        println!();
    }
}
