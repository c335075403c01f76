//! Autoswap reference runtime demo CLI
//!
//! Runs one or all of the reference scenarios, or drives a simulated engine
//! from a TOML configuration for a fixed number of timer ticks. Every run uses
//! the real engine components (rule engine, dual-path executor, ledger,
//! hash-chained history, evaluation loop) against a simulated swap provider.
//! `simulate` runs the evaluation loop, the signal poller (with a file-backed
//! watermark) and the push forwarder together on virtual time.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- time-weighted
//!   cargo run -p demo -- fallback
//!   cargo run -p demo -- stop-loss
//!   cargo run -p demo -- simulate --config demo/engine.toml --ticks 20
//!   cargo run -p demo -- simulate --cursor /tmp/autoswap-cursor.json
//!   cargo run -p demo -- run-all --json

use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::{Parser, Subcommand, ValueEnum};
use tokio::{
    sync::watch,
    time::{interval_at, Instant},
};
use tracing_subscriber::EnvFilter;

use autoswap_contracts::{
    error::AutoswapResult,
    rule::{RuleParams, RuleType},
    signal::SignalKind,
};
use autoswap_core::{
    config::EngineConfig,
    traits::{CursorStore, ExecutionRecorder},
};
use autoswap_ref::{
    mock_data::{usdc, weth, SELL_OFF_TAPE},
    scenarios::{offchain_fallback, stop_loss, time_weighted, ScenarioReport},
    OffChainBehaviour, World,
};
use autoswap_runtime::{trigger, LoopStats, SignalForwarder, SignalPoller};
use autoswap_store::JsonFileCursorStore;

// ── CLI definition ────────────────────────────────────────────────────────────

/// Autoswap: rule-driven swap execution demo.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "Autoswap reference runtime demo",
    long_about = "Runs autoswap reference scenarios showing cooldown gating,\n\
                  off-chain settlement with on-chain fallback, signal-driven rules,\n\
                  and execution history integrity."
)]
struct Cli {
    /// Print the scenario reports as JSON after the run.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all three scenarios in sequence.
    RunAll,
    /// Scenario 1: Time-weighted DCA gated by a 300s cooldown.
    TimeWeighted,
    /// Scenario 2: Off-chain timeout with on-chain fallback and retry.
    Fallback,
    /// Scenario 3: Stop-loss on a price-impact tape.
    StopLoss,
    /// Drive a simulated engine for a number of timer ticks.
    Simulate {
        /// Engine configuration TOML. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Tick intervals to simulate; one tape signal lands in each.
        #[arg(long, default_value_t = 10)]
        ticks: u32,
        /// Agents to register, each funded with 1000 WETH.
        #[arg(long, default_value_t = 3)]
        agents: u32,
        /// How the simulated off-chain counter-party behaves.
        #[arg(long, value_enum, default_value_t = OffChain::Succeed)]
        offchain: OffChain,
        /// Signal watermark file. A fresh temp file is used and removed when
        /// omitted; an existing file makes the poller resume from it.
        #[arg(long)]
        cursor: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OffChain {
    Succeed,
    Fail,
    Hang,
    Disconnected,
}

impl From<OffChain> for OffChainBehaviour {
    fn from(value: OffChain) -> Self {
        match value {
            OffChain::Succeed => OffChainBehaviour::Succeed,
            OffChain::Fail => OffChainBehaviour::Fail,
            OffChain::Hang => OffChainBehaviour::Hang,
            OffChain::Disconnected => OffChainBehaviour::Disconnected,
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

// Single-threaded so `simulate` can pause tokio's clock.
#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize structured logging.  Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    print_banner();

    let result = match cli.command {
        Command::RunAll => run_all().await,
        Command::TimeWeighted => time_weighted::run_scenario().await.map(|r| vec![r]),
        Command::Fallback => offchain_fallback::run_scenario().await.map(|r| vec![r]),
        Command::StopLoss => stop_loss::run_scenario().await.map(|r| vec![r]),
        Command::Simulate { config, ticks, agents, offchain, cursor } => {
            simulate(config, ticks, agents, offchain.into(), cursor).await.map(|()| Vec::new())
        }
    };

    match result {
        Ok(reports) => {
            if cli.json && !reports.is_empty() {
                match serde_json::to_string_pretty(&reports) {
                    Ok(json) => println!("{json}"),
                    Err(e) => eprintln!("Could not serialize reports: {}", e),
                }
            }
            let failed: Vec<&ScenarioReport> = reports.iter().filter(|r| !r.all_passed()).collect();
            if failed.is_empty() {
                println!("All selected runs completed successfully.");
                return;
            }
            for report in failed {
                for check in report.failed() {
                    eprintln!("Scenario '{}' failed check: {}", report.name, check.label);
                }
                if !report.history_verified {
                    eprintln!("Scenario '{}' history failed verification", report.name);
                }
            }
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Demo error: {}", e);
            std::process::exit(1);
        }
    }
}

// ── Scenario dispatch ─────────────────────────────────────────────────────────

async fn run_all() -> AutoswapResult<Vec<ScenarioReport>> {
    Ok(vec![
        time_weighted::run_scenario().await?,
        offchain_fallback::run_scenario().await?,
        stop_loss::run_scenario().await?,
    ])
}

// ── Simulation ────────────────────────────────────────────────────────────────

async fn simulate(
    config_path: Option<PathBuf>,
    ticks: u32,
    agents: u32,
    offchain: OffChainBehaviour,
    cursor_path: Option<PathBuf>,
) -> AutoswapResult<()> {
    let config = match &config_path {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    let tick_secs = config.scheduler.tick_interval_secs;
    let owns_cursor = cursor_path.is_none();
    let cursor_path = cursor_path
        .unwrap_or_else(|| std::env::temp_dir().join(format!("autoswap-demo-cursor-{}.json", std::process::id())));

    println!("=== Simulation: {ticks} tick(s) of {tick_secs}s, {agents} agent(s), off-chain {offchain:?} ===");
    println!("  Signal watermark: {}", cursor_path.display());
    println!();

    // Virtual time: tokio jumps to the next timer whenever every task is
    // idle, and the engine clock is moved by the market driver below.
    tokio::time::pause();

    let world = World::new(config, offchain, 0)?;
    let mut agent_ids = Vec::new();
    for _ in 0..agents {
        agent_ids.push(
            world
                .spawn_agent(
                    1_000,
                    &[
                        RuleParams::new(RuleType::TimeWeighted, 0, 0, 300),
                        RuleParams::new(RuleType::StopLoss, 500, 0, 600),
                    ],
                )
                .await?,
        );
    }

    let cursor = Arc::new(JsonFileCursorStore::new(&cursor_path));
    let (tx, rx) = trigger::channel(256);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller = SignalPoller::new(world.signals.clone(), cursor.clone(), tx.clone(), world.config.scheduler.clone());
    let forwarder = SignalForwarder::new(world.signals.clone(), tx);
    let evaluation = world.evaluation_loop();

    let (stats, polled, pushed, driven) = tokio::join!(
        evaluation.run(rx, shutdown_rx.clone()),
        poller.run(shutdown_rx.clone()),
        forwarder.run(shutdown_rx),
        drive_market(&world, ticks, shutdown_tx),
    );
    driven?;
    polled?;
    let pushed = pushed?;
    let stats = stats?;
    println!();
    print_loop_stats(&stats, pushed);

    for agent_id in &agent_ids {
        println!(
            "  Agent {}: WETH {} USDC {}",
            agent_id,
            world.balance(*agent_id, &weth())?,
            world.balance(*agent_id, &usdc())?
        );
    }

    let history = world.recorder.query(None, 5)?;
    println!();
    println!("  Latest executions:");
    for attempt in &history {
        println!(
            "    t={:<6} agent {} rule {} {:?} {:?} in={} out={}{}",
            attempt.timestamp,
            attempt.agent_id,
            attempt.rule_index,
            attempt.path,
            attempt.outcome,
            attempt.amount_in,
            attempt.amount_out,
            attempt.error_detail.as_deref().map(|d| format!(" ({d})")).unwrap_or_default()
        );
    }

    world.ledger.check_all_solvency()?;
    println!();
    println!(
        "  Signal watermark:       next sequence {}",
        cursor.load()?.map(|next| next.to_string()).unwrap_or_else(|| "unset".to_string())
    );
    println!(
        "  Execution history:      {} ({} record(s) in chain)",
        if world.recorder.verify_integrity() { "VERIFIED" } else { "FAILED" },
        world.recorder.len()
    );
    println!();

    if owns_cursor {
        if let Err(e) = std::fs::remove_file(&cursor_path) {
            tracing::debug!(path = %cursor_path.display(), error = %e, "temp cursor not removed");
        }
    }

    Ok(())
}

/// Halfway through each tick interval, move the engine clock forward one
/// interval and emit the next tape signal. Stops the engine when done.
async fn drive_market(world: &World, ticks: u32, shutdown: watch::Sender<bool>) -> AutoswapResult<()> {
    let tick_secs = world.config.scheduler.tick_interval_secs;
    let tick = Duration::from_secs(tick_secs);
    let tape: Vec<(SignalKind, u32)> = SELL_OFF_TAPE.iter().map(|e| (e.kind, e.magnitude_bps)).collect();
    let mut market = interval_at(Instant::now() + tick / 2, tick);

    let mut result = Ok(());
    for step in 0..ticks as usize {
        market.tick().await;
        world.clock.advance(tick_secs);
        let (kind, magnitude_bps) = tape[step % tape.len()];
        match world.emit_signal(kind, magnitude_bps) {
            Ok(sequence) => println!(
                "  t={:<6} signal #{:<3} {:<13} {:>5}bps",
                world.now(),
                sequence,
                kind.to_string(),
                magnitude_bps
            ),
            Err(e) => {
                result = Err(e);
                break;
            }
        }
    }

    // Let the pass for the last signal run before stopping.
    tokio::time::sleep(tick / 4).await;
    let _ = shutdown.send(true);
    result
}

fn print_loop_stats(stats: &LoopStats, pushed: usize) {
    println!(
        "  Passes:                 {} tick, {} signal ({} trigger(s) coalesced, {} pushed)",
        stats.tick_passes, stats.signal_passes, stats.coalesced_triggers, pushed
    );
    println!(
        "  Dispatches:             {} succeeded, {} failed, {} skipped at gate, {} error(s)",
        stats.totals.succeeded, stats.totals.failed, stats.totals.gate_rejected, stats.totals.errors
    );
    println!();
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("Autoswap: Strategy Execution Engine");
    println!("Reference Demo");
    println!("====================================");
    println!();
    println!("Engine pipeline per ready rule:");
    println!("  [1] Rule engine: cooldown gate, then the rule's trigger condition");
    println!("  [2] Gate commit: last_executed re-validated and written by the substrate");
    println!("  [3] Quote and re-validate against the provider");
    println!("  [4] Off-chain session settlement, bounded by a deadline");
    println!("  [5] On-chain fallback: simulate, submit, linear backoff");
    println!("  [6] Atomic ledger update + SHA-256 chained execution record");
    println!();
}
