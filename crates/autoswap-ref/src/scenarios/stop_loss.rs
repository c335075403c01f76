//! Scenario 3: Stop-loss on a price-impact tape
//!
//! An agent protects a 1000 WETH position with a `StopLoss` rule at 500bps
//! and full-balance sizing. The sell-off tape is replayed through the signal
//! poller; every ingested signal triggers an evaluation pass.
//!
//! Pipeline walk-through for the demo run:
//!   1. Each tape entry is appended to the signal log at its own time
//!   2. The poller ingests it and advances the watermark
//!   3. The signal trigger starts a pass over the latest pool signal
//!   4. Impact below 500bps, or a non-price signal, never fires
//!   5. At 615bps the whole WETH balance is swapped out
//!   6. At 880bps the rule is ready again but there is nothing left to sell

use std::sync::Arc;

use autoswap_contracts::{
    error::AutoswapResult,
    rule::{RuleParams, RuleType},
};
use autoswap_core::{
    config::{EngineConfig, SizingPolicy},
    traits::{CursorStore, ExecutionRecorder},
};
use autoswap_runtime::{trigger, SignalPoller, Trigger};
use autoswap_store::MemoryCursorStore;

use crate::{
    mock_data::{usdc, weth, GENESIS, SELL_OFF_TAPE},
    provider::OffChainBehaviour,
    scenarios::{print_history, ScenarioReport},
    World,
};

pub const STOP_LOSS_BPS: u32 = 500;

/// Run Scenario 3: Stop-loss on a price-impact tape.
pub async fn run_scenario() -> AutoswapResult<ScenarioReport> {
    println!("=== Scenario 3: Stop-loss on a price-impact tape ===");
    println!();

    let mut config = EngineConfig::default();
    config.executor.sizing = SizingPolicy::FullBalance;

    let mut report = ScenarioReport::new("stop-loss");
    let world = World::new(config, OffChainBehaviour::Succeed, 0)?;
    let agent_id = world.spawn_agent(1_000, &[RuleParams::new(RuleType::StopLoss, STOP_LOSS_BPS, 0, 60)]).await?;
    let evaluation = world.evaluation_loop();

    let cursor = Arc::new(MemoryCursorStore::new());
    let (tx, mut rx) = trigger::channel(SELL_OFF_TAPE.len());
    let poller = SignalPoller::new(world.signals.clone(), cursor.clone(), tx, world.config.scheduler.clone());

    println!("  Agent {agent_id}: 1000 WETH, StopLoss at {STOP_LOSS_BPS}bps, sizing full balance");
    println!();

    let mut fired_at = Vec::new();
    for entry in SELL_OFF_TAPE {
        world.clock.set(GENESIS + entry.offset_secs);
        world.emit_signal(entry.kind, entry.magnitude_bps)?;
        poller.poll_once().await?;

        while let Ok(Trigger::Signal { sequence, .. }) = rx.try_recv() {
            let pass = evaluation.evaluate_pass().await?;
            println!(
                "  t={:<4} #{} {:<13} {:>5}bps  dispatched={} succeeded={} skipped={}",
                world.now(),
                sequence,
                entry.kind.to_string(),
                entry.magnitude_bps,
                pass.rules_dispatched,
                pass.succeeded,
                pass.gate_rejected
            );
            if pass.succeeded > 0 {
                fired_at.push(entry.magnitude_bps);
            }
        }
    }
    println!();

    report.check("fired exactly once, at 615bps", fired_at == [615]);
    report.check("watermark past the whole tape", cursor.load()? == Some(SELL_OFF_TAPE.len() as u64));

    let weth_left = world.balance(agent_id, &weth())?;
    let usdc_held = world.balance(agent_id, &usdc())?;
    println!("  Balances:               WETH {weth_left} USDC {usdc_held}");
    report.check("position fully exited: WETH 0 / USDC 950", weth_left == 0 && usdc_held == 950);
    report.check("one record in history", world.recorder.query(Some(agent_id), 10)?.len() == 1);
    report.check("ledger solvent", world.ledger.check_all_solvency().is_ok());

    print_history(&mut report, &world);
    println!("  Scenario 3 complete.");
    println!();

    Ok(report)
}
