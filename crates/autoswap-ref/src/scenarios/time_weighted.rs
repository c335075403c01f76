//! Scenario 1: Time-weighted DCA
//!
//! An agent holding 1000 WETH carries one `TimeWeighted` rule with a 300
//! second cooldown. The engine swaps 10% of the WETH balance into USDC each
//! time the cooldown elapses, settling off-chain.
//!
//! Pipeline walk-through for the demo run:
//!   1. t=1: the rule was never executed, so 299s of cooldown remain; skipped
//!   2. t=301: the cooldown has elapsed; 100 WETH is swapped for 95 USDC
//!   3. t=301 again: the committed cooldown blocks a second dispatch
//!   4. t=601: the next window opens; 90 WETH is swapped for 85 USDC
//!   5. Execution history integrity verified at the end

use autoswap_contracts::{
    error::AutoswapResult,
    execution::ExecutionPath,
    rule::{RuleParams, RuleType},
};
use autoswap_core::traits::ExecutionRecorder;

use crate::{
    mock_data::{usdc, weth},
    scenarios::{print_history, ScenarioReport},
    World,
};

pub const COOLDOWN_SECS: u64 = 300;

/// Run Scenario 1: Time-weighted DCA.
pub async fn run_scenario() -> AutoswapResult<ScenarioReport> {
    println!("=== Scenario 1: Time-weighted DCA ===");
    println!();

    let mut report = ScenarioReport::new("time-weighted");
    let world = World::healthy()?;
    let evaluation = world.evaluation_loop();

    let agent_id = world.spawn_agent(1_000, &[RuleParams::new(RuleType::TimeWeighted, 0, 0, COOLDOWN_SECS)]).await?;
    println!("  Agent {agent_id}: 1000 WETH, TimeWeighted every {COOLDOWN_SECS}s, sizing 10% of balance");
    println!();

    // ── t=1: inside the first window ─────────────────────────────────────────

    let pass = evaluation.evaluate_pass().await?;
    println!("  t={:<4} dispatched={} (cooldown remaining 299s)", world.now(), pass.rules_dispatched);
    report.check("no dispatch at t=1", pass.rules_dispatched == 0);
    report.check("gate reports not ready at t=1", !world.chain.is_ready(agent_id, 0, world.now())?);

    // ── t=301: first window opens ────────────────────────────────────────────

    world.clock.set(1 + COOLDOWN_SECS);
    report.check("gate reports ready at t=301", world.chain.is_ready(agent_id, 0, world.now())?);
    let pass = evaluation.evaluate_pass().await?;
    let (weth_left, usdc_held) = (world.balance(agent_id, &weth())?, world.balance(agent_id, &usdc())?);
    println!(
        "  t={:<4} dispatched={} succeeded={}  WETH {} USDC {}",
        world.now(),
        pass.rules_dispatched,
        pass.succeeded,
        weth_left,
        usdc_held
    );
    report.check("one swap settled at t=301", pass.succeeded == 1);
    report.check("balances WETH 900 / USDC 95", weth_left == 900 && usdc_held == 95);
    report.check("gate reports not ready right after commit", !world.chain.is_ready(agent_id, 0, world.now())?);

    // ── t=301 again: same instant ────────────────────────────────────────────

    let pass = evaluation.evaluate_pass().await?;
    println!("  t={:<4} dispatched={} (cooldown just committed)", world.now(), pass.rules_dispatched);
    report.check("no second dispatch in the same window", pass.rules_dispatched == 0);

    // ── t=601: second window ─────────────────────────────────────────────────

    world.clock.advance(COOLDOWN_SECS);
    let pass = evaluation.evaluate_pass().await?;
    let (weth_left, usdc_held) = (world.balance(agent_id, &weth())?, world.balance(agent_id, &usdc())?);
    println!(
        "  t={:<4} dispatched={} succeeded={}  WETH {} USDC {}",
        world.now(),
        pass.rules_dispatched,
        pass.succeeded,
        weth_left,
        usdc_held
    );
    report.check("balances WETH 810 / USDC 180", weth_left == 810 && usdc_held == 180);

    let history = world.recorder.query(Some(agent_id), 10)?;
    report.check(
        "both swaps recorded off-chain",
        history.len() == 2
            && history.iter().all(|attempt| attempt.succeeded() && attempt.path == Some(ExecutionPath::OffChain)),
    );
    report.check("ledger solvent", world.ledger.check_all_solvency().is_ok());

    print_history(&mut report, &world);
    println!("  Scenario 1 complete.");
    println!();

    Ok(report)
}
