//! Scenario 2: Off-chain timeout with on-chain fallback
//!
//! The off-chain counter-party stops answering. The executor gives the
//! session its deadline, abandons it, and settles the same quote on-chain.
//! The first on-chain submission reverts, so the second attempt runs after
//! one retry delay.
//!
//! Pipeline walk-through for the demo run:
//!   1. Quote 100 WETH → 95 USDC and re-validate it
//!   2. Off-chain settlement hangs past `offchain_timeout_ms`; abandoned
//!   3. On-chain attempt 1: simulate passes, submit reverts
//!   4. Wait `1 * retry_delay_ms`, then attempt 2 confirms
//!   5. Ledger applies WETH -100 / USDC +95 atomically
//!   6. One history record: path on-chain, success, 100 in, 95 out

use autoswap_contracts::{
    error::AutoswapResult,
    execution::ExecutionPath,
    rule::{RuleParams, RuleType},
};
use autoswap_core::{config::EngineConfig, traits::ExecutionRecorder};

use crate::{
    mock_data::{usdc, weth},
    provider::OffChainBehaviour,
    scenarios::{print_history, ScenarioReport},
    World,
};

/// Engine settings with deadlines short enough for an interactive demo.
pub fn demo_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.executor.offchain_timeout_ms = 250;
    config.executor.retry_delay_ms = 100;
    config
}

/// Run Scenario 2: Off-chain timeout with on-chain fallback.
pub async fn run_scenario() -> AutoswapResult<ScenarioReport> {
    run_with(demo_config(), 1).await
}

/// Run the scenario with `config`, failing the first `onchain_failures`
/// on-chain submissions.
pub async fn run_with(config: EngineConfig, onchain_failures: u32) -> AutoswapResult<ScenarioReport> {
    println!("=== Scenario 2: Off-chain timeout, on-chain fallback ===");
    println!();

    let mut report = ScenarioReport::new("offchain-fallback");
    let world = World::new(config, OffChainBehaviour::Hang, onchain_failures)?;
    let agent_id = world.spawn_agent(1_000, &[RuleParams::new(RuleType::TimeWeighted, 0, 0, 300)]).await?;

    println!("  Agent {agent_id}: 1000 WETH, off-chain counter-party: not answering");
    println!(
        "  Off-chain deadline {}ms, on-chain attempts {}, retry delay {}ms (linear)",
        world.config.executor.offchain_timeout_ms,
        world.config.executor.max_onchain_attempts,
        world.config.executor.retry_delay_ms
    );
    println!();

    world.clock.set(301);
    let pass = world.evaluation_loop().evaluate_pass().await?;

    let submissions = world.provider.count("settle_on_chain");
    println!("  Off-chain attempts:     {}", world.provider.count("settle_off_chain"));
    println!("  On-chain submissions:   {}", submissions);
    println!("  Pass: dispatched={} succeeded={} failed={}", pass.rules_dispatched, pass.succeeded, pass.failed);

    report.check("swap settled", pass.succeeded == 1);
    report.check("off-chain tried once", world.provider.count("settle_off_chain") == 1);
    report.check("hung session closed", world.provider.count("close_session") == 1);
    report.check(
        format!("on-chain confirmed on attempt {}", onchain_failures + 1),
        submissions == onchain_failures as usize + 1,
    );

    let weth_left = world.balance(agent_id, &weth())?;
    let usdc_held = world.balance(agent_id, &usdc())?;
    println!("  Balances:               WETH {weth_left} USDC {usdc_held}");
    report.check("balances WETH 900 / USDC 95", weth_left == 900 && usdc_held == 95);

    let history = world.recorder.query(Some(agent_id), 10)?;
    let recorded_on_chain = match history.as_slice() {
        [attempt] => {
            println!(
                "  Recorded:               path={:?} outcome={:?} in={} out={} ref={}",
                attempt.path,
                attempt.outcome,
                attempt.amount_in,
                attempt.amount_out,
                attempt.external_reference.as_deref().unwrap_or("-")
            );
            attempt.succeeded()
                && attempt.path == Some(ExecutionPath::OnChain)
                && attempt.amount_in == 100
                && attempt.amount_out == 95
        }
        _ => false,
    };
    report.check("one record: on-chain, success, 100 in, 95 out", recorded_on_chain);
    report.check("ledger solvent", world.ledger.check_all_solvency().is_ok());

    print_history(&mut report, &world);
    println!("  Scenario 2 complete.");
    println!();

    Ok(report)
}
