//! End-to-end tests over a fully wired world.

use std::time::Duration;

use autoswap_contracts::{
    agent::{AccountId, AgentId},
    error::AutoswapError,
    execution::{ExecutionPath, Outcome},
    rule::{RuleParams, RuleType},
    Amount,
};
use autoswap_core::{
    config::{CooldownCommit, EngineConfig},
    traits::{ChainReader, ExecutionRecorder, RuleEvaluator},
};
use autoswap_ref::{
    mock_data::{admin, owner, usdc, weth},
    scenarios::{offchain_fallback, stop_loss, time_weighted},
    OffChainBehaviour, World,
};
use autoswap_rules::RuleEngine;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn every(cooldown_secs: u64) -> RuleParams {
    RuleParams::new(RuleType::TimeWeighted, 0, 0, cooldown_secs)
}

fn balances(world: &World, agent_id: AgentId) -> (Amount, Amount) {
    (world.balance(agent_id, &weth()).unwrap(), world.balance(agent_id, &usdc()).unwrap())
}

// ── 1. cooldown ──────────────────────────────────────────────────────────────

/// TimeWeighted with cooldown 300: not ready at 1, ready at 301, and not
/// ready again once that execution is committed.
#[tokio::test]
async fn test_cooldown_gates_first_execution() {
    let world = World::healthy().unwrap();
    let agent_id = world.spawn_agent(1_000, &[every(300)]).await.unwrap();
    let engine = RuleEngine::new();

    let agent = world.chain.get_agent(agent_id).await.unwrap();
    let rules = world.chain.get_rules(agent_id).await.unwrap();
    assert!(!engine.evaluate(&agent, &rules[0], None, 1).should_execute);
    assert!(!world.chain.is_ready(agent_id, 0, 1).unwrap());
    assert!(engine.evaluate(&agent, &rules[0], None, 301).should_execute);
    assert!(world.chain.is_ready(agent_id, 0, 301).unwrap());

    world.clock.set(301);
    let pass = world.evaluation_loop().evaluate_pass().await.unwrap();
    assert_eq!(pass.succeeded, 1);

    let rules = world.chain.get_rules(agent_id).await.unwrap();
    assert_eq!(rules[0].last_executed, 301);
    assert!(!engine.evaluate(&agent, &rules[0], None, 301).should_execute);
    assert!(!world.chain.is_ready(agent_id, 0, 301).unwrap());
}

/// Over many passes `last_executed` never decreases and consecutive
/// executions are at least one cooldown apart.
#[tokio::test]
async fn test_cooldown_monotonicity_across_passes() {
    let world = World::healthy().unwrap();
    let agent_id = world.spawn_agent(1_000_000, &[every(120)]).await.unwrap();
    let evaluation = world.evaluation_loop();

    let mut last = 0;
    for _ in 0..40 {
        world.clock.advance(45);
        evaluation.evaluate_pass().await.unwrap();
        let current = world.chain.get_rules(agent_id).await.unwrap()[0].last_executed;
        assert!(current >= last, "last_executed went backwards: {last} -> {current}");
        last = current;
    }

    let mut times: Vec<u64> = world
        .recorder
        .query(Some(agent_id), 100)
        .unwrap()
        .iter()
        .map(|attempt| attempt.timestamp)
        .collect();
    times.reverse();
    assert!(times.len() > 1);
    assert!(times.windows(2).all(|pair| pair[1] - pair[0] >= 120), "got {times:?}");
}

// ── 2. dual-path settlement ──────────────────────────────────────────────────

/// WETH 1000, off-chain never answers: the default 3s deadline expires and
/// the swap settles on-chain at 95 for 100.
#[tokio::test(start_paused = true)]
async fn test_offchain_timeout_falls_back_on_chain() {
    let world = World::new(EngineConfig::default(), OffChainBehaviour::Hang, 0).unwrap();
    let agent_id = world.spawn_agent(1_000, &[every(300)]).await.unwrap();
    world.clock.set(301);

    let started = tokio::time::Instant::now();
    let pass = world.evaluation_loop().evaluate_pass().await.unwrap();

    assert!(started.elapsed() >= std::time::Duration::from_millis(3_000));
    assert_eq!(pass.succeeded, 1);
    assert_eq!(balances(&world, agent_id), (900, 95));

    let history = world.recorder.query(Some(agent_id), 10).unwrap();
    assert_eq!(history.len(), 1);
    let attempt = &history[0];
    assert_eq!(attempt.path, Some(ExecutionPath::OnChain));
    assert_eq!(attempt.outcome, Outcome::Success);
    assert_eq!(attempt.amount_in, 100);
    assert_eq!(attempt.amount_out, 95);
    assert!(attempt.external_reference.as_deref().is_some_and(|r| r.starts_with("0x")));
    assert!(world.recorder.verify_integrity());

    // The abandoned off-chain session is still closed.
    assert_eq!(world.provider.count("open_session"), 1);
    assert_eq!(world.provider.count("close_session"), 1);
}

/// Whatever goes wrong off-chain, a healthy on-chain path still settles.
#[tokio::test(start_paused = true)]
async fn test_fallback_completeness() {
    for behaviour in [OffChainBehaviour::Fail, OffChainBehaviour::Hang, OffChainBehaviour::Disconnected] {
        let world = World::new(EngineConfig::default(), behaviour, 0).unwrap();
        let agent_id = world.spawn_agent(1_000, &[every(300)]).await.unwrap();
        world.clock.set(301);

        let pass = world.evaluation_loop().evaluate_pass().await.unwrap();

        assert_eq!(pass.succeeded, 1, "{behaviour:?}");
        assert_eq!(balances(&world, agent_id), (900, 95), "{behaviour:?}");
        let recorded = world.recorder.query(None, 10).unwrap();
        assert_eq!(recorded[0].path, Some(ExecutionPath::OnChain), "{behaviour:?}");
        let expected_offchain = usize::from(behaviour != OffChainBehaviour::Disconnected);
        assert_eq!(world.provider.count("settle_off_chain"), expected_offchain, "{behaviour:?}");
    }
}

/// Both paths down: one failed record on the on-chain path, balances intact.
#[tokio::test(start_paused = true)]
async fn test_exhausted_fallback_records_failure() {
    let world = World::new(EngineConfig::default(), OffChainBehaviour::Fail, 10).unwrap();
    let agent_id = world.spawn_agent(1_000, &[every(300)]).await.unwrap();
    world.clock.set(301);

    let pass = world.evaluation_loop().evaluate_pass().await.unwrap();

    assert_eq!(pass.failed, 1);
    assert_eq!(world.provider.count("settle_on_chain"), 3);
    assert_eq!(balances(&world, agent_id), (1_000, 0));

    let history = world.recorder.query(Some(agent_id), 10).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].outcome, Outcome::Failed);
    assert_eq!(history[0].path, Some(ExecutionPath::OnChain));
    let detail = history[0].error_detail.as_deref().unwrap_or_default();
    assert!(detail.contains("after 3 attempt(s)"), "got: {detail}");
    assert!(!detail.contains("reverted"), "provider text leaked: {detail}");
}

/// Commit-on-success with a revoked executor: every dispatch is refused
/// before quoting, so the rule never trades however often it comes up.
#[tokio::test]
async fn test_revoked_executor_never_settles_on_success_commit() {
    let mut config = EngineConfig::default();
    config.executor.cooldown_commit = CooldownCommit::OnSuccess;
    let world = World::new(config, OffChainBehaviour::Succeed, 0).unwrap();
    let agent_id = world.spawn_agent(1_000, &[every(300)]).await.unwrap();
    let account = AccountId::new(world.config.executor.executor_account.clone());
    world.chain.revoke_executor(&admin(), &account).unwrap();
    world.clock.set(301);

    let evaluation = world.evaluation_loop();
    for _ in 0..3 {
        let pass = evaluation.evaluate_pass().await.unwrap();
        assert_eq!(pass.rules_dispatched, 1);
        assert_eq!(pass.errors, 1);
        assert_eq!(pass.succeeded, 0);
        world.clock.advance(300);
    }

    assert!(world.provider.calls().is_empty());
    assert_eq!(balances(&world, agent_id), (1_000, 0));
    assert_eq!(world.recorder.len(), 0);
    assert_eq!(world.chain.get_rules(agent_id).await.unwrap()[0].last_executed, 0);
}

// ── 3. ledger ────────────────────────────────────────────────────────────────

/// Withdrawing 2000 from 1000 fails and changes nothing.
#[tokio::test]
async fn test_over_withdrawal_is_rejected() {
    let world = World::healthy().unwrap();
    let agent_id = world.spawn_agent(1_000, &[]).await.unwrap();

    let err = world.chain.withdraw(&owner(), agent_id, &weth(), 2_000).await.unwrap_err();
    assert!(matches!(
        err,
        AutoswapError::InsufficientBalance { requested: 2_000, available: 1_000, .. }
    ));
    assert_eq!(balances(&world, agent_id), (1_000, 0));
    assert_eq!(world.ledger.custodied(&weth()).unwrap(), 1_000);
    assert_eq!(world.chain.get_agent(agent_id).await.unwrap().deposited_amount, 1_000);
}

/// A withdrawal issued while a settlement is in flight waits for it and
/// sees the post-swap balance; the confirmed swap is recorded as a success.
#[tokio::test(start_paused = true)]
async fn test_withdrawal_waits_for_in_flight_settlement() {
    let world = World::new(EngineConfig::default(), OffChainBehaviour::Hang, 0).unwrap();
    let agent_id = world.spawn_agent(1_000, &[every(300)]).await.unwrap();
    world.clock.set(301);

    let evaluation = world.evaluation_loop();
    let pass = tokio::spawn(async move { evaluation.evaluate_pass().await });
    // Off-chain hangs until its 3s deadline, holding the agent's lock.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(!pass.is_finished());

    let err = world.chain.withdraw(&owner(), agent_id, &weth(), 1_000).await.unwrap_err();
    assert!(matches!(
        err,
        AutoswapError::InsufficientBalance { requested: 1_000, available: 900, .. }
    ));

    let pass = pass.await.unwrap().unwrap();
    assert_eq!(pass.succeeded, 1);
    assert_eq!(world.provider.count("settle_on_chain"), 1);
    assert_eq!(balances(&world, agent_id), (900, 95));
    let history = world.recorder.query(Some(agent_id), 10).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].outcome, Outcome::Success);
    assert_eq!(history[0].path, Some(ExecutionPath::OnChain));

    assert_eq!(world.chain.withdraw(&owner(), agent_id, &weth(), 900).await.unwrap(), 0);
    world.ledger.check_all_solvency().unwrap();
}

/// Balances move only by deposits, withdrawals and settled amounts.
#[tokio::test]
async fn test_ledger_conservation_over_settlements() {
    let world = World::healthy().unwrap();
    let a = world.spawn_agent(1_000, &[every(60)]).await.unwrap();
    let b = world.spawn_agent(500, &[every(60)]).await.unwrap();
    world.chain.withdraw(&owner(), b, &weth(), 200).await.unwrap();

    let evaluation = world.evaluation_loop();
    for _ in 0..5 {
        world.clock.advance(60);
        evaluation.evaluate_pass().await.unwrap();
    }

    let history = world.recorder.query(None, 100).unwrap();
    let settled_in: Amount = history.iter().filter(|h| h.succeeded()).map(|h| h.amount_in).sum();
    let settled_out: Amount = history.iter().filter(|h| h.succeeded()).map(|h| h.amount_out).sum();

    let (a_weth, a_usdc) = balances(&world, a);
    let (b_weth, b_usdc) = balances(&world, b);
    assert_eq!(a_weth + b_weth, 1_000 + 500 - 200 - settled_in);
    assert_eq!(a_usdc + b_usdc, settled_out);
    assert_eq!(world.ledger.total_tracked(&weth()).unwrap(), world.ledger.custodied(&weth()).unwrap());
    world.ledger.check_all_solvency().unwrap();
}

// ── 4. reference scenarios ───────────────────────────────────────────────────

#[tokio::test]
async fn test_time_weighted_scenario() {
    let report = time_weighted::run_scenario().await.unwrap();
    assert!(report.all_passed(), "failed: {:?}", report.failed().collect::<Vec<_>>());
    assert_eq!(report.recorded, 2);
}

#[tokio::test(start_paused = true)]
async fn test_offchain_fallback_scenario() {
    let report = offchain_fallback::run_scenario().await.unwrap();
    assert!(report.all_passed(), "failed: {:?}", report.failed().collect::<Vec<_>>());
    assert_eq!(report.recorded, 1);
}

#[tokio::test]
async fn test_stop_loss_scenario() {
    let report = stop_loss::run_scenario().await.unwrap();
    assert!(report.all_passed(), "failed: {:?}", report.failed().collect::<Vec<_>>());
}
