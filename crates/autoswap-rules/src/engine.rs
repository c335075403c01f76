//! The rule engine.
//!
//! `RuleEngine` implements the `RuleEvaluator` trait from autoswap-core.
//!
//! Evaluation algorithm:
//!
//! 1. Apply the cooldown gate: `now - last_executed >= cooldown_secs`.
//!    If it fails → skip with "cooldown remaining Ns".
//! 2. Derive the rule's `TriggerCondition` from its type and parameters.
//! 3. Check the condition against the latest signal for the pool and return
//!    its decision.
//!
//! Agent status and the rule's `enabled` flag are the caller's preconditions
//! and are not re-checked here.

use tracing::debug;

use autoswap_contracts::{
    agent::Agent,
    execution::Decision,
    rule::{GateBlock, Rule},
    signal::Signal,
    Timestamp,
};
use autoswap_core::traits::RuleEvaluator;

use crate::condition::TriggerCondition;

/// Stateless evaluator for every rule type.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleEngine;

impl RuleEngine {
    pub fn new() -> Self {
        Self
    }
}

impl RuleEvaluator for RuleEngine {
    fn evaluate(&self, agent: &Agent, rule: &Rule, latest_signal: Option<&Signal>, now: Timestamp) -> Decision {
        let remaining_secs = rule.cooldown_remaining(now);
        if remaining_secs > 0 {
            let reason = GateBlock::Cooldown { remaining_secs }.to_string();
            debug!(agent_id = %agent.id, rule_id = %rule.id, %reason, "rule gated");
            return Decision::skip(reason);
        }

        let decision = TriggerCondition::for_rule(rule).check(latest_signal);
        debug!(
            agent_id = %agent.id,
            rule_id = %rule.id,
            rule_type = ?rule.rule_type,
            should_execute = decision.should_execute,
            reason = %decision.reason,
            "rule evaluated"
        );
        decision
    }
}
