//! Rule types and the universal cooldown gate.
//!
//! Rules live in an ordered list per agent. The position of a rule is part of
//! how callers address it, but removal swaps the last rule into the removed
//! slot, so indices are not stable across removals. Every rule therefore also
//! carries an immutable [`RuleId`] that commits are checked against.
//!
//! [`check_gate`] is the single readiness check shared by the rule engine and
//! the chain substrate's `can_execute`; both must agree for identical inputs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    agent::{Agent, AgentStatus},
    error::{AutoswapError, AutoswapResult},
    Bps, Timestamp, BPS_DENOMINATOR,
};

/// Minimum gap between two executions of the same rule, in seconds.
pub const MIN_COOLDOWN_SECS: u64 = 60;

/// Immutable rule identity, distinct from the rule's storage slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleId(pub uuid::Uuid);

impl RuleId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for RuleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule-{}", self.0)
    }
}

/// The trigger condition family of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleType {
    RebalanceThreshold,
    /// Trades on a fixed interval; `cooldown_secs` is the interval.
    TimeWeighted,
    LiquidityRange,
    StopLoss,
    TakeProfit,
    /// Fires on a signal whose kind equals `target_value`.
    CustomSignal,
}

/// The owner-supplied parameters of a rule, validated before storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleParams {
    pub rule_type: RuleType,
    /// Trigger threshold in basis points, `0..=10000`.
    pub threshold_bps: Bps,
    /// Meaning depends on `rule_type` (signal kind for `CustomSignal`).
    pub target_value: u64,
    /// Seconds between executions, at least [`MIN_COOLDOWN_SECS`].
    pub cooldown_secs: u64,
}

impl RuleParams {
    pub fn new(rule_type: RuleType, threshold_bps: Bps, target_value: u64, cooldown_secs: u64) -> Self {
        Self { rule_type, threshold_bps, target_value, cooldown_secs }
    }

    /// Reject thresholds above 100% and cooldowns below the floor.
    pub fn validate(&self) -> AutoswapResult<()> {
        if self.threshold_bps > BPS_DENOMINATOR {
            return Err(AutoswapError::InvalidRule {
                reason: format!(
                    "threshold {}bps exceeds {}bps",
                    self.threshold_bps, BPS_DENOMINATOR
                ),
            });
        }
        if self.cooldown_secs < MIN_COOLDOWN_SECS {
            return Err(AutoswapError::InvalidRule {
                reason: format!(
                    "cooldown {}s is below the {}s floor",
                    self.cooldown_secs, MIN_COOLDOWN_SECS
                ),
            });
        }
        Ok(())
    }
}

/// A stored rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub rule_type: RuleType,
    pub threshold_bps: Bps,
    pub target_value: u64,
    pub cooldown_secs: u64,
    /// Unix seconds of the last committed execution; 0 means never.
    pub last_executed: Timestamp,
    pub enabled: bool,
}

impl Rule {
    /// Build an enabled, never-executed rule from validated parameters.
    pub fn new(params: RuleParams) -> AutoswapResult<Self> {
        params.validate()?;
        Ok(Self {
            id: RuleId::new(),
            rule_type: params.rule_type,
            threshold_bps: params.threshold_bps,
            target_value: params.target_value,
            cooldown_secs: params.cooldown_secs,
            last_executed: 0,
            enabled: true,
        })
    }

    /// Replace the mutable parameters, keeping identity and execution history.
    pub fn apply(&mut self, params: RuleParams) -> AutoswapResult<()> {
        params.validate()?;
        self.rule_type = params.rule_type;
        self.threshold_bps = params.threshold_bps;
        self.target_value = params.target_value;
        self.cooldown_secs = params.cooldown_secs;
        Ok(())
    }

    /// Seconds until the cooldown window re-opens at `now`; 0 when open.
    ///
    /// A clock reading earlier than `last_executed` counts as zero elapsed.
    pub fn cooldown_remaining(&self, now: Timestamp) -> u64 {
        let elapsed = now.saturating_sub(self.last_executed);
        self.cooldown_secs.saturating_sub(elapsed)
    }

    /// `now - last_executed >= cooldown`.
    pub fn cooldown_elapsed(&self, now: Timestamp) -> bool {
        self.cooldown_remaining(now) == 0
    }
}

/// Why a rule is not ready to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateBlock {
    AgentNotActive(AgentStatus),
    RuleDisabled,
    Cooldown { remaining_secs: u64 },
}

impl fmt::Display for GateBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateBlock::AgentNotActive(status) => write!(f, "agent is {status:?}"),
            GateBlock::RuleDisabled => f.write_str("rule disabled"),
            GateBlock::Cooldown { remaining_secs } => {
                write!(f, "cooldown remaining {remaining_secs}s")
            }
        }
    }
}

impl From<GateBlock> for AutoswapError {
    fn from(block: GateBlock) -> Self {
        AutoswapError::GateRejected { reason: block.to_string() }
    }
}

/// The active + enabled + cooldown gate, checked in that order.
pub fn check_gate(agent: &Agent, rule: &Rule, now: Timestamp) -> Result<(), GateBlock> {
    if !agent.is_active() {
        return Err(GateBlock::AgentNotActive(agent.status));
    }
    if !rule.enabled {
        return Err(GateBlock::RuleDisabled);
    }
    match rule.cooldown_remaining(now) {
        0 => Ok(()),
        remaining_secs => Err(GateBlock::Cooldown { remaining_secs }),
    }
}
