//! Rule decisions, execution results, and execution history records.
//!
//! `Decision` is what the rule engine returns for one rule at one instant.
//! `ExecutionResult` is what the executor returns to its caller.
//! `ExecutionAttempt` is what gets appended to the execution history, one
//! per terminal attempt, never one per retry.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{agent::AgentId, rule::RuleId, Amount, Timestamp};

/// The rule engine's verdict for one rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub should_execute: bool,
    /// Why the rule fires or does not, written to debug logs.
    pub reason: String,
}

impl Decision {
    pub fn execute(reason: impl Into<String>) -> Self {
        Self { should_execute: true, reason: reason.into() }
    }

    pub fn skip(reason: impl Into<String>) -> Self {
        Self { should_execute: false, reason: reason.into() }
    }
}

/// Which settlement mechanism finalized (or last tried to finalize) a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionPath {
    /// Low-latency session-based settlement with the counter-party.
    OffChain,
    /// Transactional fallback.
    OnChain,
}

impl fmt::Display for ExecutionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionPath::OffChain => f.write_str("off-chain"),
            ExecutionPath::OnChain => f.write_str("on-chain"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Success,
    Failed,
}

/// An immutable record of one terminal execution attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionAttempt {
    pub agent_id: AgentId,
    pub rule_index: usize,
    pub rule_id: RuleId,
    /// Engine clock reading (unix seconds) when the attempt was dispatched.
    pub timestamp: Timestamp,
    /// The path that settled, or the last path tried. `None` when the attempt
    /// failed before any settlement path was tried (quote or validation).
    pub path: Option<ExecutionPath>,
    pub outcome: Outcome,
    pub amount_in: Amount,
    pub amount_out: Amount,
    /// Session update id or transaction hash of the settlement.
    pub external_reference: Option<String>,
    /// Sanitized, human-readable cause of a failure.
    pub error_detail: Option<String>,
    /// Wall-clock time the record was created (UTC).
    pub recorded_at: DateTime<Utc>,
}

impl ExecutionAttempt {
    pub fn succeeded(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

/// What the executor hands back to the evaluation loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub success: bool,
    pub path: Option<ExecutionPath>,
    pub amount_in: Amount,
    pub amount_out: Option<Amount>,
    pub error: Option<String>,
}

impl From<&ExecutionAttempt> for ExecutionResult {
    fn from(attempt: &ExecutionAttempt) -> Self {
        let success = attempt.succeeded();
        Self {
            success,
            path: attempt.path,
            amount_in: attempt.amount_in,
            amount_out: success.then_some(attempt.amount_out),
            error: attempt.error_detail.clone(),
        }
    }
}
