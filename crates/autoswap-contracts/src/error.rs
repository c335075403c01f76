//! Runtime error types for the autoswap execution pipeline.
//!
//! All fallible operations in the engine return `AutoswapResult<T>`.
//! Variants carry enough context to log a full diagnosis, while
//! [`AutoswapError::public_reason`] yields the sanitized cause that is written
//! to the execution history and shown to dashboard consumers.

use thiserror::Error;

use crate::{
    agent::{AccountId, AgentId, AgentStatus, TokenId},
    execution::ExecutionPath,
    rule::RuleId,
    Amount,
};

/// The unified error type for the autoswap engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AutoswapError {
    /// The rule is not ready (cooldown, disabled, agent not active).
    ///
    /// This is a gate rejection, not a failure: callers skip the rule.
    #[error("gate rejected execution: {reason}")]
    GateRejected { reason: String },

    #[error("agent {agent_id} not found")]
    AgentNotFound { agent_id: AgentId },

    #[error("rule index {rule_index} not found for agent {agent_id}")]
    RuleNotFound { agent_id: AgentId, rule_index: usize },

    /// The slot at `rule_index` holds a different rule than the one evaluated.
    ///
    /// Rule removal swaps the last rule into the removed slot, so an index
    /// captured before a removal can silently point at another rule.
    #[error("rule at index {rule_index} of agent {agent_id} is {found}, expected {expected}")]
    RuleShifted {
        agent_id: AgentId,
        rule_index: usize,
        expected: RuleId,
        found: RuleId,
    },

    /// Rule parameters violate the cooldown floor or the basis-point range.
    #[error("invalid rule: {reason}")]
    InvalidRule { reason: String },

    #[error("agent {agent_id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        agent_id: AgentId,
        from: AgentStatus,
        to: AgentStatus,
    },

    /// A withdrawal or settlement asked for more than the agent holds.
    ///
    /// Invariant violation: never retried, nothing is applied.
    #[error("agent {agent_id} holds {available} {token}, {requested} requested")]
    InsufficientBalance {
        agent_id: AgentId,
        token: TokenId,
        requested: Amount,
        available: Amount,
    },

    /// Tracked balances for `token` would exceed what the vault custodies.
    #[error("solvency violated for {token}: tracked {tracked} exceeds custodied {custodied}")]
    SolvencyViolation {
        token: TokenId,
        tracked: Amount,
        custodied: Amount,
    },

    #[error("account {caller} is not authorized to {action}")]
    Unauthorized { caller: AccountId, action: String },

    #[error("quote is stale: {reason}")]
    QuoteStale { reason: String },

    /// A transient failure reported by the quote/settle provider.
    #[error("provider failure during {operation}: {reason}")]
    Provider { operation: String, reason: String },

    #[error("{operation} timed out after {after_ms}ms")]
    Timeout { operation: String, after_ms: u64 },

    /// A settlement path gave up after exhausting its attempts.
    #[error("{path} settlement failed after {attempts} attempt(s): {reason}")]
    SettlementFailed {
        path: ExecutionPath,
        attempts: u32,
        reason: String,
    },

    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    #[error("execution record write failed: {reason}")]
    RecordFailed { reason: String },

    /// The chain substrate could not be reached at all.
    #[error("chain unavailable: {reason}")]
    ChainUnavailable { reason: String },

    #[error("storage error: {reason}")]
    StorageError { reason: String },
}

impl AutoswapError {
    /// True for failures that may succeed if the same call is attempted again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Provider { .. }
                | Self::Timeout { .. }
                | Self::QuoteStale { .. }
                | Self::ChainUnavailable { .. }
        )
    }

    /// True for balance-accounting violations. These must never be retried.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Self::InsufficientBalance { .. } | Self::SolvencyViolation { .. }
        )
    }

    pub fn is_gate_rejection(&self) -> bool {
        matches!(self, Self::GateRejected { .. })
    }

    /// Human-readable cause suitable for the execution history.
    ///
    /// Never includes provider payloads, raw error text, or internal ids.
    pub fn public_reason(&self) -> String {
        match self {
            Self::GateRejected { reason } => format!("rule not ready: {reason}"),
            Self::AgentNotFound { .. } | Self::RuleNotFound { .. } => {
                "agent or rule no longer exists".to_string()
            }
            Self::RuleShifted { .. } => "rule list changed before execution".to_string(),
            Self::InvalidRule { .. } => "rule configuration is invalid".to_string(),
            Self::InvalidTransition { .. } => "agent is not in a tradable state".to_string(),
            Self::InsufficientBalance { token, .. } => format!("insufficient {token} balance"),
            Self::SolvencyViolation { .. } => {
                "settlement refused: vault solvency check failed".to_string()
            }
            Self::Unauthorized { .. } => "executor is not authorized".to_string(),
            Self::QuoteStale { .. } => "quote expired before settlement".to_string(),
            Self::Provider { operation, .. } => {
                format!("swap provider unavailable during {operation}")
            }
            Self::Timeout { operation, .. } => format!("{operation} timed out"),
            Self::SettlementFailed { path, attempts, .. } => {
                format!("{path} settlement failed after {attempts} attempt(s)")
            }
            Self::ConfigError { .. }
            | Self::RecordFailed { .. }
            | Self::ChainUnavailable { .. }
            | Self::StorageError { .. } => "internal engine error".to_string(),
        }
    }
}

/// Convenience alias used throughout the autoswap crates.
pub type AutoswapResult<T> = Result<T, AutoswapError>;
