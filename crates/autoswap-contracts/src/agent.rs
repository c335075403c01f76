//! Agent identity and lifecycle types.
//!
//! An agent is a user-owned automation unit: it holds a token deposit, an
//! ordered rule list, and a trading pair that every rule executes against.
//! Agents are never deleted; `Liquidated` is the terminal status.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Amount, Timestamp};

/// Opaque agent identifier assigned by the chain substrate at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub u64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent-{}", self.0)
    }
}

/// An account on the ledger substrate: an owner, an admin, or an executor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Token symbol or address. Compared by exact string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenId(pub String);

impl TokenId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of the trading pool that signals are scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PoolId(pub String);

impl PoolId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The execution target of an agent: every swap sells `token_in` for
/// `token_out` through `pool_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TradingPair {
    pub pool_id: PoolId,
    pub token_in: TokenId,
    pub token_out: TokenId,
}

impl TradingPair {
    pub fn new(pool_id: PoolId, token_in: TokenId, token_out: TokenId) -> Self {
        Self { pool_id, token_in, token_out }
    }
}

/// Lifecycle status of an agent.
///
/// ```text
/// Inactive ──activate──→ Active ⇄ Paused
///     └───────────────────┴────────┴──liquidate──→ Liquidated (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentStatus {
    Inactive,
    Active,
    Paused,
    Liquidated,
}

impl AgentStatus {
    /// Return true if the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: AgentStatus) -> bool {
        use AgentStatus::*;
        matches!(
            (self, next),
            (Inactive, Active)
                | (Active, Paused)
                | (Paused, Active)
                | (Inactive, Liquidated)
                | (Active, Liquidated)
                | (Paused, Liquidated)
        )
    }
}

/// A snapshot of an agent record as read from the chain substrate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub owner: AccountId,
    pub pair: TradingPair,
    pub status: AgentStatus,
    /// Aggregate amount ever deposited net of withdrawals. Informational only;
    /// the ledger's per-token balances are authoritative.
    pub deposited_amount: Amount,
    pub created_at: Timestamp,
    pub last_activity: Timestamp,
}

impl Agent {
    pub fn is_active(&self) -> bool {
        self.status == AgentStatus::Active
    }
}
