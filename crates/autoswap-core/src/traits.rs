//! Collaborator trait definitions for the autoswap engine.
//!
//! These traits define every boundary the engine talks across:
//!
//! - `RuleEvaluator`      the pure trigger decision for one rule
//! - `ChainReader`        read-only agent/rule/balance state
//! - `ExecutionGate`      the server-side readiness check and cooldown commit
//! - `AgentLedger`        the authoritative per-agent balance map
//! - `SignalSource`       pool-scoped signals: latest, paged and pushed
//! - `QuoteProvider`      quoting plus off-chain and on-chain settlement
//! - `ExecutionRecorder`  append-only execution history
//! - `CursorStore`        the persisted signal ingestion watermark
//!
//! Storage backends (in-memory, database, RPC) implement these without the
//! rule engine or executor knowing which one is in use.

use async_trait::async_trait;
use tokio::sync::broadcast;

use autoswap_contracts::{
    agent::{AccountId, Agent, AgentId, PoolId, TokenId},
    error::AutoswapResult,
    execution::{Decision, ExecutionAttempt},
    quote::{Quote, SessionId, Settlement, SwapRequest},
    rule::{Rule, RuleId},
    signal::Signal,
    Amount, Bps, Timestamp, BPS_DENOMINATOR,
};

/// Decides whether a rule should execute now.
///
/// Implementations must be pure: no I/O, and identical inputs always yield
/// the same decision.
pub trait RuleEvaluator: Send + Sync {
    fn evaluate(&self, agent: &Agent, rule: &Rule, latest_signal: Option<&Signal>, now: Timestamp) -> Decision;

    /// Indices of the rules in `rules` that should execute now, in stored
    /// order.
    ///
    /// Applies the caller-side preconditions (agent active, rule enabled)
    /// before consulting [`RuleEvaluator::evaluate`].
    fn ready_rules(&self, agent: &Agent, rules: &[Rule], latest_signal: Option<&Signal>, now: Timestamp) -> Vec<usize> {
        if !agent.is_active() {
            return Vec::new();
        }
        rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| rule.enabled)
            .filter(|(_, rule)| self.evaluate(agent, rule, latest_signal, now).should_execute)
            .map(|(index, _)| index)
            .collect()
    }
}

/// Read-only accessor to agent records, rule lists, and balances.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// All registered agents, in registration order, regardless of status.
    async fn list_agents(&self) -> AutoswapResult<Vec<AgentId>>;

    async fn get_agent(&self, agent_id: AgentId) -> AutoswapResult<Agent>;

    /// The agent's rules in stored order. Index in the returned vector is the
    /// rule index used by `ExecutionGate`.
    async fn get_rules(&self, agent_id: AgentId) -> AutoswapResult<Vec<Rule>>;

    async fn get_agent_balance(&self, agent_id: AgentId, token: &TokenId) -> AutoswapResult<Amount>;
}

/// The substrate's execution gate.
///
/// `can_execute` must apply exactly the same active + enabled + cooldown
/// check as the rule engine. `commit_execution` re-validates that check at the
/// point of commit, so a caller's local decision can never bypass it.
#[async_trait]
pub trait ExecutionGate: Send + Sync {
    async fn can_execute(&self, agent_id: AgentId, rule_index: usize, now: Timestamp) -> AutoswapResult<bool>;

    /// Commit `last_executed = now` for the rule at `rule_index`.
    ///
    /// Fails with `GateRejected` if the rule is not ready, `RuleShifted` if
    /// the slot no longer holds `expected_rule`, and `Unauthorized` if
    /// `caller` is not an authorized executor.
    async fn commit_execution(
        &self,
        caller: &AccountId,
        agent_id: AgentId,
        rule_index: usize,
        expected_rule: RuleId,
        now: Timestamp,
    ) -> AutoswapResult<()>;

    /// Run every check `commit_execution` would run, without writing.
    ///
    /// Returns the error the commit would fail with, so a caller that commits
    /// late learns about a refused caller before acting rather than after.
    async fn check_commit(
        &self,
        caller: &AccountId,
        agent_id: AgentId,
        rule_index: usize,
        expected_rule: RuleId,
        now: Timestamp,
    ) -> AutoswapResult<()>;
}

/// The authoritative per-agent balance map.
///
/// Every mutation is all-or-nothing: when a precondition fails nothing is
/// applied, and a swap settlement's debit and credit are never observable
/// separately.
pub trait AgentLedger: Send + Sync {
    fn balance(&self, agent_id: AgentId, token: &TokenId) -> AutoswapResult<Amount>;

    /// Credit `amount` and return the new balance.
    fn apply_deposit(&self, agent_id: AgentId, token: &TokenId, amount: Amount) -> AutoswapResult<Amount>;

    /// Debit `amount` and return the new balance. Fails with
    /// `InsufficientBalance` when `amount` exceeds the balance.
    fn apply_withdraw(&self, agent_id: AgentId, token: &TokenId, amount: Amount) -> AutoswapResult<Amount>;

    /// Debit `amount_in` of `token_in` and credit `amount_out` of `token_out`
    /// as one atomic unit.
    fn apply_swap_settlement(
        &self,
        agent_id: AgentId,
        token_in: &TokenId,
        amount_in: Amount,
        token_out: &TokenId,
        amount_out: Amount,
    ) -> AutoswapResult<()>;
}

/// Source of pool-scoped signals.
#[async_trait]
pub trait SignalSource: Send + Sync {
    /// The most recent signal for `pool_id`, or `None` if none was ever seen.
    async fn latest_signal(&self, pool_id: &PoolId) -> AutoswapResult<Option<Signal>>;

    /// Up to `limit` signals with `sequence >= from_sequence`, ascending.
    async fn fetch_signals(&self, from_sequence: u64, limit: usize) -> AutoswapResult<Vec<Signal>>;

    /// Sequence of the newest signal in the log, or `None` if it is empty.
    async fn head(&self) -> AutoswapResult<Option<u64>>;

    /// Push delivery of new signals, if the source supports it.
    ///
    /// Sources without a push channel return `None` and are only polled. A
    /// receiver that lags loses signals; the poller picks those up.
    fn subscribe(&self) -> Option<broadcast::Receiver<Signal>> {
        None
    }
}

/// Quote and settlement provider.
///
/// Only the routing/pricing contract lives behind this trait; the engine
/// never computes prices itself.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn quote(&self, request: &SwapRequest) -> AutoswapResult<Quote>;

    /// Check that `quote` is still fresh.
    ///
    /// The default re-quotes the same request and accepts the quote when the
    /// fresh output is within `tolerance_bps` of the original in either
    /// direction.
    async fn validate(&self, quote: &Quote, tolerance_bps: Bps) -> AutoswapResult<bool> {
        let fresh = self
            .quote(&SwapRequest {
                token_in: quote.token_in.clone(),
                token_out: quote.token_out.clone(),
                amount_in: quote.amount_in,
                slippage_bps: quote.slippage_bps,
            })
            .await?;
        let drift = fresh.amount_out.abs_diff(quote.amount_out);
        let allowed = quote.amount_out.saturating_mul(Amount::from(tolerance_bps)) / Amount::from(BPS_DENOMINATOR);
        Ok(drift <= allowed)
    }

    /// Whether the off-chain session channel is currently usable.
    fn session_connected(&self) -> bool;

    /// Open a settlement session for `agent_id`, or reuse an open one.
    async fn open_session(&self, agent_id: AgentId) -> AutoswapResult<SessionId>;

    /// Submit the balance update for `quote` within `session`.
    async fn settle_off_chain(&self, session: &SessionId, quote: &Quote) -> AutoswapResult<Settlement>;

    async fn close_session(&self, session: &SessionId) -> AutoswapResult<()>;

    /// Dry-run the on-chain swap against current state.
    async fn simulate_on_chain(
        &self,
        agent_id: AgentId,
        rule_index: usize,
        quote: &Quote,
        min_amount_out: Amount,
    ) -> AutoswapResult<()>;

    /// Submit the on-chain swap and wait for confirmation.
    async fn settle_on_chain(
        &self,
        agent_id: AgentId,
        rule_index: usize,
        quote: &Quote,
        min_amount_out: Amount,
    ) -> AutoswapResult<Settlement>;
}

/// Append-only history of terminal execution attempts.
pub trait ExecutionRecorder: Send + Sync {
    fn record(&self, attempt: &ExecutionAttempt) -> AutoswapResult<()>;

    /// Most-recent-first, at most `limit` entries, optionally for one agent.
    fn query(&self, agent_id: Option<AgentId>, limit: usize) -> AutoswapResult<Vec<ExecutionAttempt>>;
}

/// Persistence for the signal ingestion watermark.
///
/// The stored value is the next sequence number to fetch.
pub trait CursorStore: Send + Sync {
    fn load(&self) -> AutoswapResult<Option<u64>>;

    fn save(&self, next_sequence: u64) -> AutoswapResult<()>;
}
