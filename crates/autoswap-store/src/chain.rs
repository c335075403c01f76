//! The in-memory chain substrate.
//!
//! `InMemoryChain` holds agent records, rule lists, and the executor
//! allow-list, and forwards balance movements to an [`InMemoryLedger`]. It
//! implements both `ChainReader` and `ExecutionGate`, and re-validates the
//! shared readiness gate on every commit.
//!
//! Deposits and withdrawals run under the chain's [`AgentLocks`]. Hand the
//! same locks to the executor and a withdrawal waits for any settlement in
//! flight for that agent instead of racing it.
//!
//! Permissions:
//!
//! | operation                                   | caller                 |
//! |---------------------------------------------|------------------------|
//! | activate, pause, unpause                    | owner                  |
//! | add/update/enable/remove rule               | owner                  |
//! | deposit, withdraw                           | owner                  |
//! | emergency_pause, authorize/revoke executor  | admin                  |
//! | liquidate                                   | owner or admin         |
//! | commit_execution                            | authorized executor    |

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use autoswap_contracts::{
    agent::{AccountId, Agent, AgentId, AgentStatus, TokenId, TradingPair},
    error::{AutoswapError, AutoswapResult},
    rule::{check_gate, Rule, RuleId, RuleParams},
    Amount, Timestamp,
};
use autoswap_core::{
    locks::AgentLocks,
    traits::{AgentLedger, ChainReader, ExecutionGate},
};

use crate::ledger::InMemoryLedger;

#[derive(Debug, Default)]
struct ChainState {
    agents: BTreeMap<AgentId, Agent>,
    rules: HashMap<AgentId, Vec<Rule>>,
    executors: HashSet<AccountId>,
    next_agent_id: u64,
}

impl ChainState {
    fn agent(&self, agent_id: AgentId) -> AutoswapResult<&Agent> {
        self.agents.get(&agent_id).ok_or(AutoswapError::AgentNotFound { agent_id })
    }

    fn agent_mut(&mut self, agent_id: AgentId) -> AutoswapResult<&mut Agent> {
        self.agents.get_mut(&agent_id).ok_or(AutoswapError::AgentNotFound { agent_id })
    }

    fn rules_mut(&mut self, agent_id: AgentId) -> &mut Vec<Rule> {
        self.rules.entry(agent_id).or_default()
    }

    /// Everything a commit checks, in the order it checks it.
    fn validate_commit(
        &self,
        caller: &AccountId,
        agent_id: AgentId,
        rule_index: usize,
        expected_rule: RuleId,
        now: Timestamp,
    ) -> AutoswapResult<()> {
        if !self.executors.contains(caller) {
            return Err(AutoswapError::Unauthorized { caller: caller.clone(), action: "commit execution".to_string() });
        }

        let agent = self.agent(agent_id)?;
        let rule = self
            .rules
            .get(&agent_id)
            .and_then(|rules| rules.get(rule_index))
            .ok_or(AutoswapError::RuleNotFound { agent_id, rule_index })?;
        if rule.id != expected_rule {
            return Err(AutoswapError::RuleShifted { agent_id, rule_index, expected: expected_rule, found: rule.id });
        }
        check_gate(agent, rule, now).map_err(Into::into)
    }
}

/// Agents, rules, and executor authorization, backed by an in-memory ledger.
pub struct InMemoryChain {
    admin: AccountId,
    state: Mutex<ChainState>,
    ledger: Arc<InMemoryLedger>,
    locks: AgentLocks,
}

impl InMemoryChain {
    pub fn new(admin: AccountId, ledger: Arc<InMemoryLedger>) -> Self {
        Self {
            admin,
            state: Mutex::new(ChainState { next_agent_id: 1, ..ChainState::default() }),
            ledger,
            locks: AgentLocks::new(),
        }
    }

    /// Use `locks` for fund operations, typically the executor's.
    pub fn with_locks(mut self, locks: AgentLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn locks(&self) -> &AgentLocks {
        &self.locks
    }

    pub fn ledger(&self) -> &Arc<InMemoryLedger> {
        &self.ledger
    }

    pub fn admin(&self) -> &AccountId {
        &self.admin
    }

    // ── Agent lifecycle ──────────────────────────────────────────────────────

    /// Register a new agent in `Inactive` status.
    pub fn register_agent(&self, owner: AccountId, pair: TradingPair, now: Timestamp) -> AutoswapResult<AgentId> {
        let mut state = self.lock()?;
        let agent_id = AgentId(state.next_agent_id);
        state.next_agent_id += 1;

        info!(agent_id = %agent_id, owner = %owner, pool = %pair.pool_id, "agent registered");
        state.agents.insert(
            agent_id,
            Agent {
                id: agent_id,
                owner,
                pair,
                status: AgentStatus::Inactive,
                deposited_amount: 0,
                created_at: now,
                last_activity: now,
            },
        );
        state.rules.insert(agent_id, Vec::new());
        Ok(agent_id)
    }

    pub fn activate(&self, caller: &AccountId, agent_id: AgentId, now: Timestamp) -> AutoswapResult<()> {
        self.transition(caller, agent_id, AgentStatus::Active, now, Role::Owner)
    }

    pub fn pause(&self, caller: &AccountId, agent_id: AgentId, now: Timestamp) -> AutoswapResult<()> {
        self.transition(caller, agent_id, AgentStatus::Paused, now, Role::Owner)
    }

    pub fn unpause(&self, caller: &AccountId, agent_id: AgentId, now: Timestamp) -> AutoswapResult<()> {
        self.transition(caller, agent_id, AgentStatus::Active, now, Role::Owner)
    }

    pub fn emergency_pause(&self, caller: &AccountId, agent_id: AgentId, now: Timestamp) -> AutoswapResult<()> {
        self.transition(caller, agent_id, AgentStatus::Paused, now, Role::Admin)
    }

    /// Move the agent to the terminal `Liquidated` status.
    pub fn liquidate(&self, caller: &AccountId, agent_id: AgentId, now: Timestamp) -> AutoswapResult<()> {
        self.transition(caller, agent_id, AgentStatus::Liquidated, now, Role::OwnerOrAdmin)
    }

    fn transition(
        &self,
        caller: &AccountId,
        agent_id: AgentId,
        to: AgentStatus,
        now: Timestamp,
        role: Role,
    ) -> AutoswapResult<()> {
        let mut state = self.lock()?;
        let admin = self.admin.clone();
        let agent = state.agent_mut(agent_id)?;
        role.check(caller, &agent.owner, &admin, "change agent status")?;

        if !agent.status.can_transition_to(to) {
            return Err(AutoswapError::InvalidTransition { agent_id, from: agent.status, to });
        }
        info!(agent_id = %agent_id, from = ?agent.status, to = ?to, caller = %caller, "agent status changed");
        agent.status = to;
        agent.last_activity = now;
        Ok(())
    }

    // ── Rule management ──────────────────────────────────────────────────────

    /// Append a rule and return its index.
    pub fn add_rule(&self, caller: &AccountId, agent_id: AgentId, params: RuleParams) -> AutoswapResult<usize> {
        let rule = Rule::new(params)?;
        let mut state = self.lock()?;
        self.require_owner(&state, caller, agent_id, "add rule")?;

        let rules = state.rules_mut(agent_id);
        rules.push(rule);
        let index = rules.len() - 1;
        debug!(agent_id = %agent_id, rule_index = index, "rule added");
        Ok(index)
    }

    /// Replace a rule's parameters, keeping its identity and `last_executed`.
    pub fn update_rule(
        &self,
        caller: &AccountId,
        agent_id: AgentId,
        rule_index: usize,
        params: RuleParams,
    ) -> AutoswapResult<()> {
        let mut state = self.lock()?;
        self.require_owner(&state, caller, agent_id, "update rule")?;
        let rule = state
            .rules_mut(agent_id)
            .get_mut(rule_index)
            .ok_or(AutoswapError::RuleNotFound { agent_id, rule_index })?;
        rule.apply(params)
    }

    pub fn set_rule_enabled(
        &self,
        caller: &AccountId,
        agent_id: AgentId,
        rule_index: usize,
        enabled: bool,
    ) -> AutoswapResult<()> {
        let mut state = self.lock()?;
        self.require_owner(&state, caller, agent_id, "toggle rule")?;
        let rule = state
            .rules_mut(agent_id)
            .get_mut(rule_index)
            .ok_or(AutoswapError::RuleNotFound { agent_id, rule_index })?;
        rule.enabled = enabled;
        Ok(())
    }

    /// Remove a rule by moving the last rule into its slot.
    ///
    /// The moved rule's index changes; its `RuleId` does not.
    pub fn remove_rule(&self, caller: &AccountId, agent_id: AgentId, rule_index: usize) -> AutoswapResult<Rule> {
        let mut state = self.lock()?;
        self.require_owner(&state, caller, agent_id, "remove rule")?;
        let rules = state.rules_mut(agent_id);
        if rule_index >= rules.len() {
            return Err(AutoswapError::RuleNotFound { agent_id, rule_index });
        }
        let removed = rules.swap_remove(rule_index);
        debug!(agent_id = %agent_id, rule_index, rule_id = %removed.id, "rule removed");
        Ok(removed)
    }

    /// Current index of the rule with `rule_id`, if it still exists.
    pub fn find_rule(&self, agent_id: AgentId, rule_id: RuleId) -> AutoswapResult<Option<usize>> {
        let state = self.lock()?;
        Ok(state
            .rules
            .get(&agent_id)
            .and_then(|rules| rules.iter().position(|rule| rule.id == rule_id)))
    }

    // ── Authorization ────────────────────────────────────────────────────────

    pub fn authorize_executor(&self, caller: &AccountId, account: AccountId) -> AutoswapResult<()> {
        let mut state = self.lock()?;
        Role::Admin.check(caller, &self.admin, &self.admin, "authorize executor")?;
        info!(account = %account, "executor authorized");
        state.executors.insert(account);
        Ok(())
    }

    pub fn revoke_executor(&self, caller: &AccountId, account: &AccountId) -> AutoswapResult<()> {
        let mut state = self.lock()?;
        Role::Admin.check(caller, &self.admin, &self.admin, "revoke executor")?;
        if state.executors.remove(account) {
            info!(account = %account, "executor revoked");
        }
        Ok(())
    }

    // ── Funds ────────────────────────────────────────────────────────────────

    /// Credit `amount` of `token` to the agent and return the new balance.
    ///
    /// Waits for the agent's lock first.
    pub async fn deposit(&self, caller: &AccountId, agent_id: AgentId, token: &TokenId, amount: Amount) -> AutoswapResult<Amount> {
        let _guard = self.locks.acquire(agent_id).await;
        let mut state = self.lock()?;
        self.require_owner(&state, caller, agent_id, "deposit")?;
        let agent = state.agent_mut(agent_id)?;
        if agent.status == AgentStatus::Liquidated {
            return Err(AutoswapError::InvalidTransition {
                agent_id,
                from: AgentStatus::Liquidated,
                to: AgentStatus::Liquidated,
            });
        }

        let balance = self.ledger.apply_deposit(agent_id, token, amount)?;
        if *token == agent.pair.token_in {
            agent.deposited_amount = agent.deposited_amount.saturating_add(amount);
        }
        Ok(balance)
    }

    /// Debit `amount` of `token` from the agent and return the new balance.
    ///
    /// Waits for the agent's lock first, so it sees the balance after any
    /// settlement that was in flight.
    pub async fn withdraw(&self, caller: &AccountId, agent_id: AgentId, token: &TokenId, amount: Amount) -> AutoswapResult<Amount> {
        let _guard = self.locks.acquire(agent_id).await;
        let mut state = self.lock()?;
        self.require_owner(&state, caller, agent_id, "withdraw")?;

        let balance = self.ledger.apply_withdraw(agent_id, token, amount).map_err(|err| {
            warn!(agent_id = %agent_id, token = %token, amount, error = %err, "withdrawal refused");
            err
        })?;
        let agent = state.agent_mut(agent_id)?;
        if *token == agent.pair.token_in {
            agent.deposited_amount = agent.deposited_amount.saturating_sub(amount);
        }
        Ok(balance)
    }

    // ── Gate ─────────────────────────────────────────────────────────────────

    /// Synchronous form of `ExecutionGate::can_execute`.
    pub fn is_ready(&self, agent_id: AgentId, rule_index: usize, now: Timestamp) -> AutoswapResult<bool> {
        let state = self.lock()?;
        let agent = state.agent(agent_id)?;
        let rule = state
            .rules
            .get(&agent_id)
            .and_then(|rules| rules.get(rule_index))
            .ok_or(AutoswapError::RuleNotFound { agent_id, rule_index })?;
        Ok(check_gate(agent, rule, now).is_ok())
    }

    fn require_owner(&self, state: &ChainState, caller: &AccountId, agent_id: AgentId, action: &str) -> AutoswapResult<()> {
        let agent = state.agent(agent_id)?;
        Role::Owner.check(caller, &agent.owner, &self.admin, action)
    }

    fn lock(&self) -> AutoswapResult<MutexGuard<'_, ChainState>> {
        self.state.lock().map_err(|e| AutoswapError::StorageError {
            reason: format!("chain state lock poisoned: {}", e),
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Role {
    Owner,
    Admin,
    OwnerOrAdmin,
}

impl Role {
    fn check(self, caller: &AccountId, owner: &AccountId, admin: &AccountId, action: &str) -> AutoswapResult<()> {
        let allowed = match self {
            Role::Owner => caller == owner,
            Role::Admin => caller == admin,
            Role::OwnerOrAdmin => caller == owner || caller == admin,
        };
        if allowed {
            Ok(())
        } else {
            Err(AutoswapError::Unauthorized { caller: caller.clone(), action: action.to_string() })
        }
    }
}

// ── ChainReader / ExecutionGate impls ────────────────────────────────────────

#[async_trait]
impl ChainReader for InMemoryChain {
    async fn list_agents(&self) -> AutoswapResult<Vec<AgentId>> {
        Ok(self.lock()?.agents.keys().copied().collect())
    }

    async fn get_agent(&self, agent_id: AgentId) -> AutoswapResult<Agent> {
        self.lock()?.agent(agent_id).cloned()
    }

    async fn get_rules(&self, agent_id: AgentId) -> AutoswapResult<Vec<Rule>> {
        let state = self.lock()?;
        state.agent(agent_id)?;
        Ok(state.rules.get(&agent_id).cloned().unwrap_or_default())
    }

    async fn get_agent_balance(&self, agent_id: AgentId, token: &TokenId) -> AutoswapResult<Amount> {
        self.ledger.balance(agent_id, token)
    }
}

#[async_trait]
impl ExecutionGate for InMemoryChain {
    async fn can_execute(&self, agent_id: AgentId, rule_index: usize, now: Timestamp) -> AutoswapResult<bool> {
        self.is_ready(agent_id, rule_index, now)
    }

    async fn commit_execution(
        &self,
        caller: &AccountId,
        agent_id: AgentId,
        rule_index: usize,
        expected_rule: RuleId,
        now: Timestamp,
    ) -> AutoswapResult<()> {
        let mut state = self.lock()?;
        state.validate_commit(caller, agent_id, rule_index, expected_rule, now)?;

        if let Some(rule) = state.rules.get_mut(&agent_id).and_then(|rules| rules.get_mut(rule_index)) {
            rule.last_executed = now;
        }
        if let Some(agent) = state.agents.get_mut(&agent_id) {
            agent.last_activity = now;
        }
        debug!(agent_id = %agent_id, rule_index, now, "execution committed");
        Ok(())
    }

    async fn check_commit(
        &self,
        caller: &AccountId,
        agent_id: AgentId,
        rule_index: usize,
        expected_rule: RuleId,
        now: Timestamp,
    ) -> AutoswapResult<()> {
        self.lock()?.validate_commit(caller, agent_id, rule_index, expected_rule, now)
    }
}
