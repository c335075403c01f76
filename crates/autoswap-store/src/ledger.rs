//! The in-memory agent ledger.
//!
//! Balances and per-token custody live under one mutex, so every mutation is
//! applied as a unit: a failed precondition changes nothing, and no reader
//! can observe a settlement's debit without its credit.
//!
//! Custody is what the vault actually holds. Deposits and withdrawals move
//! balance and custody together; a settlement moves custody by `-amount_in`
//! of `token_in` and `+amount_out` of `token_out`. The solvency invariant is
//! that, per token, the sum of all agent balances never exceeds custody.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Mutex, MutexGuard},
};

use tracing::{debug, error};

use autoswap_contracts::{
    agent::{AgentId, TokenId},
    error::{AutoswapError, AutoswapResult},
    Amount,
};
use autoswap_core::traits::AgentLedger;

#[derive(Debug, Default)]
struct LedgerState {
    balances: HashMap<(AgentId, TokenId), Amount>,
    custody: HashMap<TokenId, Amount>,
}

impl LedgerState {
    fn balance(&self, agent_id: AgentId, token: &TokenId) -> Amount {
        self.balances.get(&(agent_id, token.clone())).copied().unwrap_or(0)
    }

    fn custody(&self, token: &TokenId) -> Amount {
        self.custody.get(token).copied().unwrap_or(0)
    }

    fn tracked(&self, token: &TokenId) -> Amount {
        self.balances
            .iter()
            .filter(|((_, t), _)| t == token)
            .fold(0, |sum: Amount, (_, amount)| sum.saturating_add(*amount))
    }

    fn set_balance(&mut self, agent_id: AgentId, token: &TokenId, amount: Amount) {
        self.balances.insert((agent_id, token.clone()), amount);
    }

    fn set_custody(&mut self, token: &TokenId, amount: Amount) {
        self.custody.insert(token.clone(), amount);
    }
}

fn overflow(token: &TokenId) -> AutoswapError {
    AutoswapError::StorageError { reason: format!("{token} amount overflow") }
}

/// The authoritative per-agent balance map with custody tracking.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every non-zero balance the agent holds.
    pub fn balances_of(&self, agent_id: AgentId) -> AutoswapResult<BTreeMap<TokenId, Amount>> {
        let state = self.lock()?;
        Ok(state
            .balances
            .iter()
            .filter(|((id, _), amount)| *id == agent_id && **amount > 0)
            .map(|((_, token), amount)| (token.clone(), *amount))
            .collect())
    }

    /// Sum of all agent balances for `token`.
    pub fn total_tracked(&self, token: &TokenId) -> AutoswapResult<Amount> {
        Ok(self.lock()?.tracked(token))
    }

    pub fn custodied(&self, token: &TokenId) -> AutoswapResult<Amount> {
        Ok(self.lock()?.custody(token))
    }

    /// Replace the custody figure for `token` with an external vault reading.
    pub fn reconcile_custody(&self, token: &TokenId, custodied: Amount) -> AutoswapResult<()> {
        let mut state = self.lock()?;
        state.set_custody(token, custodied);
        Ok(())
    }

    /// Fail with `SolvencyViolation` if tracked balances exceed custody.
    pub fn check_solvency(&self, token: &TokenId) -> AutoswapResult<()> {
        let state = self.lock()?;
        Self::solvent(&state, token)
    }

    /// Check every token the ledger has seen.
    pub fn check_all_solvency(&self) -> AutoswapResult<()> {
        let state = self.lock()?;
        let mut tokens: Vec<&TokenId> = state.custody.keys().collect();
        tokens.extend(state.balances.keys().map(|(_, token)| token));
        tokens.sort();
        tokens.dedup();
        for token in tokens {
            Self::solvent(&state, token)?;
        }
        Ok(())
    }

    fn solvent(state: &LedgerState, token: &TokenId) -> AutoswapResult<()> {
        let tracked = state.tracked(token);
        let custodied = state.custody(token);
        if tracked > custodied {
            return Err(AutoswapError::SolvencyViolation { token: token.clone(), tracked, custodied });
        }
        Ok(())
    }

    fn lock(&self) -> AutoswapResult<MutexGuard<'_, LedgerState>> {
        self.state.lock().map_err(|e| AutoswapError::StorageError {
            reason: format!("ledger lock poisoned: {}", e),
        })
    }
}

impl AgentLedger for InMemoryLedger {
    fn balance(&self, agent_id: AgentId, token: &TokenId) -> AutoswapResult<Amount> {
        Ok(self.lock()?.balance(agent_id, token))
    }

    fn apply_deposit(&self, agent_id: AgentId, token: &TokenId, amount: Amount) -> AutoswapResult<Amount> {
        let mut state = self.lock()?;
        let balance = state.balance(agent_id, token).checked_add(amount).ok_or_else(|| overflow(token))?;
        let custody = state.custody(token).checked_add(amount).ok_or_else(|| overflow(token))?;

        state.set_balance(agent_id, token, balance);
        state.set_custody(token, custody);
        debug!(agent_id = %agent_id, token = %token, amount, balance, "deposit applied");
        Ok(balance)
    }

    fn apply_withdraw(&self, agent_id: AgentId, token: &TokenId, amount: Amount) -> AutoswapResult<Amount> {
        let mut state = self.lock()?;
        let available = state.balance(agent_id, token);
        if amount > available {
            return Err(AutoswapError::InsufficientBalance {
                agent_id,
                token: token.clone(),
                requested: amount,
                available,
            });
        }
        let custody = state.custody(token);
        let Some(custody) = custody.checked_sub(amount) else {
            error!(agent_id = %agent_id, token = %token, amount, custody, "withdrawal exceeds custody");
            return Err(AutoswapError::SolvencyViolation {
                token: token.clone(),
                tracked: state.tracked(token),
                custodied: custody,
            });
        };

        let balance = available - amount;
        state.set_balance(agent_id, token, balance);
        state.set_custody(token, custody);
        debug!(agent_id = %agent_id, token = %token, amount, balance, "withdrawal applied");
        Ok(balance)
    }

    fn apply_swap_settlement(
        &self,
        agent_id: AgentId,
        token_in: &TokenId,
        amount_in: Amount,
        token_out: &TokenId,
        amount_out: Amount,
    ) -> AutoswapResult<()> {
        let mut state = self.lock()?;

        let available = state.balance(agent_id, token_in);
        if amount_in > available {
            return Err(AutoswapError::InsufficientBalance {
                agent_id,
                token: token_in.clone(),
                requested: amount_in,
                available,
            });
        }
        let custody_in = state.custody(token_in);
        let Some(custody_in_after) = custody_in.checked_sub(amount_in) else {
            return Err(AutoswapError::SolvencyViolation {
                token: token_in.clone(),
                tracked: state.tracked(token_in),
                custodied: custody_in,
            });
        };

        // Compute both sides before writing either.
        let balance_in_after = available - amount_in;
        let same_token = token_in == token_out;
        let balance_out_before = if same_token { balance_in_after } else { state.balance(agent_id, token_out) };
        let custody_out_before = if same_token { custody_in_after } else { state.custody(token_out) };
        let balance_out_after = balance_out_before.checked_add(amount_out).ok_or_else(|| overflow(token_out))?;
        let custody_out_after = custody_out_before.checked_add(amount_out).ok_or_else(|| overflow(token_out))?;

        let tracked_in_after = state.tracked(token_in).saturating_sub(amount_in);
        if !same_token && tracked_in_after > custody_in_after {
            error!(agent_id = %agent_id, token = %token_in, tracked = tracked_in_after, custodied = custody_in_after, "settlement would break solvency");
            return Err(AutoswapError::SolvencyViolation {
                token: token_in.clone(),
                tracked: tracked_in_after,
                custodied: custody_in_after,
            });
        }

        state.set_balance(agent_id, token_in, balance_in_after);
        state.set_custody(token_in, custody_in_after);
        state.set_balance(agent_id, token_out, balance_out_after);
        state.set_custody(token_out, custody_out_after);

        debug!(
            agent_id = %agent_id,
            token_in = %token_in,
            amount_in,
            token_out = %token_out,
            amount_out,
            "swap settlement applied"
        );
        Ok(())
    }
}
