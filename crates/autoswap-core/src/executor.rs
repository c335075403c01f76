//! The dual-path executor: quote, settle off-chain or on-chain, reconcile.
//!
//! The executor enforces this pipeline for one ready rule:
//!
//!   Lock → Size → Commit → Quote → Validate → Off-chain ⇢ On-chain → Ledger → Record
//!
//! The agent's lock is held for the whole pipeline, so the balance read at
//! sizing time is the balance the settlement is applied against. Deposits and
//! withdrawals take the same lock when the executor shares its [`AgentLocks`]
//! with the substrate. The ledger is only touched after a settlement is
//! confirmed on one of the two paths, and a confirmed settlement is always
//! terminal: it is never retried, never followed by the other path.
//! Every terminal outcome, success or failure, produces exactly one
//! `ExecutionAttempt` in the recorder; retries inside the on-chain path do not.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use autoswap_contracts::{
    agent::{AccountId, Agent},
    error::{AutoswapError, AutoswapResult},
    execution::{ExecutionAttempt, ExecutionPath, ExecutionResult, Outcome},
    quote::{Quote, Settlement, SwapRequest},
    rule::Rule,
    Amount, Timestamp,
};

use crate::{
    config::{CooldownCommit, ExecutorConfig},
    locks::AgentLocks,
    timing::{with_timeout, Clock},
    traits::{AgentLedger, ChainReader, ExecutionGate, ExecutionRecorder, QuoteProvider},
};

/// The collaborators an executor drives.
#[derive(Clone)]
pub struct ExecutorDeps {
    pub chain: Arc<dyn ChainReader>,
    pub gate: Arc<dyn ExecutionGate>,
    pub ledger: Arc<dyn AgentLedger>,
    pub provider: Arc<dyn QuoteProvider>,
    pub recorder: Arc<dyn ExecutionRecorder>,
    pub clock: Arc<dyn Clock>,
}

/// Identity of the attempt being executed, carried into the history record.
struct AttemptContext<'a> {
    agent: &'a Agent,
    rule_index: usize,
    rule: &'a Rule,
    dispatched_at: Timestamp,
    amount_in: Amount,
}

/// Executes ready rules through the off-chain path with on-chain fallback.
///
/// One executor serves every agent; per-agent exclusion comes from its
/// [`AgentLocks`]. The executor does not deduplicate calls: a second call for
/// the same rule inside its cooldown is rejected by the gate, not here.
pub struct DualPathExecutor {
    deps: ExecutorDeps,
    config: ExecutorConfig,
    account: AccountId,
    locks: AgentLocks,
}

impl DualPathExecutor {
    pub fn new(deps: ExecutorDeps, config: ExecutorConfig) -> Self {
        let account = AccountId::new(config.executor_account.clone());
        Self { deps, config, account, locks: AgentLocks::new() }
    }

    /// Share lock slots with another component that mutates agent balances.
    pub fn with_locks(mut self, locks: AgentLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn locks(&self) -> &AgentLocks {
        &self.locks
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute the rule at `rule_index`, which the caller evaluated as `rule`.
    ///
    /// # Pipeline
    ///
    /// 1. Take the agent's lock and size `amount_in` from the `token_in`
    ///    balance through the configured `SizingPolicy`
    /// 2. Commit `last_executed` through the gate (`OnDispatch`), or run the
    ///    same checks as a dry run (`OnSuccess`)
    /// 3. Quote, then validate the quote is still fresh
    /// 4. Off-chain attempt, when the session channel is connected; any
    ///    failure falls through
    /// 5. On-chain attempt with simulate-then-submit and linear backoff
    /// 6. Apply the settlement to the ledger as one atomic pair update
    /// 7. Record the terminal attempt
    ///
    /// # Errors
    ///
    /// Returns `Err(GateRejected)` when the rule is not ready or there is
    /// nothing to swap; these are skips, not failures, and are not recorded.
    /// Returns `Err(Unauthorized)` when the substrate refuses this executor,
    /// before anything is quoted or settled.
    /// Returns `Err` for read failures before dispatch and for a failed
    /// history write. Every other failure is an `Ok` result with
    /// `success = false` that has already been recorded.
    pub async fn execute(&self, agent: &Agent, rule_index: usize, rule: &Rule) -> AutoswapResult<ExecutionResult> {
        let _guard = self.locks.acquire(agent.id).await;
        let now = self.deps.clock.now();
        let pair = &agent.pair;

        debug!(
            agent_id = %agent.id,
            rule_index,
            rule_id = %rule.id,
            rule_type = ?rule.rule_type,
            "executor dispatch starting"
        );

        // ── Step 1: Size the swap ────────────────────────────────────────────
        let balance = self.deps.chain.get_agent_balance(agent.id, &pair.token_in).await?;
        let amount_in = self.config.sizing.amount_in(balance);
        if amount_in == 0 {
            return Err(AutoswapError::GateRejected {
                reason: format!("no {} balance to swap", pair.token_in),
            });
        }

        let ctx = AttemptContext { agent, rule_index, rule, dispatched_at: now, amount_in };

        // ── Step 2: Gate ─────────────────────────────────────────────────────
        //
        // The substrate re-validates readiness here; a stale local decision
        // surfaces as GateRejected and the rule is skipped.
        match self.config.cooldown_commit {
            CooldownCommit::OnDispatch => {
                self.deps
                    .gate
                    .commit_execution(&self.account, agent.id, rule_index, rule.id, now)
                    .await?;
            }
            CooldownCommit::OnSuccess => {
                // The commit only happens after settlement, so anything that
                // would refuse it has to be caught before the swap.
                self.deps
                    .gate
                    .check_commit(&self.account, agent.id, rule_index, rule.id, now)
                    .await?;
            }
        }

        if amount_in > balance {
            let err = AutoswapError::InsufficientBalance {
                agent_id: agent.id,
                token: pair.token_in.clone(),
                requested: amount_in,
                available: balance,
            };
            error!(agent_id = %agent.id, rule_index, error = %err, "sized swap exceeds balance, not settling");
            return self.finish_failed(&ctx, None, None, &err);
        }

        // ── Step 3: Quote and validate ───────────────────────────────────────
        let request = SwapRequest {
            token_in: pair.token_in.clone(),
            token_out: pair.token_out.clone(),
            amount_in,
            slippage_bps: self.config.slippage_bps,
        };
        let quote = match self.fresh_quote(&request).await {
            Ok(quote) => quote,
            Err(err) => {
                warn!(agent_id = %agent.id, rule_index, error = %err, "quote unavailable, attempt failed");
                return self.finish_failed(&ctx, None, None, &err);
            }
        };

        // ── Step 4: Off-chain attempt ────────────────────────────────────────
        let mut settled: Option<(ExecutionPath, Settlement)> = None;
        if self.deps.provider.session_connected() {
            match self.settle_off_chain(&ctx, &quote).await {
                Ok(settlement) => settled = Some((ExecutionPath::OffChain, settlement)),
                Err(err) => {
                    warn!(
                        agent_id = %agent.id,
                        rule_index,
                        error = %err,
                        "off-chain settlement failed, falling back to on-chain"
                    );
                }
            }
        } else {
            debug!(agent_id = %agent.id, rule_index, "session channel disconnected, going on-chain");
        }

        // ── Step 5: On-chain fallback ────────────────────────────────────────
        let (path, settlement) = match settled {
            Some(settled) => settled,
            None => match self.settle_on_chain(&ctx, &quote).await {
                Ok(settlement) => (ExecutionPath::OnChain, settlement),
                Err(err) => {
                    warn!(agent_id = %agent.id, rule_index, error = %err, "on-chain settlement exhausted");
                    return self.finish_failed(&ctx, Some(ExecutionPath::OnChain), None, &err);
                }
            },
        };

        let min_out = quote.min_amount_out();
        if settlement.amount_out < min_out {
            // Confirmed is final. The ledger tracks what custody received.
            warn!(
                agent_id = %agent.id,
                rule_index,
                path = %path,
                reference = %settlement.reference,
                amount_out = settlement.amount_out,
                min_out,
                "settlement confirmed below minimum output"
            );
        }

        if self.config.cooldown_commit == CooldownCommit::OnSuccess {
            // The swap already happened; a refused commit cannot undo it.
            if let Err(err) = self
                .deps
                .gate
                .commit_execution(&self.account, agent.id, rule_index, rule.id, now)
                .await
            {
                error!(
                    agent_id = %agent.id,
                    rule_index,
                    reference = %settlement.reference,
                    error = %err,
                    "cooldown commit after settlement failed"
                );
            }
        }

        // ── Step 6: Ledger reconciliation ────────────────────────────────────
        if let Err(err) = self.deps.ledger.apply_swap_settlement(
            agent.id,
            &pair.token_in,
            amount_in,
            &pair.token_out,
            settlement.amount_out,
        ) {
            error!(
                agent_id = %agent.id,
                rule_index,
                path = %path,
                reference = %settlement.reference,
                amount_in,
                amount_out = settlement.amount_out,
                error = %err,
                "ledger refused settlement"
            );
            return self.finish_failed(&ctx, Some(path), Some(settlement.reference), &err);
        }

        info!(
            agent_id = %agent.id,
            rule_index,
            path = %path,
            amount_in,
            amount_out = settlement.amount_out,
            reference = %settlement.reference,
            "swap settled"
        );

        // ── Step 7: Record ───────────────────────────────────────────────────
        let attempt = ExecutionAttempt {
            agent_id: agent.id,
            rule_index,
            rule_id: rule.id,
            timestamp: ctx.dispatched_at,
            path: Some(path),
            outcome: Outcome::Success,
            amount_in,
            amount_out: settlement.amount_out,
            external_reference: Some(settlement.reference),
            error_detail: None,
            recorded_at: Utc::now(),
        };
        self.deps.recorder.record(&attempt)?;
        Ok(ExecutionResult::from(&attempt))
    }

    async fn fresh_quote(&self, request: &SwapRequest) -> AutoswapResult<Quote> {
        let timeout = self.config.quote_timeout();
        let quote = with_timeout("quote", timeout, self.deps.provider.quote(request)).await?;

        let fresh = with_timeout(
            "quote validation",
            timeout,
            self.deps.provider.validate(&quote, self.config.quote_tolerance_bps),
        )
        .await?;
        if !fresh {
            return Err(AutoswapError::QuoteStale {
                reason: format!("re-quote drifted more than {}bps", self.config.quote_tolerance_bps),
            });
        }
        Ok(quote)
    }

    /// One off-chain try. No retries.
    ///
    /// Opening the session and submitting the update share one deadline.
    /// Closing runs afterwards under its own deadline, whatever the submit
    /// did, so a hung counter-party does not leak the session.
    async fn settle_off_chain(&self, ctx: &AttemptContext<'_>, quote: &Quote) -> AutoswapResult<Settlement> {
        let provider = &self.deps.provider;
        let budget = self.config.offchain_timeout();
        let started = tokio::time::Instant::now();

        let session = with_timeout("off-chain session open", budget, provider.open_session(ctx.agent.id)).await?;
        let remaining = budget.saturating_sub(started.elapsed());
        let settled = with_timeout("off-chain settlement", remaining, provider.settle_off_chain(&session, quote)).await;

        if let Err(err) = with_timeout("off-chain session close", budget, provider.close_session(&session)).await {
            debug!(agent_id = %ctx.agent.id, session = %session.0, error = %err, "session close failed");
        }
        settled
    }

    /// Simulate then submit, up to `max_onchain_attempts` times.
    ///
    /// Attempt `n` that fails waits `n * retry_delay` before attempt `n + 1`.
    /// The minimum output is enforced by simulation and by the submission
    /// itself; whatever a submission confirms ends the loop.
    async fn settle_on_chain(&self, ctx: &AttemptContext<'_>, quote: &Quote) -> AutoswapResult<Settlement> {
        let max_attempts = self.config.max_onchain_attempts.max(1);
        let min_out = quote.min_amount_out();
        let mut last_error: Option<AutoswapError> = None;

        for attempt in 1..=max_attempts {
            match self.try_on_chain(ctx, quote, min_out).await {
                Ok(settlement) => {
                    if attempt > 1 {
                        info!(agent_id = %ctx.agent.id, rule_index = ctx.rule_index, attempt, "on-chain settlement succeeded after retry");
                    }
                    return Ok(settlement);
                }
                Err(err) => {
                    warn!(
                        agent_id = %ctx.agent.id,
                        rule_index = ctx.rule_index,
                        attempt,
                        max_attempts,
                        error = %err,
                        "on-chain attempt failed"
                    );
                    if err.is_invariant_violation() {
                        return Err(err);
                    }
                    last_error = Some(err);
                    if attempt < max_attempts {
                        tokio::time::sleep(self.config.retry_delay() * attempt).await;
                    }
                }
            }
        }

        Err(AutoswapError::SettlementFailed {
            path: ExecutionPath::OnChain,
            attempts: max_attempts,
            reason: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }

    async fn try_on_chain(&self, ctx: &AttemptContext<'_>, quote: &Quote, min_out: Amount) -> AutoswapResult<Settlement> {
        let provider = &self.deps.provider;
        let timeout = self.config.onchain_timeout();
        let agent_id = ctx.agent.id;

        with_timeout(
            "on-chain simulation",
            timeout,
            provider.simulate_on_chain(agent_id, ctx.rule_index, quote, min_out),
        )
        .await?;

        with_timeout(
            "on-chain submission",
            timeout,
            provider.settle_on_chain(agent_id, ctx.rule_index, quote, min_out),
        )
        .await
    }

    /// Record a failed terminal attempt and convert it into a result.
    fn finish_failed(
        &self,
        ctx: &AttemptContext<'_>,
        path: Option<ExecutionPath>,
        external_reference: Option<String>,
        err: &AutoswapError,
    ) -> AutoswapResult<ExecutionResult> {
        let attempt = ExecutionAttempt {
            agent_id: ctx.agent.id,
            rule_index: ctx.rule_index,
            rule_id: ctx.rule.id,
            timestamp: ctx.dispatched_at,
            path,
            outcome: Outcome::Failed,
            amount_in: ctx.amount_in,
            amount_out: 0,
            external_reference,
            error_detail: Some(err.public_reason()),
            recorded_at: Utc::now(),
        };
        self.deps.recorder.record(&attempt)?;
        Ok(ExecutionResult::from(&attempt))
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
