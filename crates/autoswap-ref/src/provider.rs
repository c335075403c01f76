//! A scripted quote/settle provider.
//!
//! Prices every swap at a fixed rate and lets the caller choose how the
//! off-chain counter-party behaves and how many on-chain submissions fail
//! before one confirms. Every call is appended to an inspectable log.

use std::{
    future,
    sync::{
        atomic::{AtomicU32, AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
};

use async_trait::async_trait;
use tracing::debug;

use autoswap_contracts::{
    agent::AgentId,
    error::{AutoswapError, AutoswapResult},
    quote::{Quote, SessionId, Settlement, SwapRequest},
    Amount, Bps, BPS_DENOMINATOR,
};
use autoswap_core::{timing::Clock, traits::QuoteProvider};

/// How the simulated counter-party answers off-chain settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffChainBehaviour {
    /// Settle immediately at the quoted amount.
    Succeed,
    /// Reject the balance update.
    Fail,
    /// Never answer. The executor's deadline decides.
    Hang,
    /// Report the session channel as down.
    Disconnected,
}

pub struct SimulatedProvider {
    rate_bps: Bps,
    clock: Arc<dyn Clock>,
    offchain: Mutex<OffChainBehaviour>,
    onchain_failures_left: AtomicU32,
    nonce: AtomicU64,
    calls: Mutex<Vec<String>>,
}

impl SimulatedProvider {
    /// A provider quoting `amount_in * rate_bps / 10000` that settles
    /// off-chain successfully.
    pub fn new(rate_bps: Bps, clock: Arc<dyn Clock>) -> Self {
        Self {
            rate_bps,
            clock,
            offchain: Mutex::new(OffChainBehaviour::Succeed),
            onchain_failures_left: AtomicU32::new(0),
            nonce: AtomicU64::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_offchain(self, behaviour: OffChainBehaviour) -> Self {
        self.set_offchain(behaviour);
        self
    }

    /// Fail the next `failures` on-chain submissions before confirming.
    pub fn with_onchain_failures(self, failures: u32) -> Self {
        self.onchain_failures_left.store(failures, Ordering::SeqCst);
        self
    }

    pub fn set_offchain(&self, behaviour: OffChainBehaviour) {
        *self.offchain.lock().unwrap_or_else(PoisonError::into_inner) = behaviour;
    }

    pub fn rate_bps(&self) -> Bps {
        self.rate_bps
    }

    /// Every provider call so far, oldest first.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// How many times `operation` was called.
    pub fn count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|call| call.as_str() == operation)
            .count()
    }

    fn log(&self, operation: &str) {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(operation.to_string());
    }

    fn offchain(&self) -> OffChainBehaviour {
        *self.offchain.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_nonce(&self) -> u64 {
        self.nonce.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl QuoteProvider for SimulatedProvider {
    async fn quote(&self, request: &SwapRequest) -> AutoswapResult<Quote> {
        self.log("quote");
        let amount_out = request.amount_in.saturating_mul(Amount::from(self.rate_bps)) / Amount::from(BPS_DENOMINATOR);
        Ok(Quote {
            token_in: request.token_in.clone(),
            token_out: request.token_out.clone(),
            amount_in: request.amount_in,
            amount_out,
            slippage_bps: request.slippage_bps,
            route: format!("{}>{}", request.token_in, request.token_out),
            quoted_at: self.clock.now(),
        })
    }

    fn session_connected(&self) -> bool {
        self.offchain() != OffChainBehaviour::Disconnected
    }

    async fn open_session(&self, agent_id: AgentId) -> AutoswapResult<SessionId> {
        self.log("open_session");
        Ok(SessionId(format!("session-{agent_id}")))
    }

    async fn settle_off_chain(&self, session: &SessionId, quote: &Quote) -> AutoswapResult<Settlement> {
        self.log("settle_off_chain");
        match self.offchain() {
            OffChainBehaviour::Succeed => Ok(Settlement {
                amount_out: quote.amount_out,
                reference: format!("{}/update-{}", session.0, self.next_nonce()),
            }),
            OffChainBehaviour::Fail => Err(AutoswapError::Provider {
                operation: "off-chain settlement".to_string(),
                reason: "counter-party rejected the balance update".to_string(),
            }),
            OffChainBehaviour::Hang => {
                debug!(session = %session.0, "off-chain counter-party not answering");
                future::pending().await
            }
            OffChainBehaviour::Disconnected => Err(AutoswapError::Provider {
                operation: "off-chain settlement".to_string(),
                reason: "session channel disconnected".to_string(),
            }),
        }
    }

    async fn close_session(&self, _session: &SessionId) -> AutoswapResult<()> {
        self.log("close_session");
        Ok(())
    }

    async fn simulate_on_chain(
        &self,
        _agent_id: AgentId,
        _rule_index: usize,
        quote: &Quote,
        min_amount_out: Amount,
    ) -> AutoswapResult<()> {
        self.log("simulate_on_chain");
        if quote.amount_out < min_amount_out {
            return Err(AutoswapError::Provider {
                operation: "on-chain simulation".to_string(),
                reason: format!("output {} below minimum {}", quote.amount_out, min_amount_out),
            });
        }
        Ok(())
    }

    async fn settle_on_chain(
        &self,
        _agent_id: AgentId,
        _rule_index: usize,
        quote: &Quote,
        _min_amount_out: Amount,
    ) -> AutoswapResult<Settlement> {
        self.log("settle_on_chain");
        let failing = self
            .onchain_failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AutoswapError::Provider {
                operation: "on-chain settlement".to_string(),
                reason: "transaction reverted".to_string(),
            });
        }
        Ok(Settlement {
            amount_out: quote.amount_out,
            reference: format!("0x{:064x}", self.next_nonce()),
        })
    }
}
