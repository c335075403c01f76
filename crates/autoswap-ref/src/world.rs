//! A fully wired in-process engine.
//!
//! [`World`] owns one instance of every component the engine needs, built
//! from an [`EngineConfig`] and driven by a [`ManualClock`], so scenarios and
//! tests control time explicitly. The chain and the executor share one set of
//! agent locks, so deposits and withdrawals wait for settlements in flight.

use std::sync::Arc;

use autoswap_audit::InMemoryExecutionRecorder;
use autoswap_contracts::{
    agent::{AccountId, AgentId, TokenId},
    error::AutoswapResult,
    rule::RuleParams,
    signal::SignalKind,
    Amount, Bps, Timestamp,
};
use autoswap_core::{
    config::EngineConfig,
    locks::AgentLocks,
    timing::{Clock, ManualClock},
    traits::AgentLedger,
    DualPathExecutor, ExecutorDeps,
};
use autoswap_rules::RuleEngine;
use autoswap_runtime::{EvaluationLoop, LoopDeps};
use autoswap_store::{InMemoryChain, InMemoryLedger};

use crate::{
    mock_data::{self, GENESIS, SIM_RATE_BPS},
    provider::{OffChainBehaviour, SimulatedProvider},
    signals::MemorySignalSource,
};

pub struct World {
    pub config: EngineConfig,
    pub clock: Arc<ManualClock>,
    pub ledger: Arc<InMemoryLedger>,
    pub chain: Arc<InMemoryChain>,
    pub signals: Arc<MemorySignalSource>,
    pub provider: Arc<SimulatedProvider>,
    pub recorder: Arc<InMemoryExecutionRecorder>,
    pub executor: Arc<DualPathExecutor>,
}

impl World {
    /// Build a world at [`GENESIS`] whose provider behaves as described.
    ///
    /// The configured executor account is authorized on the chain.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `config` fails validation.
    pub fn new(config: EngineConfig, offchain: OffChainBehaviour, onchain_failures: u32) -> AutoswapResult<Self> {
        config.validate()?;

        let clock = Arc::new(ManualClock::new(GENESIS));
        let ledger = Arc::new(InMemoryLedger::new());
        let locks = AgentLocks::new();
        let chain = Arc::new(InMemoryChain::new(mock_data::admin(), Arc::clone(&ledger)).with_locks(locks.clone()));
        chain.authorize_executor(&mock_data::admin(), AccountId::new(config.executor.executor_account.clone()))?;

        let provider = Arc::new(
            SimulatedProvider::new(SIM_RATE_BPS, clock.clone())
                .with_offchain(offchain)
                .with_onchain_failures(onchain_failures),
        );
        let recorder = Arc::new(InMemoryExecutionRecorder::from_config(&config.recorder));
        let executor = Arc::new(
            DualPathExecutor::new(
                ExecutorDeps {
                    chain: chain.clone(),
                    gate: chain.clone(),
                    ledger: ledger.clone(),
                    provider: provider.clone(),
                    recorder: recorder.clone(),
                    clock: clock.clone(),
                },
                config.executor.clone(),
            )
            .with_locks(locks),
        );

        Ok(Self {
            config,
            clock,
            ledger,
            chain,
            signals: Arc::new(MemorySignalSource::new()),
            provider,
            recorder,
            executor,
        })
    }

    /// A world with default configuration and a well-behaved provider.
    pub fn healthy() -> AutoswapResult<Self> {
        Self::new(EngineConfig::default(), OffChainBehaviour::Succeed, 0)
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Register and activate a WETH/USDC agent for the default owner, fund it
    /// with `deposit_weth`, and install `rules` in order.
    pub async fn spawn_agent(&self, deposit_weth: Amount, rules: &[RuleParams]) -> AutoswapResult<AgentId> {
        let owner = mock_data::owner();
        let now = self.now();
        let agent_id = self.chain.register_agent(owner.clone(), mock_data::weth_usdc(), now)?;
        self.chain.activate(&owner, agent_id, now)?;
        if deposit_weth > 0 {
            self.chain.deposit(&owner, agent_id, &mock_data::weth(), deposit_weth).await?;
        }
        for params in rules {
            self.chain.add_rule(&owner, agent_id, params.clone())?;
        }
        Ok(agent_id)
    }

    /// Append a signal for the WETH/USDC pool at the current time.
    pub fn emit_signal(&self, kind: SignalKind, magnitude_bps: Bps) -> AutoswapResult<u64> {
        self.signals.push(mock_data::weth_usdc_pool(), kind, magnitude_bps, self.now())
    }

    pub fn balance(&self, agent_id: AgentId, token: &TokenId) -> AutoswapResult<Amount> {
        self.ledger.balance(agent_id, token)
    }

    /// An evaluation loop over this world's chain, signals and executor.
    pub fn evaluation_loop(&self) -> EvaluationLoop {
        EvaluationLoop::new(
            LoopDeps {
                chain: self.chain.clone(),
                signals: self.signals.clone(),
                evaluator: Arc::new(RuleEngine::new()),
                executor: Arc::clone(&self.executor),
                clock: self.clock.clone(),
            },
            self.config.scheduler.clone(),
        )
    }
}
