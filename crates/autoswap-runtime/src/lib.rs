//! # autoswap-runtime
//!
//! The scheduler that drives the autoswap engine.
//!
//! - [`EvaluationLoop`]: timer ticks and signal triggers feed one evaluation
//!   routine that dispatches ready rules to the executor
//! - [`SignalPoller`]: paged signal ingestion with a persisted watermark,
//!   feeding the loop's trigger channel
//! - [`SignalForwarder`]: push delivery from sources that support it, into
//!   the same channel; the poller backs it up
//!
//! ## Usage
//!
//! ```rust,ignore
//! let (tx, rx) = autoswap_runtime::trigger::channel(256);
//! let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!
//! let poller = SignalPoller::new(signals.clone(), cursor, tx.clone(), config.scheduler.clone());
//! tokio::spawn({ let shutdown = shutdown_rx.clone(); async move { poller.run(shutdown).await } });
//! let forwarder = SignalForwarder::new(signals, tx);
//! tokio::spawn({ let shutdown = shutdown_rx.clone(); async move { forwarder.run(shutdown).await } });
//! let stats = EvaluationLoop::new(deps, config.scheduler).run(rx, shutdown_rx).await?;
//! ```

pub mod evaluation;
pub mod poller;
pub mod push;
pub mod trigger;

pub use evaluation::{EvaluationLoop, LoopDeps, LoopStats, PassReport};
pub use poller::SignalPoller;
pub use push::SignalForwarder;
pub use trigger::Trigger;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use async_trait::async_trait;
    use tokio::sync::{broadcast, watch};

    use autoswap_audit::InMemoryExecutionRecorder;
    use autoswap_contracts::{
        agent::{AccountId, Agent, AgentId, PoolId, TokenId, TradingPair},
        error::{AutoswapError, AutoswapResult},
        quote::{Quote, SessionId, Settlement, SwapRequest},
        rule::{Rule, RuleParams, RuleType},
        signal::{Signal, SignalKind},
        Amount, Timestamp,
    };
    use autoswap_core::{
        config::{ExecutorConfig, SchedulerConfig},
        timing::ManualClock,
        traits::{ChainReader, CursorStore, ExecutionRecorder, QuoteProvider, SignalSource},
        DualPathExecutor, ExecutorDeps,
    };
    use autoswap_rules::RuleEngine;
    use autoswap_store::{InMemoryChain, InMemoryLedger, MemoryCursorStore};

    use super::{trigger, EvaluationLoop, LoopDeps, SignalForwarder, SignalPoller, Trigger};

    // ── Mock helpers ──────────────────────────────────────────────────────────

    fn owner() -> AccountId {
        AccountId::new("owner")
    }

    fn admin() -> AccountId {
        AccountId::new("admin")
    }

    fn weth() -> TokenId {
        TokenId::new("WETH")
    }

    fn pool() -> PoolId {
        PoolId::new("weth-usdc")
    }

    /// Settles every swap off-chain at 95%.
    struct InstantProvider;

    #[async_trait]
    impl QuoteProvider for InstantProvider {
        async fn quote(&self, request: &SwapRequest) -> AutoswapResult<Quote> {
            Ok(Quote {
                token_in: request.token_in.clone(),
                token_out: request.token_out.clone(),
                amount_in: request.amount_in,
                amount_out: request.amount_in * 95 / 100,
                slippage_bps: request.slippage_bps,
                route: "direct".to_string(),
                quoted_at: 0,
            })
        }

        fn session_connected(&self) -> bool {
            true
        }

        async fn open_session(&self, agent_id: AgentId) -> AutoswapResult<SessionId> {
            Ok(SessionId(agent_id.to_string()))
        }

        async fn settle_off_chain(&self, _session: &SessionId, quote: &Quote) -> AutoswapResult<Settlement> {
            Ok(Settlement { amount_out: quote.amount_out, reference: "instant".to_string() })
        }

        async fn close_session(&self, _session: &SessionId) -> AutoswapResult<()> {
            Ok(())
        }

        async fn simulate_on_chain(&self, _a: AgentId, _r: usize, _q: &Quote, _m: Amount) -> AutoswapResult<()> {
            Ok(())
        }

        async fn settle_on_chain(&self, _a: AgentId, _r: usize, quote: &Quote, _m: Amount) -> AutoswapResult<Settlement> {
            Ok(Settlement { amount_out: quote.amount_out, reference: "0xinstant".to_string() })
        }
    }

    /// A signal log held in memory that also pushes every new signal.
    struct SignalLog {
        signals: Mutex<Vec<Signal>>,
        fetches: Mutex<Vec<(u64, usize)>>,
        pushed: broadcast::Sender<Signal>,
    }

    impl Default for SignalLog {
        fn default() -> Self {
            Self { signals: Mutex::default(), fetches: Mutex::default(), pushed: broadcast::channel(16).0 }
        }
    }

    impl SignalLog {
        fn push(&self, kind: SignalKind, magnitude_bps: u32) {
            let mut signals = self.signals.lock().unwrap();
            let sequence = signals.len() as u64;
            let signal = Signal { pool_id: pool(), kind, magnitude_bps, timestamp: 0, sequence };
            signals.push(signal.clone());
            // Nobody subscribed is fine.
            let _ = self.pushed.send(signal);
        }
    }

    #[async_trait]
    impl SignalSource for SignalLog {
        async fn latest_signal(&self, pool_id: &PoolId) -> AutoswapResult<Option<Signal>> {
            Ok(self.signals.lock().unwrap().iter().rev().find(|s| &s.pool_id == pool_id).cloned())
        }

        async fn fetch_signals(&self, from_sequence: u64, limit: usize) -> AutoswapResult<Vec<Signal>> {
            self.fetches.lock().unwrap().push((from_sequence, limit));
            Ok(self
                .signals
                .lock()
                .unwrap()
                .iter()
                .filter(|s| s.sequence >= from_sequence)
                .take(limit)
                .cloned()
                .collect())
        }

        async fn head(&self) -> AutoswapResult<Option<u64>> {
            Ok(self.signals.lock().unwrap().last().map(|s| s.sequence))
        }

        fn subscribe(&self) -> Option<broadcast::Receiver<Signal>> {
            Some(self.pushed.subscribe())
        }
    }

    /// Answers reads but has no push channel.
    struct PollOnly(SignalLog);

    #[async_trait]
    impl SignalSource for PollOnly {
        async fn latest_signal(&self, pool_id: &PoolId) -> AutoswapResult<Option<Signal>> {
            self.0.latest_signal(pool_id).await
        }

        async fn fetch_signals(&self, from_sequence: u64, limit: usize) -> AutoswapResult<Vec<Signal>> {
            self.0.fetch_signals(from_sequence, limit).await
        }

        async fn head(&self) -> AutoswapResult<Option<u64>> {
            self.0.head().await
        }
    }

    /// Wraps a chain and fails reads for chosen agents, or for everything.
    struct FlakyChain {
        inner: Arc<InMemoryChain>,
        broken_agent: Option<AgentId>,
        unreachable: bool,
    }

    #[async_trait]
    impl ChainReader for FlakyChain {
        async fn list_agents(&self) -> AutoswapResult<Vec<AgentId>> {
            if self.unreachable {
                return Err(AutoswapError::ChainUnavailable { reason: "rpc down".to_string() });
            }
            self.inner.list_agents().await
        }

        async fn get_agent(&self, agent_id: AgentId) -> AutoswapResult<Agent> {
            self.inner.get_agent(agent_id).await
        }

        async fn get_rules(&self, agent_id: AgentId) -> AutoswapResult<Vec<Rule>> {
            if self.broken_agent == Some(agent_id) {
                return Err(AutoswapError::ChainUnavailable { reason: "read timed out".to_string() });
            }
            self.inner.get_rules(agent_id).await
        }

        async fn get_agent_balance(&self, agent_id: AgentId, token: &TokenId) -> AutoswapResult<Amount> {
            self.inner.get_agent_balance(agent_id, token).await
        }
    }

    struct Fixture {
        chain: Arc<InMemoryChain>,
        signals: Arc<SignalLog>,
        recorder: Arc<InMemoryExecutionRecorder>,
        clock: Arc<ManualClock>,
    }

    impl Fixture {
        fn new(now: Timestamp) -> Self {
            let ledger = Arc::new(InMemoryLedger::new());
            let chain = Arc::new(InMemoryChain::new(admin(), ledger));
            chain
                .authorize_executor(&admin(), AccountId::new(ExecutorConfig::default().executor_account))
                .unwrap();
            Self {
                chain,
                signals: Arc::new(SignalLog::default()),
                recorder: Arc::new(InMemoryExecutionRecorder::new(100)),
                clock: Arc::new(ManualClock::new(now)),
            }
        }

        /// An active agent holding 1000 WETH with the given rules.
        async fn agent(&self, rules: &[RuleParams]) -> AgentId {
            let pair = TradingPair::new(pool(), weth(), TokenId::new("USDC"));
            let agent_id = self.chain.register_agent(owner(), pair, 0).unwrap();
            self.chain.activate(&owner(), agent_id, 0).unwrap();
            self.chain.deposit(&owner(), agent_id, &weth(), 1_000).await.unwrap();
            for params in rules {
                self.chain.add_rule(&owner(), agent_id, params.clone()).unwrap();
            }
            agent_id
        }

        fn evaluation_loop(&self, reader: Arc<dyn ChainReader>) -> EvaluationLoop {
            let executor = DualPathExecutor::new(
                ExecutorDeps {
                    chain: reader.clone(),
                    gate: self.chain.clone(),
                    ledger: self.chain.ledger().clone(),
                    provider: Arc::new(InstantProvider),
                    recorder: self.recorder.clone(),
                    clock: self.clock.clone(),
                },
                ExecutorConfig::default(),
            )
            .with_locks(self.chain.locks().clone());
            EvaluationLoop::new(
                LoopDeps {
                    chain: reader,
                    signals: self.signals.clone(),
                    evaluator: Arc::new(RuleEngine::new()),
                    executor: Arc::new(executor),
                    clock: self.clock.clone(),
                },
                SchedulerConfig::default(),
            )
        }

        fn default_loop(&self) -> EvaluationLoop {
            self.evaluation_loop(self.chain.clone())
        }
    }

    fn every(cooldown_secs: u64) -> RuleParams {
        RuleParams::new(RuleType::TimeWeighted, 0, 0, cooldown_secs)
    }

    // ── 1. evaluation pass ────────────────────────────────────────────────────

    /// Ready rules are dispatched; paused agents and closed cooldowns are not.
    #[tokio::test]
    async fn test_pass_dispatches_ready_rules_only() {
        let fx = Fixture::new(1_000);
        let ready = fx.agent(&[every(300)]).await;
        let paused = fx.agent(&[every(300)]).await;
        fx.chain.pause(&owner(), paused, 0).unwrap();

        let report = fx.default_loop().evaluate_pass().await.unwrap();

        assert_eq!(report.agents_seen, 2);
        assert_eq!(report.agents_evaluated, 1);
        assert_eq!(report.rules_dispatched, 1);
        assert_eq!(report.succeeded, 1);
        assert_eq!(fx.chain.get_agent_balance(ready, &weth()).await.unwrap(), 900);
        assert_eq!(fx.chain.get_agent_balance(paused, &weth()).await.unwrap(), 1_000);

        // Same instant: the cooldown just committed blocks a second dispatch.
        let again = fx.default_loop().evaluate_pass().await.unwrap();
        assert_eq!(again.rules_dispatched, 0);
        assert_eq!(fx.recorder.len(), 1);
    }

    /// One agent's rules execute in stored order.
    #[tokio::test]
    async fn test_rules_run_in_stored_order() {
        let fx = Fixture::new(1_000);
        let agent_id = fx.agent(&[every(300), every(600), every(900)]).await;

        let report = fx.default_loop().evaluate_pass().await.unwrap();
        assert_eq!(report.succeeded, 3);

        let mut history = fx.recorder.query(Some(agent_id), 10).unwrap();
        history.reverse();
        let order: Vec<usize> = history.iter().map(|a| a.rule_index).collect();
        assert_eq!(order, vec![0, 1, 2]);
        // 10% of 1000, then 10% of 900, then 10% of 810.
        let sizes: Vec<Amount> = history.iter().map(|a| a.amount_in).collect();
        assert_eq!(sizes, vec![100, 90, 81]);
    }

    /// Signal rules fire from the latest signal of the agent's pool.
    #[tokio::test]
    async fn test_signal_rule_uses_latest_signal() {
        let fx = Fixture::new(1_000);
        fx.agent(&[RuleParams::new(RuleType::StopLoss, 500, 0, 60)]).await;

        fx.signals.push(SignalKind::PRICE_IMPACT, 200);
        assert_eq!(fx.default_loop().evaluate_pass().await.unwrap().rules_dispatched, 0);

        fx.signals.push(SignalKind::PRICE_IMPACT, 800);
        assert_eq!(fx.default_loop().evaluate_pass().await.unwrap().succeeded, 1);
    }

    /// A read failure for one agent is skipped; the others still execute.
    #[tokio::test]
    async fn test_agent_failure_is_isolated() {
        let fx = Fixture::new(1_000);
        let broken = fx.agent(&[every(300)]).await;
        let healthy = fx.agent(&[every(300)]).await;
        let reader = Arc::new(FlakyChain { inner: fx.chain.clone(), broken_agent: Some(broken), unreachable: false });

        let report = fx.evaluation_loop(reader).evaluate_pass().await.unwrap();

        assert_eq!(report.errors, 1);
        assert_eq!(report.succeeded, 1);
        assert_eq!(fx.chain.get_agent_balance(healthy, &weth()).await.unwrap(), 900);
        assert_eq!(fx.chain.get_agent_balance(broken, &weth()).await.unwrap(), 1_000);
    }

    // ── 2. run loop ───────────────────────────────────────────────────────────

    /// Timer ticks drive passes until shutdown.
    #[tokio::test(start_paused = true)]
    async fn test_run_ticks_until_shutdown() {
        let fx = Fixture::new(1_000);
        fx.agent(&[every(300)]).await;
        let evaluation = fx.default_loop();
        let (_tx, rx) = trigger::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move { evaluation.run(rx, shutdown_rx).await });
        // Ticks at 0s, 30s, 60s.
        tokio::time::sleep(Duration::from_secs(65)).await;
        shutdown_tx.send(true).unwrap();

        let stats = handle.await.unwrap().unwrap();
        assert_eq!(stats.tick_passes, 3);
        assert_eq!(stats.totals.succeeded, 1, "the clock never moved, so only the first pass executes");
    }

    /// A burst of signal triggers collapses into a single pass.
    #[tokio::test(start_paused = true)]
    async fn test_signal_triggers_are_coalesced() {
        let fx = Fixture::new(1_000);
        let evaluation = fx.default_loop();
        let (tx, rx) = trigger::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move { evaluation.run(rx, shutdown_rx).await });
        // Let the immediate first tick run.
        tokio::time::sleep(Duration::from_secs(1)).await;
        for sequence in 0..3 {
            tx.send(Trigger::Signal { pool_id: pool(), sequence }).await.unwrap();
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
        shutdown_tx.send(true).unwrap();

        let stats = handle.await.unwrap().unwrap();
        assert_eq!(stats.tick_passes, 1);
        assert_eq!(stats.signal_passes, 1);
        assert_eq!(stats.coalesced_triggers, 2);
    }

    /// An unreachable chain stops the loop.
    #[tokio::test(start_paused = true)]
    async fn test_unreachable_chain_is_fatal() {
        let fx = Fixture::new(1_000);
        let reader = Arc::new(FlakyChain { inner: fx.chain.clone(), broken_agent: None, unreachable: true });
        let evaluation = fx.evaluation_loop(reader);
        let (_tx, rx) = trigger::channel(16);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let result = evaluation.run(rx, shutdown_rx).await;
        assert!(matches!(result, Err(AutoswapError::ChainUnavailable { .. })));
    }

    // ── 3. signal poller ──────────────────────────────────────────────────────

    /// Pages are bounded, ordered, and the watermark lands after the last one.
    #[tokio::test]
    async fn test_poller_pages_and_saves_watermark() {
        let log = Arc::new(SignalLog::default());
        for _ in 0..5 {
            log.push(SignalKind::VOLUME_SPIKE, 10);
        }
        let cursor = Arc::new(MemoryCursorStore::new());
        let (tx, mut rx) = trigger::channel(16);
        let config = SchedulerConfig { signal_page_size: 2, ..SchedulerConfig::default() };
        let poller = SignalPoller::new(log.clone(), cursor.clone(), tx, config);

        assert_eq!(poller.poll_once().await.unwrap(), 5);

        let mut delivered = Vec::new();
        while let Ok(Trigger::Signal { sequence, .. }) = rx.try_recv() {
            delivered.push(sequence);
        }
        assert_eq!(delivered, vec![0, 1, 2, 3, 4]);
        assert_eq!(cursor.load().unwrap(), Some(5));
        assert_eq!(*log.fetches.lock().unwrap(), vec![(0, 2), (2, 2), (4, 2)]);
    }

    /// A restarted poller resumes from the watermark instead of the start.
    #[tokio::test]
    async fn test_poller_resumes_from_watermark() {
        let log = Arc::new(SignalLog::default());
        for _ in 0..4 {
            log.push(SignalKind::PRICE_IMPACT, 10);
        }
        let cursor = Arc::new(MemoryCursorStore::new());
        cursor.save(3).unwrap();
        let (tx, mut rx) = trigger::channel(16);
        let poller = SignalPoller::new(log.clone(), cursor.clone(), tx, SchedulerConfig::default());

        assert_eq!(poller.poll_once().await.unwrap(), 1);
        assert_eq!(rx.try_recv().unwrap(), Trigger::Signal { pool_id: pool(), sequence: 3 });
        assert_eq!(cursor.load().unwrap(), Some(4));

        // Caught up with the head: nothing is fetched.
        assert_eq!(poller.poll_once().await.unwrap(), 0);
        assert_eq!(cursor.load().unwrap(), Some(4));
        assert_eq!(log.fetches.lock().unwrap().len(), 1);
    }

    /// The poll loop picks up signals as they land and stops on shutdown.
    #[tokio::test(start_paused = true)]
    async fn test_poller_run_delivers_until_shutdown() {
        let log = Arc::new(SignalLog::default());
        log.push(SignalKind::PRICE_IMPACT, 10);
        let cursor = Arc::new(MemoryCursorStore::new());
        let (tx, mut rx) = trigger::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let poller = SignalPoller::new(log.clone(), cursor.clone(), tx, SchedulerConfig::default());

        let handle = tokio::spawn(async move { poller.run(shutdown_rx).await });
        // First poll is immediate; the next one is 2s later.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(rx.try_recv().unwrap(), Trigger::Signal { pool_id: pool(), sequence: 0 });
        assert!(rx.try_recv().is_err());

        log.push(SignalKind::PRICE_IMPACT, 20);
        log.push(SignalKind::VOLUME_SPIKE, 30);
        tokio::time::sleep(Duration::from_secs(2)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();

        let mut delivered = Vec::new();
        while let Ok(Trigger::Signal { sequence, .. }) = rx.try_recv() {
            delivered.push(sequence);
        }
        assert_eq!(delivered, vec![1, 2]);
        assert_eq!(cursor.load().unwrap(), Some(3));
    }

    /// A closed trigger channel fails the poll before the watermark moves.
    #[tokio::test]
    async fn test_poller_keeps_watermark_when_undelivered() {
        let log = Arc::new(SignalLog::default());
        log.push(SignalKind::PRICE_IMPACT, 10);
        let cursor = Arc::new(MemoryCursorStore::new());
        let (tx, rx) = trigger::channel(16);
        drop(rx);
        let poller = SignalPoller::new(log, cursor.clone(), tx, SchedulerConfig::default());

        assert!(poller.poll_once().await.is_err());
        assert_eq!(cursor.load().unwrap(), None);
    }

    // ── 4. push delivery ──────────────────────────────────────────────────────

    /// A pushed signal wakes the loop on its own; nothing polls the log.
    #[tokio::test(start_paused = true)]
    async fn test_pushed_signal_starts_pass_without_polling() {
        let fx = Fixture::new(1_000);
        let agent_id = fx.agent(&[RuleParams::new(RuleType::StopLoss, 500, 0, 60)]).await;
        let evaluation = fx.default_loop();
        let (tx, rx) = trigger::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let forwarder = SignalForwarder::new(fx.signals.clone(), tx);

        let forwarding = tokio::spawn({
            let shutdown = shutdown_rx.clone();
            async move { forwarder.run(shutdown).await }
        });
        let handle = tokio::spawn(async move { evaluation.run(rx, shutdown_rx).await });

        // The immediate first tick finds no signal and dispatches nothing.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(fx.chain.get_agent_balance(agent_id, &weth()).await.unwrap(), 1_000);

        fx.signals.push(SignalKind::PRICE_IMPACT, 800);
        tokio::time::sleep(Duration::from_secs(1)).await;
        shutdown_tx.send(true).unwrap();

        let stats = handle.await.unwrap().unwrap();
        assert_eq!(forwarding.await.unwrap().unwrap(), 1);
        assert_eq!(stats.tick_passes, 1);
        assert_eq!(stats.signal_passes, 1);
        assert_eq!(stats.totals.succeeded, 1);
        assert_eq!(fx.chain.get_agent_balance(agent_id, &weth()).await.unwrap(), 900);
        assert!(fx.signals.fetches.lock().unwrap().is_empty());
    }

    /// A source without a push channel leaves the forwarder with nothing to do.
    #[tokio::test]
    async fn test_forwarder_without_push_channel_returns() {
        let (tx, mut rx) = trigger::channel(16);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let forwarder = SignalForwarder::new(Arc::new(PollOnly(SignalLog::default())), tx);

        assert_eq!(forwarder.run(shutdown_rx).await.unwrap(), 0);
        assert!(rx.try_recv().is_err());
    }
}
