//! The evaluation loop.
//!
//! One pass enumerates every agent, evaluates each active agent's enabled
//! rules in stored order, and dispatches the ready ones to the executor.
//! Different agents are evaluated concurrently up to `max_parallel_agents`;
//! one agent's rules always run one after another.
//!
//! A pass is started by the interval timer or by a signal trigger. Both run
//! the same routine. A failure inside one agent's evaluation is logged and
//! counted and never aborts the pass; only an unreachable chain stops the
//! loop.

use std::sync::Arc;

use tokio::{
    sync::{mpsc, watch, Semaphore},
    task::JoinSet,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

use autoswap_contracts::{
    agent::AgentId,
    error::{AutoswapError, AutoswapResult},
    Timestamp,
};
use autoswap_core::{
    config::SchedulerConfig,
    timing::Clock,
    traits::{ChainReader, RuleEvaluator, SignalSource},
    DualPathExecutor,
};

use crate::trigger::Trigger;

/// Counters for one pass, or for one agent within a pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub agents_seen: usize,
    /// Agents that were active and had their rules evaluated.
    pub agents_evaluated: usize,
    pub rules_dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Dispatches the gate refused at commit time.
    pub gate_rejected: usize,
    /// Agent read failures and executor errors.
    pub errors: usize,
}

impl PassReport {
    fn merge(&mut self, other: &PassReport) {
        self.agents_seen += other.agents_seen;
        self.agents_evaluated += other.agents_evaluated;
        self.rules_dispatched += other.rules_dispatched;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.gate_rejected += other.gate_rejected;
        self.errors += other.errors;
    }
}

/// Totals over the lifetime of [`EvaluationLoop::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub tick_passes: u64,
    pub signal_passes: u64,
    /// Triggers folded into a pass that was already about to run.
    pub coalesced_triggers: u64,
    pub failed_passes: u64,
    pub totals: PassReport,
}

/// The collaborators an evaluation loop drives.
#[derive(Clone)]
pub struct LoopDeps {
    pub chain: Arc<dyn ChainReader>,
    pub signals: Arc<dyn SignalSource>,
    pub evaluator: Arc<dyn RuleEvaluator>,
    pub executor: Arc<DualPathExecutor>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Clone)]
pub struct EvaluationLoop {
    deps: LoopDeps,
    config: SchedulerConfig,
    permits: Arc<Semaphore>,
}

impl EvaluationLoop {
    pub fn new(deps: LoopDeps, config: SchedulerConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_parallel_agents.max(1)));
        Self { deps, config, permits }
    }

    /// Run one evaluation pass over every agent at the clock's current time.
    ///
    /// # Errors
    ///
    /// Returns `Err` only if the agent list cannot be read. Per-agent
    /// failures are counted in the report.
    pub async fn evaluate_pass(&self) -> AutoswapResult<PassReport> {
        let now = self.deps.clock.now();
        let agent_ids = self.deps.chain.list_agents().await?;
        let mut report = PassReport { agents_seen: agent_ids.len(), ..PassReport::default() };

        let mut tasks = JoinSet::new();
        for agent_id in agent_ids {
            let permit = Arc::clone(&self.permits).acquire_owned().await.map_err(|_| {
                AutoswapError::ConfigError { reason: "evaluation permits closed".to_string() }
            })?;
            let this = self.clone();
            tasks.spawn(async move {
                let _permit = permit;
                (agent_id, this.evaluate_agent(agent_id, now).await)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(agent_report))) => report.merge(&agent_report),
                Ok((agent_id, Err(err))) => {
                    report.errors += 1;
                    error!(agent_id = %agent_id, error = %err, "agent evaluation failed, skipping");
                }
                Err(join_err) => {
                    report.errors += 1;
                    error!(error = %join_err, "agent evaluation task aborted");
                }
            }
        }

        info!(
            now,
            agents = report.agents_seen,
            evaluated = report.agents_evaluated,
            dispatched = report.rules_dispatched,
            succeeded = report.succeeded,
            failed = report.failed,
            errors = report.errors,
            "evaluation pass complete"
        );
        Ok(report)
    }

    async fn evaluate_agent(&self, agent_id: AgentId, now: Timestamp) -> AutoswapResult<PassReport> {
        let mut report = PassReport::default();

        let agent = self.deps.chain.get_agent(agent_id).await?;
        if !agent.is_active() {
            debug!(agent_id = %agent_id, status = ?agent.status, "agent not active, skipping");
            return Ok(report);
        }
        report.agents_evaluated = 1;

        let rules = self.deps.chain.get_rules(agent_id).await?;
        let latest = self.deps.signals.latest_signal(&agent.pair.pool_id).await?;
        let ready = self.deps.evaluator.ready_rules(&agent, &rules, latest.as_ref(), now);

        for rule_index in ready {
            report.rules_dispatched += 1;
            match self.deps.executor.execute(&agent, rule_index, &rules[rule_index]).await {
                Ok(result) if result.success => report.succeeded += 1,
                Ok(result) => {
                    report.failed += 1;
                    warn!(
                        agent_id = %agent_id,
                        rule_index,
                        path = ?result.path,
                        error = result.error.as_deref().unwrap_or(""),
                        "execution failed"
                    );
                }
                Err(err) if err.is_gate_rejection() => {
                    report.gate_rejected += 1;
                    debug!(agent_id = %agent_id, rule_index, reason = %err, "dispatch rejected at gate");
                }
                Err(err) => {
                    report.errors += 1;
                    error!(agent_id = %agent_id, rule_index, error = %err, "dispatch error");
                }
            }
        }

        Ok(report)
    }

    /// Run passes on every timer tick and every trigger until `shutdown`
    /// flips to `true` or its sender is dropped.
    ///
    /// # Errors
    ///
    /// Returns `ChainUnavailable` when a pass cannot reach the chain at all.
    pub async fn run(
        &self,
        mut triggers: mpsc::Receiver<Trigger>,
        mut shutdown: watch::Receiver<bool>,
    ) -> AutoswapResult<LoopStats> {
        let mut ticker = interval(self.config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut stats = LoopStats::default();
        let mut triggers_open = true;

        info!(
            tick_interval_secs = self.config.tick_interval_secs,
            max_parallel_agents = self.config.max_parallel_agents,
            "evaluation loop started"
        );

        loop {
            let cause = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => Trigger::Tick,
                received = triggers.recv(), if triggers_open => match received {
                    Some(trigger) => trigger,
                    None => {
                        debug!("trigger channel closed, continuing on timer only");
                        triggers_open = false;
                        continue;
                    }
                },
            };

            while let Ok(extra) = triggers.try_recv() {
                stats.coalesced_triggers += 1;
                debug!(trigger = ?extra, "trigger coalesced into pending pass");
            }

            match &cause {
                Trigger::Tick => stats.tick_passes += 1,
                Trigger::Signal { pool_id, sequence } => {
                    stats.signal_passes += 1;
                    debug!(pool = %pool_id, sequence, "signal-triggered pass");
                }
            }

            match self.evaluate_pass().await {
                Ok(report) => stats.totals.merge(&report),
                Err(err) => {
                    stats.failed_passes += 1;
                    error!(error = %err, "evaluation pass failed");
                    if matches!(err, AutoswapError::ChainUnavailable { .. }) {
                        return Err(err);
                    }
                }
            }
        }

        info!(
            tick_passes = stats.tick_passes,
            signal_passes = stats.signal_passes,
            failed_passes = stats.failed_passes,
            "evaluation loop stopped"
        );
        Ok(stats)
    }
}
