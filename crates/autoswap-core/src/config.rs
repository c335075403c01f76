//! Engine configuration loaded from TOML.
//!
//! Every field has a default, so an empty document is a valid configuration.
//!
//! ```toml
//! [executor]
//! max_onchain_attempts = 3
//! retry_delay_ms = 1000
//! slippage_bps = 50
//! sizing = { kind = "fraction-of-balance", bps = 1000 }
//! cooldown_commit = "on-dispatch"
//!
//! [scheduler]
//! tick_interval_secs = 30
//! max_parallel_agents = 8
//!
//! [recorder]
//! capacity = 1000
//! ```

use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use autoswap_contracts::{
    error::{AutoswapError, AutoswapResult},
    Amount, Bps, BPS_DENOMINATOR,
};

/// How much of the agent's `token_in` balance one execution swaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SizingPolicy {
    /// A fixed share of the current balance, rounded down.
    FractionOfBalance { bps: Bps },
    /// A fixed amount, regardless of balance.
    Fixed { amount: u64 },
    FullBalance,
}

impl SizingPolicy {
    pub fn amount_in(&self, balance: Amount) -> Amount {
        match *self {
            SizingPolicy::FractionOfBalance { bps } => {
                balance.saturating_mul(Amount::from(bps)) / Amount::from(BPS_DENOMINATOR)
            }
            SizingPolicy::Fixed { amount } => Amount::from(amount),
            SizingPolicy::FullBalance => balance,
        }
    }
}

impl Default for SizingPolicy {
    fn default() -> Self {
        SizingPolicy::FractionOfBalance { bps: 1_000 }
    }
}

/// When the rule's `last_executed` is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CooldownCommit {
    /// Commit before settlement. A failed settlement still consumes the
    /// cooldown window, which rate-limits retries against a broken provider.
    #[default]
    OnDispatch,
    /// Check the gate before settlement and commit only after success.
    OnSuccess,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// On-chain attempts per execution, including the first.
    pub max_onchain_attempts: u32,
    /// Base of the linear backoff: attempt `n` waits `n * retry_delay_ms`.
    pub retry_delay_ms: u64,
    pub slippage_bps: Bps,
    /// Maximum drift between a quote and its re-quote.
    pub quote_tolerance_bps: Bps,
    pub quote_timeout_ms: u64,
    /// Budget for the whole off-chain attempt (open, submit, close).
    pub offchain_timeout_ms: u64,
    /// Budget for each on-chain simulate and each submit-and-confirm.
    pub onchain_timeout_ms: u64,
    pub sizing: SizingPolicy,
    pub cooldown_commit: CooldownCommit,
    /// Account the engine commits executions as.
    pub executor_account: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_onchain_attempts: 3,
            retry_delay_ms: 1_000,
            slippage_bps: 50,
            quote_tolerance_bps: 100,
            quote_timeout_ms: 5_000,
            offchain_timeout_ms: 3_000,
            onchain_timeout_ms: 60_000,
            sizing: SizingPolicy::default(),
            cooldown_commit: CooldownCommit::default(),
            executor_account: "autoswap-executor".to_string(),
        }
    }
}

impl ExecutorConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn quote_timeout(&self) -> Duration {
        Duration::from_millis(self.quote_timeout_ms)
    }

    pub fn offchain_timeout(&self) -> Duration {
        Duration::from_millis(self.offchain_timeout_ms)
    }

    pub fn onchain_timeout(&self) -> Duration {
        Duration::from_millis(self.onchain_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub tick_interval_secs: u64,
    /// Agents evaluated concurrently within one pass.
    pub max_parallel_agents: usize,
    /// Maximum signals fetched per ingestion page.
    pub signal_page_size: usize,
    pub signal_poll_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 30,
            max_parallel_agents: 8,
            signal_page_size: 500,
            signal_poll_interval_ms: 2_000,
        }
    }
}

impl SchedulerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn signal_poll_interval(&self) -> Duration {
        Duration::from_millis(self.signal_poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Entries kept before the oldest are evicted.
    pub capacity: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self { capacity: 1_000 }
    }
}

/// The full engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub executor: ExecutorConfig,
    pub scheduler: SchedulerConfig,
    pub recorder: RecorderConfig,
}

impl EngineConfig {
    /// Parse `s` as TOML and validate the result.
    ///
    /// Returns `AutoswapError::ConfigError` if the TOML is malformed, does not
    /// match the schema, or fails [`EngineConfig::validate`].
    pub fn from_toml_str(s: &str) -> AutoswapResult<Self> {
        let config: EngineConfig = toml::from_str(s).map_err(|e| AutoswapError::ConfigError {
            reason: format!("failed to parse engine TOML: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read the file at `path` and parse it as engine configuration.
    pub fn from_file(path: &Path) -> AutoswapResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| AutoswapError::ConfigError {
            reason: format!("failed to read engine config '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> AutoswapResult<()> {
        let executor = &self.executor;
        let fail = |reason: String| Err(AutoswapError::ConfigError { reason });

        if executor.max_onchain_attempts == 0 {
            return fail("executor.max_onchain_attempts must be at least 1".to_string());
        }
        for (name, value) in [
            ("executor.slippage_bps", executor.slippage_bps),
            ("executor.quote_tolerance_bps", executor.quote_tolerance_bps),
        ] {
            if value > BPS_DENOMINATOR {
                return fail(format!("{name} = {value} exceeds {BPS_DENOMINATOR}"));
            }
        }
        if let SizingPolicy::FractionOfBalance { bps } = executor.sizing {
            if bps == 0 || bps > BPS_DENOMINATOR {
                return fail(format!("executor.sizing.bps = {bps} must be within 1..={BPS_DENOMINATOR}"));
            }
        }
        if executor.offchain_timeout_ms == 0 || executor.offchain_timeout_ms >= executor.onchain_timeout_ms {
            return fail("executor.offchain_timeout_ms must be non-zero and shorter than onchain_timeout_ms".to_string());
        }
        if executor.executor_account.trim().is_empty() {
            return fail("executor.executor_account must not be empty".to_string());
        }
        if self.scheduler.tick_interval_secs == 0 {
            return fail("scheduler.tick_interval_secs must be at least 1".to_string());
        }
        if self.scheduler.max_parallel_agents == 0 {
            return fail("scheduler.max_parallel_agents must be at least 1".to_string());
        }
        if self.scheduler.signal_page_size == 0 {
            return fail("scheduler.signal_page_size must be at least 1".to_string());
        }
        if self.recorder.capacity == 0 {
            return fail("recorder.capacity must be at least 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.executor.max_onchain_attempts, 3);
        assert_eq!(config.executor.sizing, SizingPolicy::FractionOfBalance { bps: 1_000 });
        assert_eq!(config.executor.cooldown_commit, CooldownCommit::OnDispatch);
        assert_eq!(config.recorder.capacity, 1_000);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [executor]
            max_onchain_attempts = 5
            sizing = { kind = "fixed", amount = 250 }
            cooldown_commit = "on-success"

            [scheduler]
            tick_interval_secs = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.executor.max_onchain_attempts, 5);
        assert_eq!(config.executor.sizing, SizingPolicy::Fixed { amount: 250 });
        assert_eq!(config.executor.cooldown_commit, CooldownCommit::OnSuccess);
        assert_eq!(config.executor.retry_delay_ms, 1_000);
        assert_eq!(config.scheduler.tick_interval_secs, 10);
        assert_eq!(config.scheduler.max_parallel_agents, 8);
    }

    #[test]
    fn malformed_toml_is_config_error() {
        match EngineConfig::from_toml_str("this is not valid toml ][[[") {
            Err(AutoswapError::ConfigError { reason }) => {
                assert!(reason.contains("failed to parse engine TOML"), "got: {reason}");
            }
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn validate_rejects_zero_attempts() {
        let result = EngineConfig::from_toml_str("[executor]\nmax_onchain_attempts = 0\n");
        assert!(matches!(result, Err(AutoswapError::ConfigError { .. })));
    }

    #[test]
    fn validate_requires_offchain_timeout_shorter_than_onchain() {
        let result = EngineConfig::from_toml_str(
            "[executor]\noffchain_timeout_ms = 60000\nonchain_timeout_ms = 60000\n",
        );
        match result {
            Err(AutoswapError::ConfigError { reason }) => assert!(reason.contains("offchain_timeout_ms")),
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn validate_rejects_out_of_range_bps() {
        assert!(EngineConfig::from_toml_str("[executor]\nslippage_bps = 10001\n").is_err());
        assert!(EngineConfig::from_toml_str(
            "[executor]\nsizing = { kind = \"fraction-of-balance\", bps = 0 }\n"
        )
        .is_err());
    }

    #[test]
    fn missing_file_is_config_error() {
        let result = EngineConfig::from_file(Path::new("/nonexistent/autoswap.toml"));
        match result {
            Err(AutoswapError::ConfigError { reason }) => assert!(reason.contains("failed to read")),
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn sizing_policies() {
        assert_eq!(SizingPolicy::default().amount_in(1_000), 100);
        assert_eq!(SizingPolicy::FractionOfBalance { bps: 1_000 }.amount_in(9), 0);
        assert_eq!(SizingPolicy::Fixed { amount: 250 }.amount_in(10), 250);
        assert_eq!(SizingPolicy::FullBalance.amount_in(777), 777);
    }
}
