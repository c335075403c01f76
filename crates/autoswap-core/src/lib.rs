//! # autoswap-core
//!
//! The execution runtime for autoswap agents.
//!
//! This crate provides:
//! - The collaborator traits (`ChainReader`, `ExecutionGate`, `AgentLedger`,
//!   `SignalSource`, `QuoteProvider`, `ExecutionRecorder`, `CursorStore`)
//! - The `DualPathExecutor` that drives one ready rule to a terminal outcome
//! - Engine configuration, the clock abstraction, and per-agent locks
//!
//! ## Usage
//!
//! ```rust,ignore
//! use autoswap_core::{DualPathExecutor, ExecutorDeps, config::EngineConfig};
//!
//! let config = EngineConfig::from_file(Path::new("autoswap.toml"))?;
//! let executor = DualPathExecutor::new(deps, config.executor);
//! let result = executor.execute(&agent, rule_index, &rule).await?;
//! ```

pub mod config;
pub mod executor;
pub mod locks;
pub mod timing;
pub mod traits;

pub use executor::{DualPathExecutor, ExecutorDeps};
