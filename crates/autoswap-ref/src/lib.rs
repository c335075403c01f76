//! # autoswap-ref
//!
//! Reference runtime for the autoswap strategy engine.
//!
//! Wires the real engine components (rule engine, dual-path executor,
//! in-memory chain and ledger, hash-chained recorder, evaluation loop) to a
//! simulated swap provider and an in-memory signal log, then runs three
//! scenarios end to end:
//!
//! 1. **Time-weighted DCA**: an interval rule gated by a 300 second cooldown,
//!    settled off-chain.
//! 2. **Off-chain fallback**: the off-chain session hangs past its deadline,
//!    the executor falls back on-chain and retries with linear backoff.
//! 3. **Stop-loss**: a price-impact rule that fires only once the signal tape
//!    crosses its threshold.
//!
//! All market data is hardcoded and fictional. No network calls are made.

pub mod mock_data;
pub mod provider;
pub mod scenarios;
pub mod signals;
pub mod world;

pub use provider::{OffChainBehaviour, SimulatedProvider};
pub use signals::MemorySignalSource;
pub use world::World;
