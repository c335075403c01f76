//! # autoswap-store
//!
//! In-memory state backends for the autoswap engine:
//!
//! - [`InMemoryChain`]: agents, rules, executor authorization, and the
//!   `ChainReader` / `ExecutionGate` boundary
//! - [`InMemoryLedger`]: the authoritative per-agent balances with custody
//!   tracking and solvency checks
//! - [`MemoryCursorStore`] and [`JsonFileCursorStore`]: the signal ingestion
//!   watermark

pub mod chain;
pub mod cursor;
pub mod ledger;

pub use chain::InMemoryChain;
pub use cursor::{JsonFileCursorStore, MemoryCursorStore};
pub use ledger::InMemoryLedger;
