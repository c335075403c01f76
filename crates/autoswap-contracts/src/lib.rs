//! # autoswap-contracts
//!
//! Shared types, invariants, and error contracts for the autoswap strategy
//! execution engine.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate beyond the validating constructors and the cooldown gate that
//! the rule engine and the chain substrate must share.

pub mod agent;
pub mod error;
pub mod execution;
pub mod quote;
pub mod rule;
pub mod signal;

/// Unix time in whole seconds.
pub type Timestamp = u64;

/// Token amount in the token's smallest unit.
pub type Amount = u128;

/// Basis points; 10000 is 100%.
pub type Bps = u32;

pub const BPS_DENOMINATOR: Bps = 10_000;
