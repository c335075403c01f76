//! # autoswap-rules
//!
//! The pure rule engine for the autoswap strategy engine.
//!
//! ## Overview
//!
//! This crate provides [`RuleEngine`], which implements the
//! [`RuleEvaluator`](autoswap_core::traits::RuleEvaluator) trait. Every rule
//! passes the universal cooldown gate first; only then is its type-specific
//! [`TriggerCondition`] checked against the latest signal for the agent's pool.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use autoswap_rules::RuleEngine;
//! use autoswap_core::traits::RuleEvaluator;
//!
//! let decision = RuleEngine::new().evaluate(&agent, &rule, latest.as_ref(), now);
//! if decision.should_execute { /* dispatch */ }
//! ```

pub mod condition;
pub mod engine;

pub use condition::TriggerCondition;
pub use engine::RuleEngine;

// ── Tests ─────────────────────────────────────────────────────────────────────
