//! # autoswap-audit
//!
//! Capped, append-only, SHA-256 hash-chained execution history.
//!
//! ## Overview
//!
//! Every terminal execution attempt is wrapped in a `HistoryEvent` that links
//! to the previous event via its SHA-256 hash. Only the last `capacity`
//! events are retained; verification anchors on the oldest retained event.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use autoswap_audit::InMemoryExecutionRecorder;
//! use autoswap_core::traits::ExecutionRecorder;
//!
//! let recorder = InMemoryExecutionRecorder::new(1_000);
//! recorder.record(&attempt)?;
//!
//! assert!(recorder.verify_integrity());
//! let latest = recorder.query(Some(agent_id), 20)?;
//! ```

pub mod chain;
pub mod event;
pub mod memory;

pub use chain::{hash_event, verify_chain};
pub use event::{HistoryEvent, HistoryExport};
pub use memory::InMemoryExecutionRecorder;

// ── Tests ─────────────────────────────────────────────────────────────────────
