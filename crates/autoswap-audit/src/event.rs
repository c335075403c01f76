//! History event and export types.
//!
//! `HistoryEvent` wraps one `ExecutionAttempt` with its position in the
//! history and the SHA-256 hashes that make tampering detectable.
//! `HistoryExport` is a sealed snapshot of the retained window.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use autoswap_contracts::execution::ExecutionAttempt;

/// A single entry in the execution history's hash chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEvent {
    /// Position in the full history, starting at 0. Eviction does not
    /// renumber retained events.
    pub sequence: u64,

    pub attempt: ExecutionAttempt,

    /// `this_hash` of the previous event, or `GENESIS_HASH` for sequence 0.
    pub prev_hash: String,

    /// SHA-256 (hex) over (sequence, prev_hash, canonical JSON of attempt).
    pub this_hash: String,
}

impl HistoryEvent {
    /// The `prev_hash` of the first event ever recorded.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}

/// A sealed snapshot of the retained history, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryExport {
    pub events: Vec<HistoryEvent>,

    /// Number of events evicted before the first retained one.
    pub evicted: u64,

    pub exported_at: DateTime<Utc>,

    /// The `this_hash` of the last event. Empty if nothing was ever recorded.
    pub terminal_hash: String,
}
