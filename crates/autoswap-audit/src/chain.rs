//! Hash-chain primitives: hashing and chain integrity verification.
//!
//! Hash input layout (bytes, in order):
//!   1. sequence as 8-byte little-endian
//!   2. prev_hash as UTF-8 bytes (64 ASCII hex chars)
//!   3. canonical JSON of the attempt (serde_json, no pretty-printing)

use sha2::{Digest, Sha256};

use autoswap_contracts::{
    error::{AutoswapError, AutoswapResult},
    execution::ExecutionAttempt,
};

use crate::event::HistoryEvent;

/// Compute the SHA-256 hash for one history event.
///
/// Returns a lowercase 64-character hex string, or `RecordFailed` if the
/// attempt cannot be serialized.
pub fn hash_event(sequence: u64, attempt: &ExecutionAttempt, prev_hash: &str) -> AutoswapResult<String> {
    let attempt_json = serde_json::to_vec(attempt).map_err(|e| AutoswapError::RecordFailed {
        reason: format!("execution attempt is not serializable: {}", e),
    })?;

    let mut hasher = Sha256::new();
    hasher.update(sequence.to_le_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(&attempt_json);

    Ok(hex::encode(hasher.finalize()))
}

/// Verify the integrity of a (possibly truncated) hash chain.
///
/// Returns `true` when:
///
/// 1. **Anchor**: the first event links to `GENESIS_HASH` if it is sequence
///    0; otherwise its own `prev_hash` is taken as the anchor, since the
///    events before it were evicted.
/// 2. **Contiguity**: sequence numbers increase by exactly one.
/// 3. **Linkage**: each `prev_hash` equals the preceding `this_hash`.
/// 4. **Correctness**: each `this_hash` matches its recomputed value.
///
/// An empty chain is valid.
pub fn verify_chain(events: &[HistoryEvent]) -> bool {
    let Some(first) = events.first() else {
        return true;
    };

    let mut expected_prev = if first.sequence == 0 {
        HistoryEvent::GENESIS_HASH.to_string()
    } else {
        first.prev_hash.clone()
    };
    let mut expected_sequence = first.sequence;

    for event in events {
        if event.sequence != expected_sequence || event.prev_hash != expected_prev {
            return false;
        }
        match hash_event(event.sequence, &event.attempt, &event.prev_hash) {
            Ok(recomputed) if recomputed == event.this_hash => {}
            _ => return false,
        }
        expected_prev = event.this_hash.clone();
        expected_sequence += 1;
    }

    true
}
