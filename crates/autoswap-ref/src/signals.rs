//! An in-memory signal log.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::broadcast;

use autoswap_contracts::{
    agent::PoolId,
    error::{AutoswapError, AutoswapResult},
    signal::{Signal, SignalKind},
    Bps, Timestamp,
};
use autoswap_core::traits::SignalSource;

/// Pushed signals a slow subscriber may fall behind by before it lags.
const PUSH_CAPACITY: usize = 256;

/// Signals for every pool in one sequence, numbered from 0 in push order.
///
/// Every appended signal is also pushed to current subscribers.
#[derive(Debug)]
pub struct MemorySignalSource {
    log: Mutex<Vec<Signal>>,
    pushed: broadcast::Sender<Signal>,
}

impl Default for MemorySignalSource {
    fn default() -> Self {
        Self { log: Mutex::default(), pushed: broadcast::channel(PUSH_CAPACITY).0 }
    }
}

impl MemorySignalSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a signal, notify subscribers, and return its sequence number.
    pub fn push(&self, pool_id: PoolId, kind: SignalKind, magnitude_bps: Bps, timestamp: Timestamp) -> AutoswapResult<u64> {
        let mut log = self.lock()?;
        let sequence = log.len() as u64;
        let signal = Signal { pool_id, kind, magnitude_bps, timestamp, sequence };
        log.push(signal.clone());
        // Sent under the log lock so subscribers see sequences in order.
        // Having no subscribers is not an error.
        let _ = self.pushed.send(signal);
        Ok(sequence)
    }

    pub fn len(&self) -> usize {
        self.log.lock().map(|log| log.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> AutoswapResult<MutexGuard<'_, Vec<Signal>>> {
        self.log.lock().map_err(|e| AutoswapError::StorageError {
            reason: format!("signal log lock poisoned: {}", e),
        })
    }
}

#[async_trait]
impl SignalSource for MemorySignalSource {
    async fn latest_signal(&self, pool_id: &PoolId) -> AutoswapResult<Option<Signal>> {
        Ok(self.lock()?.iter().rev().find(|signal| &signal.pool_id == pool_id).cloned())
    }

    async fn fetch_signals(&self, from_sequence: u64, limit: usize) -> AutoswapResult<Vec<Signal>> {
        Ok(self
            .lock()?
            .iter()
            .skip_while(|signal| signal.sequence < from_sequence)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn head(&self) -> AutoswapResult<Option<u64>> {
        Ok(self.lock()?.last().map(|signal| signal.sequence))
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<Signal>> {
        Some(self.pushed.subscribe())
    }
}
