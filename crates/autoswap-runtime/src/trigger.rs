//! What wakes the evaluation loop.

use autoswap_contracts::agent::PoolId;
use tokio::sync::mpsc;

/// A request to run an evaluation pass.
///
/// Timer ticks and signal arrivals feed the same channel and run the same
/// pass; triggers that queue up while a pass runs are coalesced into one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Tick,
    Signal { pool_id: PoolId, sequence: u64 },
}

/// Create the trigger channel shared by the poller and the loop.
pub fn channel(capacity: usize) -> (mpsc::Sender<Trigger>, mpsc::Receiver<Trigger>) {
    mpsc::channel(capacity.max(1))
}
