//! Per-agent single-flight locks.
//!
//! Every execution for an agent runs while holding that agent's lock, so two
//! settlements for the same agent are never in flight together. Clones share
//! slots, so a substrate that moves funds can hold the same locks as the
//! executor. Different agents never contend.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use autoswap_contracts::agent::AgentId;

#[derive(Debug, Default, Clone)]
pub struct AgentLocks {
    inner: Arc<Mutex<HashMap<AgentId, Arc<AsyncMutex<()>>>>>,
}

impl AgentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `agent_id`. Released when the guard drops.
    pub async fn acquire(&self, agent_id: AgentId) -> OwnedMutexGuard<()> {
        self.slot(agent_id).lock_owned().await
    }

    /// Take the lock only if nobody holds it.
    pub fn try_acquire(&self, agent_id: AgentId) -> Option<OwnedMutexGuard<()>> {
        self.slot(agent_id).try_lock_owned().ok()
    }

    fn slot(&self, agent_id: AgentId) -> Arc<AsyncMutex<()>> {
        // The map only hands out Arcs; a panic elsewhere cannot leave it torn.
        // Slots are never removed. Agents are never deleted, so the map is
        // bounded by the number of agents ever registered.
        let mut slots = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(slots.entry(agent_id).or_default())
    }
}
