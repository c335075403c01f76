//! In-memory implementation of `ExecutionRecorder`.
//!
//! `InMemoryExecutionRecorder` keeps the most recent `capacity` attempts in a
//! `VecDeque` protected by a `Mutex` and discards the oldest FIFO once full.
//! Every attempt is hash-chained to the one before it, including attempts
//! that have since been evicted.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard},
};

use chrono::Utc;
use tracing::{debug, info};

use autoswap_contracts::{
    agent::AgentId,
    error::{AutoswapError, AutoswapResult},
    execution::ExecutionAttempt,
};
use autoswap_core::{config::RecorderConfig, traits::ExecutionRecorder};

use crate::{
    chain::{hash_event, verify_chain},
    event::{HistoryEvent, HistoryExport},
};

// ── Internal mutable state ────────────────────────────────────────────────────

pub(crate) struct HistoryState {
    /// Retained events, oldest first.
    pub(crate) events: VecDeque<HistoryEvent>,

    /// The next sequence number to assign.
    pub(crate) sequence: u64,

    /// The `this_hash` of the last recorded event, or `GENESIS_HASH`.
    pub(crate) last_hash: String,

    pub(crate) evicted: u64,
}

// ── Public recorder ───────────────────────────────────────────────────────────

/// A capped, append-only execution history backed by a SHA-256 hash chain.
///
/// Clones share the same history.
#[derive(Clone)]
pub struct InMemoryExecutionRecorder {
    capacity: usize,
    pub(crate) state: Arc<Mutex<HistoryState>>,
}

impl InMemoryExecutionRecorder {
    /// Create a recorder that retains at most `capacity` attempts.
    pub fn new(capacity: usize) -> Self {
        let state = HistoryState {
            events: VecDeque::with_capacity(capacity.min(4_096)),
            sequence: 0,
            last_hash: HistoryEvent::GENESIS_HASH.to_string(),
            evicted: 0,
        };
        Self { capacity: capacity.max(1), state: Arc::new(Mutex::new(state)) }
    }

    pub fn from_config(config: &RecorderConfig) -> Self {
        Self::new(config.capacity)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().map(|state| state.events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Export a sealed snapshot of the retained window.
    pub fn export(&self) -> AutoswapResult<HistoryExport> {
        let state = self.lock()?;
        let terminal_hash = if state.sequence == 0 { String::new() } else { state.last_hash.clone() };

        Ok(HistoryExport {
            events: state.events.iter().cloned().collect(),
            evicted: state.evicted,
            exported_at: Utc::now(),
            terminal_hash,
        })
    }

    /// Verify that the retained chain has not been tampered with.
    pub fn verify_integrity(&self) -> bool {
        match self.lock() {
            Ok(state) => {
                let events: Vec<HistoryEvent> = state.events.iter().cloned().collect();
                verify_chain(&events)
            }
            Err(_) => false,
        }
    }

    fn lock(&self) -> AutoswapResult<MutexGuard<'_, HistoryState>> {
        self.state.lock().map_err(|e| AutoswapError::RecordFailed {
            reason: format!("history lock poisoned: {}", e),
        })
    }
}

// ── ExecutionRecorder impl ────────────────────────────────────────────────────

impl ExecutionRecorder for InMemoryExecutionRecorder {
    fn record(&self, attempt: &ExecutionAttempt) -> AutoswapResult<()> {
        let mut state = self.lock()?;

        let sequence = state.sequence;
        let prev_hash = state.last_hash.clone();
        let this_hash = hash_event(sequence, attempt, &prev_hash)?;

        if state.events.len() >= self.capacity {
            state.events.pop_front();
            state.evicted += 1;
        }
        state.events.push_back(HistoryEvent {
            sequence,
            attempt: attempt.clone(),
            prev_hash,
            this_hash: this_hash.clone(),
        });
        state.sequence += 1;
        state.last_hash = this_hash;

        debug!(
            sequence,
            agent_id = %attempt.agent_id,
            rule_index = attempt.rule_index,
            outcome = ?attempt.outcome,
            "execution attempt recorded"
        );
        if state.evicted > 0 && state.evicted % self.capacity as u64 == 0 {
            info!(evicted = state.evicted, capacity = self.capacity, "execution history rolled over");
        }

        Ok(())
    }

    fn query(&self, agent_id: Option<AgentId>, limit: usize) -> AutoswapResult<Vec<ExecutionAttempt>> {
        let state = self.lock()?;
        Ok(state
            .events
            .iter()
            .rev()
            .filter(|event| agent_id.map_or(true, |id| event.attempt.agent_id == id))
            .take(limit)
            .map(|event| event.attempt.clone())
            .collect())
    }
}
