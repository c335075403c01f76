//! Push delivery of signals.
//!
//! Sources that can notify subscribers hand out a broadcast receiver; the
//! forwarder turns each pushed signal into a trigger as soon as it arrives.
//! Pushes are best effort. A lagging receiver skips signals and the poller
//! delivers them on its next interval, so a signal may reach the loop twice.

use std::sync::Arc;

use tokio::sync::{broadcast::error::RecvError, mpsc, watch};
use tracing::{debug, info, warn};

use autoswap_contracts::error::AutoswapResult;
use autoswap_core::traits::SignalSource;

use crate::trigger::Trigger;

pub struct SignalForwarder {
    source: Arc<dyn SignalSource>,
    triggers: mpsc::Sender<Trigger>,
}

impl SignalForwarder {
    pub fn new(source: Arc<dyn SignalSource>, triggers: mpsc::Sender<Trigger>) -> Self {
        Self { source, triggers }
    }

    /// Forward pushed signals until `shutdown` flips to `true`, the source
    /// closes its channel, or the evaluation loop stops listening.
    ///
    /// Returns the number of signals forwarded. A source without a push
    /// channel returns `Ok(0)` immediately.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> AutoswapResult<usize> {
        let Some(mut pushed) = self.source.subscribe() else {
            info!("signal source has no push channel, relying on polling");
            return Ok(0);
        };
        info!("signal push forwarder started");

        let mut forwarded = 0;
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                received = pushed.recv() => match received {
                    Ok(signal) => {
                        let trigger = Trigger::Signal { pool_id: signal.pool_id, sequence: signal.sequence };
                        if self.triggers.send(trigger).await.is_err() {
                            info!("trigger channel closed, push forwarder stopping");
                            break;
                        }
                        forwarded += 1;
                        debug!(sequence = signal.sequence, "pushed signal forwarded");
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "push receiver lagged, skipped signals wait for the poller");
                    }
                    Err(RecvError::Closed) => {
                        info!("signal push channel closed");
                        break;
                    }
                },
            }
        }

        Ok(forwarded)
    }
}
