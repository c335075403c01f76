//! Signal ingestion with a persisted watermark.
//!
//! The poller reads the signal log in bounded pages, in increasing sequence
//! order, and sends one trigger per delivered signal. The watermark is saved
//! after each page is fully delivered, so a restart resumes after the last
//! complete page. A crash between delivery and save replays that page;
//! consumers must tolerate duplicate signals.

use std::sync::Arc;

use tokio::{
    sync::{mpsc, watch},
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use autoswap_contracts::{
    error::{AutoswapError, AutoswapResult},
    signal::Signal,
};
use autoswap_core::{
    config::SchedulerConfig,
    traits::{CursorStore, SignalSource},
};

use crate::trigger::Trigger;

pub struct SignalPoller {
    source: Arc<dyn SignalSource>,
    cursor: Arc<dyn CursorStore>,
    triggers: mpsc::Sender<Trigger>,
    config: SchedulerConfig,
}

impl SignalPoller {
    pub fn new(
        source: Arc<dyn SignalSource>,
        cursor: Arc<dyn CursorStore>,
        triggers: mpsc::Sender<Trigger>,
        config: SchedulerConfig,
    ) -> Self {
        Self { source, cursor, triggers, config }
    }

    /// Drain every available page from the watermark onward.
    ///
    /// Returns the number of signals delivered.
    pub async fn poll_once(&self) -> AutoswapResult<usize> {
        let page_size = self.config.signal_page_size.max(1);
        let mut next = self.cursor.load()?.unwrap_or(0);
        let mut delivered = 0;

        match self.source.head().await? {
            Some(head) if head >= next => {}
            _ => return Ok(0),
        }

        loop {
            let mut page = self.source.fetch_signals(next, page_size).await?;
            page.retain(|signal| signal.sequence >= next);
            if page.is_empty() {
                break;
            }
            page.sort_by_key(|signal| signal.sequence);
            let full_page = page.len() >= page_size;

            for signal in &page {
                self.deliver(signal).await?;
            }
            delivered += page.len();

            if let Some(last) = page.last() {
                next = last.sequence + 1;
            }
            self.cursor.save(next)?;
            debug!(next_sequence = next, page_len = page.len(), "signal page ingested");

            if !full_page {
                break;
            }
        }

        Ok(delivered)
    }

    async fn deliver(&self, signal: &Signal) -> AutoswapResult<()> {
        let trigger = Trigger::Signal { pool_id: signal.pool_id.clone(), sequence: signal.sequence };
        self.triggers.send(trigger).await.map_err(|_| AutoswapError::StorageError {
            reason: "trigger channel closed".to_string(),
        })
    }

    /// Poll on the configured interval until `shutdown` flips to `true`, its
    /// sender is dropped, or the evaluation loop stops listening.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> AutoswapResult<()> {
        let mut ticker = interval(self.config.signal_poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            poll_interval_ms = self.config.signal_poll_interval_ms,
            page_size = self.config.signal_page_size,
            "signal poller started"
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if self.triggers.is_closed() {
                        info!("trigger channel closed, signal poller stopping");
                        break;
                    }
                    match self.poll_once().await {
                        Ok(0) => {}
                        Ok(delivered) => debug!(delivered, "signals delivered"),
                        Err(err) if err.is_transient() => warn!(error = %err, "signal poll failed, retrying next interval"),
                        Err(err) => {
                            warn!(error = %err, "signal poll failed");
                            if self.triggers.is_closed() {
                                break;
                            }
                        }
                    }
                }
            }
        }

        Ok(())
    }
}
