//! Engine clock and timeout helpers.
//!
//! Rule readiness is decided on whole unix seconds read from a [`Clock`], so
//! tests and simulations can drive time explicitly with [`ManualClock`].

use std::{
    future::Future,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use autoswap_contracts::{
    error::{AutoswapError, AutoswapResult},
    Timestamp,
};

pub trait Clock: Send + Sync {
    /// Current unix time in seconds.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        chrono::Utc::now().timestamp().max(0) as Timestamp
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self { now: AtomicU64::new(start) }
    }

    pub fn set(&self, now: Timestamp) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Move forward by `secs` and return the new reading.
    pub fn advance(&self, secs: u64) -> Timestamp {
        self.now.fetch_add(secs, Ordering::SeqCst) + secs
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

/// Run `fut` with a deadline, mapping expiry to `AutoswapError::Timeout`.
pub async fn with_timeout<T, F>(operation: &str, limit: Duration, fut: F) -> AutoswapResult<T>
where
    F: Future<Output = AutoswapResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(AutoswapError::Timeout {
            operation: operation.to_string(),
            after_ms: limit.as_millis().try_into().unwrap_or(u64::MAX),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(300);
        assert_eq!(clock.now(), 300);
        assert_eq!(clock.advance(1), 301);
        clock.set(10);
        assert_eq!(clock.now(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn with_timeout_maps_expiry() {
        let result: AutoswapResult<()> = with_timeout("quote", Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;

        assert_eq!(
            result,
            Err(AutoswapError::Timeout { operation: "quote".to_string(), after_ms: 50 })
        );
    }

    #[tokio::test]
    async fn with_timeout_passes_through_inner_result() {
        let ok = with_timeout("quote", Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));

        let err: AutoswapResult<u8> = with_timeout("quote", Duration::from_secs(1), async {
            Err(AutoswapError::QuoteStale { reason: "drift".to_string() })
        })
        .await;
        assert!(matches!(err, Err(AutoswapError::QuoteStale { .. })));
    }
}
