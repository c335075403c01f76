//! Pool-scoped signals consumed by signal-dependent rules.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{agent::PoolId, Bps, Timestamp};

/// Numeric signal discriminant.
///
/// `CustomSignal` rules match on the raw number, so kinds beyond the
/// well-known constants are valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignalKind(pub u64);

impl SignalKind {
    /// Price moved by `magnitude_bps` in the pool.
    pub const PRICE_IMPACT: SignalKind = SignalKind(1);
    pub const VOLUME_SPIKE: SignalKind = SignalKind(2);
    pub const LIQUIDITY_SHIFT: SignalKind = SignalKind(3);
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            SignalKind::PRICE_IMPACT => f.write_str("price-impact"),
            SignalKind::VOLUME_SPIKE => f.write_str("volume-spike"),
            SignalKind::LIQUIDITY_SHIFT => f.write_str("liquidity-shift"),
            SignalKind(other) => write!(f, "kind-{other}"),
        }
    }
}

/// One signal emitted by the signal source.
///
/// `sequence` is the source's monotonically increasing log position; it is
/// what the ingestion watermark tracks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub pool_id: PoolId,
    pub kind: SignalKind,
    pub magnitude_bps: Bps,
    pub timestamp: Timestamp,
    pub sequence: u64,
}
