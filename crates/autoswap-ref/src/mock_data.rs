//! Fictional market data for the reference scenarios.
//!
//! One WETH/USDC pool, the accounts that own and administer agents, and a
//! hardcoded price-impact tape. Nothing here reflects a real market.

use autoswap_contracts::{
    agent::{AccountId, PoolId, TokenId, TradingPair},
    signal::SignalKind,
    Bps, Timestamp,
};

/// Engine clock at the start of every scenario.
pub const GENESIS: Timestamp = 1;

/// Simulated WETH to USDC rate: 100 in, 95 out.
pub const SIM_RATE_BPS: Bps = 9_500;

pub fn weth() -> TokenId {
    TokenId::new("WETH")
}

pub fn usdc() -> TokenId {
    TokenId::new("USDC")
}

pub fn weth_usdc_pool() -> PoolId {
    PoolId::new("weth-usdc-30")
}

pub fn weth_usdc() -> TradingPair {
    TradingPair::new(weth_usdc_pool(), weth(), usdc())
}

pub fn owner() -> AccountId {
    AccountId::new("alice")
}

pub fn admin() -> AccountId {
    AccountId::new("vault-admin")
}

/// One entry of the price-impact tape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TapeEntry {
    /// Seconds after [`GENESIS`].
    pub offset_secs: u64,
    pub kind: SignalKind,
    pub magnitude_bps: Bps,
}

const fn impact(offset_secs: u64, magnitude_bps: Bps) -> TapeEntry {
    TapeEntry { offset_secs, kind: SignalKind::PRICE_IMPACT, magnitude_bps }
}

/// A sell-off on the WETH/USDC pool: impact climbs past 5% at the fourth
/// observation, with a volume spike in between that stop-loss rules ignore.
pub const SELL_OFF_TAPE: [TapeEntry; 6] = [
    impact(60, 120),
    impact(120, 240),
    TapeEntry { offset_secs: 150, kind: SignalKind::VOLUME_SPIKE, magnitude_bps: 9_000 },
    impact(180, 410),
    impact(240, 615),
    impact(300, 880),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tape_is_time_ordered() {
        let offsets: Vec<u64> = SELL_OFF_TAPE.iter().map(|entry| entry.offset_secs).collect();
        let mut sorted = offsets.clone();
        sorted.sort_unstable();
        assert_eq!(offsets, sorted);
    }

    #[test]
    fn test_sim_rate_yields_95_of_100() {
        assert_eq!(100 * u128::from(SIM_RATE_BPS) / 10_000, 95);
    }
}
