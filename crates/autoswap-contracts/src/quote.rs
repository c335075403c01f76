//! Quote and settlement types exchanged with the quote/settle provider.

use serde::{Deserialize, Serialize};

use crate::{agent::TokenId, Amount, Bps, Timestamp, BPS_DENOMINATOR};

/// A request for a swap quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRequest {
    pub token_in: TokenId,
    pub token_out: TokenId,
    pub amount_in: Amount,
    pub slippage_bps: Bps,
}

/// A provider quote for a [`SwapRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub token_in: TokenId,
    pub token_out: TokenId,
    pub amount_in: Amount,
    pub amount_out: Amount,
    pub slippage_bps: Bps,
    /// Provider-defined route description (pool hops, venue).
    pub route: String,
    pub quoted_at: Timestamp,
}

impl Quote {
    /// `amount_out * (10000 - slippage_bps) / 10000`, rounded down.
    pub fn min_amount_out(&self) -> Amount {
        let keep = Amount::from(BPS_DENOMINATOR.saturating_sub(self.slippage_bps));
        self.amount_out.saturating_mul(keep) / Amount::from(BPS_DENOMINATOR)
    }
}

/// Handle to an off-chain settlement session with the counter-party.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

/// A confirmed settlement on either path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Amount of `token_out` actually received.
    pub amount_out: Amount,
    /// Session update id (off-chain) or transaction hash (on-chain).
    pub reference: String,
}
