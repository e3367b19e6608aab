use serde::{Deserialize, Serialize};

use crate::ledger::types::{Bps, Points};

/// Settlement arithmetic for one room.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrizeBreakdown {
    pub gross_pool: Points,
    pub commission: Points,
    pub net_prize: Points,
}

/// Pure settlement function: stake schedule to winner payout. Every display
/// surface (pre-game estimate, post-win confirmation, claim flow) must go
/// through this one function so the figures can never diverge.
pub fn compute_prize(entry_fee: Points, max_players: u16, commission_rate_bps: Bps) -> PrizeBreakdown {
    let gross_pool = entry_fee * Points::from(max_players);
    // Single floor; the widened intermediate keeps large pools exact.
    let commission = (u128::from(gross_pool) * u128::from(commission_rate_bps) / 10_000) as Points;
    PrizeBreakdown {
        gross_pool,
        commission,
        net_prize: gross_pool - commission,
    }
}
