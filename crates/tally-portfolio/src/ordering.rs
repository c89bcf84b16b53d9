//! Ordering policies.
//!
//! Two places need a fixed order for the results to be reproducible:
//!
//! - **Log merge.** Per-symbol logs are concatenated, then raw fills are
//!   sorted by the portfolio-wide `seq_num` and closed trades by
//!   `(entry_date, exit_date)`. The cumulative-total column is recomputed
//!   over the merged closed-trade log.
//! - **Rebalance.** Target-weight changes are applied in ascending order of
//!   `target - current`, so every reduction frees cash before any increase
//!   spends it. Ties keep symbol order.
//!
//! Both sorts are stable.

use crate::accounting::i128_to_i64_clamp;
use crate::types::{ClosedTrade, RawFill};

// ---------------------------------------------------------------------------
// Log merge
// ---------------------------------------------------------------------------

/// Sort raw fills by `seq_num` ascending, in place.
pub fn sort_raw_fills(fills: &mut [RawFill]) {
    fills.sort_by_key(|f| f.seq_num);
}

/// Sort closed trades by `(entry_date, exit_date)` ascending, in place.
pub fn sort_closed_trades(trades: &mut [ClosedTrade]) {
    trades.sort_by_key(|t| (t.entry_date, t.exit_date));
}

/// Overwrite `cumul_total_micros` with the running sum of `pl_cash_micros`.
pub fn recompute_cumul_total(trades: &mut [ClosedTrade]) {
    let mut running: i128 = 0;
    for t in trades.iter_mut() {
        running += t.pl_cash_micros as i128;
        t.cumul_total_micros = i128_to_i64_clamp(running);
    }
}

// ---------------------------------------------------------------------------
// Rebalance order
// ---------------------------------------------------------------------------

/// A pending weight change for one symbol.
#[derive(Clone, Debug, PartialEq)]
pub struct WeightDelta {
    pub symbol: String,
    pub current: f64,
    pub target: f64,
}

impl WeightDelta {
    pub fn delta(&self) -> f64 {
        self.target - self.current
    }
}

/// Sort so the largest reductions come first and increases come last.
pub fn sort_sell_before_buy(deltas: &mut [WeightDelta]) {
    deltas.sort_by(|a, b| {
        a.delta()
            .partial_cmp(&b.delta())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
