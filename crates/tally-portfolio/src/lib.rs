//! tally-portfolio
//!
//! Trade accounting for backtests.
//! - Per-symbol ledgers with FIFO lots and realized P&L
//! - One shared cash account per portfolio (margin-aware buying power)
//! - Target-weight rebalancing, applied sell-before-buy
//! - Raw-fill, closed-trade and daily-balance logs
//! - Pure deterministic logic (no IO, no clock)

mod account;
mod accounting;
mod error;
mod metrics;
mod types;

pub mod daily_balance;
pub mod ledger;
pub mod ordering;
pub mod portfolio;

pub use account::Account;
pub use daily_balance::{tag_trade_states, DailyBalance};
pub use error::ValidationError;
pub use ledger::Ledger;
pub use metrics::{
    compute_equity_micros, compute_leverage, compute_total_funds_micros,
    compute_total_value_micros, EquityMetrics,
};
pub use ordering::{sort_sell_before_buy, WeightDelta};
pub use portfolio::{Holding, Holdings, Portfolio, RebalanceStep, SymbolPerformance, TradeLogs};
pub use types::{
    ClosedTrade, DailyBalanceRecord, Direction, EntryExit, ExitQty, FillOutcome, Lot, RawFill,
    TradeState,
};

use std::collections::BTreeMap;

/// Price/cash scale: micros (1e-6).
pub const MICROS_SCALE: i64 = 1_000_000;

/// Canonical mark map type (symbol -> price_micros).
pub type MarkMap = BTreeMap<String, i64>;

/// Helper to build a MarkMap with minimal boilerplate.
pub fn marks<I, S>(items: I) -> MarkMap
where
    I: IntoIterator<Item = (S, i64)>,
    S: Into<String>,
{
    let mut m = MarkMap::new();
    for (sym, px) in items {
        m.insert(sym.into(), px);
    }
    m
}

/// Micros to a plain decimal value.
pub fn micros_to_f64(micros: i64) -> f64 {
    micros as f64 / MICROS_SCALE as f64
}

/// Decimal value to micros, rounded to the nearest micro and saturating.
pub fn f64_to_micros(value: f64) -> i64 {
    let scaled = (value * MICROS_SCALE as f64).round();
    if scaled.is_nan() {
        0
    } else if scaled >= i64::MAX as f64 {
        i64::MAX
    } else if scaled <= i64::MIN as f64 {
        i64::MIN
    } else {
        scaled as i64
    }
}
