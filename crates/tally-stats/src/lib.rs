//! Performance statistics over a finished run's logs.
//!
//! Input is the daily balance and the closed-trade log produced by
//! `tally-portfolio`; output is a flat [`Statistics`] record.
//!
//! # Determinism
//! Every function is pure over its inputs. Ties (first minimum, first peak,
//! first recovery) resolve to the earliest row.

pub mod drawdown;
mod kelly;
pub mod ratios;
mod stats;
pub mod trades;

pub use drawdown::{
    max_closed_out_drawdown, max_intra_day_drawdown, rolling_max_drawdown, rolling_max_runup,
    Drawdown, Recovery,
};
pub use kelly::{kelly_criterion, KellyCriterion};
pub use ratios::{
    daily_returns, pct_change, sharpe_ratio, sharpe_with_bounds, sortino_ratio, SharpeBounds,
};
pub use stats::{
    annual_return_rate, compute, trading_period, years_between, Statistics, StatsError,
    TRADING_DAYS_PER_MONTH, TRADING_DAYS_PER_WEEK, TRADING_DAYS_PER_YEAR,
};
pub use trades::{longest_run, trade_bars, TradeMetrics, NO_LOSS_SENTINEL};
