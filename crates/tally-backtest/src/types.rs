use chrono::NaiveDate;
use tally_portfolio::{TradeLogs, MICROS_SCALE};
use tally_stats::Statistics;

/// Backtest configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct BacktestConfig {
    /// Symbols the portfolio trades; each needs a `<SYMBOL>_close` column.
    pub symbols: Vec<String>,

    /// Initial cash balance in micros.
    pub capital_micros: i64,

    /// Buying-power multiple of cash; 1.0 is a cash account.
    pub margin: f64,

    /// Contract multiplier applied to every symbol.
    pub multiplier: i64,

    /// Annual risk-free rate for Sharpe/Sortino.
    pub risk_free: f64,

    /// First simulated date (inclusive); `None` starts at the first row.
    pub start: Option<NaiveDate>,

    /// Last simulated date (inclusive); `None` runs to the last row.
    pub end: Option<NaiveDate>,
}

impl BacktestConfig {
    /// Cash account over `symbols` with the given capital.
    pub fn cash_account<I, S>(symbols: I, capital_micros: i64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            symbols: symbols.into_iter().map(Into::into).collect(),
            capital_micros,
            margin: 1.0,
            multiplier: 1,
            risk_free: 0.0,
            start: None,
            end: None,
        }
    }

    /// Reasonable defaults for testing.
    pub fn test_defaults() -> Self {
        Self::cash_account(["SPY"], 10_000 * MICROS_SCALE)
    }
}

/// Backtest report produced after a run.
#[derive(Clone, Debug, PartialEq)]
pub struct BacktestReport {
    /// Raw-fill, closed-trade and daily-balance logs.
    pub logs: TradeLogs,
    /// Statistics over the logs.
    pub stats: Statistics,
}
