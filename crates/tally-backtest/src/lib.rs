//! tally-backtest
//!
//! Row-by-row replay of a strategy over a date-indexed price table.
//!
//! Pipeline per row: ROW -> MARKS -> STRATEGY -> PORTFOLIO -> DAILY BALANCE
//!
//! - Price table with columns resolved once (`ColumnRef`), no name lookups per row
//! - Per-symbol indicators (momentum, volatility, SMA crossover regime)
//! - Deterministic replay (same table + config => identical logs and stats)
//! - Parallel parameter sweeps over isolated portfolios

mod engine;
pub mod indicator;
pub mod loader;
pub mod sweep;
pub mod table;
pub mod types;

pub use engine::{BacktestEngine, BacktestError, BuyAndHold, RowContext, Strategy};
pub use indicator::{Crossover, Indicator, IndicatorError, Momentum, Sma, TimeFrame, Volatility};
pub use loader::{load_csv_file, parse_csv_bars, LoadError};
pub use sweep::{run_sweep, SweepResult};
pub use table::{symbol_column_name, ColumnRef, PriceTable, Row, TableError};
pub use types::{BacktestConfig, BacktestReport};
