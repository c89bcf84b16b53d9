use std::collections::BTreeMap;

use tally_portfolio::{ExitQty, MarkMap, Portfolio, ValidationError};
use tally_stats::StatsError;
use tracing::{debug, info};

use crate::indicator::IndicatorError;
use crate::table::{ColumnRef, PriceTable, Row, TableError};
use crate::types::{BacktestConfig, BacktestReport};

/// Backtest error variants.
#[derive(Clone, Debug, PartialEq)]
pub enum BacktestError {
    Validation(ValidationError),
    Table(TableError),
    Indicator(IndicatorError),
    Stats(StatsError),
    /// The configured date range selects no rows.
    EmptyRange,
    /// A strategy-specific failure.
    Strategy(String),
}

impl From<ValidationError> for BacktestError {
    fn from(e: ValidationError) -> Self {
        BacktestError::Validation(e)
    }
}

impl From<TableError> for BacktestError {
    fn from(e: TableError) -> Self {
        BacktestError::Table(e)
    }
}

impl From<IndicatorError> for BacktestError {
    fn from(e: IndicatorError) -> Self {
        BacktestError::Indicator(e)
    }
}

impl From<StatsError> for BacktestError {
    fn from(e: StatsError) -> Self {
        BacktestError::Stats(e)
    }
}

impl core::fmt::Display for BacktestError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            BacktestError::Validation(e) => write!(f, "validation: {}", e),
            BacktestError::Table(e) => write!(f, "table: {}", e),
            BacktestError::Indicator(e) => write!(f, "indicator: {}", e),
            BacktestError::Stats(e) => write!(f, "stats: {}", e),
            BacktestError::EmptyRange => write!(f, "date range selects no rows"),
            BacktestError::Strategy(msg) => write!(f, "strategy: {}", msg),
        }
    }
}

impl std::error::Error for BacktestError {}

// ---------------------------------------------------------------------------
// Strategy seam
// ---------------------------------------------------------------------------

/// Everything a strategy sees on one row.
pub struct RowContext<'a> {
    row: Row<'a>,
    marks: &'a MarkMap,
    first: usize,
    is_last_row: bool,
    pub portfolio: &'a mut Portfolio,
}

impl<'a> RowContext<'a> {
    pub fn row(&self) -> Row<'a> {
        self.row
    }

    /// Closing prices of every traded symbol on this row.
    pub fn marks(&self) -> &'a MarkMap {
        self.marks
    }

    pub fn is_first_row(&self) -> bool {
        self.row.index() == self.first
    }

    pub fn is_last_row(&self) -> bool {
        self.is_last_row
    }
}

/// Called once per row, in date order, before the day's balance is recorded.
pub trait Strategy {
    fn on_row(&mut self, ctx: &mut RowContext<'_>) -> Result<(), BacktestError>;
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Sequential per-row replay over a [`PriceTable`].
///
/// Each run builds its own [`Portfolio`]; nothing persists between runs.
#[derive(Clone, Debug)]
pub struct BacktestEngine {
    config: BacktestConfig,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Run `strategy` over the configured date range.
    ///
    /// Per row: price map from the close columns, strategy, then the daily
    /// balance at those closes. Logs and statistics are computed at the end.
    pub fn run<S: Strategy + ?Sized>(
        &self,
        table: &PriceTable,
        strategy: &mut S,
    ) -> Result<BacktestReport, BacktestError> {
        let cfg = &self.config;
        let mut portfolio = Portfolio::with_multiplier(
            cfg.symbols.iter().map(String::as_str),
            cfg.capital_micros,
            cfg.margin,
            cfg.multiplier,
        )?;

        let close_cols: Vec<ColumnRef> = cfg
            .symbols
            .iter()
            .map(|s| table.symbol_column(s, "close"))
            .collect::<Result<_, _>>()?;

        let range = table.date_range(cfg.start, cfg.end);
        if range.is_empty() {
            return Err(BacktestError::EmptyRange);
        }
        let first = range.start;
        let last = range.end - 1;
        info!(
            symbols = cfg.symbols.len(),
            rows = range.len(),
            "backtest start"
        );

        for i in range {
            let Some(row) = table.row(i) else {
                break;
            };
            let marks = row.marks(&close_cols)?;
            let mut ctx = RowContext {
                row,
                marks: &marks,
                is_last_row: i == last,
                first,
                portfolio: &mut portfolio,
            };
            strategy.on_row(&mut ctx)?;
            portfolio.record_daily_balance(row.date(), &marks)?;
        }

        let logs = portfolio.get_logs();
        let stats = tally_stats::compute(&logs.daily, &logs.trades, cfg.capital_micros, cfg.risk_free)?;
        info!(
            trades = logs.trades.len(),
            ending_balance = stats.ending_balance,
            "backtest finish"
        );
        Ok(BacktestReport { logs, stats })
    }
}

// ---------------------------------------------------------------------------
// Benchmark
// ---------------------------------------------------------------------------

/// Equal-weight every symbol on the first row; liquidate on the last.
#[derive(Clone, Debug, Default)]
pub struct BuyAndHold;

impl Strategy for BuyAndHold {
    fn on_row(&mut self, ctx: &mut RowContext<'_>) -> Result<(), BacktestError> {
        let date = ctx.row().date();
        let marks = ctx.marks();

        if ctx.is_first_row() {
            let symbols: Vec<String> = ctx.portfolio.symbols().map(str::to_string).collect();
            if !symbols.is_empty() {
                let w = 1.0 / symbols.len() as f64;
                let weights: BTreeMap<String, f64> =
                    symbols.into_iter().map(|s| (s, w)).collect();
                let steps = ctx
                    .portfolio
                    .adjust_percents(date, marks, &weights, &BTreeMap::new())?;
                debug!(date = %date, steps = steps.len(), "buy and hold entry");
            }
        }

        if ctx.is_last_row() {
            let held: Vec<String> = ctx
                .portfolio
                .positions()
                .into_iter()
                .map(str::to_string)
                .collect();
            for symbol in held {
                ctx.portfolio.exit_trade(date, marks, &symbol, ExitQty::All)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tally_portfolio::{Direction, TradeState, MICROS_SCALE};

    const M: i64 = MICROS_SCALE;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn table() -> PriceTable {
        let mut t = PriceTable::new(vec![d(2), d(3), d(4), d(5)]).unwrap();
        t.insert_symbol_column("SPY", "close", vec![50.0, 45.0, 55.0, 60.0])
            .unwrap();
        t
    }

    #[test]
    fn buy_and_hold_round_trip() {
        let engine = BacktestEngine::new(BacktestConfig::test_defaults());
        let report = engine.run(&table(), &mut BuyAndHold).unwrap();

        assert_eq!(report.logs.raw.len(), 2);
        assert_eq!(report.logs.trades.len(), 1);
        assert_eq!(report.logs.trades[0].qty, 200);
        assert_eq!(report.logs.trades[0].pl_cash_micros, 2_000 * M);
        assert_eq!(report.logs.daily.len(), 4);
        assert_eq!(report.logs.daily[0].state, TradeState::Open);
        assert_eq!(report.logs.daily[3].state, TradeState::Close);
        assert_eq!(report.stats.ending_balance, 12_000.0);
    }

    #[test]
    fn date_range_limits_rows() {
        let mut cfg = BacktestConfig::test_defaults();
        cfg.start = Some(d(3));
        cfg.end = Some(d(4));
        let report = BacktestEngine::new(cfg).run(&table(), &mut BuyAndHold).unwrap();
        assert_eq!(report.logs.daily.len(), 2);
        assert_eq!(report.logs.daily[0].date, d(3));
        // 10,000 / 45 = 222 shares, out at 55
        assert_eq!(report.logs.trades[0].qty, 222);
    }

    #[test]
    fn empty_range_is_an_error() {
        let mut cfg = BacktestConfig::test_defaults();
        cfg.start = Some(d(20));
        assert_eq!(
            BacktestEngine::new(cfg).run(&table(), &mut BuyAndHold),
            Err(BacktestError::EmptyRange)
        );
    }

    #[test]
    fn missing_close_column_is_an_error() {
        let cfg = BacktestConfig::cash_account(["QQQ"], 10_000 * M);
        let err = BacktestEngine::new(cfg)
            .run(&table(), &mut BuyAndHold)
            .unwrap_err();
        assert_eq!(
            err,
            BacktestError::Table(TableError::MissingColumn("QQQ_close".to_string()))
        );
    }

    struct ShortOnce;

    impl Strategy for ShortOnce {
        fn on_row(&mut self, ctx: &mut RowContext<'_>) -> Result<(), BacktestError> {
            let date = ctx.row().date();
            let marks = ctx.marks();
            if ctx.is_first_row() {
                ctx.portfolio
                    .enter_trade(date, marks, "SPY", Some(10), Direction::Short)?;
            }
            if ctx.is_last_row() {
                ctx.portfolio.exit_trade(date, marks, "SPY", ExitQty::All)?;
            }
            Ok(())
        }
    }

    #[test]
    fn strategies_drive_the_portfolio() {
        let engine = BacktestEngine::new(BacktestConfig::test_defaults());
        let report = engine.run(&table(), &mut ShortOnce).unwrap();
        assert_eq!(report.logs.trades[0].direction, Direction::Short);
        // short 10 @ 50, cover @ 60
        assert_eq!(report.logs.trades[0].pl_cash_micros, -100 * M);
    }
}
