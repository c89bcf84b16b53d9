use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;
use tally_portfolio::{micros_to_f64, ClosedTrade, DailyBalanceRecord};
use tracing::warn;

use crate::drawdown::{
    max_closed_out_drawdown, max_intra_day_drawdown, rolling_max_drawdown, rolling_max_runup,
    Recovery,
};
use crate::ratios::{daily_returns, mean, pct_change, sharpe_with_bounds, sortino_ratio, std_sample};
use crate::trades::TradeMetrics;

pub const TRADING_DAYS_PER_YEAR: usize = 252;
pub const TRADING_DAYS_PER_MONTH: usize = 20;
pub const TRADING_DAYS_PER_WEEK: usize = 5;

const DAYS_PER_YEAR: f64 = 365.2425;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatsError {
    /// At least one daily-balance row is needed for start/end and balances.
    EmptyDailyBalance,
}

impl std::fmt::Display for StatsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyDailyBalance => write!(f, "statistics need at least one daily balance row"),
        }
    }
}

impl std::error::Error for StatsError {}

// ============================================================================
// Record
// ============================================================================

/// The full statistics record of one run.
///
/// Cash values are in currency units; percentages are in percent (10.0 = 10%).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Statistics {
    // overall
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub beginning_balance: f64,
    pub ending_balance: f64,
    pub total_net_profit: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub profit_factor: f64,
    pub return_on_initial_capital: f64,
    pub annual_return_rate: f64,
    pub trading_period: String,
    pub pct_time_in_market: f64,

    // sums
    pub total_num_trades: usize,
    pub trades_per_year: f64,
    pub num_winning_trades: usize,
    pub num_losing_trades: usize,
    pub num_even_trades: usize,
    pub pct_profitable_trades: f64,

    // cash profits and losses
    pub avg_profit_per_trade: f64,
    pub avg_profit_per_winning_trade: f64,
    pub avg_loss_per_losing_trade: f64,
    pub ratio_avg_profit_win_loss: f64,
    pub largest_profit_winning_trade: f64,
    pub largest_loss_losing_trade: f64,

    // points
    pub num_winning_points: f64,
    pub num_losing_points: f64,
    pub total_net_points: f64,
    pub avg_points: f64,
    pub largest_points_winning_trade: f64,
    pub largest_points_losing_trade: f64,
    pub avg_pct_gain_per_trade: f64,
    pub largest_pct_winning_trade: f64,
    pub largest_pct_losing_trade: f64,

    // streaks
    pub max_consecutive_winning_trades: usize,
    pub max_consecutive_losing_trades: usize,
    pub avg_bars_winning_trades: f64,
    pub avg_bars_losing_trades: f64,

    // drawdown
    pub max_closed_out_drawdown: f64,
    pub max_closed_out_drawdown_peak: f64,
    pub max_closed_out_drawdown_trough: f64,
    pub max_closed_out_drawdown_start_date: NaiveDate,
    pub max_closed_out_drawdown_end_date: NaiveDate,
    pub max_closed_out_drawdown_recovery_date: Recovery,
    pub drawdown_recovery: f64,
    pub drawdown_annualized_return: f64,
    pub max_intra_day_drawdown: f64,
    pub avg_yearly_closed_out_drawdown: f64,
    pub max_yearly_closed_out_drawdown: f64,
    pub avg_monthly_closed_out_drawdown: f64,
    pub max_monthly_closed_out_drawdown: f64,
    pub avg_weekly_closed_out_drawdown: f64,
    pub max_weekly_closed_out_drawdown: f64,

    // runup
    pub avg_yearly_closed_out_runup: f64,
    pub max_yearly_closed_out_runup: f64,
    pub avg_monthly_closed_out_runup: f64,
    pub max_monthly_closed_out_runup: f64,
    pub avg_weekly_closed_out_runup: f64,
    pub max_weekly_closed_out_runup: f64,

    // percent change
    pub pct_profitable_years: f64,
    pub best_year: f64,
    pub worst_year: f64,
    pub avg_year: f64,
    pub annual_std: f64,
    pub pct_profitable_months: f64,
    pub best_month: f64,
    pub worst_month: f64,
    pub avg_month: f64,
    pub monthly_std: f64,
    pub pct_profitable_weeks: f64,
    pub best_week: f64,
    pub worst_week: f64,
    pub avg_week: f64,
    pub weekly_std: f64,

    // ratios
    pub sharpe_ratio: f64,
    pub sharpe_ratio_max: f64,
    pub sharpe_ratio_min: f64,
    pub sortino_ratio: f64,
    pub annualized_return_over_max_drawdown: f64,
}

// ============================================================================
// Computation
// ============================================================================

/// Compute the record from a finished run's logs.
///
/// `daily` supplies the date index, the equity curve and the start/end dates;
/// `trades` supplies every trade-level figure.
pub fn compute(
    daily: &[DailyBalanceRecord],
    trades: &[ClosedTrade],
    capital_micros: i64,
    risk_free: f64,
) -> Result<Statistics, StatsError> {
    let (first, last) = match (daily.first(), daily.last()) {
        (Some(f), Some(l)) => (f, l),
        _ => return Err(StatsError::EmptyDailyBalance),
    };

    let dates: Vec<NaiveDate> = daily.iter().map(|r| r.date).collect();
    let close: Vec<f64> = daily.iter().map(|r| micros_to_f64(r.close_micros)).collect();
    let high: Vec<f64> = daily.iter().map(|r| micros_to_f64(r.high_micros)).collect();
    let low: Vec<f64> = daily.iter().map(|r| micros_to_f64(r.low_micros)).collect();

    let start = first.date;
    let end = last.date;
    let capital = micros_to_f64(capital_micros);
    let ending_balance = micros_to_f64(last.close_micros);
    let years = years_between(start, end);
    let cagr = annual_return_rate(ending_balance, capital, years);

    let tm = TradeMetrics::compute(trades, &dates);

    // Both series are non-empty here, so the drawdowns exist.
    let dd = max_closed_out_drawdown(&dates, &close).ok_or(StatsError::EmptyDailyBalance)?;
    let intra = max_intra_day_drawdown(&dates, &high, &low).ok_or(StatsError::EmptyDailyBalance)?;

    let (avg_yearly_dd, max_yearly_dd) = avg_min(&rolling_max_drawdown(&close, TRADING_DAYS_PER_YEAR));
    let (avg_monthly_dd, max_monthly_dd) =
        avg_min(&rolling_max_drawdown(&close, TRADING_DAYS_PER_MONTH));
    let (avg_weekly_dd, max_weekly_dd) = avg_min(&rolling_max_drawdown(&close, TRADING_DAYS_PER_WEEK));

    let (avg_yearly_ru, max_yearly_ru) = avg_max(&rolling_max_runup(&close, TRADING_DAYS_PER_YEAR));
    let (avg_monthly_ru, max_monthly_ru) = avg_max(&rolling_max_runup(&close, TRADING_DAYS_PER_MONTH));
    let (avg_weekly_ru, max_weekly_ru) = avg_max(&rolling_max_runup(&close, TRADING_DAYS_PER_WEEK));

    let yearly = PeriodChange::compute(&close, TRADING_DAYS_PER_YEAR);
    let monthly = PeriodChange::compute(&close, TRADING_DAYS_PER_MONTH);
    let weekly = PeriodChange::compute(&close, TRADING_DAYS_PER_WEEK);

    let rets = daily_returns(&close);
    let period = TRADING_DAYS_PER_YEAR as f64;
    let sharpe = sharpe_with_bounds(&rets, risk_free, period);
    let sortino = sortino_ratio(&rets, risk_free, period);

    if rets.is_empty() {
        warn!(rows = daily.len(), "single-row daily balance: ratios default to 0");
    }

    Ok(Statistics {
        start,
        end,
        beginning_balance: capital,
        ending_balance,
        total_net_profit: tm.total_net_profit,
        gross_profit: tm.gross_profit,
        gross_loss: tm.gross_loss,
        profit_factor: tm.profit_factor,
        return_on_initial_capital: if capital == 0.0 {
            0.0
        } else {
            tm.total_net_profit / capital * 100.0
        },
        annual_return_rate: cagr,
        trading_period: trading_period(start, end),
        pct_time_in_market: tm.total_bars_in_market as f64 / daily.len() as f64 * 100.0,

        total_num_trades: tm.total_num_trades,
        trades_per_year: if years > 0.0 {
            tm.total_num_trades as f64 / years
        } else {
            0.0
        },
        num_winning_trades: tm.num_winning_trades,
        num_losing_trades: tm.num_losing_trades,
        num_even_trades: tm.num_even_trades,
        pct_profitable_trades: tm.pct_profitable_trades,

        avg_profit_per_trade: tm.avg_profit_per_trade,
        avg_profit_per_winning_trade: tm.avg_profit_per_winning_trade,
        avg_loss_per_losing_trade: tm.avg_loss_per_losing_trade,
        ratio_avg_profit_win_loss: tm.ratio_avg_profit_win_loss,
        largest_profit_winning_trade: tm.largest_profit_winning_trade,
        largest_loss_losing_trade: tm.largest_loss_losing_trade,

        num_winning_points: tm.num_winning_points,
        num_losing_points: tm.num_losing_points,
        total_net_points: tm.total_net_points,
        avg_points: tm.avg_points,
        largest_points_winning_trade: tm.largest_points_winning_trade,
        largest_points_losing_trade: tm.largest_points_losing_trade,
        avg_pct_gain_per_trade: tm.avg_pct_gain_per_trade,
        largest_pct_winning_trade: tm.largest_pct_winning_trade,
        largest_pct_losing_trade: tm.largest_pct_losing_trade,

        max_consecutive_winning_trades: tm.max_consecutive_winning_trades,
        max_consecutive_losing_trades: tm.max_consecutive_losing_trades,
        avg_bars_winning_trades: tm.avg_bars_winning_trades,
        avg_bars_losing_trades: tm.avg_bars_losing_trades,

        max_closed_out_drawdown: dd.max_pct,
        max_closed_out_drawdown_peak: dd.peak,
        max_closed_out_drawdown_trough: dd.trough,
        max_closed_out_drawdown_start_date: dd.start_date,
        max_closed_out_drawdown_end_date: dd.end_date,
        max_closed_out_drawdown_recovery_date: dd.recovery,
        drawdown_recovery: -years_between(dd.start_date, dd.end_date),
        drawdown_annualized_return: if cagr == 0.0 { 0.0 } else { dd.max_pct / cagr },
        max_intra_day_drawdown: intra.max_pct,
        avg_yearly_closed_out_drawdown: avg_yearly_dd,
        max_yearly_closed_out_drawdown: max_yearly_dd,
        avg_monthly_closed_out_drawdown: avg_monthly_dd,
        max_monthly_closed_out_drawdown: max_monthly_dd,
        avg_weekly_closed_out_drawdown: avg_weekly_dd,
        max_weekly_closed_out_drawdown: max_weekly_dd,

        avg_yearly_closed_out_runup: avg_yearly_ru,
        max_yearly_closed_out_runup: max_yearly_ru,
        avg_monthly_closed_out_runup: avg_monthly_ru,
        max_monthly_closed_out_runup: max_monthly_ru,
        avg_weekly_closed_out_runup: avg_weekly_ru,
        max_weekly_closed_out_runup: max_weekly_ru,

        pct_profitable_years: yearly.pct_profitable,
        best_year: yearly.best,
        worst_year: yearly.worst,
        avg_year: yearly.avg,
        annual_std: yearly.std,
        pct_profitable_months: monthly.pct_profitable,
        best_month: monthly.best,
        worst_month: monthly.worst,
        avg_month: monthly.avg,
        monthly_std: monthly.std,
        pct_profitable_weeks: weekly.pct_profitable,
        best_week: weekly.best,
        worst_week: weekly.worst,
        avg_week: weekly.avg,
        weekly_std: weekly.std,

        sharpe_ratio: sharpe.ratio,
        sharpe_ratio_max: sharpe.max,
        sharpe_ratio_min: sharpe.min,
        sortino_ratio: sortino,
        annualized_return_over_max_drawdown: if dd.max_pct == 0.0 {
            0.0
        } else {
            (cagr / dd.max_pct).abs()
        },
    })
}

impl Statistics {
    /// `(name, rendered value)` pairs sorted by name, for key=value output.
    pub fn to_pairs(&self) -> Result<Vec<(String, String)>, serde_json::Error> {
        // serde_json's default map is ordered by key.
        let map = match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => map,
            _ => return Ok(Vec::new()),
        };
        Ok(map
            .into_iter()
            .map(|(k, v)| {
                let rendered = match v {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                (k, rendered)
            })
            .collect())
    }
}

// ============================================================================
// Helpers
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq)]
struct PeriodChange {
    pct_profitable: f64,
    best: f64,
    worst: f64,
    avg: f64,
    std: f64,
}

impl PeriodChange {
    fn compute(close: &[f64], period: usize) -> Self {
        let pc = pct_change(close, period);
        if pc.is_empty() {
            return Self::default();
        }
        let up = pc.iter().filter(|&&x| x > 0.0).count();
        Self {
            pct_profitable: up as f64 / pc.len() as f64 * 100.0,
            best: pc.iter().copied().fold(f64::MIN, f64::max),
            worst: pc.iter().copied().fold(f64::MAX, f64::min),
            avg: mean(&pc),
            std: std_sample(&pc),
        }
    }
}

fn avg_min(xs: &[f64]) -> (f64, f64) {
    if xs.is_empty() {
        return (0.0, 0.0);
    }
    (mean(xs), xs.iter().copied().fold(f64::MAX, f64::min))
}

fn avg_max(xs: &[f64]) -> (f64, f64) {
    if xs.is_empty() {
        return (0.0, 0.0);
    }
    (mean(xs), xs.iter().copied().fold(f64::MIN, f64::max))
}

/// Calendar days between two dates in years of 365.2425 days.
pub fn years_between(start: NaiveDate, end: NaiveDate) -> f64 {
    (end - start).num_days() as f64 / DAYS_PER_YEAR
}

/// Compound annual growth rate in percent; 0 for a zero-length period or a
/// non-positive balance.
pub fn annual_return_rate(ending_balance: f64, capital: f64, years: f64) -> f64 {
    if years <= 0.0 || capital <= 0.0 || ending_balance <= 0.0 {
        return 0.0;
    }
    ((ending_balance / capital).powf(1.0 / years) - 1.0) * 100.0
}

/// `"X years Y months Z days"`, counting whole calendar months.
pub fn trading_period(start: NaiveDate, end: NaiveDate) -> String {
    if end <= start {
        return "0 years 0 months 0 days".to_string();
    }
    let mut months = (end.year() - start.year()) * 12 + end.month() as i32 - start.month() as i32;
    let anchor = |m: i32| start.checked_add_months(Months::new(m.max(0) as u32));
    let mut base = anchor(months).unwrap_or(start);
    if base > end {
        months -= 1;
        base = anchor(months).unwrap_or(start);
    }
    let days = (end - base).num_days();
    format!("{} years {} months {} days", months / 12, months % 12, days)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tally_portfolio::{Direction, TradeState, MICROS_SCALE};

    const M: i64 = MICROS_SCALE;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn row(date: NaiveDate, close: i64) -> DailyBalanceRecord {
        DailyBalanceRecord {
            date,
            high_micros: close * M,
            low_micros: close * M,
            close_micros: close * M,
            shares: 0,
            cash_micros: close * M,
            leverage: 1.0,
            state: TradeState::Hold,
        }
    }

    #[test]
    fn trading_period_counts_calendar_units() {
        assert_eq!(
            trading_period(d(2020, 1, 15), d(2022, 3, 20)),
            "2 years 2 months 5 days"
        );
        assert_eq!(
            trading_period(d(2020, 1, 31), d(2020, 3, 1)),
            "0 years 1 months 1 days"
        );
        assert_eq!(trading_period(d(2020, 1, 1), d(2020, 1, 1)), "0 years 0 months 0 days");
    }

    #[test]
    fn cagr_doubles_in_one_year() {
        let years = 365.2425 / DAYS_PER_YEAR;
        assert!((annual_return_rate(20_000.0, 10_000.0, years) - 100.0).abs() < 1e-9);
        assert_eq!(annual_return_rate(20_000.0, 10_000.0, 0.0), 0.0);
    }

    #[test]
    fn empty_daily_balance_rejected() {
        assert_eq!(
            compute(&[], &[], 10_000 * M, 0.0),
            Err(StatsError::EmptyDailyBalance)
        );
    }

    #[test]
    fn single_row_is_degenerate_but_defined() {
        let s = compute(&[row(d(2020, 1, 2), 10_000)], &[], 10_000 * M, 0.0).unwrap();
        assert_eq!(s.total_num_trades, 0);
        assert_eq!(s.annual_return_rate, 0.0);
        assert_eq!(s.sharpe_ratio, 0.0);
        assert_eq!(s.max_closed_out_drawdown, 0.0);
        assert_eq!(s.drawdown_annualized_return, 0.0);
        assert_eq!(s.best_year, 0.0);
    }

    #[test]
    fn one_trade_run() {
        let daily = vec![
            row(d(2020, 1, 2), 10_000),
            row(d(2020, 1, 3), 9_000),
            row(d(2020, 1, 6), 11_000),
        ];
        let trades = vec![ClosedTrade {
            entry_date: d(2020, 1, 2),
            entry_price_micros: 50 * M,
            exit_date: d(2020, 1, 6),
            exit_price_micros: 55 * M,
            pl_points_micros: 5 * M,
            pl_cash_micros: 1_000 * M,
            qty: 200,
            cumul_total_micros: 1_000 * M,
            direction: Direction::Long,
            symbol: "SPY".to_string(),
        }];
        let s = compute(&daily, &trades, 10_000 * M, 0.0).unwrap();

        assert_eq!(s.ending_balance, 11_000.0);
        assert_eq!(s.total_net_profit, 1_000.0);
        assert!((s.return_on_initial_capital - 10.0).abs() < 1e-9);
        assert_eq!(s.pct_time_in_market, 100.0);
        assert_eq!(s.avg_bars_winning_trades, 3.0);
        assert!((s.max_closed_out_drawdown - (-10.0)).abs() < 1e-9);
        assert_eq!(s.max_closed_out_drawdown_end_date, d(2020, 1, 3));
        assert_eq!(
            s.max_closed_out_drawdown_recovery_date,
            Recovery::Recovered(d(2020, 1, 6))
        );
        assert!(s.annual_return_rate > 0.0);
        assert!(s.drawdown_annualized_return < 0.0);

        let pairs = s.to_pairs().unwrap();
        let names: Vec<&str> = pairs.iter().map(|(k, _)| k.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
        assert!(names.contains(&"ending_balance"));
        assert!(pairs
            .iter()
            .any(|(k, v)| k == "max_closed_out_drawdown_recovery_date" && v == "2020-01-06"));
    }
}
