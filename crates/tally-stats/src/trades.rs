use chrono::NaiveDate;
use tally_portfolio::{micros_to_f64, ClosedTrade};

use crate::ratios::mean;

/// Cap used for ratios whose denominator is zero (no losing trades).
pub const NO_LOSS_SENTINEL: f64 = 1000.0;

// ============================================================================
// Streaks
// ============================================================================

/// Length of the longest run of consecutive `value`s.
pub fn longest_run<I>(flags: I, value: bool) -> usize
where
    I: IntoIterator<Item = bool>,
{
    let mut best = 0usize;
    let mut current = 0usize;
    for flag in flags {
        if flag == value {
            current += 1;
            best = best.max(current);
        } else {
            current = 0;
        }
    }
    best
}

// ============================================================================
// Bars held
// ============================================================================

/// Rows of `dates` (sorted ascending) between entry and exit, inclusive.
pub fn trade_bars(dates: &[NaiveDate], entry: NaiveDate, exit: NaiveDate) -> usize {
    let lo = dates.partition_point(|d| *d < entry);
    let hi = dates.partition_point(|d| *d <= exit);
    hi.saturating_sub(lo)
}

// ============================================================================
// Trade-level metrics
// ============================================================================

/// Everything derivable from the closed-trade log alone (plus the bar index
/// for holding periods). Cash values are in currency units, not micros.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TradeMetrics {
    pub total_net_profit: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub profit_factor: f64,

    pub total_num_trades: usize,
    pub num_winning_trades: usize,
    pub num_losing_trades: usize,
    pub num_even_trades: usize,
    pub pct_profitable_trades: f64,

    pub avg_profit_per_trade: f64,
    pub avg_profit_per_winning_trade: f64,
    pub avg_loss_per_losing_trade: f64,
    pub ratio_avg_profit_win_loss: f64,
    pub largest_profit_winning_trade: f64,
    pub largest_loss_losing_trade: f64,

    pub num_winning_points: f64,
    pub num_losing_points: f64,
    pub total_net_points: f64,
    pub avg_points: f64,
    pub largest_points_winning_trade: f64,
    pub largest_points_losing_trade: f64,
    pub avg_pct_gain_per_trade: f64,
    pub largest_pct_winning_trade: f64,
    pub largest_pct_losing_trade: f64,

    pub max_consecutive_winning_trades: usize,
    pub max_consecutive_losing_trades: usize,
    pub avg_bars_winning_trades: f64,
    pub avg_bars_losing_trades: f64,
    /// Σ bars over every trade.
    pub total_bars_in_market: usize,
}

impl TradeMetrics {
    pub fn compute(trades: &[ClosedTrade], dates: &[NaiveDate]) -> Self {
        let cash: Vec<f64> = trades.iter().map(|t| micros_to_f64(t.pl_cash_micros)).collect();
        let points: Vec<f64> = trades
            .iter()
            .map(|t| micros_to_f64(t.pl_points_micros))
            .collect();
        let pct: Vec<f64> = trades
            .iter()
            .map(|t| {
                if t.entry_price_micros == 0 {
                    0.0
                } else {
                    t.pl_points_micros as f64 / t.entry_price_micros as f64
                }
            })
            .collect();

        let wins: Vec<f64> = cash.iter().copied().filter(|&c| c > 0.0).collect();
        let losses: Vec<f64> = cash.iter().copied().filter(|&c| c < 0.0).collect();

        let n = trades.len();
        let n_win = wins.len();
        let n_loss = losses.len();
        let n_even = cash.iter().filter(|&&c| c == 0.0).count();

        let total_net_profit: f64 = cash.iter().sum();
        let gross_profit: f64 = wins.iter().sum();
        let gross_loss: f64 = losses.iter().sum();

        let avg_win = if n_win == 0 { 0.0 } else { gross_profit / n_win as f64 };
        let avg_loss = if n_loss == 0 { 0.0 } else { gross_loss / n_loss as f64 };

        let mut m = TradeMetrics {
            total_net_profit,
            gross_profit,
            gross_loss,
            profit_factor: capped_ratio(gross_profit, gross_loss),
            total_num_trades: n,
            num_winning_trades: n_win,
            num_losing_trades: n_loss,
            num_even_trades: n_even,
            pct_profitable_trades: if n == 0 { 0.0 } else { n_win as f64 / n as f64 * 100.0 },
            avg_profit_per_trade: if n == 0 { 0.0 } else { total_net_profit / n as f64 },
            avg_profit_per_winning_trade: avg_win,
            avg_loss_per_losing_trade: avg_loss,
            ratio_avg_profit_win_loss: capped_ratio(avg_win, avg_loss),
            largest_profit_winning_trade: max_or_zero(&wins),
            largest_loss_losing_trade: min_or_zero(&losses),
            avg_points: mean(&points),
            avg_pct_gain_per_trade: mean(&pct) * 100.0,
            ..Default::default()
        };

        if n_win > 0 {
            let win_points: Vec<f64> = points.iter().copied().filter(|&p| p > 0.0).collect();
            let win_pct: Vec<f64> = pct.iter().copied().filter(|&p| p > 0.0).collect();
            m.num_winning_points = win_points.iter().sum();
            m.largest_points_winning_trade = max_or_zero(&win_points);
            m.largest_pct_winning_trade = max_or_zero(&win_pct) * 100.0;
            m.max_consecutive_winning_trades = longest_run(cash.iter().map(|&c| c > 0.0), true);
        }
        if n_loss > 0 {
            let loss_points: Vec<f64> = points.iter().copied().filter(|&p| p < 0.0).collect();
            let loss_pct: Vec<f64> = pct.iter().copied().filter(|&p| p < 0.0).collect();
            m.num_losing_points = loss_points.iter().sum();
            m.largest_points_losing_trade = min_or_zero(&loss_points);
            m.largest_pct_losing_trade = min_or_zero(&loss_pct) * 100.0;
            m.max_consecutive_losing_trades = longest_run(cash.iter().map(|&c| c > 0.0), false);
        }
        m.total_net_points = m.num_winning_points + m.num_losing_points;

        let bars: Vec<(f64, usize)> = trades
            .iter()
            .zip(&cash)
            .map(|(t, &c)| (c, trade_bars(dates, t.entry_date, t.exit_date)))
            .collect();
        m.total_bars_in_market = bars.iter().map(|&(_, b)| b).sum();
        m.avg_bars_winning_trades = mean_bars(&bars, |c| c > 0.0);
        m.avg_bars_losing_trades = mean_bars(&bars, |c| c < 0.0);
        m
    }
}

/// `num / den * -1` for a positive numerator over a negative denominator.
///
/// 0 when the numerator is 0; the sentinel when the denominator is 0.
fn capped_ratio(num: f64, den: f64) -> f64 {
    if num == 0.0 {
        0.0
    } else if den == 0.0 {
        NO_LOSS_SENTINEL
    } else {
        num / den * -1.0
    }
}

fn max_or_zero(xs: &[f64]) -> f64 {
    xs.iter().copied().fold(None, |acc: Option<f64>, x| Some(acc.map_or(x, |a| a.max(x))))
        .unwrap_or(0.0)
}

fn min_or_zero(xs: &[f64]) -> f64 {
    xs.iter().copied().fold(None, |acc: Option<f64>, x| Some(acc.map_or(x, |a| a.min(x))))
        .unwrap_or(0.0)
}

fn mean_bars(bars: &[(f64, usize)], keep: impl Fn(f64) -> bool) -> f64 {
    let picked: Vec<f64> = bars
        .iter()
        .filter(|(c, _)| keep(*c))
        .map(|&(_, b)| b as f64)
        .collect();
    mean(&picked)
}

// ============================================================================
// Tests
// ============================================================================
