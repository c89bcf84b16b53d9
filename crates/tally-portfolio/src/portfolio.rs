//! Multi-symbol portfolio over one shared cash account.
//!
//! The [`Portfolio`] owns one [`Account`] and one [`Ledger`] per symbol
//! (`BTreeMap`, so iteration order is symbol order). Every valuation takes a
//! [`MarkMap`] of the day's prices; a held symbol without a price is an
//! error rather than a silent zero.
//!
//! Rebalancing to target weights resolves into per-symbol adjust calls
//! applied sell-before-buy (see [`ordering`](crate::ordering)).

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::{
    accounting::scale_micros,
    account::Account,
    daily_balance::DailyBalance,
    error::ValidationError,
    ledger::{check_weight, target_shares, Ledger},
    metrics::EquityMetrics,
    ordering::{
        recompute_cumul_total, sort_closed_trades, sort_raw_fills, sort_sell_before_buy,
        WeightDelta,
    },
    types::{ClosedTrade, DailyBalanceRecord, Direction, ExitQty, FillOutcome, RawFill},
    MarkMap,
};

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// The three finished logs of a run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TradeLogs {
    /// Every enter/exit, ordered by `seq_num`.
    pub raw: Vec<RawFill>,
    /// Every closed lot, ordered by `(entry_date, exit_date)`.
    pub trades: Vec<ClosedTrade>,
    /// One row per recorded day, trade-state tagged.
    pub daily: Vec<DailyBalanceRecord>,
}

/// One symbol's adjustment inside an [`Portfolio::adjust_percents`] pass.
#[derive(Clone, Debug, PartialEq)]
pub struct RebalanceStep {
    pub symbol: String,
    pub current_weight: f64,
    pub target_weight: f64,
    pub outcome: FillOutcome,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Holding {
    pub symbol: String,
    pub shares: i64,
    pub direction: Direction,
    pub value_micros: i64,
    /// Share value over total funds.
    pub weight: f64,
}

/// Point-in-time view of every symbol, held or not.
#[derive(Clone, Debug, PartialEq)]
pub struct Holdings {
    pub date: NaiveDate,
    pub holdings: Vec<Holding>,
    pub cash_micros: i64,
    pub equity_micros: i64,
}

impl Holdings {
    /// `2010-02-01 SPY:24.1 TLT:24.9 cash:  1.6 total: 100.0` (percent view).
    pub fn percent_line(&self) -> String {
        let mut out = self.date.format("%Y-%m-%d").to_string();
        let mut total = 0.0;
        for h in &self.holdings {
            total += h.weight;
            out.push_str(&format!(" {}:{:4.1}", h.symbol, h.weight * 100.0));
        }
        let cash_pct = if self.equity_micros != 0 {
            self.cash_micros as f64 / self.equity_micros as f64
        } else {
            0.0
        };
        total += cash_pct.abs();
        out.push_str(&format!(" cash:{:5.1} total:{:6.1}", cash_pct * 100.0, total * 100.0));
        out
    }
}

/// `2010-02-01 SPY: 54 TLT: 59 cash:    84.20 total:  9872.30` (shares view).
impl std::fmt::Display for Holdings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.date.format("%Y-%m-%d"))?;
        for h in &self.holdings {
            write!(f, " {}:{:3}", h.symbol, h.shares)?;
        }
        write!(
            f,
            " cash:{:9.2} total:{:10.2}",
            crate::micros_to_f64(self.cash_micros),
            crate::micros_to_f64(self.equity_micros)
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SymbolPerformance {
    pub symbol: String,
    pub cumul_total_micros: i64,
    pub weight: f64,
    /// Share of the portfolio's total realized P&L.
    pub pct_cumul_total: f64,
    /// `pct_cumul_total / weight`; above 1.0 means the symbol outperformed its allocation.
    pub relative_performance: f64,
}

// ---------------------------------------------------------------------------
// Portfolio
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Portfolio {
    account: Account,
    ledgers: BTreeMap<String, Ledger>,
    daily: DailyBalance,
}

impl Portfolio {
    pub fn new<I, S>(symbols: I, capital_micros: i64, margin: f64) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_multiplier(symbols, capital_micros, margin, 1)
    }

    /// Every ledger uses the same contract multiplier.
    pub fn with_multiplier<I, S>(
        symbols: I,
        capital_micros: i64,
        margin: f64,
        multiplier: i64,
    ) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let account = Account::new(capital_micros, margin)?;
        let mut ledgers = BTreeMap::new();
        for sym in symbols {
            let sym: String = sym.into();
            let ledger = Ledger::with_multiplier(sym.clone(), multiplier)?;
            ledgers.insert(sym, ledger);
        }
        Ok(Self {
            account,
            ledgers,
            daily: DailyBalance::new(),
        })
    }

    // -----------------------------------------------------------------------
    // Read surface
    // -----------------------------------------------------------------------

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn cash_micros(&self) -> i64 {
        self.account.cash_micros()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> + '_ {
        self.ledgers.keys().map(String::as_str)
    }

    pub fn ledger(&self, symbol: &str) -> Option<&Ledger> {
        self.ledgers.get(symbol)
    }

    /// Shares held in `symbol` (0 if unknown or flat).
    pub fn shares(&self, symbol: &str) -> i64 {
        self.ledgers.get(symbol).map(Ledger::shares).unwrap_or(0)
    }

    /// Symbols currently holding shares.
    pub fn positions(&self) -> Vec<&str> {
        self.ledgers
            .iter()
            .filter(|(_, l)| !l.is_flat())
            .map(|(s, _)| s.as_str())
            .collect()
    }

    /// Σ share value over held symbols.
    pub fn share_value_micros(&self, prices: &MarkMap) -> Result<i64, ValidationError> {
        let mut total: i64 = 0;
        for (sym, ledger) in &self.ledgers {
            if ledger.is_flat() {
                continue;
            }
            let px = price_of(prices, sym)?;
            total = total.saturating_add(ledger.share_value_micros(px));
        }
        Ok(total)
    }

    pub fn metrics(&self, prices: &MarkMap) -> Result<EquityMetrics, ValidationError> {
        Ok(EquityMetrics::compute(
            self.account.cash_micros(),
            self.share_value_micros(prices)?,
            self.account.margin(),
        ))
    }

    pub fn total_value_micros(&self, prices: &MarkMap) -> Result<i64, ValidationError> {
        Ok(self.metrics(prices)?.total_value_micros)
    }

    pub fn equity_micros(&self, prices: &MarkMap) -> Result<i64, ValidationError> {
        Ok(self.metrics(prices)?.equity_micros)
    }

    pub fn leverage(&self, prices: &MarkMap) -> Result<f64, ValidationError> {
        Ok(self.metrics(prices)?.leverage)
    }

    pub fn total_funds_micros(&self, prices: &MarkMap) -> Result<i64, ValidationError> {
        Ok(self.metrics(prices)?.total_funds_micros)
    }

    /// `symbol`'s share value over total funds (0 when funds are exhausted).
    pub fn share_percent(&self, prices: &MarkMap, symbol: &str) -> Result<f64, ValidationError> {
        let ledger = self.known(symbol)?;
        let total_funds = self.total_funds_micros(prices)?;
        if total_funds <= 0 || ledger.is_flat() {
            return Ok(0.0);
        }
        let sv = ledger.share_value_micros(price_of(prices, symbol)?);
        Ok(sv as f64 / total_funds as f64)
    }

    pub fn holdings(&self, date: NaiveDate, prices: &MarkMap) -> Result<Holdings, ValidationError> {
        let m = self.metrics(prices)?;
        let mut holdings = Vec::with_capacity(self.ledgers.len());
        for (sym, ledger) in &self.ledgers {
            let value = if ledger.is_flat() {
                0
            } else {
                ledger.share_value_micros(price_of(prices, sym)?)
            };
            let weight = if m.total_funds_micros > 0 {
                value as f64 / m.total_funds_micros as f64
            } else {
                0.0
            };
            holdings.push(Holding {
                symbol: sym.clone(),
                shares: ledger.shares(),
                direction: ledger.direction(),
                value_micros: value,
                weight,
            });
        }
        Ok(Holdings {
            date,
            holdings,
            cash_micros: m.cash_micros,
            equity_micros: m.equity_micros,
        })
    }

    // -----------------------------------------------------------------------
    // Trading
    // -----------------------------------------------------------------------

    /// Enter against aggregate buying power.
    pub fn enter_trade(
        &mut self,
        date: NaiveDate,
        prices: &MarkMap,
        symbol: &str,
        shares: Option<i64>,
        direction: Direction,
    ) -> Result<FillOutcome, ValidationError> {
        self.known(symbol)?;
        let price = price_of(prices, symbol)?;
        let buying_power = self.account.buying_power_micros(self.share_value_micros(prices)?);
        let ledger = self.ledgers.get_mut(symbol).ok_or_else(|| unknown(symbol))?;
        ledger.enter_with_buying_power(
            &mut self.account,
            buying_power,
            date,
            price,
            shares,
            direction,
        )
    }

    pub fn exit_trade(
        &mut self,
        date: NaiveDate,
        prices: &MarkMap,
        symbol: &str,
        qty: ExitQty,
    ) -> Result<FillOutcome, ValidationError> {
        let price = price_of(prices, symbol)?;
        let ledger = self.ledgers.get_mut(symbol).ok_or_else(|| unknown(symbol))?;
        ledger.exit_trade(&mut self.account, date, price, qty)
    }

    pub fn adjust_shares(
        &mut self,
        date: NaiveDate,
        prices: &MarkMap,
        symbol: &str,
        target: i64,
        direction: Direction,
    ) -> Result<FillOutcome, ValidationError> {
        self.known(symbol)?;
        let price = price_of(prices, symbol)?;
        let buying_power = self.account.buying_power_micros(self.share_value_micros(prices)?);
        let ledger = self.ledgers.get_mut(symbol).ok_or_else(|| unknown(symbol))?;
        ledger.adjust_shares_with_buying_power(
            &mut self.account,
            buying_power,
            date,
            price,
            target,
            direction,
        )
    }

    /// Hold `value_micros` worth of `symbol`, capped at total funds.
    pub fn adjust_value(
        &mut self,
        date: NaiveDate,
        prices: &MarkMap,
        symbol: &str,
        value_micros: i64,
        direction: Direction,
    ) -> Result<FillOutcome, ValidationError> {
        let ledger = self.known(symbol)?;
        let price = price_of(prices, symbol)?;
        let held = (ledger.shares(), ledger.share_value_micros(price));
        let m = self.metrics(prices)?;
        let target = target_shares(m.total_funds_micros, value_micros, price, held.0, held.1);
        let buying_power = self.account.buying_power_micros(m.share_value_micros);
        let ledger = self.ledgers.get_mut(symbol).ok_or_else(|| unknown(symbol))?;
        ledger.adjust_shares_with_buying_power(
            &mut self.account,
            buying_power,
            date,
            price,
            target,
            direction,
        )
    }

    /// Hold `weight` of total funds in `symbol`.
    pub fn adjust_percent(
        &mut self,
        date: NaiveDate,
        prices: &MarkMap,
        symbol: &str,
        weight: f64,
        direction: Direction,
    ) -> Result<FillOutcome, ValidationError> {
        check_weight(symbol, weight)?;
        let total_funds = self.total_funds_micros(prices)?;
        self.adjust_value(date, prices, symbol, scale_micros(total_funds, weight), direction)
    }

    /// Rebalance every symbol in `weights` in one pass.
    ///
    /// All weights, symbols, prices and directions are validated before
    /// anything moves. Adjustments then run in ascending order of
    /// `target - current`, so reductions release cash before increases
    /// spend it. Symbols absent from `weights` are left alone; a symbol
    /// absent from `directions` is LONG.
    pub fn adjust_percents(
        &mut self,
        date: NaiveDate,
        prices: &MarkMap,
        weights: &BTreeMap<String, f64>,
        directions: &BTreeMap<String, Direction>,
    ) -> Result<Vec<RebalanceStep>, ValidationError> {
        let mut deltas = Vec::with_capacity(weights.len());
        for (sym, &target) in weights {
            check_weight(sym, target)?;
            let ledger = self.known(sym)?;
            let price = price_of(prices, sym)?;
            if price <= 0 {
                return Err(ValidationError::NonPositivePrice {
                    symbol: sym.clone(),
                    price_micros: price,
                });
            }
            let direction = directions.get(sym).copied().unwrap_or_default();
            if target > 0.0 && !ledger.is_flat() && ledger.direction() != direction {
                return Err(ValidationError::DirectionFlip {
                    symbol: sym.clone(),
                    held: ledger.direction(),
                    requested: direction,
                });
            }
            deltas.push(WeightDelta {
                symbol: sym.clone(),
                current: self.share_percent(prices, sym)?,
                target,
            });
        }
        sort_sell_before_buy(&mut deltas);

        let mut steps = Vec::with_capacity(deltas.len());
        for d in deltas {
            let direction = directions.get(&d.symbol).copied().unwrap_or_default();
            let outcome = self.adjust_percent(date, prices, &d.symbol, d.target, direction)?;
            debug!(
                symbol = %d.symbol,
                current = d.current,
                target = d.target,
                filled = outcome.filled,
                "rebalance step"
            );
            steps.push(RebalanceStep {
                symbol: d.symbol,
                current_weight: d.current,
                target_weight: d.target,
                outcome,
            });
        }
        Ok(steps)
    }

    // -----------------------------------------------------------------------
    // Logs
    // -----------------------------------------------------------------------

    /// Snapshot the day at closing prices: equity fills high, low and close.
    pub fn record_daily_balance(
        &mut self,
        date: NaiveDate,
        prices: &MarkMap,
    ) -> Result<(), ValidationError> {
        let m = self.metrics(prices)?;
        let shares = self.ledgers.values().map(Ledger::shares).sum();
        self.daily.push(DailyBalanceRecord {
            date,
            high_micros: m.equity_micros,
            low_micros: m.equity_micros,
            close_micros: m.equity_micros,
            shares,
            cash_micros: m.cash_micros,
            leverage: m.leverage,
            state: Default::default(),
        });
        Ok(())
    }

    /// Merge every ledger's logs into one chronological view.
    pub fn get_logs(&self) -> TradeLogs {
        let mut raw: Vec<RawFill> = self
            .ledgers
            .values()
            .flat_map(|l| l.raw_fills().iter().cloned())
            .collect();
        sort_raw_fills(&mut raw);

        let mut trades: Vec<ClosedTrade> = self
            .ledgers
            .values()
            .flat_map(|l| l.closed_trades().iter().cloned())
            .collect();
        sort_closed_trades(&mut trades);
        recompute_cumul_total(&mut trades);

        let daily = self.daily.finalize(&trades);
        TradeLogs { raw, trades, daily }
    }

    /// Realized P&L per symbol, its share of the total, and how that share
    /// compares with the symbol's allocation. A final `TOTAL` row sums the
    /// cash column and pins the ratios at 1.0.
    pub fn performance_per_symbol(
        &self,
        weights: &BTreeMap<String, f64>,
    ) -> Result<Vec<SymbolPerformance>, ValidationError> {
        for (sym, &w) in weights {
            check_weight(sym, w)?;
        }
        let total: i64 = self.ledgers.values().map(Ledger::cumul_total_micros).sum();

        let mut rows = Vec::with_capacity(self.ledgers.len() + 1);
        for (sym, ledger) in &self.ledgers {
            let weight = weights.get(sym).copied().unwrap_or(0.0);
            let pct = if total != 0 {
                ledger.cumul_total_micros() as f64 / total as f64
            } else {
                0.0
            };
            let relative = if weight > 0.0 { pct / weight } else { 0.0 };
            rows.push(SymbolPerformance {
                symbol: sym.clone(),
                cumul_total_micros: ledger.cumul_total_micros(),
                weight,
                pct_cumul_total: pct,
                relative_performance: relative,
            });
        }
        rows.push(SymbolPerformance {
            symbol: "TOTAL".to_string(),
            cumul_total_micros: total,
            weight: 1.0,
            pct_cumul_total: 1.0,
            relative_performance: 1.0,
        });
        Ok(rows)
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    fn known(&self, symbol: &str) -> Result<&Ledger, ValidationError> {
        self.ledgers.get(symbol).ok_or_else(|| unknown(symbol))
    }
}

fn unknown(symbol: &str) -> ValidationError {
    ValidationError::UnknownSymbol {
        symbol: symbol.to_string(),
    }
}

fn price_of(prices: &MarkMap, symbol: &str) -> Result<i64, ValidationError> {
    prices.get(symbol).copied().ok_or_else(|| unknown(symbol))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{marks, TradeState, MICROS_SCALE};

    const M: i64 = MICROS_SCALE;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, 7, day).unwrap()
    }

    fn weights(items: &[(&str, f64)]) -> BTreeMap<String, f64> {
        items.iter().map(|(s, w)| (s.to_string(), *w)).collect()
    }

    fn no_dirs() -> BTreeMap<String, Direction> {
        BTreeMap::new()
    }

    #[test]
    fn fresh_portfolio_is_all_cash() {
        let pf = Portfolio::new(["SPY", "TLT"], 10_000 * M, 1.0).unwrap();
        let px = marks([("SPY", 100 * M), ("TLT", 50 * M)]);
        assert_eq!(pf.equity_micros(&px).unwrap(), 10_000 * M);
        assert_eq!(pf.leverage(&px).unwrap(), 1.0);
        assert!(pf.positions().is_empty());
    }

    #[test]
    fn unknown_symbol_rejected() {
        let mut pf = Portfolio::new(["SPY"], 10_000 * M, 1.0).unwrap();
        let px = marks([("SPY", 100 * M), ("QQQ", 100 * M)]);
        let err = pf.adjust_percent(d(1), &px, "QQQ", 0.5, Direction::Long);
        assert_eq!(
            err,
            Err(ValidationError::UnknownSymbol {
                symbol: "QQQ".to_string()
            })
        );
    }

    #[test]
    fn held_symbol_without_price_is_an_error() {
        let mut pf = Portfolio::new(["SPY"], 10_000 * M, 1.0).unwrap();
        pf.enter_trade(d(1), &marks([("SPY", 100 * M)]), "SPY", Some(10), Direction::Long)
            .unwrap();
        assert!(pf.equity_micros(&MarkMap::new()).is_err());
    }

    #[test]
    fn adjust_percents_splits_funds() {
        let mut pf = Portfolio::new(["SPY", "TLT"], 10_000 * M, 1.0).unwrap();
        let px = marks([("SPY", 100 * M), ("TLT", 50 * M)]);
        pf.adjust_percents(d(1), &px, &weights(&[("SPY", 0.5), ("TLT", 0.5)]), &no_dirs())
            .unwrap();

        assert_eq!(pf.shares("SPY"), 50);
        assert_eq!(pf.shares("TLT"), 100);
        assert_eq!(pf.cash_micros(), 0);
        assert_eq!(pf.positions(), vec!["SPY", "TLT"]);
    }

    #[test]
    fn adjust_percents_sells_before_buying() {
        let mut pf = Portfolio::new(["AAA", "BBB"], 10_000 * M, 1.0).unwrap();
        let px = marks([("AAA", 100 * M), ("BBB", 100 * M)]);
        pf.adjust_percents(d(1), &px, &weights(&[("AAA", 1.0), ("BBB", 0.0)]), &no_dirs())
            .unwrap();
        assert_eq!(pf.shares("AAA"), 100);

        // AAA is first alphabetically, but its reduction must run before BBB's buy.
        let steps = pf
            .adjust_percents(d(2), &px, &weights(&[("AAA", 0.0), ("BBB", 1.0)]), &no_dirs())
            .unwrap();
        assert_eq!(steps[0].symbol, "AAA");
        assert_eq!(steps[0].outcome.filled, -100);
        assert_eq!(steps[1].symbol, "BBB");
        assert_eq!(steps[1].outcome.filled, 100);
        assert!(!steps[1].outcome.was_clamped());
    }

    #[test]
    fn adjust_percents_validates_before_mutating() {
        let mut pf = Portfolio::new(["AAA", "BBB"], 10_000 * M, 1.0).unwrap();
        let px = marks([("AAA", 100 * M), ("BBB", 100 * M)]);
        let err = pf.adjust_percents(d(1), &px, &weights(&[("AAA", 0.5), ("BBB", 1.2)]), &no_dirs());
        assert!(matches!(err, Err(ValidationError::WeightOutOfRange { .. })));
        assert_eq!(pf.shares("AAA"), 0);
        assert_eq!(pf.cash_micros(), 10_000 * M);
    }

    #[test]
    fn adjust_percents_rejects_zero_price_before_selling() {
        let mut pf = Portfolio::new(["AAA", "BBB"], 10_000 * M, 1.0).unwrap();
        pf.enter_trade(d(1), &marks([("AAA", 100 * M)]), "AAA", Some(100), Direction::Long)
            .unwrap();

        // AAA's reduction sorts first; BBB's zero price must stop the pass before it.
        let px = marks([("AAA", 100 * M), ("BBB", 0)]);
        let err = pf.adjust_percents(d(2), &px, &weights(&[("AAA", 0.0), ("BBB", 1.0)]), &no_dirs());
        assert_eq!(
            err,
            Err(ValidationError::NonPositivePrice {
                symbol: "BBB".to_string(),
                price_micros: 0
            })
        );
        assert_eq!(pf.shares("AAA"), 100);
        assert_eq!(pf.cash_micros(), 0);
        assert_eq!(pf.get_logs().raw.len(), 1);
    }

    #[test]
    fn adjust_percents_refuses_to_flip_a_held_short() {
        let mut pf = Portfolio::new(["AAA", "BBB"], 10_000 * M, 1.0).unwrap();
        let px = marks([("AAA", 100 * M), ("BBB", 50 * M)]);
        pf.enter_trade(d(1), &px, "AAA", Some(20), Direction::Short)
            .unwrap();
        pf.enter_trade(d(1), &px, "BBB", Some(20), Direction::Long)
            .unwrap();
        let cash = pf.cash_micros();

        // BBB would be reduced first if the pass were allowed to start.
        let err = pf.adjust_percents(d(2), &px, &weights(&[("AAA", 0.5), ("BBB", 0.0)]), &no_dirs());
        assert_eq!(
            err,
            Err(ValidationError::DirectionFlip {
                symbol: "AAA".to_string(),
                held: Direction::Short,
                requested: Direction::Long,
            })
        );
        assert_eq!(pf.shares("AAA"), 20);
        assert_eq!(pf.ledger("AAA").unwrap().direction(), Direction::Short);
        assert_eq!(pf.shares("BBB"), 20);
        assert_eq!(pf.cash_micros(), cash);
    }

    #[test]
    fn short_at_current_weight_is_a_noop_after_price_move() {
        let mut pf = Portfolio::new(["AAA"], 10_000 * M, 1.0).unwrap();
        pf.enter_trade(d(1), &marks([("AAA", 50 * M)]), "AAA", Some(50), Direction::Short)
            .unwrap();

        let px = marks([("AAA", 40 * M)]);
        let current = pf.share_percent(&px, "AAA").unwrap();
        let out = pf
            .adjust_percent(d(2), &px, "AAA", current, Direction::Short)
            .unwrap();
        assert!(out.is_noop());
        assert_eq!(pf.shares("AAA"), 50);
    }

    #[test]
    fn short_and_long_side_by_side() {
        let mut pf = Portfolio::new(["AAA", "BBB"], 10_000 * M, 1.0).unwrap();
        let px = marks([("AAA", 100 * M), ("BBB", 100 * M)]);
        let dirs: BTreeMap<String, Direction> = [("BBB".to_string(), Direction::Short)].into();
        pf.adjust_percents(d(1), &px, &weights(&[("AAA", 0.5), ("BBB", 0.5)]), &dirs)
            .unwrap();
        assert_eq!(pf.ledger("BBB").unwrap().direction(), Direction::Short);

        // BBB falls 10%: the short gains 500.
        let px2 = marks([("AAA", 100 * M), ("BBB", 90 * M)]);
        assert_eq!(pf.equity_micros(&px2).unwrap(), 10_500 * M);
    }

    #[test]
    fn margin_scales_total_funds() {
        let mut pf = Portfolio::new(["SPY"], 10_000 * M, 2.0).unwrap();
        let px = marks([("SPY", 100 * M)]);
        pf.adjust_percent(d(1), &px, "SPY", 1.0, Direction::Long).unwrap();
        assert_eq!(pf.shares("SPY"), 200);
        assert_eq!(pf.cash_micros(), -10_000 * M);
        assert_eq!(pf.leverage(&px).unwrap(), 2.0);
    }

    #[test]
    fn logs_merge_across_symbols() {
        let mut pf = Portfolio::new(["AAA", "BBB"], 10_000 * M, 1.0).unwrap();
        let px1 = marks([("AAA", 10 * M), ("BBB", 20 * M)]);
        let px2 = marks([("AAA", 12 * M), ("BBB", 19 * M)]);

        pf.enter_trade(d(1), &px1, "BBB", Some(10), Direction::Long).unwrap();
        pf.enter_trade(d(2), &px1, "AAA", Some(10), Direction::Long).unwrap();
        pf.record_daily_balance(d(1), &px1).unwrap();
        pf.exit_trade(d(3), &px2, "AAA", ExitQty::All).unwrap();
        pf.exit_trade(d(3), &px2, "BBB", ExitQty::All).unwrap();
        pf.record_daily_balance(d(3), &px2).unwrap();

        let logs = pf.get_logs();
        let seqs: Vec<u64> = logs.raw.iter().map(|f| f.seq_num).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4]);

        // BBB entered first, so it leads the closed-trade log.
        assert_eq!(logs.trades[0].symbol, "BBB");
        assert_eq!(logs.trades[0].cumul_total_micros, -10 * M);
        assert_eq!(logs.trades[1].cumul_total_micros, 10 * M);

        assert_eq!(logs.daily[0].state, TradeState::Open);
        assert_eq!(logs.daily[1].state, TradeState::Close);
        assert_eq!(logs.daily[1].close_micros, 10_010 * M);
    }

    #[test]
    fn performance_per_symbol_adds_total_row() {
        let mut pf = Portfolio::new(["AAA", "BBB"], 10_000 * M, 1.0).unwrap();
        let px1 = marks([("AAA", 10 * M), ("BBB", 10 * M)]);
        let px2 = marks([("AAA", 13 * M), ("BBB", 11 * M)]);
        let w = weights(&[("AAA", 0.5), ("BBB", 0.5)]);
        pf.adjust_percents(d(1), &px1, &w, &no_dirs()).unwrap();
        pf.adjust_percents(d(2), &px2, &weights(&[("AAA", 0.0), ("BBB", 0.0)]), &no_dirs())
            .unwrap();

        let rows = pf.performance_per_symbol(&w).unwrap();
        assert_eq!(rows.len(), 3);
        // AAA: 500 * 3 = 1500, BBB: 500 * 1 = 500
        assert_eq!(rows[0].cumul_total_micros, 1_500 * M);
        assert!((rows[0].pct_cumul_total - 0.75).abs() < 1e-12);
        assert!((rows[0].relative_performance - 1.5).abs() < 1e-12);
        assert_eq!(rows[2].symbol, "TOTAL");
        assert_eq!(rows[2].cumul_total_micros, 2_000 * M);
    }

    #[test]
    fn holdings_render_both_views() {
        let mut pf = Portfolio::new(["SPY", "TLT"], 10_000 * M, 1.0).unwrap();
        let px = marks([("SPY", 100 * M), ("TLT", 50 * M)]);
        pf.adjust_percents(d(1), &px, &weights(&[("SPY", 0.25), ("TLT", 0.25)]), &no_dirs())
            .unwrap();

        let h = pf.holdings(d(1), &px).unwrap();
        let shares_view = h.to_string();
        assert!(shares_view.starts_with("2019-07-01"));
        assert!(shares_view.contains("SPY: 25"));
        assert!(shares_view.contains("TLT: 50"));
        assert!(h.percent_line().contains("SPY:25.0"));
    }
}
