//! Per-instrument trade ledger.
//!
//! # Purpose
//! A [`Ledger`] tracks one symbol: direction, open FIFO lots, the closed-trade
//! log and the raw-fill log. It owns no cash. Every write takes the shared
//! [`Account`] by `&mut`, so one cash pool can back many ledgers.
//!
//! - Entries are clamped to what buying power allows; a clamp to zero is a no-op.
//! - Exits consume lots oldest-first and emit one closed-trade row per lot touched.
//! - Direction can only change once the ledger is flat.
//!
//! Share count and average entry price are derived from the lot queue on
//! every read, so they cannot drift from the lots.
//!
//! # Usage
//! ```ignore
//! let mut acct = Account::cash_only(10_000 * MICROS_SCALE);
//! let mut spy = Ledger::new("SPY");
//! spy.buy(&mut acct, date, 50 * MICROS_SCALE, Some(100))?;
//! spy.sell(&mut acct, later, 60 * MICROS_SCALE, None)?;
//! ```
//!
//! # Determinism
//! No IO, no clock, no randomness. The same call sequence always produces
//! the same logs.

use std::collections::VecDeque;

use chrono::NaiveDate;
use tracing::debug;

use crate::{
    accounting::{
        consume_fifo, i128_to_i64_clamp, mul_qty_price_micros, pl_points_micros,
        qty_of_oldest_lots, scale_micros, share_value_micros, shares_for_funds, total_qty,
        vwap_micros,
    },
    account::Account,
    error::ValidationError,
    metrics::EquityMetrics,
    types::{ClosedTrade, Direction, EntryExit, ExitQty, FillOutcome, Lot, RawFill},
};

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Ledger {
    symbol: String,
    direction: Direction,
    multiplier: i64,
    lots: VecDeque<Lot>,
    closed: Vec<ClosedTrade>,
    raw: Vec<RawFill>,
    cumul_total_micros: i64,
}

impl Ledger {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            direction: Direction::Long,
            multiplier: 1,
            lots: VecDeque::new(),
            closed: Vec::new(),
            raw: Vec::new(),
            cumul_total_micros: 0,
        }
    }

    /// Futures-style ledger: P&L per point is scaled by `multiplier`.
    pub fn with_multiplier(
        symbol: impl Into<String>,
        multiplier: i64,
    ) -> Result<Self, ValidationError> {
        if multiplier < 1 {
            return Err(ValidationError::InvalidMultiplier { multiplier });
        }
        let mut ledger = Self::new(symbol);
        ledger.multiplier = multiplier;
        Ok(ledger)
    }

    // -----------------------------------------------------------------------
    // Read surface
    // -----------------------------------------------------------------------

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Direction of the open position, or of the last one if flat.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn multiplier(&self) -> i64 {
        self.multiplier
    }

    /// Σ qty over the open lots.
    pub fn shares(&self) -> i64 {
        total_qty(&self.lots)
    }

    pub fn is_flat(&self) -> bool {
        self.lots.is_empty()
    }

    /// Open lots, oldest first.
    pub fn lots(&self) -> impl Iterator<Item = &Lot> + '_ {
        self.lots.iter()
    }

    /// Volume-weighted mean entry price of the open lots (0 if flat).
    pub fn average_entry_price_micros(&self) -> i64 {
        vwap_micros(&self.lots)
    }

    /// Cash value of the open position at `price_micros`.
    pub fn share_value_micros(&self, price_micros: i64) -> i64 {
        share_value_micros(&self.lots, self.direction, price_micros, self.multiplier)
    }

    pub fn closed_trades(&self) -> &[ClosedTrade] {
        &self.closed
    }

    pub fn raw_fills(&self) -> &[RawFill] {
        &self.raw
    }

    /// Realized P&L accumulated over every exit.
    pub fn cumul_total_micros(&self) -> i64 {
        self.cumul_total_micros
    }

    /// Valuation of this ledger alone against `acct`.
    pub fn metrics(&self, acct: &Account, price_micros: i64) -> EquityMetrics {
        EquityMetrics::compute(
            acct.cash_micros(),
            self.share_value_micros(price_micros),
            acct.margin(),
        )
    }

    /// Share value as a fraction of total funds (0 when funds are exhausted).
    pub fn share_percent(&self, acct: &Account, price_micros: i64) -> f64 {
        let m = self.metrics(acct, price_micros);
        if m.total_funds_micros <= 0 {
            return 0.0;
        }
        m.share_value_micros as f64 / m.total_funds_micros as f64
    }

    // -----------------------------------------------------------------------
    // Write surface
    // -----------------------------------------------------------------------

    /// Open (or add to) a position.
    ///
    /// `shares = None` buys as many as buying power allows. A request beyond
    /// buying power is clamped; the outcome reports both numbers.
    ///
    /// # Errors
    /// [`ValidationError::NonPositivePrice`] or
    /// [`ValidationError::DirectionFlip`]. Nothing is mutated on error.
    pub fn enter_trade(
        &mut self,
        acct: &mut Account,
        date: NaiveDate,
        price_micros: i64,
        shares: Option<i64>,
        direction: Direction,
    ) -> Result<FillOutcome, ValidationError> {
        let buying_power = acct.buying_power_micros(self.share_value_micros(price_micros));
        self.enter_with_buying_power(acct, buying_power, date, price_micros, shares, direction)
    }

    /// Close some or all of the position, oldest lots first.
    ///
    /// Each consumed lot (or the consumed part of one) becomes one
    /// [`ClosedTrade`]. Asking for more than is held exits what is held.
    pub fn exit_trade(
        &mut self,
        acct: &mut Account,
        date: NaiveDate,
        price_micros: i64,
        qty: ExitQty,
    ) -> Result<FillOutcome, ValidationError> {
        self.check_price(price_micros)?;

        let held = self.shares();
        let requested = match qty {
            ExitQty::All => held,
            ExitQty::Shares(n) => n.max(0),
            ExitQty::Lots(n) => qty_of_oldest_lots(&self.lots, n),
        };
        let exiting = requested.min(held);
        if exiting < requested {
            debug!(
                symbol = %self.symbol,
                requested,
                held,
                "exit clamped to shares held"
            );
        }
        if exiting == 0 {
            return Ok(FillOutcome::new(-requested, 0));
        }

        for lot in consume_fifo(&mut self.lots, exiting) {
            let pl_points = pl_points_micros(self.direction, lot.entry_price_micros, price_micros);
            let pl_cash = i128_to_i64_clamp(
                (pl_points as i128) * (lot.qty as i128) * (self.multiplier as i128),
            );
            self.cumul_total_micros = self.cumul_total_micros.saturating_add(pl_cash);

            // Return the entry cost, then settle the gain or loss.
            let cost = i128_to_i64_clamp(mul_qty_price_micros(lot.qty, lot.entry_price_micros));
            acct.credit(cost.saturating_add(pl_cash));

            self.closed.push(ClosedTrade {
                entry_date: lot.entry_date,
                entry_price_micros: lot.entry_price_micros,
                exit_date: date,
                exit_price_micros: price_micros,
                pl_points_micros: pl_points,
                pl_cash_micros: pl_cash,
                qty: lot.qty,
                cumul_total_micros: self.cumul_total_micros,
                direction: self.direction,
                symbol: self.symbol.clone(),
            });
        }

        let seq_num = acct.next_seq_num();
        self.raw.push(RawFill {
            date,
            seq_num,
            price_micros,
            qty: exiting,
            entry_exit: EntryExit::Exit,
            direction: self.direction,
            symbol: self.symbol.clone(),
        });
        debug!(symbol = %self.symbol, seq_num, qty = exiting, price_micros, "exit");

        Ok(FillOutcome::new(-requested, -exiting))
    }

    pub fn buy(
        &mut self,
        acct: &mut Account,
        date: NaiveDate,
        price_micros: i64,
        shares: Option<i64>,
    ) -> Result<FillOutcome, ValidationError> {
        self.enter_trade(acct, date, price_micros, shares, Direction::Long)
    }

    /// `shares`: `None` = all, positive = shares, negative = oldest lots.
    pub fn sell(
        &mut self,
        acct: &mut Account,
        date: NaiveDate,
        price_micros: i64,
        shares: Option<i64>,
    ) -> Result<FillOutcome, ValidationError> {
        self.exit_trade(acct, date, price_micros, ExitQty::from_signed(shares))
    }

    pub fn sell_short(
        &mut self,
        acct: &mut Account,
        date: NaiveDate,
        price_micros: i64,
        shares: Option<i64>,
    ) -> Result<FillOutcome, ValidationError> {
        self.enter_trade(acct, date, price_micros, shares, Direction::Short)
    }

    /// `shares`: `None` = all, positive = shares, negative = oldest lots.
    pub fn buy_to_cover(
        &mut self,
        acct: &mut Account,
        date: NaiveDate,
        price_micros: i64,
        shares: Option<i64>,
    ) -> Result<FillOutcome, ValidationError> {
        self.exit_trade(acct, date, price_micros, ExitQty::from_signed(shares))
    }

    /// Enter or exit whatever it takes to hold `target` shares.
    pub fn adjust_shares(
        &mut self,
        acct: &mut Account,
        date: NaiveDate,
        price_micros: i64,
        target: i64,
        direction: Direction,
    ) -> Result<FillOutcome, ValidationError> {
        let buying_power = acct.buying_power_micros(self.share_value_micros(price_micros));
        self.adjust_shares_with_buying_power(
            acct,
            buying_power,
            date,
            price_micros,
            target,
            direction,
        )
    }

    /// Hold `value_micros` worth of shares, capped at total funds.
    pub fn adjust_value(
        &mut self,
        acct: &mut Account,
        date: NaiveDate,
        price_micros: i64,
        value_micros: i64,
        direction: Direction,
    ) -> Result<FillOutcome, ValidationError> {
        self.check_price(price_micros)?;
        let m = self.metrics(acct, price_micros);
        let target = target_shares(
            m.total_funds_micros,
            value_micros,
            price_micros,
            self.shares(),
            m.share_value_micros,
        );
        let buying_power = acct.buying_power_micros(m.share_value_micros);
        self.adjust_shares_with_buying_power(
            acct,
            buying_power,
            date,
            price_micros,
            target,
            direction,
        )
    }

    /// Hold `weight` (in `[0, 1]`) of total funds in this symbol.
    pub fn adjust_percent(
        &mut self,
        acct: &mut Account,
        date: NaiveDate,
        price_micros: i64,
        weight: f64,
        direction: Direction,
    ) -> Result<FillOutcome, ValidationError> {
        check_weight(&self.symbol, weight)?;
        self.check_price(price_micros)?;
        let m = self.metrics(acct, price_micros);
        let value = scale_micros(m.total_funds_micros, weight);
        let target = target_shares(
            m.total_funds_micros,
            value,
            price_micros,
            self.shares(),
            m.share_value_micros,
        );
        let buying_power = acct.buying_power_micros(m.share_value_micros);
        self.adjust_shares_with_buying_power(
            acct,
            buying_power,
            date,
            price_micros,
            target,
            direction,
        )
    }

    /// Lot-queue consistency check for tests and audits.
    ///
    /// Every lot is positive in size and price, and the running realized
    /// total matches the closed-trade log.
    pub fn verify_integrity(&self) -> bool {
        let lots_ok = self
            .lots
            .iter()
            .all(|l| l.qty > 0 && l.entry_price_micros > 0);
        let realized: i128 = self.closed.iter().map(|t| t.pl_cash_micros as i128).sum();
        lots_ok && i128_to_i64_clamp(realized) == self.cumul_total_micros
    }

    // -----------------------------------------------------------------------
    // Crate-internal: portfolio supplies aggregate buying power
    // -----------------------------------------------------------------------

    pub(crate) fn enter_with_buying_power(
        &mut self,
        acct: &mut Account,
        buying_power_micros: i64,
        date: NaiveDate,
        price_micros: i64,
        shares: Option<i64>,
        direction: Direction,
    ) -> Result<FillOutcome, ValidationError> {
        self.check_price(price_micros)?;
        self.check_direction(direction)?;

        let max_shares = shares_for_funds(buying_power_micros, price_micros);
        let requested = shares.unwrap_or(max_shares);
        if requested <= 0 {
            return Ok(FillOutcome::none());
        }
        let filled = requested.min(max_shares);
        if filled < requested {
            debug!(
                symbol = %self.symbol,
                requested,
                filled,
                buying_power_micros,
                "entry clamped to buying power"
            );
        }
        if filled == 0 {
            return Ok(FillOutcome::new(requested, 0));
        }

        self.direction = direction;
        self.lots.push_back(Lot::new(date, price_micros, filled));
        acct.debit(i128_to_i64_clamp(mul_qty_price_micros(filled, price_micros)));

        let seq_num = acct.next_seq_num();
        self.raw.push(RawFill {
            date,
            seq_num,
            price_micros,
            qty: filled,
            entry_exit: EntryExit::Entry,
            direction,
            symbol: self.symbol.clone(),
        });
        debug!(symbol = %self.symbol, seq_num, qty = filled, price_micros, "entry");

        Ok(FillOutcome::new(requested, filled))
    }

    pub(crate) fn adjust_shares_with_buying_power(
        &mut self,
        acct: &mut Account,
        buying_power_micros: i64,
        date: NaiveDate,
        price_micros: i64,
        target: i64,
        direction: Direction,
    ) -> Result<FillOutcome, ValidationError> {
        self.check_price(price_micros)?;
        let target = target.max(0);
        let held = self.shares();

        if held > 0 && direction != self.direction {
            if target == 0 {
                return self.exit_trade(acct, date, price_micros, ExitQty::All);
            }
            self.check_direction(direction)?;
        }

        let delta = target - held;
        if delta > 0 {
            self.enter_with_buying_power(
                acct,
                buying_power_micros,
                date,
                price_micros,
                Some(delta),
                direction,
            )
        } else if delta < 0 {
            self.exit_trade(acct, date, price_micros, ExitQty::Shares(-delta))
        } else {
            Ok(FillOutcome::none())
        }
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    fn check_price(&self, price_micros: i64) -> Result<(), ValidationError> {
        if price_micros <= 0 {
            return Err(ValidationError::NonPositivePrice {
                symbol: self.symbol.clone(),
                price_micros,
            });
        }
        Ok(())
    }

    fn check_direction(&self, requested: Direction) -> Result<(), ValidationError> {
        if !self.lots.is_empty() && requested != self.direction {
            return Err(ValidationError::DirectionFlip {
                symbol: self.symbol.clone(),
                held: self.direction,
                requested,
            });
        }
        Ok(())
    }
}

/// Whole shares worth `min(total_funds, value)` at `price_micros`.
/// Shares to hold so the position is worth `value_micros` (capped at total
/// funds).
///
/// Held shares are valued the way `share_value_micros` values them, so a
/// target equal to the current value maps back to the current share count
/// for shorts and multiplied contracts too. Added shares are valued at
/// `price_micros`, the price they would enter at.
pub(crate) fn target_shares(
    total_funds_micros: i64,
    value_micros: i64,
    price_micros: i64,
    held_shares: i64,
    held_value_micros: i64,
) -> i64 {
    let value = total_funds_micros.min(value_micros).max(0);
    if value == 0 {
        return 0;
    }
    if held_shares <= 0 {
        return shares_for_funds(value, price_micros);
    }
    if value >= held_value_micros {
        let extra = value.saturating_sub(held_value_micros);
        return held_shares.saturating_add(shares_for_funds(extra, price_micros));
    }
    // held_value_micros > value >= 0: shed the excess at the held per-share value.
    let excess = (held_value_micros - value) as i128;
    let held_value = held_value_micros as i128;
    let removed = (excess * held_shares as i128 + held_value - 1) / held_value;
    (held_shares as i128 - removed).max(0) as i64
}

pub(crate) fn check_weight(symbol: &str, weight: f64) -> Result<(), ValidationError> {
    if !(0.0..=1.0).contains(&weight) {
        return Err(ValidationError::WeightOutOfRange {
            symbol: symbol.to_string(),
            weight,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MICROS_SCALE;

    const M: i64 = MICROS_SCALE;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 3, day).unwrap()
    }

    fn setup(capital: i64) -> (Account, Ledger) {
        (Account::cash_only(capital * M), Ledger::new("SPY"))
    }

    // --- Entry ---

    #[test]
    fn entry_debits_cash_and_opens_lot() {
        let (mut acct, mut l) = setup(10_000);
        let out = l.buy(&mut acct, d(1), 50 * M, Some(100)).unwrap();

        assert_eq!(out, FillOutcome::new(100, 100));
        assert_eq!(acct.cash_micros(), 5_000 * M);
        assert_eq!(l.shares(), 100);
        assert_eq!(l.average_entry_price_micros(), 50 * M);
        assert_eq!(l.raw_fills().len(), 1);
        assert_eq!(l.raw_fills()[0].entry_exit, EntryExit::Entry);
    }

    #[test]
    fn entry_without_size_uses_all_buying_power() {
        let (mut acct, mut l) = setup(1_000);
        let out = l.buy(&mut acct, d(1), 30 * M, None).unwrap();
        assert_eq!(out.filled, 33);
        assert!(!out.was_clamped());
        assert_eq!(acct.cash_micros(), 10 * M);
    }

    #[test]
    fn entry_beyond_buying_power_is_clamped() {
        let (mut acct, mut l) = setup(1_000);
        let out = l.buy(&mut acct, d(1), 100 * M, Some(50)).unwrap();
        assert_eq!(out, FillOutcome::new(50, 10));
        assert!(out.was_clamped());
        assert_eq!(acct.cash_micros(), 0);
    }

    #[test]
    fn entry_clamped_to_zero_is_a_noop() {
        let (mut acct, mut l) = setup(10);
        let out = l.buy(&mut acct, d(1), 100 * M, Some(1)).unwrap();
        assert_eq!(out.filled, 0);
        assert!(l.raw_fills().is_empty());
        assert_eq!(acct.cash_micros(), 10 * M);
        assert_eq!(acct.last_seq_num(), 0);
    }

    #[test]
    fn margin_extends_buying_power() {
        let mut acct = Account::new(1_000 * M, 2.0).unwrap();
        let mut l = Ledger::new("SPY");
        let out = l.buy(&mut acct, d(1), 100 * M, None).unwrap();
        assert_eq!(out.filled, 20);
        assert_eq!(acct.cash_micros(), -1_000 * M);
    }

    #[test]
    fn rejects_non_positive_price() {
        let (mut acct, mut l) = setup(1_000);
        let err = l.buy(&mut acct, d(1), 0, Some(1));
        assert_eq!(
            err,
            Err(ValidationError::NonPositivePrice {
                symbol: "SPY".to_string(),
                price_micros: 0
            })
        );
        assert_eq!(acct.cash_micros(), 1_000 * M);
    }

    #[test]
    fn direction_flip_while_holding_is_rejected() {
        let (mut acct, mut l) = setup(10_000);
        l.buy(&mut acct, d(1), 10 * M, Some(10)).unwrap();
        let err = l.sell_short(&mut acct, d(2), 10 * M, Some(5));
        assert_eq!(
            err,
            Err(ValidationError::DirectionFlip {
                symbol: "SPY".to_string(),
                held: Direction::Long,
                requested: Direction::Short,
            })
        );
        assert_eq!(l.shares(), 10);
    }

    #[test]
    fn direction_may_change_once_flat() {
        let (mut acct, mut l) = setup(10_000);
        l.buy(&mut acct, d(1), 10 * M, Some(10)).unwrap();
        l.sell(&mut acct, d(2), 10 * M, None).unwrap();
        l.sell_short(&mut acct, d(3), 10 * M, Some(5)).unwrap();
        assert_eq!(l.direction(), Direction::Short);
        assert_eq!(l.shares(), 5);
    }

    // --- Exit ---

    #[test]
    fn full_exit_books_profit() {
        let (mut acct, mut l) = setup(10_000);
        l.buy(&mut acct, d(1), 50 * M, Some(100)).unwrap();
        let out = l.sell(&mut acct, d(2), 60 * M, None).unwrap();

        assert_eq!(out, FillOutcome::new(-100, -100));
        assert_eq!(acct.cash_micros(), 11_000 * M);
        let t = &l.closed_trades()[0];
        assert_eq!(t.pl_points_micros, 10 * M);
        assert_eq!(t.pl_cash_micros, 1_000 * M);
        assert_eq!(t.cumul_total_micros, 1_000 * M);
        assert!(l.is_flat());
    }

    #[test]
    fn exit_spanning_lots_emits_one_row_per_lot() {
        let (mut acct, mut l) = setup(10_000);
        l.buy(&mut acct, d(1), 10 * M, Some(10)).unwrap();
        l.buy(&mut acct, d(2), 20 * M, Some(10)).unwrap();
        assert_eq!(l.average_entry_price_micros(), 15 * M);

        l.sell(&mut acct, d(3), 25 * M, Some(15)).unwrap();

        let rows = l.closed_trades();
        assert_eq!(rows.len(), 2);
        assert_eq!((rows[0].entry_price_micros, rows[0].qty), (10 * M, 10));
        assert_eq!((rows[1].entry_price_micros, rows[1].qty), (20 * M, 5));
        assert_eq!(l.shares(), 5);
        assert_eq!(l.average_entry_price_micros(), 20 * M);
        // one raw fill for the exit regardless of lots touched
        assert_eq!(l.raw_fills().len(), 3);
    }

    #[test]
    fn oversized_exit_clamps_to_held() {
        let (mut acct, mut l) = setup(10_000);
        l.buy(&mut acct, d(1), 10 * M, Some(40)).unwrap();
        let out = l.sell(&mut acct, d(2), 10 * M, Some(140)).unwrap();
        assert_eq!(out, FillOutcome::new(-140, -40));
        assert!(out.was_clamped());
        assert!(l.is_flat());
    }

    #[test]
    fn exit_when_flat_is_a_noop() {
        let (mut acct, mut l) = setup(10_000);
        let out = l.sell(&mut acct, d(1), 10 * M, None).unwrap();
        assert!(out.is_noop());
        assert!(l.raw_fills().is_empty());
    }

    #[test]
    fn negative_qty_exits_oldest_lots() {
        let (mut acct, mut l) = setup(10_000);
        l.buy(&mut acct, d(1), 10 * M, Some(3)).unwrap();
        l.buy(&mut acct, d(2), 11 * M, Some(4)).unwrap();
        l.buy(&mut acct, d(3), 12 * M, Some(5)).unwrap();

        let out = l.sell(&mut acct, d(4), 12 * M, Some(-2)).unwrap();
        assert_eq!(out.filled, -7);
        assert_eq!(l.shares(), 5);
        assert_eq!(l.average_entry_price_micros(), 12 * M);
    }

    #[test]
    fn short_round_trip_profits_when_price_falls() {
        let (mut acct, mut l) = setup(10_000);
        l.sell_short(&mut acct, d(1), 50 * M, Some(100)).unwrap();
        assert_eq!(acct.cash_micros(), 5_000 * M);
        // (2 * 50 - 40) * 100
        assert_eq!(l.share_value_micros(40 * M), 6_000 * M);

        l.buy_to_cover(&mut acct, d(2), 40 * M, None).unwrap();
        assert_eq!(l.closed_trades()[0].pl_cash_micros, 1_000 * M);
        assert_eq!(acct.cash_micros(), 11_000 * M);
    }

    #[test]
    fn multiplier_scales_cash_pl() {
        let mut acct = Account::cash_only(100_000 * M);
        let mut l = Ledger::with_multiplier("ES", 50).unwrap();
        l.buy(&mut acct, d(1), 4_000 * M, Some(2)).unwrap();
        l.sell(&mut acct, d(2), 4_010 * M, None).unwrap();

        let t = &l.closed_trades()[0];
        assert_eq!(t.pl_points_micros, 10 * M);
        assert_eq!(t.pl_cash_micros, 1_000 * M);
        assert_eq!(acct.cash_micros(), 101_000 * M);
    }

    #[test]
    fn zero_multiplier_rejected() {
        assert_eq!(
            Ledger::with_multiplier("ES", 0).unwrap_err(),
            ValidationError::InvalidMultiplier { multiplier: 0 }
        );
    }

    // --- Adjust ---

    #[test]
    fn adjust_shares_moves_to_target_both_ways() {
        let (mut acct, mut l) = setup(10_000);
        let up = l
            .adjust_shares(&mut acct, d(1), 10 * M, 30, Direction::Long)
            .unwrap();
        assert_eq!(up.filled, 30);
        let down = l
            .adjust_shares(&mut acct, d(2), 10 * M, 12, Direction::Long)
            .unwrap();
        assert_eq!(down.filled, -18);
        assert_eq!(l.shares(), 12);
    }

    #[test]
    fn adjust_to_zero_in_other_direction_closes() {
        let (mut acct, mut l) = setup(10_000);
        l.buy(&mut acct, d(1), 10 * M, Some(10)).unwrap();
        let out = l
            .adjust_shares(&mut acct, d(2), 10 * M, 0, Direction::Short)
            .unwrap();
        assert_eq!(out.filled, -10);
        assert!(l.is_flat());
    }

    #[test]
    fn adjust_percent_sizes_against_total_funds() {
        let (mut acct, mut l) = setup(10_000);
        l.adjust_percent(&mut acct, d(1), 100 * M, 0.5, Direction::Long)
            .unwrap();
        assert_eq!(l.shares(), 50);
        assert!((l.share_percent(&acct, 100 * M) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn adjust_percent_twice_is_idempotent() {
        let (mut acct, mut l) = setup(10_000);
        l.adjust_percent(&mut acct, d(1), 33 * M, 0.7, Direction::Long)
            .unwrap();
        let shares = l.shares();
        let cash = acct.cash_micros();

        let again = l
            .adjust_percent(&mut acct, d(1), 33 * M, 0.7, Direction::Long)
            .unwrap();
        assert!(again.is_noop());
        assert_eq!(l.shares(), shares);
        assert_eq!(acct.cash_micros(), cash);
    }

    #[test]
    fn adjust_percent_rejects_weight_out_of_range() {
        let (mut acct, mut l) = setup(10_000);
        let err = l.adjust_percent(&mut acct, d(1), 10 * M, 1.5, Direction::Long);
        assert_eq!(
            err,
            Err(ValidationError::WeightOutOfRange {
                symbol: "SPY".to_string(),
                weight: 1.5
            })
        );
        assert!(l
            .adjust_percent(&mut acct, d(1), 10 * M, -0.1, Direction::Long)
            .is_err());
    }

    #[test]
    fn adjust_value_caps_at_total_funds() {
        let (mut acct, mut l) = setup(1_000);
        l.adjust_value(&mut acct, d(1), 10 * M, 1_000_000 * M, Direction::Long)
            .unwrap();
        assert_eq!(l.shares(), 100);
    }

    #[test]
    fn zero_weight_closes_a_short_worth_less_than_nothing() {
        let (mut acct, mut l) = setup(10_000);
        l.sell_short(&mut acct, d(1), 50 * M, Some(10)).unwrap();
        // price more than doubled: (2·50 − 120)·10 < 0
        assert!(l.share_value_micros(120 * M) < 0);

        let out = l
            .adjust_percent(&mut acct, d(2), 120 * M, 0.0, Direction::Short)
            .unwrap();
        assert_eq!(out.filled, -10);
        assert!(l.is_flat());
    }

    // --- Integrity ---

    #[test]
    fn integrity_holds_after_mixed_activity() {
        let (mut acct, mut l) = setup(10_000);
        l.buy(&mut acct, d(1), 10 * M, Some(10)).unwrap();
        l.buy(&mut acct, d(2), 12 * M, Some(10)).unwrap();
        l.sell(&mut acct, d(3), 11 * M, Some(13)).unwrap();
        l.buy(&mut acct, d(4), 9 * M, Some(4)).unwrap();
        assert!(l.verify_integrity());
        assert_eq!(l.shares(), l.lots().map(|x| x.qty).sum::<i64>());
    }

    #[test]
    fn seq_nums_shared_through_account() {
        let mut acct = Account::cash_only(10_000 * M);
        let mut a = Ledger::new("A");
        let mut b = Ledger::new("B");
        a.buy(&mut acct, d(1), 10 * M, Some(1)).unwrap();
        b.buy(&mut acct, d(1), 10 * M, Some(1)).unwrap();
        a.sell(&mut acct, d(2), 10 * M, None).unwrap();
        assert_eq!(a.raw_fills()[0].seq_num, 1);
        assert_eq!(b.raw_fills()[0].seq_num, 2);
        assert_eq!(a.raw_fills()[1].seq_num, 3);
    }
}
