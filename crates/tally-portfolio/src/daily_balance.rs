//! Daily-balance recorder.
//!
//! One [`DailyBalanceRecord`] per simulated day. Records are appended while
//! the simulation runs with state `HOLD`; the real OPEN/HOLD/CLOSE tag needs
//! the finished closed-trade log and is applied by [`tag_trade_states`].

use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::account::Account;
use crate::ledger::Ledger;
use crate::metrics::{compute_equity_micros, compute_leverage};
use crate::types::{ClosedTrade, DailyBalanceRecord, TradeState};

#[derive(Clone, Debug, Default)]
pub struct DailyBalance {
    records: Vec<DailyBalanceRecord>,
}

impl DailyBalance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[DailyBalanceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append a pre-computed snapshot.
    pub fn push(&mut self, record: DailyBalanceRecord) {
        self.records.push(record);
    }

    /// Snapshot a single ledger, valuing it at the day's high, low and close.
    ///
    /// For a SHORT position the equity high comes from the low price and
    /// vice versa; the record keeps `high >= low` either way.
    pub fn append_ledger(
        &mut self,
        date: NaiveDate,
        high_micros: i64,
        low_micros: i64,
        close_micros: i64,
        ledger: &Ledger,
        acct: &Account,
    ) {
        let cash = acct.cash_micros();
        let at = |px: i64| compute_equity_micros(cash, ledger.share_value_micros(px));
        let (a, b) = (at(high_micros), at(low_micros));
        let close_sv = ledger.share_value_micros(close_micros);

        self.records.push(DailyBalanceRecord {
            date,
            high_micros: a.max(b),
            low_micros: a.min(b),
            close_micros: compute_equity_micros(cash, close_sv),
            shares: ledger.shares(),
            cash_micros: cash,
            leverage: compute_leverage(cash, close_sv),
            state: TradeState::Hold,
        });
    }

    /// Finished records tagged against `trades`.
    pub fn finalize(&self, trades: &[ClosedTrade]) -> Vec<DailyBalanceRecord> {
        let mut out = self.records.clone();
        tag_trade_states(&mut out, trades);
        out
    }
}

/// OPEN on any entry date, else CLOSE on any exit date, else HOLD.
pub fn tag_trade_states(records: &mut [DailyBalanceRecord], trades: &[ClosedTrade]) {
    let entries: BTreeSet<NaiveDate> = trades.iter().map(|t| t.entry_date).collect();
    let exits: BTreeSet<NaiveDate> = trades.iter().map(|t| t.exit_date).collect();
    for r in records.iter_mut() {
        r.state = if entries.contains(&r.date) {
            TradeState::Open
        } else if exits.contains(&r.date) {
            TradeState::Close
        } else {
            TradeState::Hold
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MICROS_SCALE;

    const M: i64 = MICROS_SCALE;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 2, day).unwrap()
    }

    #[test]
    fn ledger_snapshot_uses_high_low_close() {
        let mut acct = Account::cash_only(10_000 * M);
        let mut l = Ledger::new("SPY");
        l.buy(&mut acct, d(1), 50 * M, Some(100)).unwrap();

        let mut dbal = DailyBalance::new();
        dbal.append_ledger(d(1), 55 * M, 45 * M, 52 * M, &l, &acct);

        let r = &dbal.records()[0];
        assert_eq!(r.high_micros, 10_500 * M);
        assert_eq!(r.low_micros, 9_500 * M);
        assert_eq!(r.close_micros, 10_200 * M);
        assert_eq!(r.shares, 100);
        assert_eq!(r.cash_micros, 5_000 * M);
    }

    #[test]
    fn short_snapshot_keeps_high_above_low() {
        let mut acct = Account::cash_only(10_000 * M);
        let mut l = Ledger::new("SPY");
        l.sell_short(&mut acct, d(1), 50 * M, Some(100)).unwrap();

        let mut dbal = DailyBalance::new();
        dbal.append_ledger(d(1), 55 * M, 45 * M, 50 * M, &l, &acct);

        let r = &dbal.records()[0];
        assert_eq!(r.high_micros, 10_500 * M);
        assert_eq!(r.low_micros, 9_500 * M);
        assert_eq!(r.close_micros, 10_000 * M);
    }

    #[test]
    fn states_follow_trade_dates() {
        let mut acct = Account::cash_only(10_000 * M);
        let mut l = Ledger::new("SPY");
        let mut dbal = DailyBalance::new();

        l.buy(&mut acct, d(1), 10 * M, Some(10)).unwrap();
        dbal.append_ledger(d(1), 10 * M, 10 * M, 10 * M, &l, &acct);
        dbal.append_ledger(d(2), 10 * M, 10 * M, 10 * M, &l, &acct);
        l.sell(&mut acct, d(3), 10 * M, None).unwrap();
        dbal.append_ledger(d(3), 10 * M, 10 * M, 10 * M, &l, &acct);

        let tagged = dbal.finalize(l.closed_trades());
        let states: Vec<TradeState> = tagged.iter().map(|r| r.state).collect();
        assert_eq!(
            states,
            vec![TradeState::Open, TradeState::Hold, TradeState::Close]
        );
    }

    #[test]
    fn unknown_state_string_rejected() {
        assert!("LIMBO".parse::<TradeState>().is_err());
        assert_eq!("CLOSE".parse::<TradeState>().unwrap(), TradeState::Close);
    }
}
