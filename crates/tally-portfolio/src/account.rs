//! The cash pool shared by every ledger of one portfolio.
//!
//! An `Account` is created per backtest and handed to ledgers by `&mut`.
//! There is no global state: two portfolios never see each other's cash or
//! sequence numbers, so independent runs can execute on separate threads.

use crate::accounting::scale_micros;
use crate::error::ValidationError;

#[derive(Clone, Debug, PartialEq)]
pub struct Account {
    initial_cash_micros: i64,
    cash_micros: i64,
    margin: f64,
    last_seq_num: u64,
}

impl Account {
    /// `margin` of 1.0 means no borrowing; 2.0 doubles buying power.
    pub fn new(capital_micros: i64, margin: f64) -> Result<Self, ValidationError> {
        if !(margin.is_finite() && margin >= 1.0) {
            return Err(ValidationError::InvalidMargin { margin });
        }
        Ok(Self {
            initial_cash_micros: capital_micros,
            cash_micros: capital_micros,
            margin,
            last_seq_num: 0,
        })
    }

    /// Unlevered account.
    pub fn cash_only(capital_micros: i64) -> Self {
        Self {
            initial_cash_micros: capital_micros,
            cash_micros: capital_micros,
            margin: 1.0,
            last_seq_num: 0,
        }
    }

    pub fn initial_cash_micros(&self) -> i64 {
        self.initial_cash_micros
    }

    pub fn cash_micros(&self) -> i64 {
        self.cash_micros
    }

    pub fn margin(&self) -> f64 {
        self.margin
    }

    /// Last sequence number handed out (0 if none).
    pub fn last_seq_num(&self) -> u64 {
        self.last_seq_num
    }

    /// `cash * margin + share_value * (margin - 1)`.
    ///
    /// Margin multiplies the cash component; open positions only contribute
    /// their borrowable excess.
    pub fn buying_power_micros(&self, share_value_micros: i64) -> i64 {
        scale_micros(self.cash_micros, self.margin)
            .saturating_add(scale_micros(share_value_micros, self.margin - 1.0))
    }

    pub(crate) fn debit(&mut self, amount_micros: i64) {
        self.cash_micros = self.cash_micros.saturating_sub(amount_micros);
    }

    pub(crate) fn credit(&mut self, amount_micros: i64) {
        self.cash_micros = self.cash_micros.saturating_add(amount_micros);
    }

    pub(crate) fn next_seq_num(&mut self) -> u64 {
        self.last_seq_num += 1;
        self.last_seq_num
    }
}
