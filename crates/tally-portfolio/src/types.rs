use std::str::FromStr;

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::ValidationError;

/// LONG or SHORT. Fixed for a ledger while it holds shares.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    #[default]
    Long,
    Short,
}

impl Direction {
    /// +1 for LONG, -1 for SHORT.
    pub fn sign(self) -> i64 {
        match self {
            Direction::Long => 1,
            Direction::Short => -1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Long => "LONG",
            Direction::Short => "SHORT",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a raw fill opened or closed shares.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryExit {
    Entry,
    Exit,
}

/// Per-day tag derived from the closed-trade log.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeState {
    Open,
    #[default]
    Hold,
    Close,
}

impl TradeState {
    pub fn as_str(self) -> &'static str {
        match self {
            TradeState::Open => "OPEN",
            TradeState::Hold => "HOLD",
            TradeState::Close => "CLOSE",
        }
    }
}

impl FromStr for TradeState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "OPEN" => Ok(TradeState::Open),
            "HOLD" => Ok(TradeState::Hold),
            "CLOSE" => Ok(TradeState::Close),
            other => Err(ValidationError::UnknownTradeState {
                state: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for TradeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A FIFO lot. `qty` is always positive; direction lives on the ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lot {
    pub entry_date: NaiveDate,
    pub entry_price_micros: i64,
    pub qty: i64,
}

impl Lot {
    pub fn new(entry_date: NaiveDate, entry_price_micros: i64, qty: i64) -> Self {
        debug_assert!(qty > 0, "Lot.qty must be > 0");
        debug_assert!(entry_price_micros > 0, "Lot.entry_price_micros must be > 0");
        Self {
            entry_date,
            entry_price_micros,
            qty,
        }
    }
}

/// One row of the closed-trade log: a lot (or the consumed part of one)
/// matched against an exit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClosedTrade {
    pub entry_date: NaiveDate,
    pub entry_price_micros: i64,
    pub exit_date: NaiveDate,
    pub exit_price_micros: i64,
    /// Per-share gain in price units, sign-adjusted for direction.
    pub pl_points_micros: i64,
    /// `pl_points * qty * multiplier`.
    pub pl_cash_micros: i64,
    pub qty: i64,
    /// Running sum of `pl_cash` up to and including this row.
    pub cumul_total_micros: i64,
    pub direction: Direction,
    pub symbol: String,
}

/// One row of the raw-fill log: every enter/exit call that moved shares.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RawFill {
    pub date: NaiveDate,
    /// Portfolio-wide monotonic sequence number.
    pub seq_num: u64,
    pub price_micros: i64,
    /// Always positive; see `entry_exit` for the sense.
    pub qty: i64,
    pub entry_exit: EntryExit,
    pub direction: Direction,
    pub symbol: String,
}

/// One mark-to-market snapshot per simulated day.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DailyBalanceRecord {
    pub date: NaiveDate,
    pub high_micros: i64,
    pub low_micros: i64,
    pub close_micros: i64,
    pub shares: i64,
    pub cash_micros: i64,
    pub leverage: f64,
    pub state: TradeState,
}

/// What an enter/exit/adjust call asked for versus what it did.
///
/// Both values are signed: positive means shares entered, negative means
/// shares exited. `requested` is the caller's delta before any clamping.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FillOutcome {
    pub requested: i64,
    pub filled: i64,
}

impl FillOutcome {
    pub fn new(requested: i64, filled: i64) -> Self {
        Self { requested, filled }
    }

    /// Nothing requested, nothing filled.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn was_clamped(&self) -> bool {
        self.requested != self.filled
    }

    pub fn is_noop(&self) -> bool {
        self.filled == 0
    }
}

/// How much to take off in an exit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExitQty {
    /// Every share held.
    All,
    /// `n` shares, clamped to holdings.
    Shares(i64),
    /// The `n` oldest open lots, entirely.
    Lots(usize),
}

impl ExitQty {
    /// Signed convention: `None` = all, positive = shares, negative = lots.
    pub fn from_signed(qty: Option<i64>) -> Self {
        match qty {
            None => ExitQty::All,
            Some(n) if n >= 0 => ExitQty::Shares(n),
            Some(n) => ExitQty::Lots(n.unsigned_abs() as usize),
        }
    }
}
