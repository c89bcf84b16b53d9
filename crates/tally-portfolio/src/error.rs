use crate::types::Direction;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Caller mistakes the ledger refuses to act on.
///
/// Every variant is raised before any state is touched: a call that returns
/// `Err` leaves cash, lots and logs exactly as they were. Over-sized exits and
/// entries beyond buying power are *not* errors; they are clamped and reported
/// through [`FillOutcome`](crate::FillOutcome).
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Rebalance weight must lie in `[0, 1]`.
    WeightOutOfRange { symbol: String, weight: f64 },
    /// Indicator lookback must be at least 1.
    UnsupportedLookback { lookback: i64 },
    /// Time frame string not one of daily/weekly/monthly/yearly.
    UnsupportedTimeFrame { time_frame: String },
    /// Direction may only change once the position is flat.
    DirectionFlip {
        symbol: String,
        held: Direction,
        requested: Direction,
    },
    /// Trade state string not one of OPEN/HOLD/CLOSE.
    UnknownTradeState { state: String },
    /// Fill prices must be strictly positive.
    NonPositivePrice { symbol: String, price_micros: i64 },
    /// Symbol is not part of the portfolio, or has no price for the day.
    UnknownSymbol { symbol: String },
    /// Margin below 1.0 would shrink buying power below cash.
    InvalidMargin { margin: f64 },
    /// Contract multiplier must be at least 1.
    InvalidMultiplier { multiplier: i64 },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WeightOutOfRange { symbol, weight } => {
                write!(f, "weight for {symbol} must be in [0, 1], got {weight}")
            }
            Self::UnsupportedLookback { lookback } => {
                write!(f, "lookback must be >= 1, got {lookback}")
            }
            Self::UnsupportedTimeFrame { time_frame } => write!(
                f,
                "time frame must be one of daily/weekly/monthly/yearly, got {time_frame:?}"
            ),
            Self::DirectionFlip {
                symbol,
                held,
                requested,
            } => write!(
                f,
                "{symbol}: cannot enter {requested} while holding a {held} position"
            ),
            Self::UnknownTradeState { state } => {
                write!(f, "trade state must be one of OPEN/HOLD/CLOSE, got {state:?}")
            }
            Self::NonPositivePrice {
                symbol,
                price_micros,
            } => write!(f, "{symbol}: price_micros must be > 0, got {price_micros}"),
            Self::UnknownSymbol { symbol } => write!(f, "unknown symbol {symbol:?}"),
            Self::InvalidMargin { margin } => write!(f, "margin must be >= 1.0, got {margin}"),
            Self::InvalidMultiplier { multiplier } => {
                write!(f, "multiplier must be >= 1, got {multiplier}")
            }
        }
    }
}

impl std::error::Error for ValidationError {}
