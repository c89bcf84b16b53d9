//! FIFO lot mechanics and fixed-point helpers.
//!
//! Pure arithmetic over a lot queue. The [`Ledger`](crate::Ledger) owns the
//! queue and the logs; this module only knows how lots are valued and
//! consumed. Products go through `i128` and are clamped back to `i64`.

use std::collections::VecDeque;

use crate::types::{Direction, Lot};

pub(crate) fn mul_qty_price_micros(qty: i64, price_micros: i64) -> i128 {
    (qty as i128) * (price_micros as i128)
}

pub(crate) fn i128_to_i64_clamp(x: i128) -> i64 {
    if x > i64::MAX as i128 {
        i64::MAX
    } else if x < i64::MIN as i128 {
        i64::MIN
    } else {
        x as i64
    }
}

/// Scale a micros amount by a ratio, rounding to the nearest micro.
pub(crate) fn scale_micros(amount_micros: i64, factor: f64) -> i64 {
    let scaled = (amount_micros as f64 * factor).round();
    if scaled >= i64::MAX as f64 {
        i64::MAX
    } else if scaled <= i64::MIN as f64 {
        i64::MIN
    } else {
        scaled as i64
    }
}

/// Whole shares affordable with `funds_micros` at `price_micros` (floored, never negative).
pub(crate) fn shares_for_funds(funds_micros: i64, price_micros: i64) -> i64 {
    if funds_micros <= 0 || price_micros <= 0 {
        return 0;
    }
    funds_micros / price_micros
}

/// Σ qty over the open lots.
pub(crate) fn total_qty(lots: &VecDeque<Lot>) -> i64 {
    lots.iter().map(|l| l.qty).sum()
}

/// Volume-weighted mean entry price of the open lots (floored to the micro).
///
/// Returns 0 for an empty queue.
pub(crate) fn vwap_micros(lots: &VecDeque<Lot>) -> i64 {
    let mut notional: i128 = 0;
    let mut qty: i128 = 0;
    for lot in lots {
        notional += mul_qty_price_micros(lot.qty, lot.entry_price_micros);
        qty += lot.qty as i128;
    }
    if qty == 0 {
        return 0;
    }
    i128_to_i64_clamp(notional / qty)
}

/// Per-share P&L in price units for one lot closed at `exit_price_micros`.
///
/// LONG: `exit - entry`; SHORT: `entry - exit`.
pub(crate) fn pl_points_micros(direction: Direction, entry_micros: i64, exit_micros: i64) -> i64 {
    let diff = exit_micros as i128 - entry_micros as i128;
    i128_to_i64_clamp(diff * direction.sign() as i128)
}

/// Cash value of the open lots at `price_micros`.
///
/// Per lot: `qty * (entry + sign * (price - entry) * multiplier)`. With a
/// multiplier of 1 this is `price * qty` for LONG and `(2 * entry - price) * qty`
/// for SHORT.
pub(crate) fn share_value_micros(
    lots: &VecDeque<Lot>,
    direction: Direction,
    price_micros: i64,
    multiplier: i64,
) -> i64 {
    let mut value: i128 = 0;
    for lot in lots {
        let entry = lot.entry_price_micros as i128;
        let move_per_share =
            (price_micros as i128 - entry) * direction.sign() as i128 * multiplier as i128;
        value += (lot.qty as i128) * (entry + move_per_share);
    }
    i128_to_i64_clamp(value)
}

/// Remove `qty` shares from the front of the queue.
///
/// Returns the consumed portions in FIFO order, each carrying the original
/// lot's entry date and price. Stops early if the queue runs dry.
pub(crate) fn consume_fifo(lots: &mut VecDeque<Lot>, mut qty: i64) -> Vec<Lot> {
    let mut consumed = Vec::new();
    while qty > 0 {
        let Some(front) = lots.front_mut() else {
            break;
        };
        let take = front.qty.min(qty);
        consumed.push(Lot::new(front.entry_date, front.entry_price_micros, take));
        front.qty -= take;
        if front.qty == 0 {
            lots.pop_front();
        }
        qty -= take;
    }
    consumed
}

/// Share count held by the `n` oldest lots.
pub(crate) fn qty_of_oldest_lots(lots: &VecDeque<Lot>, n: usize) -> i64 {
    lots.iter().take(n).map(|l| l.qty).sum()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
