use crate::accounting::scale_micros;

/// Account-level valuation at one set of prices (micros).
#[derive(Clone, Debug, PartialEq)]
pub struct EquityMetrics {
    pub cash_micros: i64,
    pub share_value_micros: i64,
    pub total_value_micros: i64,
    pub equity_micros: i64,
    pub total_funds_micros: i64,
    pub leverage: f64,
}

impl EquityMetrics {
    pub fn compute(cash_micros: i64, share_value_micros: i64, margin: f64) -> Self {
        Self {
            cash_micros,
            share_value_micros,
            total_value_micros: compute_total_value_micros(cash_micros, share_value_micros),
            equity_micros: compute_equity_micros(cash_micros, share_value_micros),
            total_funds_micros: compute_total_funds_micros(cash_micros, share_value_micros, margin),
            leverage: compute_leverage(cash_micros, share_value_micros),
        }
    }
}

/// total_value = share_value + cash, counting cash only while it is positive.
pub fn compute_total_value_micros(cash_micros: i64, share_value_micros: i64) -> i64 {
    if cash_micros > 0 {
        share_value_micros.saturating_add(cash_micros)
    } else {
        share_value_micros
    }
}

/// equity = total_value, less borrowed cash when cash is negative.
pub fn compute_equity_micros(cash_micros: i64, share_value_micros: i64) -> i64 {
    let total_value = compute_total_value_micros(cash_micros, share_value_micros);
    if cash_micros < 0 {
        total_value.saturating_add(cash_micros)
    } else {
        total_value
    }
}

/// leverage = total_value / equity; 0 when equity is not positive.
pub fn compute_leverage(cash_micros: i64, share_value_micros: i64) -> f64 {
    let equity = compute_equity_micros(cash_micros, share_value_micros);
    if equity <= 0 {
        return 0.0;
    }
    compute_total_value_micros(cash_micros, share_value_micros) as f64 / equity as f64
}

/// total_funds = equity * margin.
pub fn compute_total_funds_micros(cash_micros: i64, share_value_micros: i64, margin: f64) -> i64 {
    scale_micros(compute_equity_micros(cash_micros, share_value_micros), margin)
}
