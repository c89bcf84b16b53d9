use serde::Serialize;

// ============================================================================
// Series helpers
// ============================================================================

/// Percent change over `period` rows: `(x[i + period] - x[i]) / x[i] * 100`.
///
/// Yields `len - period` values; a zero base contributes 0.
pub fn pct_change(series: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || series.len() <= period {
        return Vec::new();
    }
    series
        .iter()
        .zip(&series[period..])
        .map(|(&a, &b)| if a == 0.0 { 0.0 } else { (b - a) / a * 100.0 })
        .collect()
}

/// Fractional day-over-day returns (`len - 1` values).
pub fn daily_returns(series: &[f64]) -> Vec<f64> {
    series
        .windows(2)
        .map(|w| if w[0] == 0.0 { 0.0 } else { w[1] / w[0] - 1.0 })
        .collect()
}

pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Population standard deviation (divide by N).
pub fn std_population(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let m = mean(xs);
    (xs.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / xs.len() as f64).sqrt()
}

/// Sample standard deviation (divide by N - 1); 0 below two values.
pub fn std_sample(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let m = mean(xs);
    (xs.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / (xs.len() - 1) as f64).sqrt()
}

// ============================================================================
// Sharpe / Sortino
// ============================================================================

/// Sharpe ratio with a ±3 standard-error band.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
pub struct SharpeBounds {
    pub ratio: f64,
    pub min: f64,
    pub max: f64,
}

/// `(mean * period - risk_free) / (std * sqrt(period))`, population std.
///
/// 0 for an empty series or zero dispersion.
pub fn sharpe_ratio(rets: &[f64], risk_free: f64, period: f64) -> f64 {
    annualized_ratio(mean(rets), std_population(rets), risk_free, period)
}

/// `sharpe ± 3 * sqrt((1 + 0.5 * sharpe^2) / N)`.
pub fn sharpe_with_bounds(rets: &[f64], risk_free: f64, period: f64) -> SharpeBounds {
    let ratio = sharpe_ratio(rets, risk_free, period);
    if rets.is_empty() {
        return SharpeBounds::default();
    }
    let stderr = ((1.0 + 0.5 * ratio * ratio) / rets.len() as f64).sqrt();
    SharpeBounds {
        ratio,
        min: ratio - 3.0 * stderr,
        max: ratio + 3.0 * stderr,
    }
}

/// Sharpe with the deviation taken over negative returns only.
pub fn sortino_ratio(rets: &[f64], risk_free: f64, period: f64) -> f64 {
    let downside: Vec<f64> = rets.iter().copied().filter(|&r| r < 0.0).collect();
    annualized_ratio(mean(rets), std_population(&downside), risk_free, period)
}

fn annualized_ratio(mean: f64, dev: f64, risk_free: f64, period: f64) -> f64 {
    let denom = dev * period.sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return 0.0;
    }
    (mean * period - risk_free) / denom
}

// ============================================================================
// Tests
// ============================================================================
