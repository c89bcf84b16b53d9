use chrono::NaiveDate;
use serde::{Serialize, Serializer};

// ============================================================================
// Types
// ============================================================================

/// When (if ever) a series climbed back above the drawdown's peak.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Recovery {
    Recovered(NaiveDate),
    NotRecovered,
}

impl std::fmt::Display for Recovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Recovery::Recovered(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Recovery::NotRecovered => f.write_str("Not Recovered Yet"),
        }
    }
}

impl Serialize for Recovery {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The worst peak-to-trough decline of a series.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Drawdown {
    /// Percent decline from the peak; always `<= 0`.
    pub max_pct: f64,
    pub peak: f64,
    pub trough: f64,
    /// First date the series stood at `peak`.
    pub start_date: NaiveDate,
    /// Date of the trough.
    pub end_date: NaiveDate,
    pub recovery: Recovery,
}

// ============================================================================
// Maximum drawdown
// ============================================================================

/// Worst closed-out drawdown: each close against the running maximum close.
///
/// Returns `None` for an empty series or mismatched lengths.
pub fn max_closed_out_drawdown(dates: &[NaiveDate], close: &[f64]) -> Option<Drawdown> {
    drawdown_against(dates, close, close)
}

/// Worst intra-day drawdown: each low against the running maximum high.
pub fn max_intra_day_drawdown(dates: &[NaiveDate], high: &[f64], low: &[f64]) -> Option<Drawdown> {
    if high.len() != low.len() {
        return None;
    }
    drawdown_against(dates, high, low)
}

/// One left-to-right pass: running max of `peaks`, percent gap to `troughs`.
fn drawdown_against(dates: &[NaiveDate], peaks: &[f64], troughs: &[f64]) -> Option<Drawdown> {
    if peaks.is_empty() || dates.len() != peaks.len() {
        return None;
    }

    let mut running_max = peaks[0];
    let mut worst = f64::INFINITY;
    let mut worst_idx = 0usize;
    let mut worst_peak = peaks[0];
    for (i, (&p, &t)) in peaks.iter().zip(troughs).enumerate() {
        if p > running_max {
            running_max = p;
        }
        let dd = pct_from(running_max, t);
        // strict `<` keeps the first occurrence of the minimum
        if dd < worst {
            worst = dd;
            worst_idx = i;
            worst_peak = running_max;
        }
    }

    let start_idx = peaks.iter().position(|&p| p == worst_peak).unwrap_or(0);
    let recovery = peaks[worst_idx + 1..]
        .iter()
        .position(|&p| p > worst_peak)
        .map(|off| Recovery::Recovered(dates[worst_idx + 1 + off]))
        .unwrap_or(Recovery::NotRecovered);

    Some(Drawdown {
        max_pct: worst.min(0.0),
        peak: worst_peak,
        trough: troughs[worst_idx],
        start_date: dates[start_idx],
        end_date: dates[worst_idx],
        recovery,
    })
}

// ============================================================================
// Rolling windows
// ============================================================================

/// Worst drawdown inside every trailing window of `period + 1` values.
///
/// The series is front-padded with its first value so there is one output
/// per input. Each window is evaluated through `slice::windows`, no copies.
pub fn rolling_max_drawdown(series: &[f64], period: usize) -> Vec<f64> {
    rolling(series, period, |w| {
        let mut running_max = w[0];
        let mut worst = 0.0_f64;
        for &x in w {
            running_max = running_max.max(x);
            worst = worst.min(pct_from(running_max, x));
        }
        worst
    })
}

/// Best runup inside every trailing window of `period + 1` values.
pub fn rolling_max_runup(series: &[f64], period: usize) -> Vec<f64> {
    rolling(series, period, |w| {
        let mut running_min = w[0];
        let mut best = 0.0_f64;
        for &x in w {
            running_min = running_min.min(x);
            best = best.max(pct_from(running_min, x));
        }
        best
    })
}

fn rolling<F>(series: &[f64], period: usize, f: F) -> Vec<f64>
where
    F: Fn(&[f64]) -> f64,
{
    let Some(&first) = series.first() else {
        return Vec::new();
    };
    let mut padded = Vec::with_capacity(series.len() + period);
    padded.resize(period, first);
    padded.extend_from_slice(series);
    padded.windows(period + 1).map(f).collect()
}

/// Percent change from `base` to `x`; 0 when `base` is 0.
fn pct_from(base: f64, x: f64) -> f64 {
    if base == 0.0 {
        return 0.0;
    }
    (x - base) / base * 100.0
}

// ============================================================================
// Tests
// ============================================================================
