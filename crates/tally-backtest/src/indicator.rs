//! Per-symbol technical indicators.
//!
//! An [`Indicator`] maps one input column to one output series of the same
//! length, `NaN` where the window is not yet full. [`PriceTable::add_indicator`]
//! runs it once per symbol and stores `<SYMBOL>_<output_suffix>`.

use std::str::FromStr;

use tally_portfolio::ValidationError;
use tally_stats::{TRADING_DAYS_PER_MONTH, TRADING_DAYS_PER_WEEK, TRADING_DAYS_PER_YEAR};
use tracing::debug;

use crate::table::{ColumnRef, PriceTable, TableError};

#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorError {
    Validation(ValidationError),
    Table(TableError),
    /// Crossover windows must satisfy `1 <= fast < slow`, `slow >= 2`.
    InvalidCrossover { fast: usize, slow: usize },
}

impl From<ValidationError> for IndicatorError {
    fn from(e: ValidationError) -> Self {
        IndicatorError::Validation(e)
    }
}

impl From<TableError> for IndicatorError {
    fn from(e: TableError) -> Self {
        IndicatorError::Table(e)
    }
}

impl std::fmt::Display for IndicatorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndicatorError::Validation(e) => write!(f, "{}", e),
            IndicatorError::Table(e) => write!(f, "{}", e),
            IndicatorError::InvalidCrossover { fast, slow } => write!(
                f,
                "invalid crossover periods: fast={} slow={} (need 1 <= fast < slow, slow >= 2)",
                fast, slow
            ),
        }
    }
}

impl std::error::Error for IndicatorError {}

pub trait Indicator {
    fn compute(&self, table: &PriceTable, input: ColumnRef) -> Result<Vec<f64>, IndicatorError>;
}

impl PriceTable {
    /// Compute `indicator` over `<symbol>_<input_suffix>` for each symbol and
    /// store the result as `<symbol>_<output_suffix>`.
    pub fn add_indicator<I: Indicator + ?Sized>(
        &mut self,
        symbols: &[String],
        indicator: &I,
        output_suffix: &str,
        input_suffix: &str,
    ) -> Result<(), IndicatorError> {
        for symbol in symbols {
            let input = self.symbol_column(symbol, input_suffix)?;
            let values = indicator.compute(self, input)?;
            self.insert_symbol_column(symbol, output_suffix, values)?;
            debug!(symbol = %symbol, output = output_suffix, "indicator added");
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Time frames
// ----------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TimeFrame {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl TimeFrame {
    /// Trading days per unit.
    pub fn factor(self) -> usize {
        match self {
            TimeFrame::Daily => 1,
            TimeFrame::Weekly => TRADING_DAYS_PER_WEEK,
            TimeFrame::Monthly => TRADING_DAYS_PER_MONTH,
            TimeFrame::Yearly => TRADING_DAYS_PER_YEAR,
        }
    }

    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s {
            "daily" => Ok(TimeFrame::Daily),
            "weekly" => Ok(TimeFrame::Weekly),
            "monthly" => Ok(TimeFrame::Monthly),
            "yearly" => Ok(TimeFrame::Yearly),
            other => Err(ValidationError::UnsupportedTimeFrame {
                time_frame: other.to_string(),
            }),
        }
    }
}

impl FromStr for TimeFrame {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeFrame::parse(s)
    }
}

fn check_lookback(lookback: usize) -> Result<(), ValidationError> {
    if lookback < 1 {
        return Err(ValidationError::UnsupportedLookback {
            lookback: lookback as i64,
        });
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// Built-ins
// ----------------------------------------------------------------------------

/// Fractional price change over `lookback` time-frame units.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Momentum {
    pub lookback: usize,
    pub time_frame: TimeFrame,
}

impl Default for Momentum {
    fn default() -> Self {
        Self {
            lookback: 1,
            time_frame: TimeFrame::Monthly,
        }
    }
}

impl Indicator for Momentum {
    fn compute(&self, table: &PriceTable, input: ColumnRef) -> Result<Vec<f64>, IndicatorError> {
        check_lookback(self.lookback)?;
        let n = self.lookback * self.time_frame.factor();
        let xs = table.values(input);
        Ok((0..xs.len())
            .map(|i| {
                if i < n {
                    f64::NAN
                } else {
                    xs[i] / xs[i - n] - 1.0
                }
            })
            .collect())
    }
}

/// Rolling sample deviation of daily returns, scaled by `sqrt(time frame)`.
///
/// With `downside`, positive returns count as 0.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Volatility {
    pub lookback: usize,
    pub time_frame: TimeFrame,
    pub downside: bool,
}

impl Default for Volatility {
    fn default() -> Self {
        Self {
            lookback: 20,
            time_frame: TimeFrame::Yearly,
            downside: false,
        }
    }
}

impl Indicator for Volatility {
    fn compute(&self, table: &PriceTable, input: ColumnRef) -> Result<Vec<f64>, IndicatorError> {
        check_lookback(self.lookback)?;
        let xs = table.values(input);
        let scale = (self.time_frame.factor() as f64).sqrt();

        // rets[0] is undefined; the first full window ends at row `lookback`.
        let rets: Vec<f64> = (0..xs.len())
            .map(|i| {
                if i == 0 {
                    return f64::NAN;
                }
                let r = xs[i] / xs[i - 1] - 1.0;
                if self.downside && r > 0.0 {
                    0.0
                } else {
                    r
                }
            })
            .collect();

        let lb = self.lookback;
        Ok((0..xs.len())
            .map(|i| {
                if i < lb || lb < 2 {
                    return f64::NAN;
                }
                sample_std(&rets[i + 1 - lb..=i]) * scale
            })
            .collect())
    }
}

/// Regime direction and duration of a fast SMA against a slow SMA.
///
/// `+n`: fast above the upper band for `n` rows; `-n`: below the lower band.
/// Inside the band the count holds. `NaN` until the slow SMA exists.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Crossover {
    pub fast: usize,
    pub slow: usize,
    /// Percent band around the slow SMA (0..=100).
    pub band: f64,
}

impl Default for Crossover {
    fn default() -> Self {
        Self {
            fast: 50,
            slow: 200,
            band: 0.0,
        }
    }
}

impl Indicator for Crossover {
    fn compute(&self, table: &PriceTable, input: ColumnRef) -> Result<Vec<f64>, IndicatorError> {
        if self.fast < 1 || self.slow < 2 || self.fast >= self.slow {
            return Err(IndicatorError::InvalidCrossover {
                fast: self.fast,
                slow: self.slow,
            });
        }
        let xs = table.values(input);
        let fast = if self.fast == 1 {
            xs.to_vec()
        } else {
            sma(xs, self.fast)
        };
        let slow = sma(xs, self.slow);
        let upper = 1.0 + self.band / 100.0;
        let lower = 1.0 - self.band / 100.0;

        let mut regime = 0.0_f64;
        Ok(fast
            .iter()
            .zip(&slow)
            .map(|(&f, &s)| {
                if s.is_nan() {
                    regime = f64::NAN;
                } else if f > s * upper {
                    regime = if regime > 0.0 { regime + 1.0 } else { 1.0 };
                } else if f < s * lower {
                    regime = if regime < 0.0 { regime - 1.0 } else { -1.0 };
                }
                regime
            })
            .collect())
    }
}

/// Simple moving average.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Sma {
    pub period: usize,
}

impl Indicator for Sma {
    fn compute(&self, table: &PriceTable, input: ColumnRef) -> Result<Vec<f64>, IndicatorError> {
        check_lookback(self.period)?;
        Ok(sma(table.values(input), self.period))
    }
}

fn sma(xs: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; xs.len()];
    if period == 0 || xs.len() < period {
        return out;
    }
    let mut sum: f64 = xs[..period].iter().sum();
    out[period - 1] = sum / period as f64;
    for i in period..xs.len() {
        sum += xs[i] - xs[i - period];
        out[i] = sum / period as f64;
    }
    out
}

fn sample_std(xs: &[f64]) -> f64 {
    let n = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / n;
    (xs.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / (n - 1.0)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn table(closes: &[f64]) -> (PriceTable, ColumnRef) {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let dates = (0..closes.len())
            .map(|i| start + Duration::days(i as i64))
            .collect();
        let mut t = PriceTable::new(dates).unwrap();
        let c = t
            .insert_symbol_column("SPY", "close", closes.to_vec())
            .unwrap();
        (t, c)
    }

    fn same(a: &[f64], b: &[f64]) -> bool {
        a.len() == b.len()
            && a
                .iter()
                .zip(b)
                .all(|(x, y)| (x.is_nan() && y.is_nan()) || (x - y).abs() < 1e-12)
    }

    #[test]
    fn time_frame_parsing() {
        assert_eq!(TimeFrame::parse("weekly"), Ok(TimeFrame::Weekly));
        assert_eq!("yearly".parse::<TimeFrame>().unwrap().factor(), 252);
        assert_eq!(
            TimeFrame::parse("hourly"),
            Err(ValidationError::UnsupportedTimeFrame {
                time_frame: "hourly".to_string()
            })
        );
    }

    #[test]
    fn momentum_daily() {
        let (t, c) = table(&[10.0, 11.0, 12.1, 6.05]);
        let m = Momentum {
            lookback: 1,
            time_frame: TimeFrame::Daily,
        };
        let out = m.compute(&t, c).unwrap();
        assert!(same(&out, &[f64::NAN, 0.1, 0.1, -0.5]));
    }

    #[test]
    fn momentum_rejects_zero_lookback() {
        let (t, c) = table(&[1.0, 2.0]);
        let m = Momentum {
            lookback: 0,
            time_frame: TimeFrame::Daily,
        };
        assert_eq!(
            m.compute(&t, c),
            Err(IndicatorError::Validation(
                ValidationError::UnsupportedLookback { lookback: 0 }
            ))
        );
    }

    #[test]
    fn sma_window() {
        let (t, c) = table(&[1.0, 2.0, 3.0, 4.0]);
        let out = Sma { period: 2 }.compute(&t, c).unwrap();
        assert!(same(&out, &[f64::NAN, 1.5, 2.5, 3.5]));
    }

    #[test]
    fn volatility_window_and_downside() {
        // returns: NaN, +10%, -10%, +10%
        let (t, c) = table(&[100.0, 110.0, 99.0, 108.9]);
        let v = Volatility {
            lookback: 2,
            time_frame: TimeFrame::Daily,
            downside: false,
        };
        let out = v.compute(&t, c).unwrap();
        assert!(out[0].is_nan() && out[1].is_nan());
        // sample std of (0.1, -0.1)
        assert!((out[2] - 0.02_f64.sqrt()).abs() < 1e-9);

        let dv = Volatility {
            downside: true,
            ..v
        };
        let out = dv.compute(&t, c).unwrap();
        // sample std of (0, -0.1)
        assert!((out[2] - 0.005_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn crossover_counts_regime_duration() {
        // slow SMA(2) defined from row 1; fast is the price itself
        let (t, c) = table(&[10.0, 12.0, 14.0, 16.0, 10.0, 8.0, 8.0]);
        let x = Crossover {
            fast: 1,
            slow: 2,
            band: 0.0,
        };
        let out = x.compute(&t, c).unwrap();
        // sma2: NaN, 11, 13, 15, 13, 9, 8
        assert!(same(&out, &[f64::NAN, 1.0, 2.0, 3.0, -1.0, -2.0, -2.0]));
    }

    #[test]
    fn crossover_rejects_bad_periods() {
        let (t, c) = table(&[1.0, 2.0, 3.0]);
        for (fast, slow) in [(0, 5), (2, 1), (5, 5)] {
            let x = Crossover {
                fast,
                slow,
                band: 0.0,
            };
            assert_eq!(
                x.compute(&t, c),
                Err(IndicatorError::InvalidCrossover { fast, slow })
            );
        }
    }

    #[test]
    fn add_indicator_names_output_per_symbol() {
        let (mut t, _) = table(&[1.0, 2.0, 3.0]);
        t.insert_symbol_column("TLT", "close", vec![3.0, 2.0, 1.0])
            .unwrap();
        let symbols = t.symbols();
        t.add_indicator(&symbols, &Sma { period: 2 }, "sma2", "close")
            .unwrap();
        let tlt = t.symbol_column("TLT", "sma2").unwrap();
        assert!(same(t.values(tlt), &[f64::NAN, 2.5, 1.5]));
        // indicator columns are not mistaken for symbols
        assert_eq!(t.symbols(), vec!["SPY".to_string(), "TLT".to_string()]);

        let err = t
            .add_indicator(&symbols, &Sma { period: 2 }, "x", "open")
            .unwrap_err();
        assert!(matches!(err, IndicatorError::Table(TableError::MissingColumn(_))));
    }
}
