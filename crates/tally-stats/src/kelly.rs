//! Leverage sizing from a finished run's statistics.
//!
//! The Kelly criterion puts the optimal target risk (annualized standard
//! deviation of returns) at the expected Sharpe ratio. Dividing a target risk
//! by the instrument's own risk gives a leverage factor: the cash value of a
//! position divided by capital.

use serde::Serialize;

use crate::stats::Statistics;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct KellyCriterion {
    pub sharpe_ratio: f64,
    pub sharpe_ratio_max: f64,
    pub sharpe_ratio_min: f64,
    /// Annual standard deviation of the strategy's returns, as a fraction.
    pub strategy_risk: f64,
    /// Annual standard deviation of the instrument's returns before leverage.
    pub instrument_risk: f64,
    /// Equal to the expected Sharpe ratio.
    pub optimal_target_risk: f64,
    /// Half the expected Sharpe ratio.
    pub half_kelly_criterion: f64,
    /// Optimal target risk / instrument risk.
    pub aggressive_leverage: f64,
    /// Half Kelly / instrument risk.
    pub moderate_leverage: f64,
    /// Half the minimum expected Sharpe / instrument risk.
    pub conservative_leverage: f64,
}

/// Size leverage for `stats`.
///
/// Instrument risk comes from `benchmark` (typically a buy-and-hold run of
/// the traded instrument); without one the strategy's own risk stands in.
/// Every leverage factor is 0 when instrument risk is not positive.
pub fn kelly_criterion(stats: &Statistics, benchmark: Option<&Statistics>) -> KellyCriterion {
    let strategy_risk = stats.annual_std / 100.0;
    let instrument_risk = benchmark.map_or(strategy_risk, |b| b.annual_std / 100.0);
    let optimal_target_risk = stats.sharpe_ratio;
    let half_kelly_criterion = stats.sharpe_ratio / 2.0;

    let leverage = |target_risk: f64| {
        if instrument_risk > 0.0 {
            target_risk / instrument_risk
        } else {
            0.0
        }
    };

    KellyCriterion {
        sharpe_ratio: stats.sharpe_ratio,
        sharpe_ratio_max: stats.sharpe_ratio_max,
        sharpe_ratio_min: stats.sharpe_ratio_min,
        strategy_risk,
        instrument_risk,
        optimal_target_risk,
        half_kelly_criterion,
        aggressive_leverage: leverage(optimal_target_risk),
        moderate_leverage: leverage(half_kelly_criterion),
        conservative_leverage: leverage(stats.sharpe_ratio_min / 2.0),
    }
}
