//! Parallel parameter sweeps.
//!
//! # Determinism
//! Each parameter gets its own strategy instance and its own portfolio, so
//! runs share nothing but the read-only table. Results come back in input
//! order regardless of scheduling.

use rayon::prelude::*;
use tracing::info;

use crate::engine::{BacktestEngine, BacktestError, Strategy};
use crate::table::PriceTable;
use crate::types::BacktestReport;

/// One sweep point and its outcome.
#[derive(Clone, Debug, PartialEq)]
pub struct SweepResult<P> {
    pub param: P,
    pub outcome: Result<BacktestReport, BacktestError>,
}

/// Run one backtest per entry of `params`, in parallel.
///
/// `factory` builds a fresh strategy from a parameter.
pub fn run_sweep<P, S, F>(
    engine: &BacktestEngine,
    table: &PriceTable,
    params: &[P],
    factory: F,
) -> Vec<SweepResult<P>>
where
    P: Clone + Send + Sync,
    S: Strategy,
    F: Fn(&P) -> S + Sync,
{
    info!(runs = params.len(), "sweep start");
    params
        .par_iter()
        .map(|p| {
            let mut strategy = factory(p);
            SweepResult {
                param: p.clone(),
                outcome: engine.run(table, &mut strategy),
            }
        })
        .collect()
}
