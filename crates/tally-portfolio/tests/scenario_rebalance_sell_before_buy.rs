//! Scenario: Rebalancing frees cash before spending it
//!
//! # Invariants under test
//!
//! 1. In `adjust_percents`, every symbol whose weight falls is adjusted
//!    before any symbol whose weight rises, whatever the symbol order.
//!
//! 2. Because reductions run first, a fully invested, unlevered portfolio
//!    can rotate between symbols without any entry being clamped.
//!
//! 3. Two portfolios driven by the same calls end with identical logs; no
//!    state leaks between them.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tally_portfolio::{marks, Direction, Portfolio, MICROS_SCALE};

const M: i64 = MICROS_SCALE;

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2018, 10, day).unwrap()
}

fn w(items: &[(&str, f64)]) -> BTreeMap<String, f64> {
    items.iter().map(|(s, x)| (s.to_string(), *x)).collect()
}

fn rotate(pf: &mut Portfolio) -> Vec<(String, i64, bool)> {
    let dirs: BTreeMap<String, Direction> = BTreeMap::new();
    let px = marks([("AAA", 20 * M), ("MMM", 40 * M), ("ZZZ", 80 * M)]);

    pf.adjust_percents(d(1), &px, &w(&[("AAA", 0.2), ("MMM", 0.3), ("ZZZ", 0.5)]), &dirs)
        .unwrap();

    let px2 = marks([("AAA", 22 * M), ("MMM", 38 * M), ("ZZZ", 84 * M)]);
    pf.adjust_percents(d(2), &px2, &w(&[("AAA", 0.6), ("MMM", 0.4), ("ZZZ", 0.0)]), &dirs)
        .unwrap()
        .into_iter()
        .map(|s| (s.symbol, s.outcome.filled, s.outcome.was_clamped()))
        .collect()
}

#[test]
fn scenario_reductions_run_first() {
    let mut pf = Portfolio::new(["AAA", "MMM", "ZZZ"], 10_000 * M, 1.0).unwrap();
    let steps = rotate(&mut pf);

    let order: Vec<&str> = steps.iter().map(|(s, _, _)| s.as_str()).collect();
    assert_eq!(order, vec!["ZZZ", "MMM", "AAA"]);
    assert!(steps[0].1 < 0, "ZZZ is sold");
    assert!(steps[2].1 > 0, "AAA is bought");
}

#[test]
fn scenario_rotation_is_never_clamped() {
    let mut pf = Portfolio::new(["AAA", "MMM", "ZZZ"], 10_000 * M, 1.0).unwrap();
    let steps = rotate(&mut pf);
    assert!(steps.iter().all(|(_, _, clamped)| !clamped));
    assert_eq!(pf.shares("ZZZ"), 0);
    assert!(pf.cash_micros() >= 0);
}

#[test]
fn scenario_independent_portfolios_do_not_share_state() {
    let mut a = Portfolio::new(["AAA", "MMM", "ZZZ"], 10_000 * M, 1.0).unwrap();
    let mut b = Portfolio::new(["AAA", "MMM", "ZZZ"], 10_000 * M, 1.0).unwrap();
    rotate(&mut a);
    rotate(&mut b);

    let (la, lb) = (a.get_logs(), b.get_logs());
    assert_eq!(la.raw, lb.raw);
    assert_eq!(la.trades, lb.trades);
    assert_eq!(la.raw.first().map(|f| f.seq_num), Some(1));
}
