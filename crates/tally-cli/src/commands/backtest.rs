//! `tally backtest`: bar file + layered config -> benchmark run -> report.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::warn;
use uuid::Uuid;

use tally_artifacts::{write_backtest_report, ManifestArgs, RunManifest};
use tally_backtest::{BacktestConfig, BacktestEngine, BuyAndHold};
use tally_config::{report_unused_keys, UnusedKeyPolicy};
use tally_portfolio::f64_to_micros;

pub struct BacktestArgs {
    pub bars: String,
    pub config_paths: Vec<String>,
    pub out: Option<String>,
    pub strict_config: bool,
}

pub fn run_backtest(args: BacktestArgs) -> Result<()> {
    let loaded = super::load_config(&args.config_paths)?;

    let policy = if args.strict_config {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let unused = report_unused_keys(&loaded.config_json, policy)?;
    if !unused.is_clean() {
        warn!(keys = ?unused.unused_leaf_pointers, "config keys not read by backtest");
    }

    let settings = loaded.backtest_settings()?;

    let table = tally_backtest::load_csv_file(Path::new(&args.bars))
        .with_context(|| format!("load bars failed: {}", args.bars))?;

    let symbols = if settings.symbols.is_empty() {
        table.symbols()
    } else {
        settings.symbols.clone()
    };

    let config = BacktestConfig {
        symbols: symbols.clone(),
        capital_micros: f64_to_micros(settings.capital),
        margin: settings.margin,
        multiplier: settings.multiplier,
        risk_free: settings.risk_free,
        start: settings.start,
        end: settings.end,
    };

    let report = BacktestEngine::new(config)
        .run(&table, &mut BuyAndHold)
        .context("backtest failed")?;

    println!("backtest_ok=true");
    println!("config_hash={}", loaded.config_hash);
    println!("symbols={}", symbols.join(","));
    println!("rows={}", report.logs.daily.len());
    println!("fills={}", report.logs.raw.len());
    println!("trades={}", report.logs.trades.len());

    let pairs = report
        .stats
        .to_pairs()
        .context("render statistics failed")?;
    for (k, v) in pairs {
        println!("{}={}", k, v);
    }

    let kelly = tally_stats::kelly_criterion(&report.stats, None);
    println!(
        "kelly aggressive_leverage={:.4} moderate_leverage={:.4} conservative_leverage={:.4}",
        kelly.aggressive_leverage, kelly.moderate_leverage, kelly.conservative_leverage
    );

    if let Some(dir) = args.out.as_deref() {
        let manifest = RunManifest::new(ManifestArgs {
            run_id: Uuid::new_v4(),
            config_hash: &loaded.config_hash,
            bars_path: &args.bars,
            symbols: &symbols,
            strategy: "buy_and_hold",
        });
        let written = write_backtest_report(Path::new(dir), &report, &manifest)?;
        println!(
            "artifacts_written=true run_id={} out_dir={}",
            manifest.run_id,
            written.run_dir.display()
        );
    }

    Ok(())
}
