use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use tally_backtest::BacktestReport;
use tally_portfolio::{micros_to_f64, ClosedTrade, DailyBalanceRecord, RawFill};

pub const SCHEMA_VERSION: i32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub schema_version: i32,
    pub run_id: Uuid,
    pub config_hash: String,
    pub bars_path: String,
    pub symbols: Vec<String>,
    pub strategy: String,
    pub created_at_utc: DateTime<Utc>,
    pub artifacts: ArtifactList,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactList {
    pub manifest_json: String,
    pub raw_fills_csv: String,
    pub trades_csv: String,
    pub daily_balance_csv: String,
    pub stats_json: String,
}

impl Default for ArtifactList {
    fn default() -> Self {
        Self {
            manifest_json: "manifest.json".to_string(),
            raw_fills_csv: "raw_fills.csv".to_string(),
            trades_csv: "trades.csv".to_string(),
            daily_balance_csv: "daily_balance.csv".to_string(),
            stats_json: "stats.json".to_string(),
        }
    }
}

pub struct ManifestArgs<'a> {
    pub run_id: Uuid,
    pub config_hash: &'a str,
    pub bars_path: &'a str,
    pub symbols: &'a [String],
    pub strategy: &'a str,
}

impl RunManifest {
    pub fn new(args: ManifestArgs<'_>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            run_id: args.run_id,
            config_hash: args.config_hash.to_string(),
            bars_path: args.bars_path.to_string(),
            symbols: args.symbols.to_vec(),
            strategy: args.strategy.to_string(),
            created_at_utc: Utc::now(),
            artifacts: ArtifactList::default(),
        }
    }
}

pub struct WrittenRun {
    pub run_dir: PathBuf,
    pub manifest_path: PathBuf,
}

/// Write every artifact of a finished run under `<exports_root>/<run_id>/`.
///
/// Existing files for the same run id are overwritten.
pub fn write_backtest_report(
    exports_root: &Path,
    report: &BacktestReport,
    manifest: &RunManifest,
) -> Result<WrittenRun> {
    let run_dir = exports_root.join(manifest.run_id.to_string());
    fs::create_dir_all(&run_dir)
        .with_context(|| format!("create exports dir failed: {}", run_dir.display()))?;
    let names = &manifest.artifacts;

    write_csv(
        &run_dir.join(&names.raw_fills_csv),
        report.logs.raw.iter().map(RawFillRow::from),
    )?;
    write_csv(
        &run_dir.join(&names.trades_csv),
        report.logs.trades.iter().map(TradeRow::from),
    )?;
    write_csv(
        &run_dir.join(&names.daily_balance_csv),
        report.logs.daily.iter().map(DailyBalanceRow::from),
    )?;
    write_json(&run_dir.join(&names.stats_json), &report.stats)?;

    let manifest_path = run_dir.join(&names.manifest_json);
    write_json(&manifest_path, manifest)?;

    Ok(WrittenRun {
        run_dir,
        manifest_path,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("serialize failed: {}", path.display()))?;
    fs::write(path, format!("{json}\n"))
        .with_context(|| format!("write failed: {}", path.display()))
}

fn write_csv<T, I>(path: &Path, rows: I) -> Result<()>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let mut w = csv::Writer::from_path(path)
        .with_context(|| format!("open csv failed: {}", path.display()))?;
    for row in rows {
        w.serialize(row)
            .with_context(|| format!("write csv row failed: {}", path.display()))?;
    }
    w.flush()
        .with_context(|| format!("flush csv failed: {}", path.display()))
}

// ---------------------------------------------------------------------------
// CSV rows (currency in decimal units)
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct RawFillRow<'a> {
    date: NaiveDate,
    seq_num: u64,
    price: f64,
    qty: i64,
    entry_exit: &'static str,
    direction: &'static str,
    symbol: &'a str,
}

impl<'a> From<&'a RawFill> for RawFillRow<'a> {
    fn from(f: &'a RawFill) -> Self {
        Self {
            date: f.date,
            seq_num: f.seq_num,
            price: micros_to_f64(f.price_micros),
            qty: f.qty,
            entry_exit: match f.entry_exit {
                tally_portfolio::EntryExit::Entry => "entry",
                tally_portfolio::EntryExit::Exit => "exit",
            },
            direction: f.direction.as_str(),
            symbol: &f.symbol,
        }
    }
}

#[derive(Serialize)]
struct TradeRow<'a> {
    entry_date: NaiveDate,
    entry_price: f64,
    exit_date: NaiveDate,
    exit_price: f64,
    pl_points: f64,
    pl_cash: f64,
    qty: i64,
    cumul_total: f64,
    direction: &'static str,
    symbol: &'a str,
}

impl<'a> From<&'a ClosedTrade> for TradeRow<'a> {
    fn from(t: &'a ClosedTrade) -> Self {
        Self {
            entry_date: t.entry_date,
            entry_price: micros_to_f64(t.entry_price_micros),
            exit_date: t.exit_date,
            exit_price: micros_to_f64(t.exit_price_micros),
            pl_points: micros_to_f64(t.pl_points_micros),
            pl_cash: micros_to_f64(t.pl_cash_micros),
            qty: t.qty,
            cumul_total: micros_to_f64(t.cumul_total_micros),
            direction: t.direction.as_str(),
            symbol: &t.symbol,
        }
    }
}

#[derive(Serialize)]
struct DailyBalanceRow {
    date: NaiveDate,
    high: f64,
    low: f64,
    close: f64,
    shares: i64,
    cash: f64,
    leverage: f64,
    state: &'static str,
}

impl From<&DailyBalanceRecord> for DailyBalanceRow {
    fn from(r: &DailyBalanceRecord) -> Self {
        Self {
            date: r.date,
            high: micros_to_f64(r.high_micros),
            low: micros_to_f64(r.low_micros),
            close: micros_to_f64(r.close_micros),
            shares: r.shares,
            cash: micros_to_f64(r.cash_micros),
            leverage: r.leverage,
            state: r.state.as_str(),
        }
    }
}
