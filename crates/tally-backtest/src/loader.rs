//! Daily bar CSV loader (deterministic).
//!
//! CSV format (long: one row per symbol per date)
//!
//! Required columns:
//! - `date` (`YYYY-MM-DD`)
//! - `symbol`
//! - `open`, `high`, `low`, `close`
//!
//! Optional columns:
//! - `volume`
//!
//! Lines starting with `#` are skipped. The table keeps only the dates every
//! symbol has a bar for, so each row prices the whole universe.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::table::{PriceTable, TableError};

const REQUIRED: [&str; 6] = ["date", "symbol", "open", "high", "low", "close"];

/// Loader errors are small, explicit, and test-friendly.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadError {
    EmptyInput,
    MissingHeader(&'static str),
    BadRow { line: u64, reason: String },
    DuplicateBar { symbol: String, date: NaiveDate },
    Table(TableError),
    Io(String),
}

impl From<std::io::Error> for LoadError {
    fn from(e: std::io::Error) -> Self {
        LoadError::Io(e.to_string())
    }
}

impl From<TableError> for LoadError {
    fn from(e: TableError) -> Self {
        LoadError::Table(e)
    }
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::EmptyInput => write!(f, "empty input"),
            LoadError::MissingHeader(h) => write!(f, "missing header: {}", h),
            LoadError::BadRow { line, reason } => write!(f, "bad row at line {}: {}", line, reason),
            LoadError::DuplicateBar { symbol, date } => {
                write!(f, "duplicate bar for {} on {}", symbol, date)
            }
            LoadError::Table(e) => write!(f, "table: {}", e),
            LoadError::Io(e) => write!(f, "io error: {}", e),
        }
    }
}

impl std::error::Error for LoadError {}

#[derive(Debug, Deserialize)]
struct BarRecord {
    date: NaiveDate,
    symbol: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: Option<f64>,
}

#[derive(Clone, Copy, Debug)]
struct Ohlcv {
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: Option<f64>,
}

/// Load bars from a CSV file on disk.
pub fn load_csv_file(path: impl AsRef<Path>) -> Result<PriceTable, LoadError> {
    let file = std::fs::File::open(path)?;
    parse_csv_reader(file)
}

/// Parse bars from CSV content (pure, deterministic).
pub fn parse_csv_bars(csv: &str) -> Result<PriceTable, LoadError> {
    parse_csv_reader(csv.as_bytes())
}

fn parse_csv_reader<R: Read>(input: R) -> Result<PriceTable, LoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(input);

    let headers = rdr
        .headers()
        .map_err(|e| LoadError::BadRow {
            line: 1,
            reason: e.to_string(),
        })?
        .clone();
    if headers.iter().all(|h| h.trim_start_matches('\u{feff}').is_empty()) {
        return Err(LoadError::EmptyInput);
    }
    // A leading UTF-8 BOM would otherwise hide the first header.
    let names: Vec<String> = headers
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();
    for req in REQUIRED {
        if !names.iter().any(|h| h == req) {
            return Err(LoadError::MissingHeader(req));
        }
    }
    let has_volume = names.iter().any(|h| h == "volume");
    rdr.set_headers(csv::StringRecord::from(names));

    let mut bars: BTreeMap<String, BTreeMap<NaiveDate, Ohlcv>> = BTreeMap::new();
    for result in rdr.deserialize::<BarRecord>() {
        let rec = result.map_err(|e| LoadError::BadRow {
            line: e.position().map_or(0, |p| p.line()),
            reason: e.to_string(),
        })?;
        if rec.symbol.is_empty() {
            return Err(LoadError::BadRow {
                line: 0,
                reason: format!("symbol is empty on {}", rec.date),
            });
        }
        let per_symbol = bars.entry(rec.symbol.clone()).or_default();
        let bar = Ohlcv {
            open: rec.open,
            high: rec.high,
            low: rec.low,
            close: rec.close,
            volume: rec.volume,
        };
        if per_symbol.insert(rec.date, bar).is_some() {
            return Err(LoadError::DuplicateBar {
                symbol: rec.symbol,
                date: rec.date,
            });
        }
    }

    if bars.is_empty() {
        return Err(LoadError::EmptyInput);
    }

    let mut common: Option<BTreeSet<NaiveDate>> = None;
    for per_symbol in bars.values() {
        let dates: BTreeSet<NaiveDate> = per_symbol.keys().copied().collect();
        common = Some(match common {
            None => dates,
            Some(acc) => acc.intersection(&dates).copied().collect(),
        });
    }
    let dates: Vec<NaiveDate> = common.unwrap_or_default().into_iter().collect();

    let mut table = PriceTable::new(dates.clone())?;
    for (symbol, per_symbol) in &bars {
        let pick = |f: fn(&Ohlcv) -> f64| -> Vec<f64> {
            dates
                .iter()
                .map(|d| per_symbol.get(d).map_or(f64::NAN, f))
                .collect()
        };
        table.insert_symbol_column(symbol, "open", pick(|b| b.open))?;
        table.insert_symbol_column(symbol, "high", pick(|b| b.high))?;
        table.insert_symbol_column(symbol, "low", pick(|b| b.low))?;
        table.insert_symbol_column(symbol, "close", pick(|b| b.close))?;
        if has_volume {
            table.insert_symbol_column(
                symbol,
                "volume",
                pick(|b| b.volume.unwrap_or(f64::NAN)),
            )?;
        }
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 6, day).unwrap()
    }

    #[test]
    fn parse_csv_builds_wide_table() {
        let csv = r#"date,symbol,open,high,low,close
# seed data
2023-06-02,TLT,100,101,99,100.5
2023-06-01,SPY,400,405,398,404
2023-06-01,TLT,99,100,98,99.5
2023-06-02,SPY,404,410,402,409
"#;
        let t = parse_csv_bars(csv).expect("parse");
        assert_eq!(t.dates(), &[d(1), d(2)]);
        assert_eq!(t.symbols(), vec!["SPY".to_string(), "TLT".to_string()]);
        let spy = t.symbol_column("SPY", "close").unwrap();
        assert_eq!(t.values(spy), &[404.0, 409.0]);
        let tlt_high = t.symbol_column("TLT", "high").unwrap();
        assert_eq!(t.values(tlt_high), &[100.0, 101.0]);
        assert!(t.column("SPY_volume").is_err());
    }

    #[test]
    fn keeps_only_common_dates() {
        let csv = "date,symbol,open,high,low,close\n\
                   2023-06-01,SPY,1,1,1,1\n\
                   2023-06-02,SPY,2,2,2,2\n\
                   2023-06-02,GLD,3,3,3,3\n";
        let t = parse_csv_bars(csv).unwrap();
        assert_eq!(t.dates(), &[d(2)]);
    }

    #[test]
    fn missing_header_is_reported() {
        let csv = "date,symbol,open,high,low\n2023-06-01,SPY,1,1,1\n";
        assert_eq!(
            parse_csv_bars(csv).unwrap_err(),
            LoadError::MissingHeader("close")
        );
    }

    #[test]
    fn duplicate_bar_is_rejected() {
        let csv = "date,symbol,open,high,low,close\n\
                   2023-06-01,SPY,1,1,1,1\n\
                   2023-06-01,SPY,2,2,2,2\n";
        assert_eq!(
            parse_csv_bars(csv).unwrap_err(),
            LoadError::DuplicateBar {
                symbol: "SPY".to_string(),
                date: d(1)
            }
        );
    }

    #[test]
    fn bad_number_is_a_bad_row() {
        let csv = "date,symbol,open,high,low,close\n2023-06-01,SPY,1,x,1,1\n";
        assert!(matches!(
            parse_csv_bars(csv).unwrap_err(),
            LoadError::BadRow { .. }
        ));
    }

    #[test]
    fn empty_input() {
        assert_eq!(parse_csv_bars("").unwrap_err(), LoadError::EmptyInput);
    }
}
