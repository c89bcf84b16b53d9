//! Date-indexed price table.
//!
//! Columns are plain `f64` vectors named `<SYMBOL>_<field>`. Callers resolve
//! a [`ColumnRef`] once, then read rows by index with no name lookups.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tally_portfolio::{f64_to_micros, MarkMap};

#[derive(Debug, Clone, PartialEq)]
pub enum TableError {
    MissingColumn(String),
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
    UnorderedDates {
        index: usize,
        date: NaiveDate,
    },
    /// The column has no owning symbol, so it cannot feed a price map.
    NotSymbolColumn(String),
    MissingValue {
        column: String,
        date: NaiveDate,
    },
}

impl std::fmt::Display for TableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableError::MissingColumn(c) => write!(f, "missing column: {}", c),
            TableError::LengthMismatch {
                column,
                expected,
                actual,
            } => write!(
                f,
                "column {} has {} values, table has {} rows",
                column, actual, expected
            ),
            TableError::UnorderedDates { index, date } => {
                write!(f, "dates not strictly increasing at row {}: {}", index, date)
            }
            TableError::NotSymbolColumn(c) => write!(f, "column {} belongs to no symbol", c),
            TableError::MissingValue { column, date } => {
                write!(f, "no value in column {} on {}", column, date)
            }
        }
    }
}

impl std::error::Error for TableError {}

/// Resolved handle to one column of one table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ColumnRef(usize);

#[derive(Clone, Debug)]
struct Column {
    name: String,
    symbol: Option<String>,
    values: Vec<f64>,
}

#[derive(Clone, Debug, Default)]
pub struct PriceTable {
    dates: Vec<NaiveDate>,
    columns: Vec<Column>,
    by_name: BTreeMap<String, usize>,
}

/// `SPY` + `close` -> `SPY_close`.
pub fn symbol_column_name(symbol: &str, field: &str) -> String {
    format!("{}_{}", symbol, field)
}

impl PriceTable {
    /// An empty table over `dates`, which must be strictly increasing.
    pub fn new(dates: Vec<NaiveDate>) -> Result<Self, TableError> {
        for (i, w) in dates.windows(2).enumerate() {
            if w[1] <= w[0] {
                return Err(TableError::UnorderedDates {
                    index: i + 1,
                    date: w[1],
                });
            }
        }
        Ok(Self {
            dates,
            ..Default::default()
        })
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Add (or replace) a column that belongs to no symbol.
    pub fn insert_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<ColumnRef, TableError> {
        self.put(name.into(), None, values)
    }

    /// Add (or replace) `<symbol>_<field>`.
    pub fn insert_symbol_column(
        &mut self,
        symbol: &str,
        field: &str,
        values: Vec<f64>,
    ) -> Result<ColumnRef, TableError> {
        self.put(
            symbol_column_name(symbol, field),
            Some(symbol.to_string()),
            values,
        )
    }

    fn put(
        &mut self,
        name: String,
        symbol: Option<String>,
        values: Vec<f64>,
    ) -> Result<ColumnRef, TableError> {
        if values.len() != self.dates.len() {
            return Err(TableError::LengthMismatch {
                column: name,
                expected: self.dates.len(),
                actual: values.len(),
            });
        }
        if let Some(&i) = self.by_name.get(&name) {
            self.columns[i] = Column {
                name,
                symbol,
                values,
            };
            return Ok(ColumnRef(i));
        }
        let i = self.columns.len();
        self.by_name.insert(name.clone(), i);
        self.columns.push(Column {
            name,
            symbol,
            values,
        });
        Ok(ColumnRef(i))
    }

    pub fn column(&self, name: &str) -> Result<ColumnRef, TableError> {
        self.by_name
            .get(name)
            .map(|&i| ColumnRef(i))
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))
    }

    pub fn symbol_column(&self, symbol: &str, field: &str) -> Result<ColumnRef, TableError> {
        self.column(&symbol_column_name(symbol, field))
    }

    pub fn values(&self, col: ColumnRef) -> &[f64] {
        &self.columns[col.0].values
    }

    pub fn column_name(&self, col: ColumnRef) -> &str {
        &self.columns[col.0].name
    }

    /// Column names in insertion order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Symbols that own a `close` column, sorted.
    pub fn symbols(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .columns
            .iter()
            .filter_map(|c| match &c.symbol {
                Some(s) if c.name == symbol_column_name(s, "close") => Some(s.clone()),
                _ => None,
            })
            .collect();
        out.sort();
        out
    }

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        (index < self.dates.len()).then_some(Row { table: self, index })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> + '_ {
        (0..self.dates.len()).map(move |index| Row { table: self, index })
    }

    /// Half-open row range covering `start..=end` (either bound optional).
    pub fn date_range(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> std::ops::Range<usize> {
        let lo = start.map_or(0, |s| self.dates.partition_point(|d| *d < s));
        let hi = end.map_or(self.dates.len(), |e| self.dates.partition_point(|d| *d <= e));
        lo..hi.max(lo)
    }
}

/// One date of a [`PriceTable`].
#[derive(Copy, Clone, Debug)]
pub struct Row<'a> {
    table: &'a PriceTable,
    index: usize,
}

impl<'a> Row<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn date(&self) -> NaiveDate {
        self.table.dates[self.index]
    }

    pub fn get(&self, col: ColumnRef) -> f64 {
        self.table.columns[col.0].values[self.index]
    }

    /// Price map for the symbols owning `cols`, converted to micros.
    pub fn marks(&self, cols: &[ColumnRef]) -> Result<MarkMap, TableError> {
        let mut out = MarkMap::new();
        for &col in cols {
            let c = &self.table.columns[col.0];
            let symbol = c
                .symbol
                .as_ref()
                .ok_or_else(|| TableError::NotSymbolColumn(c.name.clone()))?;
            let v = c.values[self.index];
            if !v.is_finite() {
                return Err(TableError::MissingValue {
                    column: c.name.clone(),
                    date: self.date(),
                });
            }
            out.insert(symbol.clone(), f64_to_micros(v));
        }
        Ok(out)
    }
}
