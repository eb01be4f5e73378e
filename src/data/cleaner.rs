//! Brent price series cleaning.
//!
//! Turns the raw price CSV (mixed date layouts, unsorted rows, missing
//! prices) into the series the change-point model consumes: sorted by date,
//! interior gaps filled by time-weighted linear interpolation, log-returns
//! derived per consecutive pair. The first surviving price row is dropped
//! because it has no prior price, so every row of the cleaned series carries
//! a defined log-return and the model's change-point index maps directly to
//! a row (and therefore a calendar date).

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Date layouts observed in the raw Brent dataset, tried in order.
/// Two-digit years resolve per chrono's pivot (69..=99 -> 19xx).
const DATE_LAYOUTS: &[&str] = &[
    "%Y-%m-%d",
    "%d-%b-%y",
    "%b %d, %Y",
    "%m/%d/%Y",
    "%d-%b-%Y",
];

/// One row of the raw input, before any parsing.
#[derive(Debug, Clone)]
pub struct RawPriceRow {
    pub date: String,
    /// `None` when the price cell is empty; candidate for interpolation.
    pub price: Option<f64>,
    /// 1-based line number in the source file, for error reporting.
    pub line: usize,
}

/// A surviving price observation after parsing, sorting and gap filling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

/// One row of the cleaned series. Serialized column names match the
/// artifact schema the dashboard consumes (`Date,Price,Log_Return`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CleanRow {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Price")]
    pub price: f64,
    #[serde(rename = "Log_Return")]
    pub log_return: f64,
}

/// The cleaned, date-ordered series. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CleanedSeries {
    rows: Vec<CleanRow>,
}

#[derive(Debug)]
pub enum CleanError {
    /// The input file does not exist or could not be opened.
    MissingInput(PathBuf),
    /// Malformed CSV structure.
    Csv(csv::Error),
    /// A date cell matched none of the known layouts.
    UnparseableDate { line: usize, value: String },
    /// A price cell was present but not a positive finite number.
    BadPrice { line: usize, value: String },
    /// Fewer than two priced rows survived; no log-return can be derived.
    TooFewRows { surviving: usize },
    /// Required column missing from the header row.
    MissingColumn(&'static str),
    Io(std::io::Error),
}

impl fmt::Display for CleanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CleanError::MissingInput(path) => {
                write!(f, "input file not found: {}", path.display())
            }
            CleanError::Csv(e) => write!(f, "malformed CSV: {e}"),
            CleanError::UnparseableDate { line, value } => {
                write!(f, "line {line}: unparseable date '{value}'")
            }
            CleanError::BadPrice { line, value } => {
                write!(f, "line {line}: invalid price '{value}'")
            }
            CleanError::TooFewRows { surviving } => {
                write!(f, "only {surviving} priced row(s) survived cleaning; need at least 2")
            }
            CleanError::MissingColumn(name) => write!(f, "missing required column '{name}'"),
            CleanError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for CleanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CleanError::Csv(e) => Some(e),
            CleanError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<csv::Error> for CleanError {
    fn from(e: csv::Error) -> Self {
        CleanError::Csv(e)
    }
}

impl From<std::io::Error> for CleanError {
    fn from(e: std::io::Error) -> Self {
        CleanError::Io(e)
    }
}

/// Parse a date cell against the known layouts.
pub(crate) fn parse_date(value: &str, line: usize) -> Result<NaiveDate, CleanError> {
    let trimmed = value.trim();
    for layout in DATE_LAYOUTS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, layout) {
            return Ok(date);
        }
    }
    Err(CleanError::UnparseableDate { line, value: value.to_string() })
}

/// Load the raw `Date,Price` CSV. Empty price cells become `None`.
pub fn load_raw_prices(path: &Path) -> Result<Vec<RawPriceRow>, CleanError> {
    let file = File::open(path).map_err(|_| CleanError::MissingInput(path.to_path_buf()))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader.headers()?.clone();
    let date_idx = column_index(&headers, "Date").ok_or(CleanError::MissingColumn("Date"))?;
    let price_idx = column_index(&headers, "Price").ok_or(CleanError::MissingColumn("Price"))?;

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        // +2: one for the header row, one for 1-based numbering.
        let line = i + 2;
        let date = record.get(date_idx).unwrap_or_default().to_string();
        let price_cell = record.get(price_idx).unwrap_or_default();
        let price = if price_cell.is_empty() {
            None
        } else {
            let parsed = price_cell.parse::<f64>().map_err(|_| CleanError::BadPrice {
                line,
                value: price_cell.to_string(),
            })?;
            Some(parsed)
        };
        rows.push(RawPriceRow { date, price, line });
    }
    Ok(rows)
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.eq_ignore_ascii_case(name))
}

/// Parse, sort and gap-fill the raw rows into a priced series.
///
/// Policy, in order:
/// 1. every date must parse (hard error otherwise);
/// 2. stable ascending sort by date; duplicate dates are kept as-is and
///    logged, matching the reference behavior;
/// 3. interior missing prices are filled by linear interpolation weighted
///    by elapsed days between the nearest priced neighbors;
/// 4. leading/trailing rows with no priced neighbor on one side are dropped.
pub fn prepare_prices(raw: &[RawPriceRow]) -> Result<Vec<PricePoint>, CleanError> {
    let mut parsed: Vec<(NaiveDate, Option<f64>, usize)> = Vec::with_capacity(raw.len());
    for row in raw {
        let date = parse_date(&row.date, row.line)?;
        if let Some(price) = row.price {
            if !price.is_finite() || price <= 0.0 {
                return Err(CleanError::BadPrice { line: row.line, value: price.to_string() });
            }
        }
        parsed.push((date, row.price, row.line));
    }

    // Stable sort keeps duplicate-date rows in input order.
    parsed.sort_by_key(|(date, _, _)| *date);

    let duplicates = parsed.windows(2).filter(|w| w[0].0 == w[1].0).count();
    if duplicates > 0 {
        warn!(duplicates, "duplicate dates in raw input; rows kept as-is");
    }

    let filled = interpolate_by_time(&parsed);
    let dropped = parsed.len() - filled.len();
    if dropped > 0 {
        debug!(dropped, "dropped rows with no interpolation neighbor");
    }
    Ok(filled)
}

/// Time-weighted linear interpolation of missing prices.
///
/// A gap row at date d between priced neighbors (d0, p0) and (d1, p1) gets
/// p0 + (p1 - p0) * (d - d0) / (d1 - d0), with distances in days. Rows
/// before the first or after the last priced row have no neighbor pair and
/// are dropped.
fn interpolate_by_time(rows: &[(NaiveDate, Option<f64>, usize)]) -> Vec<PricePoint> {
    let mut out = Vec::with_capacity(rows.len());
    for (i, &(date, price, _)) in rows.iter().enumerate() {
        let price = match price {
            Some(p) => p,
            None => {
                let before = rows[..i].iter().rev().find_map(|&(d, p, _)| p.map(|p| (d, p)));
                let after = rows[i + 1..].iter().find_map(|&(d, p, _)| p.map(|p| (d, p)));
                match (before, after) {
                    (Some((d0, p0)), Some((d1, p1))) if d1 > d0 => {
                        let span = (d1 - d0).num_days() as f64;
                        let offset = (date - d0).num_days() as f64;
                        p0 + (p1 - p0) * (offset / span)
                    }
                    // Duplicate-date neighbors collapse the time span; fall
                    // back to the earlier neighbor's price.
                    (Some((_, p0)), Some(_)) => p0,
                    _ => continue,
                }
            }
        };
        out.push(PricePoint { date, price });
    }
    out
}

/// Derive log-returns per consecutive price pair. The first point has no
/// prior price and is dropped.
pub fn derive_returns(prices: &[PricePoint]) -> Result<CleanedSeries, CleanError> {
    if prices.len() < 2 {
        return Err(CleanError::TooFewRows { surviving: prices.len() });
    }
    let rows = prices
        .windows(2)
        .map(|pair| CleanRow {
            date: pair[1].date,
            price: pair[1].price,
            log_return: pair[1].price.ln() - pair[0].price.ln(),
        })
        .collect();
    Ok(CleanedSeries { rows })
}

/// Full cleaning pass: load, parse, sort, fill, derive returns.
pub fn clean(path: &Path) -> Result<CleanedSeries, CleanError> {
    let raw = load_raw_prices(path)?;
    let prices = prepare_prices(&raw)?;
    derive_returns(&prices)
}

impl CleanedSeries {
    pub fn from_rows(rows: Vec<CleanRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[CleanRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The observed series the model conditions on.
    pub fn log_returns(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.log_return).collect()
    }

    /// Calendar date for a change-point index.
    pub fn date_at(&self, index: usize) -> Option<NaiveDate> {
        self.rows.get(index).map(|r| r.date)
    }

    /// Persist as `Date,Price,Log_Return` CSV.
    pub fn write_csv(&self, path: &Path) -> Result<(), CleanError> {
        let mut writer = csv::Writer::from_path(path)?;
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Reload a previously persisted cleaned series.
    pub fn read_csv(path: &Path) -> Result<Self, CleanError> {
        let file = File::open(path).map_err(|_| CleanError::MissingInput(path.to_path_buf()))?;
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(file);
        let mut rows = Vec::new();
        for row in reader.deserialize::<CleanRow>() {
            rows.push(row?);
        }
        Ok(Self { rows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(date: &str, price: Option<f64>, line: usize) -> RawPriceRow {
        RawPriceRow { date: date.to_string(), price, line }
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn parses_mixed_date_layouts() {
        assert_eq!(parse_date("1987-05-20", 1).unwrap(), d("1987-05-20"));
        assert_eq!(parse_date("20-May-87", 1).unwrap(), d("1987-05-20"));
        assert_eq!(parse_date("Apr 22, 2020", 1).unwrap(), d("2020-04-22"));
        assert_eq!(parse_date("04/22/2020", 1).unwrap(), d("2020-04-22"));
    }

    #[test]
    fn rejects_unparseable_date() {
        let err = parse_date("not-a-date", 7).unwrap_err();
        match err {
            CleanError::UnparseableDate { line: 7, .. } => {}
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn sorts_rows_by_date() {
        let rows = vec![
            raw("2020-01-03", Some(30.0), 2),
            raw("2020-01-01", Some(10.0), 3),
            raw("2020-01-02", Some(20.0), 4),
        ];
        let prices = prepare_prices(&rows).unwrap();
        let dates: Vec<NaiveDate> = prices.iter().map(|p| p.date).collect();
        assert_eq!(dates, vec![d("2020-01-01"), d("2020-01-02"), d("2020-01-03")]);
    }

    #[test]
    fn interpolation_is_time_weighted() {
        // Gap at Jan 2; neighbors Jan 1 (10.0) and Jan 4 (40.0). One of
        // three days elapsed -> 20.0, not the row-count midpoint 25.0.
        let rows = vec![
            raw("2020-01-01", Some(10.0), 2),
            raw("2020-01-02", None, 3),
            raw("2020-01-04", Some(40.0), 4),
        ];
        let prices = prepare_prices(&rows).unwrap();
        assert_eq!(prices.len(), 3);
        assert!((prices[1].price - 20.0).abs() < 1e-12);
    }

    #[test]
    fn interpolated_price_stays_between_neighbors() {
        let rows = vec![
            raw("2020-01-01", Some(50.0), 2),
            raw("2020-01-05", None, 3),
            raw("2020-01-09", None, 4),
            raw("2020-01-10", Some(20.0), 5),
        ];
        let prices = prepare_prices(&rows).unwrap();
        for p in &prices[1..3] {
            assert!(p.price <= 50.0 && p.price >= 20.0, "filled {} escapes bounds", p.price);
        }
    }

    #[test]
    fn unresolvable_edges_are_dropped() {
        let rows = vec![
            raw("2020-01-01", None, 2),
            raw("2020-01-02", Some(10.0), 3),
            raw("2020-01-03", Some(11.0), 4),
            raw("2020-01-04", None, 5),
        ];
        let prices = prepare_prices(&rows).unwrap();
        assert_eq!(prices.len(), 2);
        assert_eq!(prices[0].date, d("2020-01-02"));
        assert_eq!(prices[1].date, d("2020-01-03"));
    }

    #[test]
    fn return_count_is_one_less_than_prices() {
        let rows = vec![
            raw("2020-01-01", Some(10.0), 2),
            raw("2020-01-02", Some(11.0), 3),
            raw("2020-01-03", Some(12.0), 4),
            raw("2020-01-06", Some(12.5), 5),
        ];
        let prices = prepare_prices(&rows).unwrap();
        let series = derive_returns(&prices).unwrap();
        assert_eq!(series.len(), prices.len() - 1);
        assert!(series.rows().iter().all(|r| r.log_return.is_finite()));
        // First row carries the return of the second price.
        assert_eq!(series.rows()[0].date, d("2020-01-02"));
        let expected = (11.0f64).ln() - (10.0f64).ln();
        assert!((series.rows()[0].log_return - expected).abs() < 1e-12);
    }

    #[test]
    fn preparing_prices_is_idempotent() {
        let rows = vec![
            raw("2020-01-01", Some(10.0), 2),
            raw("2020-01-03", None, 3),
            raw("2020-01-05", Some(14.0), 4),
        ];
        let once = prepare_prices(&rows).unwrap();
        let rendered: Vec<RawPriceRow> = once
            .iter()
            .enumerate()
            .map(|(i, p)| raw(&p.date.format("%Y-%m-%d").to_string(), Some(p.price), i + 2))
            .collect();
        let twice = prepare_prices(&rendered).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn duplicate_dates_are_kept() {
        let rows = vec![
            raw("2020-01-01", Some(10.0), 2),
            raw("2020-01-02", Some(11.0), 3),
            raw("2020-01-02", Some(11.5), 4),
        ];
        let prices = prepare_prices(&rows).unwrap();
        assert_eq!(prices.len(), 3);
    }

    #[test]
    fn rejects_non_positive_price() {
        let rows = vec![raw("2020-01-01", Some(-3.0), 2)];
        assert!(matches!(
            prepare_prices(&rows),
            Err(CleanError::BadPrice { line: 2, .. })
        ));
    }

    #[test]
    fn too_few_rows_is_an_error() {
        let prices = vec![PricePoint { date: d("2020-01-01"), price: 10.0 }];
        assert!(matches!(
            derive_returns(&prices),
            Err(CleanError::TooFewRows { surviving: 1 })
        ));
    }

    #[test]
    fn missing_input_file_is_reported() {
        let err = clean(Path::new("/nonexistent/brent.csv")).unwrap_err();
        assert!(matches!(err, CleanError::MissingInput(_)));
    }

    #[test]
    fn csv_round_trip_preserves_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clean.csv");
        let series = CleanedSeries::from_rows(vec![
            CleanRow { date: d("2020-01-02"), price: 11.0, log_return: 0.0953 },
            CleanRow { date: d("2020-01-03"), price: 12.0, log_return: 0.0870 },
        ]);
        series.write_csv(&path).unwrap();
        let back = CleanedSeries::read_csv(&path).unwrap();
        assert_eq!(series, back);
    }
}
