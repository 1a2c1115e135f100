//! CSV ingestion into a validated [`PriceSeries`].
//!
//! A header row is required. Column names are matched case-insensitively:
//! the date column is the first of `open time`, `date`, `timestamp`, `time`;
//! the close column is `close` or `close price`. `open`, `high` and `low` are
//! optional. Every failure is reported as [`PatternError::MalformedInput`].

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::{PatternError, PriceBar, PriceSeries, Result};

const DATE_COLUMNS: &[&str] = &["open time", "date", "timestamp", "time"];
const CLOSE_COLUMNS: &[&str] = &["close", "close price"];

/// Epoch values at or above this are read as milliseconds
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

fn malformed(message: impl Into<String>) -> PatternError {
    PatternError::MalformedInput(message.into())
}

/// Load a series from a CSV file on disk
pub fn load_csv(path: impl AsRef<Path>) -> Result<PriceSeries> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| malformed(format!("cannot open {}: {e}", path.display())))?;
    load_csv_reader(BufReader::new(file))
}

/// Load a series from any CSV source
pub fn load_csv_reader<R: Read>(source: R) -> Result<PriceSeries> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(source);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| malformed(format!("cannot read header: {e}")))?
        .iter()
        .map(|h| h.to_ascii_lowercase())
        .collect();

    let date_col = column(&headers, DATE_COLUMNS)
        .ok_or_else(|| malformed(format!("no date column (expected one of {DATE_COLUMNS:?})")))?;
    let close_col = column(&headers, CLOSE_COLUMNS)
        .ok_or_else(|| malformed(format!("no close column (expected one of {CLOSE_COLUMNS:?})")))?;
    let open_col = column(&headers, &["open"]);
    let high_col = column(&headers, &["high"]);
    let low_col = column(&headers, &["low"]);

    let mut bars = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| malformed(format!("row {row}: {e}")))?;
        let cell = |col: usize| record.get(col).unwrap_or("");

        let date = parse_date(cell(date_col))
            .ok_or_else(|| malformed(format!("row {row}: unparsable date '{}'", cell(date_col))))?;
        let close = parse_price(cell(close_col))
            .ok_or_else(|| malformed(format!("row {row}: unparsable close '{}'", cell(close_col))))?;

        let optional = |col: Option<usize>, name: &str| -> Result<Option<f64>> {
            match col.map(|c| cell(c)) {
                None | Some("") => Ok(None),
                Some(raw) => parse_price(raw)
                    .map(Some)
                    .ok_or_else(|| malformed(format!("row {row}: unparsable {name} '{raw}'"))),
            }
        };

        bars.push(PriceBar {
            date,
            close,
            open: optional(open_col, "open")?,
            high: optional(high_col, "high")?,
            low: optional(low_col, "low")?,
        });
    }

    if bars.is_empty() {
        return Err(malformed("no data rows"));
    }
    debug!(rows = bars.len(), has_ohlc = high_col.is_some(), "csv loaded");
    PriceSeries::from_bars(&bars)
}

/// First header matching any of `names`, in `names` order
fn column(headers: &[String], names: &[&str]) -> Option<usize> {
    names
        .iter()
        .find_map(|&name| headers.iter().position(|h| h.as_str() == name))
}

fn parse_price(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok()
}

/// Calendar day of a date cell. Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS`,
/// RFC 3339 and integer epoch seconds or milliseconds.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(stamp) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(stamp.date());
        }
    }
    if let Ok(stamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(stamp.date_naive());
    }
    let epoch: i64 = raw.parse().ok()?;
    let stamp = if epoch.abs() >= EPOCH_MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(epoch)?
    } else {
        DateTime::from_timestamp(epoch, 0)?
    };
    Some(stamp.date_naive())
}
