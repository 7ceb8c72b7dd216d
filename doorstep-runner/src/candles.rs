//! Candle CSV files: `open_time,open,high,low,close,volume`.
//!
//! `open_time` is either RFC 3339 (`2024-01-02T00:15:00Z`) or epoch
//! milliseconds, the two shapes exchange kline dumps come in. Rows must be in
//! strictly increasing time order.

use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use doorstep_core::domain::Candle;

#[derive(Debug, Error)]
pub enum CandleError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("row {row}: {source}")]
    Row {
        row: usize,
        #[source]
        source: csv::Error,
    },
    #[error("row {row}: unparseable open_time '{value}'")]
    Time { row: usize, value: String },
    #[error("row {row}: open_time is not after the previous row")]
    OutOfOrder { row: usize },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Deserialize)]
struct CandleRow {
    open_time: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

#[derive(Debug, Serialize)]
struct CandleOut<'a> {
    open_time: &'a str,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(millis) = value.parse::<i64>() {
        return Utc.timestamp_millis_opt(millis).single();
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Parse candles from any CSV reader. Row numbers in errors are 1-based
/// data rows (the header is not counted).
pub fn read_candles<R: std::io::Read>(reader: R) -> Result<Vec<Candle>, CandleError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut candles: Vec<Candle> = Vec::new();
    for (i, record) in rdr.deserialize::<CandleRow>().enumerate() {
        let row = i + 1;
        let r = record.map_err(|source| CandleError::Row { row, source })?;
        let open_time = parse_time(&r.open_time).ok_or_else(|| CandleError::Time {
            row,
            value: r.open_time.clone(),
        })?;
        if candles.last().is_some_and(|prev| prev.open_time >= open_time) {
            return Err(CandleError::OutOfOrder { row });
        }
        candles.push(Candle {
            open_time,
            open: r.open,
            high: r.high,
            low: r.low,
            close: r.close,
            volume: r.volume,
        });
    }
    Ok(candles)
}

pub fn load_candles(path: &Path) -> Result<Vec<Candle>, CandleError> {
    let file = std::fs::File::open(path).map_err(|e| CandleError::Open {
        path: path.display().to_string(),
        source: csv::Error::from(e),
    })?;
    read_candles(file)
}

/// Write candles in the same layout `load_candles` reads, RFC 3339 times.
pub fn write_candles<W: std::io::Write>(writer: W, candles: &[Candle]) -> Result<(), CandleError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for c in candles {
        let time = c.open_time.to_rfc3339();
        wtr.serialize(CandleOut {
            open_time: &time,
            open: c.open,
            high: c.high,
            low: c.low,
            close: c.close,
            volume: c.volume,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn save_candles(path: &Path, candles: &[Candle]) -> Result<(), CandleError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    write_candles(std::fs::File::create(path)?, candles)
}
