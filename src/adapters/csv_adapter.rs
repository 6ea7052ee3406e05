//! CSV file data adapter.
//!
//! - `<charts>/<TICKER>-GEN.csv`: `date,entry,close`, header optional
//! - `<charts>/<BASE>.csv`: Yahoo layout `Date,Open,High,Low,Close,...`
//! - `<indices>/sahm.csv`: `date,value` with header

use crate::domain::chart::{is_valid_price, Chart, PriceRow};
use crate::domain::error::LevtraderError;
use crate::domain::indicator::SahmSeries;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub struct CsvAdapter {
    charts_path: PathBuf,
    indices_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(charts_path: PathBuf, indices_path: PathBuf) -> Self {
        Self {
            charts_path,
            indices_path,
        }
    }

    fn chart_path(&self, ticker: &str) -> PathBuf {
        self.charts_path.join(format!("{}-GEN.csv", ticker.to_uppercase()))
    }

    fn base_chart_path(&self, base: &str) -> PathBuf {
        self.charts_path.join(format!("{}.csv", base.to_uppercase()))
    }

    fn sahm_path(&self) -> PathBuf {
        self.indices_path.join("sahm.csv")
    }
}

fn read_file(path: &Path) -> Result<String, LevtraderError> {
    fs::read_to_string(path).map_err(|e| LevtraderError::DataRead {
        reason: format!("failed to read {}: {}", path.display(), e),
    })
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{value}-01"), "%Y-%m-%d"))
        .ok()
}

fn parse_field(record: &csv::StringRecord, index: usize, name: &str, line: u64) -> Result<f64, LevtraderError> {
    record
        .get(index)
        .ok_or_else(|| LevtraderError::DataRead {
            reason: format!("line {line}: missing {name} column"),
        })?
        .trim()
        .parse()
        .map_err(|e| LevtraderError::DataRead {
            reason: format!("line {line}: invalid {name} value: {e}"),
        })
}

fn check_price(price: f64, name: &str, line: u64) -> Result<f64, LevtraderError> {
    if is_valid_price(price) {
        Ok(price)
    } else {
        Err(LevtraderError::DataRead {
            reason: format!("line {line}: {name} must be a positive number, got {price}"),
        })
    }
}

fn line_of(record: &csv::StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}

/// Parses `date,entry,close` rows. A first row whose date does not parse is
/// taken as a header.
pub fn parse_chart(content: &str) -> Result<Chart, LevtraderError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());
    let mut rows = Vec::new();

    for (index, result) in rdr.records().enumerate() {
        let record = result?;
        let line = line_of(&record);
        let date_str = record.get(0).unwrap_or_default();
        let Some(date) = parse_date(date_str) else {
            if index == 0 {
                continue;
            }
            return Err(LevtraderError::DataRead {
                reason: format!("line {line}: invalid date '{date_str}'"),
            });
        };
        let entry = check_price(parse_field(&record, 1, "entry", line)?, "entry", line)?;
        let close = check_price(parse_field(&record, 2, "close", line)?, "close", line)?;
        rows.push(PriceRow::new(date, entry, close));
    }

    Ok(Chart::new(rows))
}

/// Parses a Yahoo-layout chart, taking Open as entry and Close as close.
/// Rows with missing prices are skipped; zero, negative or non-finite
/// prices are an error.
pub fn parse_base_chart(content: &str) -> Result<Chart, LevtraderError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());
    let mut rows = Vec::new();
    let mut skipped = 0usize;

    for result in rdr.records() {
        let record = result?;
        let line = line_of(&record);
        let date_str = record.get(0).unwrap_or_default();
        let date = parse_date(date_str).ok_or_else(|| LevtraderError::DataRead {
            reason: format!("line {line}: invalid date '{date_str}'"),
        })?;
        match (
            parse_field(&record, 1, "open", line),
            parse_field(&record, 4, "close", line),
        ) {
            (Ok(open), Ok(close)) => rows.push(PriceRow::new(
                date,
                check_price(open, "open", line)?,
                check_price(close, "close", line)?,
            )),
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!(skipped, "skipped base chart rows without prices");
    }
    Ok(Chart::new(rows))
}

pub fn parse_sahm(content: &str) -> Result<SahmSeries, LevtraderError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());
    let mut entries = Vec::new();

    for result in rdr.records() {
        let record = result?;
        let line = line_of(&record);
        let date_str = record.get(0).unwrap_or_default();
        let date = parse_date(date_str).ok_or_else(|| LevtraderError::DataRead {
            reason: format!("line {line}: invalid date '{date_str}'"),
        })?;
        entries.push((date, parse_field(&record, 1, "value", line)?));
    }

    Ok(SahmSeries::new(entries))
}

impl DataPort for CsvAdapter {
    fn fetch_chart(&self, ticker: &str) -> Result<Chart, LevtraderError> {
        let path = self.chart_path(ticker);
        let chart = parse_chart(&read_file(&path)?)?;
        debug!(path = %path.display(), rows = chart.len(), "read chart");
        Ok(chart)
    }

    fn fetch_base_chart(&self, base: &str) -> Result<Chart, LevtraderError> {
        let path = self.base_chart_path(base);
        let chart = parse_base_chart(&read_file(&path)?)?;
        debug!(path = %path.display(), rows = chart.len(), "read base chart");
        Ok(chart)
    }

    fn fetch_sahm(&self) -> Result<SahmSeries, LevtraderError> {
        let path = self.sahm_path();
        let sahm = parse_sahm(&read_file(&path)?)?;
        debug!(path = %path.display(), months = sahm.len(), "read sahm series");
        Ok(sahm)
    }
}
