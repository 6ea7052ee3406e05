//! CSV export adapter implementing ReportPort.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::error::LevtraderError;
use crate::domain::evaluator::WindowResult;
use crate::domain::state::{State, Status};
use crate::ports::report_port::ReportPort;

#[derive(Serialize)]
struct HistoryRow {
    date: Option<NaiveDate>,
    elapsed_days: usize,
    entry_price: f64,
    close_price: f64,
    seed: f64,
    invested_seed: f64,
    remaining_seed: f64,
    stock_qty: u64,
    commission: f64,
    avg_price: f64,
    stock_eval: f64,
    status: Status,
    cycle: usize,
    rate_of_return: f64,
    base_ror: Option<f64>,
}

impl From<&State> for HistoryRow {
    fn from(s: &State) -> Self {
        Self {
            date: s.date,
            elapsed_days: s.elapsed_days,
            entry_price: s.entry_price,
            close_price: s.close_price,
            seed: s.seed,
            invested_seed: s.invested_seed,
            remaining_seed: s.remaining_seed,
            stock_qty: s.stock_qty,
            commission: s.commission,
            avg_price: s.avg_price,
            stock_eval: s.stock_eval,
            status: s.status,
            cycle: s.cycle,
            rate_of_return: s.rate_of_return,
            base_ror: s.base_ror,
        }
    }
}

pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }

    fn writer(output_path: &str) -> Result<csv::Writer<fs::File>, LevtraderError> {
        let path = Path::new(output_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        Ok(csv::Writer::from_path(path)?)
    }
}

impl Default for CsvReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportPort for CsvReportAdapter {
    fn write_history(&self, history: &[State], output_path: &str) -> Result<(), LevtraderError> {
        let mut wtr = Self::writer(output_path)?;
        for state in history {
            wtr.serialize(HistoryRow::from(state))?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn write_results(
        &self,
        results: &[WindowResult],
        output_path: &str,
    ) -> Result<(), LevtraderError> {
        let mut wtr = Self::writer(output_path)?;
        for result in results {
            wtr.serialize(result)?;
        }
        wtr.flush()?;
        Ok(())
    }
}
