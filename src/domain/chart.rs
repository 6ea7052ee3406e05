//! Daily price rows and the date-ordered chart.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::ops::Range;

use super::error::LevtraderError;

/// One trading day. Buys fill at `entry_price`, sells at `close_price`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub date: NaiveDate,
    pub entry_price: f64,
    pub close_price: f64,
}

impl PriceRow {
    pub fn new(date: NaiveDate, entry_price: f64, close_price: f64) -> Self {
        Self {
            date,
            entry_price,
            close_price,
        }
    }

    /// Both prices finite and positive.
    pub fn has_valid_prices(&self) -> bool {
        is_valid_price(self.entry_price) && is_valid_price(self.close_price)
    }
}

pub fn is_valid_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

/// Price rows ordered by date with at most one row per date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chart {
    rows: Vec<PriceRow>,
}

impl Chart {
    /// Sorts rows by date and drops later duplicates of a date.
    pub fn new(mut rows: Vec<PriceRow>) -> Self {
        rows.sort_by_key(|r| r.date);
        rows.dedup_by_key(|r| r.date);
        Self { rows }
    }

    /// Rejects the chart when any row has a non-positive or non-finite
    /// price.
    pub fn check_prices(&self) -> Result<(), LevtraderError> {
        match self.rows.iter().find(|r| !r.has_valid_prices()) {
            Some(row) => Err(LevtraderError::DataRead {
                reason: format!(
                    "{}: invalid prices entry={} close={}",
                    row.date, row.entry_price, row.close_price
                ),
            }),
            None => Ok(()),
        }
    }

    pub fn rows(&self) -> &[PriceRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.rows.first().map(|r| r.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.rows.last().map(|r| r.date)
    }

    pub fn position(&self, date: NaiveDate) -> Option<usize> {
        self.rows.binary_search_by_key(&date, |r| r.date).ok()
    }

    pub fn slice(&self, range: Range<usize>) -> Chart {
        Chart {
            rows: self.rows[range].to_vec(),
        }
    }

    /// Rows dated within `first..=last`, `None` when there are none.
    pub fn between(&self, first: NaiveDate, last: NaiveDate) -> Option<Chart> {
        let from = self.rows.partition_point(|r| r.date < first);
        let to = self.rows.partition_point(|r| r.date <= last);
        (from < to).then(|| self.slice(from..to))
    }

    /// Resolves optional start/end bounds to a row range.
    ///
    /// Bounds are date prefixes (`YYYY`, `YYYY-MM` or `YYYY-MM-DD`): the start
    /// bound selects the first row on or after the beginning of the period,
    /// the end bound the last row on or before the end of the period. A bound
    /// whose period lies wholly outside the chart's dates is an error.
    pub fn bounded_range(
        &self,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<Range<usize>, LevtraderError> {
        let mut from = 0;
        let mut to = self.rows.len();

        if let Some(bound) = start.filter(|s| !s.trim().is_empty()) {
            let period = self.period_within(bound)?;
            from = self.rows.partition_point(|r| r.date < period.first);
        }
        if let Some(bound) = end.filter(|s| !s.trim().is_empty()) {
            let period = self.period_within(bound)?;
            to = self.rows.partition_point(|r| r.date <= period.last);
        }

        if from >= to {
            return Err(LevtraderError::InvalidDateBound {
                bound: format!("{}..{}", start.unwrap_or(""), end.unwrap_or("")),
                reason: "no rows within bounds".into(),
            });
        }
        Ok(from..to)
    }
}

impl Chart {
    fn period_within(&self, bound: &str) -> Result<DateBound, LevtraderError> {
        let period = DateBound::parse(bound)?;
        if let (Some(first), Some(last)) = (self.first_date(), self.last_date()) {
            if period.last < first || period.first > last {
                return Err(LevtraderError::InvalidDateBound {
                    bound: bound.trim().to_string(),
                    reason: format!("outside chart dates {first}..{last}"),
                });
            }
        }
        Ok(period)
    }
}

/// A calendar period named by a date prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateBound {
    pub first: NaiveDate,
    pub last: NaiveDate,
}

impl DateBound {
    pub fn parse(bound: &str) -> Result<Self, LevtraderError> {
        let bound = bound.trim();
        let invalid = |reason: &str| LevtraderError::InvalidDateBound {
            bound: bound.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = bound.split('-').collect();
        let numbers: Vec<u32> = parts
            .iter()
            .map(|p| p.parse::<u32>())
            .collect::<Result<_, _>>()
            .map_err(|_| invalid("expected YYYY, YYYY-MM or YYYY-MM-DD"))?;

        match numbers.as_slice() {
            [year] => {
                let year = *year as i32;
                let first = NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(|| invalid("bad year"))?;
                let last = NaiveDate::from_ymd_opt(year, 12, 31).ok_or_else(|| invalid("bad year"))?;
                Ok(Self { first, last })
            }
            [year, month] => {
                let first = NaiveDate::from_ymd_opt(*year as i32, *month, 1)
                    .ok_or_else(|| invalid("bad month"))?;
                Ok(Self {
                    first,
                    last: last_day_of_month(first),
                })
            }
            [year, month, day] => {
                let date = NaiveDate::from_ymd_opt(*year as i32, *month, *day)
                    .ok_or_else(|| invalid("bad day"))?;
                Ok(Self {
                    first: date,
                    last: date,
                })
            }
            _ => Err(invalid("expected YYYY, YYYY-MM or YYYY-MM-DD")),
        }
    }
}

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn last_day_of_month(first: NaiveDate) -> NaiveDate {
    let (year, month) = if first.month() == 12 {
        (first.year() + 1, 1)
    } else {
        (first.year(), first.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.pred_opt())
        .unwrap_or(first)
}
