//! Technical indicators consumed by the day-step transition.
//!
//! - `IndicatorSet`: RSI, volatility and u-rate stored position-aligned with a chart
//! - `DaySignals`: the three values for a single day
//! - `SahmSeries`: monthly macro indicator looked up by any date in the month

pub mod rsi;
pub mod urate;
pub mod volatility;

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

use super::chart::{first_of_month, Chart};
use super::error::LevtraderError;

pub const RSI_PERIOD: usize = 5;
pub const VOLATILITY_PERIOD: usize = 5;
pub const MOVING_AVERAGE_PERIOD: usize = 50;

/// Indicator values for one trading day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DaySignals {
    pub rsi: f64,
    pub volatility: f64,
    pub u_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorSet {
    rsi: Vec<f64>,
    volatility: Vec<f64>,
    u_rate: Vec<f64>,
}

impl IndicatorSet {
    /// Computes every indicator over the whole chart. `u_rate_window` is the
    /// strategy term.
    pub fn compute(chart: &Chart, u_rate_window: usize) -> Self {
        let rows = chart.rows();
        Self {
            rsi: rsi::calculate_rsi(rows, RSI_PERIOD),
            volatility: volatility::calculate_volatility(rows, VOLATILITY_PERIOD),
            u_rate: urate::calculate_u_rate(rows, MOVING_AVERAGE_PERIOD, u_rate_window),
        }
    }

    /// Builds a set from precomputed arrays, rejecting any length mismatch.
    pub fn from_arrays(
        chart: &Chart,
        rsi: Vec<f64>,
        volatility: Vec<f64>,
        u_rate: Vec<f64>,
    ) -> Result<Self, LevtraderError> {
        for (name, len) in [
            ("rsi", rsi.len()),
            ("volatility", volatility.len()),
            ("u-rate", u_rate.len()),
        ] {
            if len != chart.len() {
                return Err(LevtraderError::MisalignedIndicator {
                    indicator: name,
                    expected: chart.len(),
                    actual: len,
                });
            }
        }
        Ok(Self {
            rsi,
            volatility,
            u_rate,
        })
    }

    /// Builds a set from date-keyed maps. Every chart date must be present in
    /// every map.
    pub fn from_maps(
        chart: &Chart,
        rsi: &HashMap<NaiveDate, f64>,
        volatility: &HashMap<NaiveDate, f64>,
        u_rate: &HashMap<NaiveDate, f64>,
    ) -> Result<Self, LevtraderError> {
        let align = |name: &'static str, map: &HashMap<NaiveDate, f64>| {
            chart
                .rows()
                .iter()
                .map(|row| {
                    map.get(&row.date)
                        .copied()
                        .ok_or(LevtraderError::MissingIndicator {
                            indicator: name,
                            date: row.date,
                        })
                })
                .collect::<Result<Vec<f64>, _>>()
        };

        Ok(Self {
            rsi: align("rsi", rsi)?,
            volatility: align("volatility", volatility)?,
            u_rate: align("u-rate", u_rate)?,
        })
    }

    pub fn len(&self) -> usize {
        self.rsi.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rsi.is_empty()
    }

    /// Signals at chart position `index`. Callers index within the chart the
    /// set was built for.
    pub fn at(&self, index: usize) -> DaySignals {
        DaySignals {
            rsi: self.rsi[index],
            volatility: self.volatility[index],
            u_rate: self.u_rate[index],
        }
    }

    pub fn slice(&self, range: Range<usize>) -> IndicatorSet {
        IndicatorSet {
            rsi: self.rsi[range.clone()].to_vec(),
            volatility: self.volatility[range.clone()].to_vec(),
            u_rate: self.u_rate[range].to_vec(),
        }
    }
}

/// A chart together with its aligned indicators.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketData {
    pub chart: Chart,
    pub indicators: IndicatorSet,
}

impl MarketData {
    pub fn new(chart: Chart, indicators: IndicatorSet) -> Result<Self, LevtraderError> {
        if indicators.len() != chart.len() {
            return Err(LevtraderError::MisalignedIndicator {
                indicator: "indicator set",
                expected: chart.len(),
                actual: indicators.len(),
            });
        }
        Ok(Self { chart, indicators })
    }

    /// Computes indicators over the full chart.
    pub fn compute(chart: Chart, term: usize) -> Self {
        let indicators = IndicatorSet::compute(&chart, term);
        Self { chart, indicators }
    }

    pub fn len(&self) -> usize {
        self.chart.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chart.is_empty()
    }

    pub fn slice(&self, range: Range<usize>) -> MarketData {
        MarketData {
            chart: self.chart.slice(range.clone()),
            indicators: self.indicators.slice(range),
        }
    }

    /// Restricts to optional date-prefix bounds. Indicators keep the values
    /// computed over the full history.
    pub fn bounded(&self, start: Option<&str>, end: Option<&str>) -> Result<MarketData, LevtraderError> {
        let range = self.chart.bounded_range(start, end)?;
        Ok(self.slice(range))
    }
}

/// Monthly macro recession indicator keyed by first-of-month.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SahmSeries {
    months: BTreeMap<NaiveDate, f64>,
}

impl SahmSeries {
    pub fn new(entries: impl IntoIterator<Item = (NaiveDate, f64)>) -> Self {
        Self {
            months: entries
                .into_iter()
                .map(|(date, value)| (first_of_month(date), value))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.months.len()
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.months.get(&first_of_month(date)).copied()
    }

    pub fn lookup(&self, date: NaiveDate) -> Result<f64, LevtraderError> {
        self.get(date).ok_or(LevtraderError::MissingIndicator {
            indicator: "sahm",
            date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chart::PriceRow;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn chart(days: &[&str]) -> Chart {
        Chart::new(
            days.iter()
                .enumerate()
                .map(|(i, d)| PriceRow::new(date(d), 10.0 + i as f64, 10.0 + i as f64))
                .collect(),
        )
    }

    #[test]
    fn compute_aligns_with_chart() {
        let c = chart(&["2024-01-02", "2024-01-03", "2024-01-04"]);
        let set = IndicatorSet::compute(&c, 40);
        assert_eq!(set.len(), 3);
        assert_eq!(set.at(0).rsi, 50.0);
    }

    #[test]
    fn from_arrays_rejects_short_series() {
        let c = chart(&["2024-01-02", "2024-01-03"]);
        let err = IndicatorSet::from_arrays(&c, vec![50.0, 50.0], vec![0.0], vec![0.0, 0.0])
            .unwrap_err();
        match err {
            LevtraderError::MisalignedIndicator {
                indicator,
                expected,
                actual,
            } => {
                assert_eq!(indicator, "volatility");
                assert_eq!(expected, 2);
                assert_eq!(actual, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn from_maps_reports_first_missing_date() {
        let c = chart(&["2024-01-02", "2024-01-03"]);
        let full: HashMap<NaiveDate, f64> =
            [(date("2024-01-02"), 1.0), (date("2024-01-03"), 2.0)].into();
        let partial: HashMap<NaiveDate, f64> = [(date("2024-01-02"), 1.0)].into();

        let err = IndicatorSet::from_maps(&c, &full, &full, &partial).unwrap_err();
        match err {
            LevtraderError::MissingIndicator { indicator, date: d } => {
                assert_eq!(indicator, "u-rate");
                assert_eq!(d, date("2024-01-03"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let ok = IndicatorSet::from_maps(&c, &full, &full, &full).unwrap();
        assert_eq!(ok.at(1).u_rate, 2.0);
    }

    #[test]
    fn market_bounded_keeps_full_history_indicators() {
        let c = chart(&["2023-12-29", "2024-01-02", "2024-01-03"]);
        let market = MarketData::new(
            c.clone(),
            IndicatorSet::from_arrays(&c, vec![1.0, 2.0, 3.0], vec![0.0; 3], vec![0.0; 3])
                .unwrap(),
        )
        .unwrap();
        let bounded = market.bounded(Some("2024"), None).unwrap();
        assert_eq!(bounded.len(), 2);
        assert_eq!(bounded.indicators.at(0).rsi, 2.0);
    }

    #[test]
    fn sahm_monthly_lookup() {
        let sahm = SahmSeries::new([(date("2020-03-01"), 0.5), (date("2020-04-01"), 4.2)]);
        assert_eq!(sahm.get(date("2020-04-17")), Some(4.2));
        assert_eq!(sahm.get(date("2020-03-31")), Some(0.5));
        assert!(sahm.lookup(date("2020-05-01")).is_err());
    }
}
