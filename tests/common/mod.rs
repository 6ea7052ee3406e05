#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use levtrader::adapters::file_config_adapter::FileConfigAdapter;
use levtrader::domain::chart::{Chart, PriceRow};
use levtrader::domain::error::LevtraderError;
use levtrader::domain::indicator::{IndicatorSet, MarketData, SahmSeries};
use levtrader::domain::settings::EngineSettings;
use levtrader::domain::strategy::StrategyConfig;
use levtrader::ports::data_port::DataPort;
use std::collections::HashMap;

pub struct MockDataPort {
    pub charts: HashMap<String, Chart>,
    pub base_charts: HashMap<String, Chart>,
    pub sahm: Option<SahmSeries>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            charts: HashMap::new(),
            base_charts: HashMap::new(),
            sahm: None,
            errors: HashMap::new(),
        }
    }

    pub fn with_chart(mut self, ticker: &str, chart: Chart) -> Self {
        self.charts.insert(ticker.to_string(), chart);
        self
    }

    pub fn with_base_chart(mut self, base: &str, chart: Chart) -> Self {
        self.base_charts.insert(base.to_string(), chart);
        self
    }

    pub fn with_sahm(mut self, sahm: SahmSeries) -> Self {
        self.sahm = Some(sahm);
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }

    fn lookup(&self, charts: &HashMap<String, Chart>, ticker: &str) -> Result<Chart, LevtraderError> {
        if let Some(reason) = self.errors.get(ticker) {
            return Err(LevtraderError::DataRead {
                reason: reason.clone(),
            });
        }
        charts.get(ticker).cloned().ok_or_else(|| LevtraderError::DataRead {
            reason: format!("no chart for {ticker}"),
        })
    }
}

impl DataPort for MockDataPort {
    fn fetch_chart(&self, ticker: &str) -> Result<Chart, LevtraderError> {
        self.lookup(&self.charts, ticker)
    }

    fn fetch_base_chart(&self, base: &str) -> Result<Chart, LevtraderError> {
        self.lookup(&self.base_charts, base)
    }

    fn fetch_sahm(&self) -> Result<SahmSeries, LevtraderError> {
        self.sahm.clone().ok_or_else(|| LevtraderError::DataRead {
            reason: "no sahm series".to_string(),
        })
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// One row per calendar day from 2024-01-01, entry equal to close.
pub fn chart_from_prices(prices: &[f64]) -> Chart {
    let start = date(2024, 1, 1);
    Chart::new(
        prices
            .iter()
            .enumerate()
            .map(|(i, &p)| PriceRow::new(start + Duration::days(i as i64), p, p))
            .collect(),
    )
}

/// Prices compounding by `daily` from 100.
pub fn geometric_prices(n: usize, daily: f64) -> Vec<f64> {
    (0..n).map(|i| 100.0 * daily.powi(i as i32)).collect()
}

/// Prices that rise overall but dip every third day, keeping RSI below 100.
pub fn choppy_rising_prices(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let trend = 100.0 * 1.01f64.powi(i as i32);
            if i % 3 == 2 { trend * 0.99 } else { trend }
        })
        .collect()
}

/// Market data with neutral signals: RSI 50, no volatility, u-rate 0.
pub fn calm_market(chart: Chart) -> MarketData {
    let n = chart.len();
    let indicators =
        IndicatorSet::from_arrays(&chart, vec![50.0; n], vec![0.0; n], vec![0.0; n]).unwrap();
    MarketData::new(chart, indicators).unwrap()
}

/// A Sahm series with `value` for every month the chart touches.
pub fn flat_sahm(chart: &Chart, value: f64) -> SahmSeries {
    SahmSeries::new(chart.rows().iter().map(|r| (r.date, value)))
}

pub fn settings(max_cycles: usize) -> EngineSettings {
    EngineSettings {
        max_cycles,
        ..EngineSettings::default()
    }
}

/// Default parameters with the Sahm filter off.
pub fn config(term: usize) -> StrategyConfig {
    StrategyConfig {
        term,
        sahm_threshold: 0.0,
        ..StrategyConfig::default()
    }
}

pub const SAMPLE_INI: &str = r#"
[engine]
seed = 1000000
max_cycles = 1
fail_penalty = 2
fail_limit = 0.1
commission_rate = 0

[tickers]
SOXL = SOXX
TQQQ = QQQ

[strategy]
term = 20
margin = 0.1
bullish_rsi = 100
sahm_threshold = 1

[strategy.SOXL]
margin = 0.05
"#;

pub fn sample_config() -> FileConfigAdapter {
    FileConfigAdapter::from_string(SAMPLE_INI).unwrap()
}

/// SOXL and TQQQ on a choppy rising chart, SOXX as SOXL's base, and a
/// calm Sahm series.
pub fn sample_data_port() -> MockDataPort {
    let chart = chart_from_prices(&choppy_rising_prices(120));
    let sahm = flat_sahm(&chart, 0.2);
    let base = chart_from_prices(&geometric_prices(120, 1.002));
    MockDataPort::new()
        .with_chart("SOXL", chart.clone())
        .with_chart("TQQQ", chart)
        .with_base_chart("SOXX", base)
        .with_sahm(sahm)
}
