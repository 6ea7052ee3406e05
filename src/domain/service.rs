//! Request/response backtest service over a read-only market cache.
//!
//! The cache is built once and never mutated, so one service may be shared
//! across threads and serve requests concurrently.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::backtest::full_backtest;
use crate::domain::error::LevtraderError;
use crate::domain::settings::EngineSettings;
use crate::domain::state::State;
use crate::domain::strategy::{StrategyConfig, StrategyParam};
use crate::domain::universe::TickerData;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BacktestRequest {
    pub ticker: String,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    /// Parameter overrides on top of the ticker's default config.
    #[serde(default)]
    pub config: Option<BTreeMap<String, f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BacktestResponse {
    History(Vec<State>),
    Error(String),
}

pub struct BacktestService {
    tickers: HashMap<String, TickerData>,
    settings: EngineSettings,
}

impl BacktestService {
    pub fn new(tickers: Vec<TickerData>, settings: EngineSettings) -> Self {
        Self {
            tickers: tickers
                .into_iter()
                .map(|data| (data.ticker.to_uppercase(), data))
                .collect(),
            settings,
        }
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.tickers.keys().map(String::as_str)
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Runs a full backtest for the request. Failures become an error
    /// response.
    pub fn handle(&self, request: &BacktestRequest) -> BacktestResponse {
        match self.run(request) {
            Ok(history) => BacktestResponse::History(history),
            Err(e) => {
                warn!(ticker = %request.ticker, error = %e, "request failed");
                BacktestResponse::Error(e.to_string())
            }
        }
    }

    pub fn run(&self, request: &BacktestRequest) -> Result<Vec<State>, LevtraderError> {
        let data = self
            .tickers
            .get(&request.ticker.trim().to_uppercase())
            .ok_or_else(|| LevtraderError::UnknownTicker {
                ticker: request.ticker.clone(),
            })?;

        let start = request.start.as_deref();
        let end = request.end.as_deref();
        let market = data.market.bounded(start, end)?;

        let base = data.base_chart.as_ref().and_then(|chart| {
            chart.between(market.chart.first_date()?, market.chart.last_date()?)
        });

        let config = match &request.config {
            Some(overrides) => apply_overrides(data.config, overrides)?,
            None => data.config,
        };

        debug!(ticker = %data.ticker, rows = market.len(), %config, "full backtest");
        Ok(full_backtest(&market, base.as_ref(), &config, &self.settings))
    }
}

fn apply_overrides(
    base: StrategyConfig,
    overrides: &BTreeMap<String, f64>,
) -> Result<StrategyConfig, LevtraderError> {
    let pins = overrides
        .iter()
        .map(|(key, &value)| {
            key.parse::<StrategyParam>()
                .map(|param| (param, value))
                .map_err(|reason| LevtraderError::InvalidFixedParam {
                    param: key.clone(),
                    reason,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let config = base.apply_fixed(&pins)?;
    config.validate()?;
    Ok(config)
}
