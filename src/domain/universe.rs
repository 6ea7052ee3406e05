//! Supported tickers and their market data.
//!
//! The `[tickers]` section maps each leveraged ticker to the base index it
//! tracks (`SOXL = SOXX`).

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::domain::chart::Chart;
use crate::domain::error::LevtraderError;
use crate::domain::indicator::MarketData;
use crate::domain::strategy::StrategyConfig;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;

/// Leveraged ticker to base index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Universe {
    tickers: BTreeMap<String, String>,
}

impl Universe {
    pub fn new(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            tickers: entries
                .into_iter()
                .map(|(ticker, base)| (ticker.trim().to_uppercase(), base.trim().to_uppercase()))
                .collect(),
        }
    }

    /// Reads `[tickers]`. Keys come back lowercased from the INI reader and
    /// are normalized to uppercase.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, LevtraderError> {
        let mut tickers = BTreeMap::new();
        for key in config.section_keys("tickers") {
            let base = config
                .get_string("tickers", &key)
                .filter(|b| !b.trim().is_empty())
                .ok_or_else(|| LevtraderError::ConfigInvalid {
                    section: "tickers".to_string(),
                    key: key.clone(),
                    reason: "base ticker must not be empty".to_string(),
                })?;
            tickers.insert(key.trim().to_uppercase(), base.trim().to_uppercase());
        }
        if tickers.is_empty() {
            return Err(LevtraderError::ConfigMissing {
                section: "tickers".to_string(),
                key: "<ticker>".to_string(),
            });
        }
        Ok(Self { tickers })
    }

    pub fn count(&self) -> usize {
        self.tickers.len()
    }

    pub fn base_of(&self, ticker: &str) -> Option<&str> {
        self.tickers.get(&ticker.to_uppercase()).map(String::as_str)
    }

    /// Base ticker for `ticker`, or an unknown-ticker error.
    pub fn require(&self, ticker: &str) -> Result<&str, LevtraderError> {
        self.base_of(ticker).ok_or_else(|| LevtraderError::UnknownTicker {
            ticker: ticker.to_string(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tickers.iter().map(|(t, b)| (t.as_str(), b.as_str()))
    }
}

/// Everything held in memory for one ticker.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerData {
    pub ticker: String,
    pub base_ticker: String,
    /// Full history with indicators computed at the default term.
    pub market: MarketData,
    pub base_chart: Option<Chart>,
    pub config: StrategyConfig,
}

/// Loads one ticker. The base chart is optional: a failure to read it is
/// logged and the ticker is served without base comparison.
pub fn load_ticker(
    data_port: &dyn DataPort,
    ticker: &str,
    base_ticker: &str,
    config: StrategyConfig,
) -> Result<TickerData, LevtraderError> {
    let chart = data_port.fetch_chart(ticker)?;
    chart.check_prices()?;
    if chart.is_empty() {
        return Err(LevtraderError::InsufficientData {
            ticker: ticker.to_string(),
            rows: 0,
            minimum: 1,
        });
    }

    let base_chart = match data_port
        .fetch_base_chart(base_ticker)
        .and_then(|base| base.check_prices().map(|()| base))
    {
        Ok(base) if !base.is_empty() => Some(base),
        Ok(_) => {
            warn!(ticker, base_ticker, "base chart is empty");
            None
        }
        Err(e) => {
            warn!(ticker, base_ticker, error = %e, "base chart unavailable");
            None
        }
    };

    Ok(TickerData {
        ticker: ticker.to_string(),
        base_ticker: base_ticker.to_string(),
        market: MarketData::compute(chart, StrategyConfig::default().term),
        base_chart,
        config,
    })
}

/// Loads every ticker in the universe, skipping those whose data cannot be
/// read. Fails only when none load.
pub fn load_universe(
    data_port: &dyn DataPort,
    config_port: &dyn ConfigPort,
    universe: &Universe,
) -> Result<Vec<TickerData>, LevtraderError> {
    let mut loaded = Vec::new();

    for (ticker, base) in universe.iter() {
        let config = StrategyConfig::from_config(config_port, Some(ticker))?;
        match load_ticker(data_port, ticker, base, config) {
            Ok(data) => {
                info!(ticker, rows = data.market.len(), "loaded chart");
                loaded.push(data);
            }
            Err(e) => warn!(ticker, error = %e, "skipping ticker"),
        }
    }

    if loaded.is_empty() {
        return Err(LevtraderError::InsufficientData {
            ticker: "all".to_string(),
            rows: 0,
            minimum: 1,
        });
    }
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    #[test]
    fn from_config_uppercases_tickers() {
        let config =
            FileConfigAdapter::from_string("[tickers]\nSOXL = soxx\nTQQQ = QQQ\n").unwrap();
        let universe = Universe::from_config(&config).unwrap();
        assert_eq!(universe.count(), 2);
        assert_eq!(universe.base_of("SOXL"), Some("SOXX"));
        assert_eq!(universe.base_of("tqqq"), Some("QQQ"));
    }

    #[test]
    fn from_config_requires_tickers() {
        let config = FileConfigAdapter::from_string("[engine]\nseed = 1\n").unwrap();
        let err = Universe::from_config(&config).unwrap_err();
        assert!(matches!(err, LevtraderError::ConfigMissing { .. }));
    }

    #[test]
    fn require_unknown_ticker() {
        let universe = Universe::new([("SOXL".to_string(), "SOXX".to_string())]);
        let err = universe.require("UPRO").unwrap_err();
        assert_eq!(err.to_string(), "'UPRO' is not supported");
    }

    #[test]
    fn iter_is_sorted() {
        let universe = Universe::new([
            ("TQQQ".to_string(), "QQQ".to_string()),
            ("SOXL".to_string(), "SOXX".to_string()),
        ]);
        let tickers: Vec<&str> = universe.iter().map(|(t, _)| t).collect();
        assert_eq!(tickers, vec!["SOXL", "TQQQ"]);
    }
}
