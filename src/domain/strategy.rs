//! Strategy parameters for the accumulate/sell policy.
//!
//! Values resolve in layers: built-in defaults, then `[strategy]`, then
//! `[strategy.<TICKER>]`, then any fixed `key:value` overrides.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::LevtraderError;
use crate::ports::config_port::ConfigPort;

/// Immutable parameters of the trading policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub term: usize,
    pub margin: f64,
    pub bullish_rsi: f64,
    pub bullish_u_rate: f64,
    pub burst_scale: f64,
    pub burst_vol: f64,
    pub sell_base: f64,
    pub sell_limit: f64,
    pub sahm_threshold: f64,
    pub min_seed_rate: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            term: 40,
            margin: 0.1,
            bullish_rsi: 80.0,
            bullish_u_rate: 0.5,
            burst_scale: 0.0,
            burst_vol: 30.0,
            sell_base: 0.0,
            sell_limit: 1.0,
            sahm_threshold: 1.0,
            min_seed_rate: 0.0,
        }
    }
}

/// A single named strategy parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StrategyParam {
    Term,
    Margin,
    BullishRsi,
    BullishURate,
    BurstScale,
    BurstVol,
    SellBase,
    SellLimit,
    SahmThreshold,
    MinSeedRate,
}

impl StrategyParam {
    pub const ALL: [StrategyParam; 10] = [
        StrategyParam::Term,
        StrategyParam::Margin,
        StrategyParam::BullishRsi,
        StrategyParam::BullishURate,
        StrategyParam::BurstScale,
        StrategyParam::BurstVol,
        StrategyParam::SellBase,
        StrategyParam::SellLimit,
        StrategyParam::SahmThreshold,
        StrategyParam::MinSeedRate,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StrategyParam::Term => "term",
            StrategyParam::Margin => "margin",
            StrategyParam::BullishRsi => "bullish_rsi",
            StrategyParam::BullishURate => "bullish_u_rate",
            StrategyParam::BurstScale => "burst_scale",
            StrategyParam::BurstVol => "burst_vol",
            StrategyParam::SellBase => "sell_base",
            StrategyParam::SellLimit => "sell_limit",
            StrategyParam::SahmThreshold => "sahm_threshold",
            StrategyParam::MinSeedRate => "min_seed_rate",
        }
    }
}

impl FromStr for StrategyParam {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "term" => Ok(StrategyParam::Term),
            "margin" => Ok(StrategyParam::Margin),
            "bullish_rsi" => Ok(StrategyParam::BullishRsi),
            // older configs call it burst_urate
            "bullish_u_rate" | "burst_urate" => Ok(StrategyParam::BullishURate),
            "burst_scale" => Ok(StrategyParam::BurstScale),
            "burst_vol" => Ok(StrategyParam::BurstVol),
            "sell_base" => Ok(StrategyParam::SellBase),
            "sell_limit" => Ok(StrategyParam::SellLimit),
            "sahm_threshold" => Ok(StrategyParam::SahmThreshold),
            "min_seed_rate" => Ok(StrategyParam::MinSeedRate),
            other => Err(format!("unknown parameter '{other}'")),
        }
    }
}

impl fmt::Display for StrategyParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl StrategyConfig {
    pub fn get(&self, param: StrategyParam) -> f64 {
        match param {
            StrategyParam::Term => self.term as f64,
            StrategyParam::Margin => self.margin,
            StrategyParam::BullishRsi => self.bullish_rsi,
            StrategyParam::BullishURate => self.bullish_u_rate,
            StrategyParam::BurstScale => self.burst_scale,
            StrategyParam::BurstVol => self.burst_vol,
            StrategyParam::SellBase => self.sell_base,
            StrategyParam::SellLimit => self.sell_limit,
            StrategyParam::SahmThreshold => self.sahm_threshold,
            StrategyParam::MinSeedRate => self.min_seed_rate,
        }
    }

    /// Returns a copy with one parameter replaced. `term` must be a positive
    /// whole number.
    pub fn with(self, param: StrategyParam, value: f64) -> Result<Self, String> {
        if !value.is_finite() {
            return Err(format!("{param} must be a finite number"));
        }
        let mut next = self;
        match param {
            StrategyParam::Term => {
                if value < 1.0 || value.fract() != 0.0 {
                    return Err("term must be a positive whole number".to_string());
                }
                next.term = value as usize;
            }
            StrategyParam::Margin => next.margin = value,
            StrategyParam::BullishRsi => next.bullish_rsi = value,
            StrategyParam::BullishURate => next.bullish_u_rate = value,
            StrategyParam::BurstScale => next.burst_scale = value,
            StrategyParam::BurstVol => next.burst_vol = value,
            StrategyParam::SellBase => next.sell_base = value,
            StrategyParam::SellLimit => next.sell_limit = value,
            StrategyParam::SahmThreshold => next.sahm_threshold = value,
            StrategyParam::MinSeedRate => next.min_seed_rate = value,
        }
        Ok(next)
    }

    /// Applies a textual `key = value` override from a config section.
    pub fn apply_override(self, section: &str, key: &str, value: &str) -> Result<Self, LevtraderError> {
        let invalid = |reason: String| LevtraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason,
        };
        let param = key.parse::<StrategyParam>().map_err(invalid)?;
        let number = value
            .trim()
            .parse::<f64>()
            .map_err(|_| invalid(format!("'{}' is not a number", value.trim())))?;
        self.with(param, number).map_err(invalid)
    }

    /// Applies fixed parameters parsed by [`parse_fixed_params`].
    pub fn apply_fixed(self, fixed: &[(StrategyParam, f64)]) -> Result<Self, LevtraderError> {
        fixed.iter().try_fold(self, |config, &(param, value)| {
            config
                .with(param, value)
                .map_err(|reason| LevtraderError::InvalidFixedParam {
                    param: param.to_string(),
                    reason,
                })
        })
    }

    /// Resolves the config for `ticker` from `[strategy]` and
    /// `[strategy.<TICKER>]`.
    pub fn from_config(config: &dyn ConfigPort, ticker: Option<&str>) -> Result<Self, LevtraderError> {
        let mut resolved = StrategyConfig::default();
        let mut sections = vec!["strategy".to_string()];
        if let Some(ticker) = ticker {
            sections.push(format!("strategy.{ticker}"));
        }

        for section in &sections {
            for key in config.section_keys(section) {
                if let Some(value) = config.get_string(section, &key) {
                    resolved = resolved.apply_override(section, &key, &value)?;
                }
            }
        }

        resolved.validate()?;
        Ok(resolved)
    }

    pub fn validate(&self) -> Result<(), LevtraderError> {
        let invalid = |key: &str, reason: &str| LevtraderError::ConfigInvalid {
            section: "strategy".to_string(),
            key: key.to_string(),
            reason: reason.to_string(),
        };

        if self.term == 0 {
            return Err(invalid("term", "term must be at least 1"));
        }
        if !(self.margin > 0.0) {
            return Err(invalid("margin", "margin must be positive"));
        }
        if !(0.0..=100.0).contains(&self.bullish_rsi) {
            return Err(invalid("bullish_rsi", "bullish_rsi must be between 0 and 100"));
        }
        if !(0.0..=1.0).contains(&self.bullish_u_rate) {
            return Err(invalid("bullish_u_rate", "bullish_u_rate must be between 0 and 1"));
        }
        if self.burst_scale < 0.0 {
            return Err(invalid("burst_scale", "burst_scale must be non-negative"));
        }
        if !(self.burst_vol > 0.0) {
            return Err(invalid("burst_vol", "burst_vol must be positive"));
        }
        if !(0.0..=1.0).contains(&self.sell_base) {
            return Err(invalid("sell_base", "sell_base must be between 0 and 1"));
        }
        if !(self.sell_base..=1.0).contains(&self.sell_limit) {
            return Err(invalid("sell_limit", "sell_limit must be between sell_base and 1"));
        }
        if self.sahm_threshold < 0.0 {
            return Err(invalid("sahm_threshold", "sahm_threshold must be non-negative"));
        }
        if !(0.0..=1.0).contains(&self.min_seed_rate) {
            return Err(invalid("min_seed_rate", "min_seed_rate must be between 0 and 1"));
        }
        Ok(())
    }
}

impl fmt::Display for StrategyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "term: {}, margin: {:.2}, bullish_rsi: {:.2}, bullish_u_rate: {:.2}, \
             burst_scale: {:.2}, burst_vol: {:.2}, sell_base: {:.2}, sell_limit: {:.2}, \
             sahm_threshold: {:.2}, min_seed_rate: {:.2}",
            self.term,
            self.margin,
            self.bullish_rsi,
            self.bullish_u_rate,
            self.burst_scale,
            self.burst_vol,
            self.sell_base,
            self.sell_limit,
            self.sahm_threshold,
            self.min_seed_rate,
        )
    }
}

/// Parses `key:value,key:value` into typed parameter pins. An empty string
/// yields no pins.
pub fn parse_fixed_params(fixed: &str) -> Result<Vec<(StrategyParam, f64)>, LevtraderError> {
    let mut pins = Vec::new();

    for item in fixed.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (key, value) = item
            .split_once(':')
            .ok_or_else(|| LevtraderError::InvalidFixedParam {
                param: item.to_string(),
                reason: "expected key:value".to_string(),
            })?;
        let param = key
            .parse::<StrategyParam>()
            .map_err(|reason| LevtraderError::InvalidFixedParam {
                param: item.to_string(),
                reason,
            })?;
        let value = value
            .trim()
            .parse::<f64>()
            .map_err(|_| LevtraderError::InvalidFixedParam {
                param: item.to_string(),
                reason: format!("'{}' is not a number", value.trim()),
            })?;
        pins.retain(|(p, _)| *p != param);
        pins.push((param, value));
    }

    Ok(pins)
}
