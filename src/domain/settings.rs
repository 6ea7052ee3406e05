//! Evaluation-wide engine settings.

use crate::domain::error::LevtraderError;
use crate::ports::config_port::ConfigPort;

pub const MARKET_DAYS_PER_YEAR: f64 = 260.0;

pub const DEFAULT_SEED: f64 = 1_000_000.0;
pub const DEFAULT_MAX_CYCLES: usize = 2;
pub const DEFAULT_FAIL_PENALTY: f64 = 2.0;
pub const DEFAULT_FAIL_LIMIT: f64 = 0.1;
pub const DEFAULT_COMMISSION_RATE: f64 = 0.0;

/// Settings held outside the strategy config and shared by every window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub seed: f64,
    pub max_cycles: usize,
    pub fail_penalty: f64,
    pub fail_limit: f64,
    pub commission_rate: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            max_cycles: DEFAULT_MAX_CYCLES,
            fail_penalty: DEFAULT_FAIL_PENALTY,
            fail_limit: DEFAULT_FAIL_LIMIT,
            commission_rate: DEFAULT_COMMISSION_RATE,
        }
    }
}

impl EngineSettings {
    /// Reads `[engine]`, falling back to defaults for absent keys. A value
    /// that is not a number is an error.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, LevtraderError> {
        let max_cycles = config.get_int("engine", "max_cycles", DEFAULT_MAX_CYCLES as i64)?;
        if max_cycles < 1 {
            return Err(LevtraderError::ConfigInvalid {
                section: "engine".to_string(),
                key: "max_cycles".to_string(),
                reason: "max_cycles must be at least 1".to_string(),
            });
        }

        let settings = Self {
            seed: config.get_double("engine", "seed", DEFAULT_SEED)?,
            max_cycles: max_cycles as usize,
            fail_penalty: config.get_double("engine", "fail_penalty", DEFAULT_FAIL_PENALTY)?,
            fail_limit: config.get_double("engine", "fail_limit", DEFAULT_FAIL_LIMIT)?,
            commission_rate: config.get_double("engine", "commission_rate", DEFAULT_COMMISSION_RATE)?,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), LevtraderError> {
        let invalid = |key: &str, reason: &str| LevtraderError::ConfigInvalid {
            section: "engine".to_string(),
            key: key.to_string(),
            reason: reason.to_string(),
        };

        if !(self.seed > 0.0) {
            return Err(invalid("seed", "seed must be positive"));
        }
        if self.max_cycles < 1 {
            return Err(invalid("max_cycles", "max_cycles must be at least 1"));
        }
        if self.fail_penalty < 0.0 {
            return Err(invalid("fail_penalty", "fail_penalty must be non-negative"));
        }
        if !(0.0..=1.0).contains(&self.fail_limit) {
            return Err(invalid("fail_limit", "fail_limit must be between 0 and 1"));
        }
        if !(0.0..0.01).contains(&self.commission_rate) {
            return Err(invalid(
                "commission_rate",
                "commission_rate must be at least 0 and below 0.01",
            ));
        }
        Ok(())
    }
}
