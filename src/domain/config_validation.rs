//! Configuration validation.
//!
//! Validates every section before any data is read.

use crate::domain::error::LevtraderError;
use crate::domain::settings::EngineSettings;
use crate::domain::strategy::StrategyConfig;
use crate::domain::universe::Universe;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_CHARTS_PATH: &str = "charts";
pub const DEFAULT_INDICES_PATH: &str = "indices";

/// Everything a run needs from the config file.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedConfig {
    pub settings: EngineSettings,
    pub universe: Universe,
    pub charts_path: String,
    pub indices_path: String,
}

pub fn validate_config(config: &dyn ConfigPort) -> Result<ValidatedConfig, LevtraderError> {
    let settings = EngineSettings::from_config(config)?;
    let charts_path = validate_path(config, "charts_path", DEFAULT_CHARTS_PATH)?;
    let indices_path = validate_path(config, "indices_path", DEFAULT_INDICES_PATH)?;
    let universe = Universe::from_config(config)?;
    validate_strategy_sections(config, &universe)?;
    validate_sweep(config)?;

    Ok(ValidatedConfig {
        settings,
        universe,
        charts_path,
        indices_path,
    })
}

fn validate_path(config: &dyn ConfigPort, key: &str, default: &str) -> Result<String, LevtraderError> {
    match config.get_string("data", key) {
        None => Ok(default.to_string()),
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(_) => Err(LevtraderError::ConfigInvalid {
            section: "data".to_string(),
            key: key.to_string(),
            reason: format!("{key} must not be empty"),
        }),
    }
}

fn validate_strategy_sections(config: &dyn ConfigPort, universe: &Universe) -> Result<(), LevtraderError> {
    StrategyConfig::from_config(config, None)?;
    for (ticker, _) in universe.iter() {
        StrategyConfig::from_config(config, Some(ticker))?;
    }
    Ok(())
}

fn validate_sweep(config: &dyn ConfigPort) -> Result<(), LevtraderError> {
    let limit = config.get_int("sweep", "max_combinations", 1)?;
    if limit < 1 {
        return Err(LevtraderError::ConfigInvalid {
            section: "sweep".to_string(),
            key: "max_combinations".to_string(),
            reason: "max_combinations must be at least 1".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn valid_config_passes() {
        let config = make_config(
            r#"
[engine]
seed = 1000000
max_cycles = 2
fail_penalty = 2
fail_limit = 0.1
commission_rate = 0

[data]
charts_path = data/charts
indices_path = data/indices

[tickers]
SOXL = SOXX
TQQQ = QQQ

[strategy]
term = 40
margin = 0.1

[strategy.SOXL]
margin = 0.12
"#,
        );
        let validated = validate_config(&config).unwrap();
        assert_eq!(validated.charts_path, "data/charts");
        assert_eq!(validated.universe.count(), 2);
        assert_eq!(validated.settings.max_cycles, 2);
    }

    #[test]
    fn data_paths_default() {
        let config = make_config("[tickers]\nSOXL = SOXX\n");
        let validated = validate_config(&config).unwrap();
        assert_eq!(validated.charts_path, "charts");
        assert_eq!(validated.indices_path, "indices");
    }

    #[test]
    fn empty_charts_path_fails() {
        let config = make_config("[data]\ncharts_path =\n\n[tickers]\nSOXL = SOXX\n");
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn missing_tickers_fails() {
        let config = make_config("[engine]\nseed = 1000\n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, LevtraderError::ConfigMissing { .. }));
    }

    #[test]
    fn invalid_ticker_override_fails() {
        let config = make_config("[tickers]\nSOXL = SOXX\n\n[strategy.SOXL]\nburst_vol = 0\n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, LevtraderError::ConfigInvalid { ref key, .. } if key == "burst_vol"));
    }

    #[test]
    fn commission_rate_out_of_range_fails() {
        let config = make_config("[engine]\ncommission_rate = 0.05\n\n[tickers]\nSOXL = SOXX\n");
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn sweep_limit_must_be_positive() {
        let config = make_config("[tickers]\nSOXL = SOXX\n\n[sweep]\nmax_combinations = 0\n");
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn non_numeric_engine_value_fails() {
        let config = make_config("[engine]\nfail_limit = lots\n\n[tickers]\nSOXL = SOXX\n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, LevtraderError::ConfigInvalid { ref key, .. } if key == "fail_limit"));
    }

    #[test]
    fn non_numeric_sweep_limit_fails() {
        let config = make_config("[tickers]\nSOXL = SOXX\n\n[sweep]\nmax_combinations = many\n");
        assert!(validate_config(&config).is_err());
    }
}
