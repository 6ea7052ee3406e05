//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for levtrader.
#[derive(Debug, thiserror::Error)]
pub enum LevtraderError {
    #[error("data read error: {reason}")]
    DataRead { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("'{ticker}' is not supported")]
    UnknownTicker { ticker: String },

    #[error("invalid date bound '{bound}': {reason}")]
    InvalidDateBound { bound: String, reason: String },

    #[error("missing {indicator} value for {date}")]
    MissingIndicator {
        indicator: &'static str,
        date: NaiveDate,
    },

    #[error("{indicator} series has {actual} values, chart has {expected} rows")]
    MisalignedIndicator {
        indicator: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("invalid fixed parameter '{param}': {reason}")]
    InvalidFixedParam { param: String, reason: String },

    #[error("sweep grid has {combinations} combinations, limit is {limit}")]
    SweepTooLarge { combinations: usize, limit: usize },

    #[error("insufficient data for {ticker}: have {rows} rows, need {minimum}")]
    InsufficientData {
        ticker: String,
        rows: usize,
        minimum: usize,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&LevtraderError> for std::process::ExitCode {
    fn from(err: &LevtraderError) -> Self {
        let code: u8 = match err {
            LevtraderError::Io(_) | LevtraderError::Csv(_) | LevtraderError::Json(_) => 1,
            LevtraderError::ConfigParse { .. }
            | LevtraderError::ConfigMissing { .. }
            | LevtraderError::ConfigInvalid { .. } => 2,
            LevtraderError::DataRead { .. }
            | LevtraderError::UnknownTicker { .. }
            | LevtraderError::InvalidDateBound { .. }
            | LevtraderError::MissingIndicator { .. }
            | LevtraderError::MisalignedIndicator { .. } => 3,
            LevtraderError::InvalidFixedParam { .. } | LevtraderError::SweepTooLarge { .. } => 4,
            LevtraderError::InsufficientData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_unknown_ticker() {
        let err = LevtraderError::UnknownTicker {
            ticker: "XYZ".into(),
        };
        assert_eq!(err.to_string(), "'XYZ' is not supported");
    }

    #[test]
    fn display_missing_indicator() {
        let err = LevtraderError::MissingIndicator {
            indicator: "rsi",
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        };
        assert_eq!(err.to_string(), "missing rsi value for 2024-03-01");
    }

    #[test]
    fn exit_codes_by_category() {
        use std::process::ExitCode;

        let config = LevtraderError::ConfigMissing {
            section: "engine".into(),
            key: "seed".into(),
        };
        assert_eq!(format!("{:?}", ExitCode::from(&config)), format!("{:?}", ExitCode::from(2)));

        let data = LevtraderError::UnknownTicker {
            ticker: "XYZ".into(),
        };
        assert_eq!(format!("{:?}", ExitCode::from(&data)), format!("{:?}", ExitCode::from(3)));

        let param = LevtraderError::InvalidFixedParam {
            param: "margin".into(),
            reason: "missing ':'".into(),
        };
        assert_eq!(format!("{:?}", ExitCode::from(&param)), format!("{:?}", ExitCode::from(4)));

        let short = LevtraderError::InsufficientData {
            ticker: "SOXL".into(),
            rows: 3,
            minimum: 40,
        };
        assert_eq!(format!("{:?}", ExitCode::from(&short)), format!("{:?}", ExitCode::from(5)));
    }
}
