//! CLI integration tests for command orchestration.
//!
//! Tests cover:
//! - Config loading and validation with real INI files on disk
//! - Ticker preparation: config layering, fixed pins, date bounds
//! - Test, full and sweep runs over a mock data port
//! - JSON request handling

mod common;

use common::*;
use levtrader::adapters::csv_adapter::CsvAdapter;
use levtrader::cli::{self, build_service, handle_request_json, TickerRun};
use levtrader::domain::error::LevtraderError;
use std::io::Write;
use std::path::Path;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn exit_code_repr(code: std::process::ExitCode) -> String {
    format!("{code:?}")
}

fn prepare(ticker: &str, start: Option<&str>, fixed: Option<&str>) -> Result<TickerRun, LevtraderError> {
    TickerRun::prepare(&sample_config(), &sample_data_port(), ticker, start, None, fixed)
}

mod config_loading {
    use super::*;

    #[test]
    fn validate_accepts_sample_config() {
        let file = write_temp_ini(SAMPLE_INI);
        let code = cli::run_validate(file.path());
        assert_eq!(exit_code_repr(code), exit_code_repr(std::process::ExitCode::SUCCESS));
    }

    #[test]
    fn validate_rejects_bad_engine_value() {
        let file = write_temp_ini("[engine]\nmax_cycles = 0\n\n[tickers]\nSOXL = SOXX\n");
        let code = cli::run_validate(file.path());
        assert_eq!(exit_code_repr(code), exit_code_repr(std::process::ExitCode::from(2)));
    }

    #[test]
    fn load_config_missing_file_fails() {
        let result = cli::load_config(Path::new("/nonexistent/levtrader.ini"));
        let code = result.err().unwrap();
        assert_eq!(exit_code_repr(code), exit_code_repr(std::process::ExitCode::from(2)));
    }
}

mod preparation {
    use super::*;

    #[test]
    fn layers_ticker_section_and_fixed_pins() {
        let run = prepare("soxl", None, None).unwrap();
        assert_eq!(run.ticker, "SOXL");
        assert_eq!(run.config.term, 20);
        assert_eq!(run.config.margin, 0.05);
        assert_eq!(run.settings.max_cycles, 1);
        assert!(run.base_chart.is_some());
        assert!(run.sahm.is_some());

        let pinned = prepare("SOXL", None, Some("margin:0.2,term:30")).unwrap();
        assert_eq!(pinned.config.margin, 0.2);
        assert_eq!(pinned.config.term, 30);

        let other = prepare("TQQQ", None, None).unwrap();
        assert_eq!(other.config.margin, 0.1);
        assert!(other.base_chart.is_none());
    }

    #[test]
    fn date_bounds_select_rows() {
        let run = prepare("SOXL", Some("2024-03"), None).unwrap();
        assert_eq!(run.range, 60..120);
        assert_eq!(run.chart.len(), 120);
    }

    #[test]
    fn unknown_ticker_fails() {
        let err = prepare("UPRO", None, None).unwrap_err();
        assert!(matches!(err, LevtraderError::UnknownTicker { .. }));
    }

    #[test]
    fn malformed_fixed_params_fail() {
        let err = prepare("SOXL", None, Some("margin=0.2")).unwrap_err();
        assert!(matches!(err, LevtraderError::InvalidFixedParam { .. }));

        let err = prepare("SOXL", None, Some("leverage:3")).unwrap_err();
        assert!(matches!(err, LevtraderError::InvalidFixedParam { .. }));
    }

    #[test]
    fn bounds_past_the_chart_fail() {
        let err = prepare("SOXL", Some("2031"), None).unwrap_err();
        assert!(matches!(err, LevtraderError::InvalidDateBound { .. }));
    }

    #[test]
    fn bounds_before_the_chart_fail() {
        let err = prepare("SOXL", Some("1990"), None).unwrap_err();
        assert!(matches!(err, LevtraderError::InvalidDateBound { .. }));

        let err = TickerRun::prepare(&sample_config(), &sample_data_port(), "SOXL", None, Some("2023-12"), None)
            .unwrap_err();
        assert!(matches!(err, LevtraderError::InvalidDateBound { .. }));
    }

    #[test]
    fn zero_price_chart_is_a_data_error() {
        let mut prices = choppy_rising_prices(60);
        prices[30] = 0.0;
        let port = sample_data_port().with_chart("SOXL", chart_from_prices(&prices));
        let err = TickerRun::prepare(&sample_config(), &port, "SOXL", None, None, None).unwrap_err();
        assert!(matches!(err, LevtraderError::DataRead { .. }));
    }

    #[test]
    fn zero_price_csv_is_rejected_before_the_engine() {
        let dir = tempfile::TempDir::new().unwrap();
        let charts = dir.path().join("charts");
        std::fs::create_dir_all(&charts).unwrap();
        let mut csv = String::from("date,entry,close\n");
        for (i, price) in choppy_rising_prices(28).iter().enumerate() {
            let entry = if i % 3 == 2 { 0.0 } else { *price };
            csv.push_str(&format!("2024-01-{:02},{entry},{price}\n", i + 1));
        }
        std::fs::write(charts.join("SOXL-GEN.csv"), csv).unwrap();

        let adapter = CsvAdapter::new(charts, dir.path().join("indices"));
        let err = TickerRun::prepare(&sample_config(), &adapter, "SOXL", None, None, None).unwrap_err();
        assert!(matches!(err, LevtraderError::DataRead { ref reason } if reason.contains("line 4")));
    }
}

mod runs {
    use super::*;

    #[test]
    fn evaluate_scores_windows() {
        let run = prepare("SOXL", None, None).unwrap();
        let (evaluation, score) = run.evaluate().unwrap();
        assert_eq!(evaluation.stats.attempted, 101);
        assert_eq!(evaluation.stats.excluded, 0);
        assert!((0.0..=1.0).contains(&score.fail_rate));
    }

    #[test]
    fn evaluate_rejects_too_few_rows() {
        let run = prepare("SOXL", Some("2024-04-20"), Some("term:30")).unwrap();
        let err = run.evaluate().unwrap_err();
        assert!(matches!(err, LevtraderError::InsufficientData { rows: 10, minimum: 30, .. }));
    }

    #[test]
    fn backtest_summarizes_bounded_history() {
        let run = prepare("SOXL", Some("2024-02"), None).unwrap();
        let (history, summary) = run.backtest().unwrap();
        assert_eq!(history.len(), 120 - 31);
        let summary = summary.unwrap();
        assert_eq!(summary.start_date, date(2024, 2, 1));
        assert_eq!(summary.end_date, date(2024, 4, 29));
        assert!(summary.base_ror.unwrap() > 0.0);
    }

    #[test]
    fn default_grid_exceeds_limit() {
        let run = prepare("SOXL", None, None).unwrap();
        let err = run.sweep(None, None).unwrap_err();
        assert!(matches!(err, LevtraderError::SweepTooLarge { limit: 100_000, .. }));
    }

    #[test]
    fn pinned_sweep_orders_by_score() {
        let run = prepare("SOXL", None, None).unwrap();
        let fixed = "bullish_rsi:100,bullish_u_rate:0.5,burst_scale:0,burst_vol:30,sell_base:0,sell_limit:1,term:20";
        let results = run.sweep(Some(fixed), None).unwrap();
        assert_eq!(results.len(), 11);
        let scores: Vec<f64> = results.all().iter().map(|e| e.score.score).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
        assert!(results.all().iter().all(|e| e.config.term == 20));
    }
}

mod requests {
    use super::*;

    #[test]
    fn json_request_round_trip() {
        let service = build_service(&sample_config(), &sample_data_port()).unwrap();
        let json = handle_request_json(&service, r#"{"ticker": "SOXL", "start": "2024-04"}"#).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let history = value["history"].as_array().unwrap();
        assert_eq!(history.len(), 29);
        assert_eq!(history[0]["date"], "2024-04-01");
    }

    #[test]
    fn malformed_json_is_an_error_response() {
        let service = build_service(&sample_config(), &sample_data_port()).unwrap();
        let json = handle_request_json(&service, "{not json").unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["error"].as_str().unwrap().starts_with("invalid request"));
    }

    #[test]
    fn unknown_ticker_is_an_error_response() {
        let service = build_service(&sample_config(), &sample_data_port()).unwrap();
        let json = handle_request_json(&service, r#"{"ticker": "UPRO"}"#).unwrap();
        assert_eq!(json, r#"{"error":"'UPRO' is not supported"}"#);
    }
}
