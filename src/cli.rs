//! CLI definition and dispatch.

use clap::{Args, Parser, Subcommand};
use std::fs;
use std::io::{self, Read};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{full_backtest, BacktestSummary};
use crate::domain::chart::Chart;
use crate::domain::config_validation::{validate_config, ValidatedConfig};
use crate::domain::error::LevtraderError;
use crate::domain::evaluator::{Evaluation, Evaluator};
use crate::domain::indicator::{MarketData, SahmSeries};
use crate::domain::scoring::Score;
use crate::domain::service::{BacktestRequest, BacktestResponse, BacktestService};
use crate::domain::settings::EngineSettings;
use crate::domain::state::State;
use crate::domain::strategy::{parse_fixed_params, StrategyConfig};
use crate::domain::sweep::{default_ranges, ParamGrid, ParamSweep, SweepResults, DEFAULT_MAX_COMBINATIONS};
use crate::domain::universe::load_universe;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "levtrader", about = "Leveraged ETF accumulate/sell backtester")]
pub struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by the per-ticker commands.
#[derive(Args, Debug, Clone)]
pub struct TickerArgs {
    #[arg(short, long)]
    pub config: PathBuf,
    #[arg(short, long)]
    pub ticker: String,
    /// First period to include (`YYYY`, `YYYY-MM` or `YYYY-MM-DD`)
    #[arg(long)]
    pub start: Option<String>,
    /// Last period to include
    #[arg(long)]
    pub end: Option<String>,
    /// Pinned parameters, `key:value,...`
    #[arg(long)]
    pub fixed: Option<String>,
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Score a config with the sliding-window evaluation
    Test {
        #[command(flatten)]
        args: TickerArgs,
    },
    /// Run one continuous backtest over the chart
    Full {
        #[command(flatten)]
        args: TickerArgs,
    },
    /// Grid-search strategy parameters
    Sweep {
        #[command(flatten)]
        args: TickerArgs,
        /// Number of configurations to print
        #[arg(long, default_value_t = 10)]
        top: usize,
        /// Maximum grid size
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Answer a JSON backtest request read from stdin
    Request {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List configured tickers
    Tickers {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Test { args } => run_test(&args),
        Command::Full { args } => run_full(&args),
        Command::Sweep { args, top, limit } => run_sweep(&args, top, limit),
        Command::Request { config } => run_request(&config),
        Command::Validate { config } => run_validate(&config),
        Command::Tickers { config } => run_tickers(&config),
    }
}

fn report(err: &LevtraderError) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::from(err)
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| report(&e))
}

pub fn data_port(validated: &ValidatedConfig) -> CsvAdapter {
    CsvAdapter::new(
        PathBuf::from(&validated.charts_path),
        PathBuf::from(&validated.indices_path),
    )
}

/// Inputs for one ticker, read and validated.
#[derive(Debug, Clone)]
pub struct TickerRun {
    pub ticker: String,
    pub settings: EngineSettings,
    pub config: StrategyConfig,
    /// Full chart; indicators are computed over all of it.
    pub chart: Chart,
    /// Rows selected by the date bounds.
    pub range: Range<usize>,
    pub base_chart: Option<Chart>,
    pub sahm: Option<SahmSeries>,
    pub sweep_limit: usize,
}

impl TickerRun {
    /// Resolves the ticker's config (defaults, `[strategy]`,
    /// `[strategy.<TICKER>]`, then `fixed`) and reads its data.
    pub fn prepare(
        config_port: &dyn ConfigPort,
        data_port: &dyn DataPort,
        ticker: &str,
        start: Option<&str>,
        end: Option<&str>,
        fixed: Option<&str>,
    ) -> Result<Self, LevtraderError> {
        let validated = validate_config(config_port)?;
        let ticker = ticker.trim().to_uppercase();
        let base_ticker = validated.universe.require(&ticker)?.to_string();

        let pins = match fixed {
            Some(fixed) => parse_fixed_params(fixed)?,
            None => Vec::new(),
        };
        let config = StrategyConfig::from_config(config_port, Some(ticker.as_str()))?.apply_fixed(&pins)?;
        config.validate()?;

        let chart = data_port.fetch_chart(&ticker)?;
        chart.check_prices()?;
        if chart.is_empty() {
            return Err(LevtraderError::InsufficientData {
                ticker,
                rows: 0,
                minimum: config.term,
            });
        }
        let range = chart.bounded_range(start, end)?;

        let base_chart = match data_port
            .fetch_base_chart(&base_ticker)
            .and_then(|base| base.check_prices().map(|()| base))
        {
            Ok(base) => Some(base),
            Err(e) => {
                warn!(%base_ticker, error = %e, "base chart unavailable");
                None
            }
        };
        let sahm = match data_port.fetch_sahm() {
            Ok(sahm) => Some(sahm),
            Err(e) => {
                warn!(error = %e, "sahm series unavailable");
                None
            }
        };

        let limit = config_port.get_int("sweep", "max_combinations", DEFAULT_MAX_COMBINATIONS as i64)?;

        info!(%ticker, rows = range.len(), %config, "prepared ticker");
        Ok(Self {
            ticker,
            settings: validated.settings,
            config,
            chart,
            range,
            base_chart,
            sahm,
            sweep_limit: usize::try_from(limit).unwrap_or(DEFAULT_MAX_COMBINATIONS),
        })
    }

    /// Bounded market data with indicators at the config's term.
    pub fn market(&self) -> Result<MarketData, LevtraderError> {
        let market = MarketData::compute(self.chart.clone(), self.config.term).slice(self.range.clone());
        if market.len() < self.config.term {
            return Err(LevtraderError::InsufficientData {
                ticker: self.ticker.clone(),
                rows: market.len(),
                minimum: self.config.term,
            });
        }
        Ok(market)
    }

    pub fn evaluate(&self) -> Result<(Evaluation, Score), LevtraderError> {
        let market = self.market()?;
        let evaluation = Evaluator::new(&market, self.sahm.as_ref(), &self.settings).evaluate(&self.config)?;
        let score = Score::from_evaluation(&evaluation, &self.settings);
        Ok((evaluation, score))
    }

    pub fn backtest(&self) -> Result<(Vec<State>, Option<BacktestSummary>), LevtraderError> {
        let market = self.market()?;
        let base = self.base_chart.as_ref().and_then(|chart| {
            chart.between(market.chart.first_date()?, market.chart.last_date()?)
        });
        let history = full_backtest(&market, base.as_ref(), &self.config, &self.settings);
        let summary = BacktestSummary::compute(&history, base.as_ref());
        Ok((history, summary))
    }

    /// Sweeps the default grid with `fixed` pins on top of this ticker's
    /// config. `limit` overrides `[sweep] max_combinations`.
    pub fn sweep(&self, fixed: Option<&str>, limit: Option<usize>) -> Result<SweepResults, LevtraderError> {
        let pins = match fixed {
            Some(fixed) => parse_fixed_params(fixed)?,
            None => Vec::new(),
        };
        let grid = ParamGrid::new(&default_ranges(), &pins);
        ParamSweep::new(&self.chart, self.range.clone(), self.sahm.as_ref(), &self.settings)
            .with_max_combinations(limit.unwrap_or(self.sweep_limit))
            .sweep(&grid, &self.config)
    }
}

fn prepare_from_args(args: &TickerArgs) -> Result<TickerRun, ExitCode> {
    eprintln!("Loading config from {}", args.config.display());
    let adapter = load_config(&args.config)?;
    let validated = validate_config(&adapter).map_err(|e| report(&e))?;
    let data = data_port(&validated);
    TickerRun::prepare(
        &adapter,
        &data,
        &args.ticker,
        args.start.as_deref(),
        args.end.as_deref(),
        args.fixed.as_deref(),
    )
    .map_err(|e| report(&e))
}

fn date_span(chart: &Chart) -> String {
    match (chart.first_date(), chart.last_date()) {
        (Some(first), Some(last)) => format!("{first}..{last}"),
        _ => "-".to_string(),
    }
}

fn run_test(args: &TickerArgs) -> ExitCode {
    let run = match prepare_from_args(args) {
        Ok(r) => r,
        Err(code) => return code,
    };

    let (evaluation, score) = match run.evaluate() {
        Ok(r) => r,
        Err(e) => return report(&e),
    };

    let span = date_span(&run.chart.slice(run.range.clone()));
    let stats = &evaluation.stats;
    println!("{} {} ({} rows)", run.ticker, span, run.range.len());
    println!("config: {}", run.config);
    println!(
        "windows: {} started, {} excluded, {} simulated, {} invalidated, {} truncated, {} retired",
        stats.attempted, stats.excluded, stats.simulated, stats.invalidated, stats.truncated, stats.retired
    );
    println!("fail rate:       {:.4}", score.fail_rate);
    println!("avg ror / year:  {:.4}", score.avg_ror_per_year);
    println!("score:           {:.2}", score.score);

    if let Some(output) = &args.output {
        let results: Vec<_> = evaluation.rounds.iter().flatten().cloned().collect();
        if let Err(e) = CsvReportAdapter::new().write_results(&results, &output.to_string_lossy()) {
            return report(&e);
        }
        eprintln!("Window results written to {}", output.display());
    }

    ExitCode::SUCCESS
}

fn format_ror(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.2}%", v * 100.0))
}

fn run_full(args: &TickerArgs) -> ExitCode {
    let run = match prepare_from_args(args) {
        Ok(r) => r,
        Err(code) => return code,
    };

    let (history, summary) = match run.backtest() {
        Ok(r) => r,
        Err(e) => return report(&e),
    };

    println!("{} config: {}", run.ticker, run.config);
    match summary {
        Some(s) => {
            println!("period:          {}..{}", s.start_date, s.end_date);
            println!("final ror:       {:.2}%", s.final_ror * 100.0);
            println!("annualized ror:  {:.2}%", s.annualized_ror * 100.0);
            println!("base ror:        {}", format_ror(s.base_ror));
            println!("base annualized: {}", format_ror(s.base_annualized_ror));
            println!(
                "sold: {}, exhausted: {} ({:.2}%), failed: {} ({:.2}%)",
                s.n_sold,
                s.n_exhausted,
                s.exhaust_rate * 100.0,
                s.n_failed,
                s.fail_rate * 100.0
            );
        }
        None => println!("no rows simulated"),
    }

    if let Some(output) = &args.output {
        if let Err(e) = CsvReportAdapter::new().write_history(&history, &output.to_string_lossy()) {
            return report(&e);
        }
        eprintln!("History written to {}", output.display());
    }

    ExitCode::SUCCESS
}

fn run_sweep(args: &TickerArgs, top: usize, limit: Option<usize>) -> ExitCode {
    let run = match prepare_from_args(args) {
        Ok(r) => r,
        Err(code) => return code,
    };

    let results = match run.sweep(args.fixed.as_deref(), limit) {
        Ok(r) => r,
        Err(e) => return report(&e),
    };

    eprintln!("Scored {} configurations", results.len());
    for (rank, entry) in results.top_n(top).iter().enumerate() {
        println!(
            "{:>3}. score={:.2} fail_rate={:.4} avg_ror={:.4}  {}",
            rank + 1,
            entry.score.score,
            entry.score.fail_rate,
            entry.score.avg_ror_per_year,
            entry.config
        );
    }

    if let Some(output) = &args.output {
        let written = fs::File::create(output)
            .map_err(LevtraderError::from)
            .and_then(|file| {
                serde_json::to_writer_pretty(file, results.top_n(top)).map_err(LevtraderError::from)
            });
        if let Err(e) = written {
            return report(&e);
        }
        eprintln!("Top configurations written to {}", output.display());
    }

    ExitCode::SUCCESS
}

/// Builds the service cache for every configured ticker.
pub fn build_service(
    config_port: &dyn ConfigPort,
    data_port: &dyn DataPort,
) -> Result<BacktestService, LevtraderError> {
    let validated = validate_config(config_port)?;
    let tickers = load_universe(data_port, config_port, &validated.universe)?;
    Ok(BacktestService::new(tickers, validated.settings))
}

/// Decodes one JSON request and encodes the service's response. A request
/// that does not decode becomes an error response.
pub fn handle_request_json(service: &BacktestService, input: &str) -> Result<String, LevtraderError> {
    let response = match serde_json::from_str::<BacktestRequest>(input) {
        Ok(request) => service.handle(&request),
        Err(e) => BacktestResponse::Error(format!("invalid request: {e}")),
    };
    Ok(serde_json::to_string(&response)?)
}

fn run_request(config_path: &Path) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let validated = match validate_config(&adapter) {
        Ok(v) => v,
        Err(e) => return report(&e),
    };
    let service = match build_service(&adapter, &data_port(&validated)) {
        Ok(s) => s,
        Err(e) => return report(&e),
    };
    let mut tickers: Vec<&str> = service.tickers().collect();
    tickers.sort_unstable();
    info!(
        tickers = %tickers.join(","),
        seed = service.settings().seed,
        max_cycles = service.settings().max_cycles,
        "serving request"
    );

    let mut input = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut input) {
        return report(&LevtraderError::from(e));
    }

    match handle_request_json(&service, &input) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => report(&e),
    }
}

pub fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let validated = match validate_config(&adapter) {
        Ok(v) => v,
        Err(e) => return report(&e),
    };

    let s = &validated.settings;
    eprintln!("\nEngine:");
    eprintln!("  seed:            {}", s.seed);
    eprintln!("  max_cycles:      {}", s.max_cycles);
    eprintln!("  fail_penalty:    {}", s.fail_penalty);
    eprintln!("  fail_limit:      {}", s.fail_limit);
    eprintln!("  commission_rate: {}", s.commission_rate);

    eprintln!("\nData:");
    eprintln!("  charts:  {}", validated.charts_path);
    eprintln!("  indices: {}", validated.indices_path);

    eprintln!("\nStrategies:");
    for (ticker, base) in validated.universe.iter() {
        match StrategyConfig::from_config(&adapter, Some(ticker)) {
            Ok(config) => eprintln!("  {ticker} ({base}): {config}"),
            Err(e) => return report(&e),
        }
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn run_tickers(config_path: &Path) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let validated = match validate_config(&adapter) {
        Ok(v) => v,
        Err(e) => return report(&e),
    };

    for (ticker, base) in validated.universe.iter() {
        println!("{ticker}\t{base}");
    }
    ExitCode::SUCCESS
}
