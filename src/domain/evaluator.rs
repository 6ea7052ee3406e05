//! Sliding-window, multi-cycle evaluation.
//!
//! Round 0 simulates one `term`-day window per start position. Each later
//! round `k` re-simulates the unsold windows of round `k - 1` over
//! `(k + 1) * term` rows from the same start, with one more exhaustion cycle
//! allowed. A round-0 window together with its extensions is a chain.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::error::LevtraderError;
use crate::domain::indicator::{MarketData, SahmSeries};
use crate::domain::settings::EngineSettings;
use crate::domain::state::State;
use crate::domain::strategy::StrategyConfig;
use crate::domain::window::{simulate_window, WindowOutcome, WindowRun};

const RETIRED_WARN_RATIO: f64 = 0.05;

/// Outcome of one simulated window in one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowResult {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub sold: bool,
    pub ror: f64,
    /// Trading days simulated before the window stopped.
    pub days: usize,
    pub start_index: usize,
    pub window_len: usize,
}

impl WindowResult {
    fn from_run(run: &WindowRun, start_index: usize, window_len: usize) -> Option<Self> {
        let first = run.history.first()?;
        let last = run.history.last()?;
        Some(Self {
            start_date: first.date?,
            end_date: last.date?,
            sold: run.outcome == WindowOutcome::Sold,
            ror: last.rate_of_return,
            days: last.elapsed_days,
            start_index,
            window_len,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EvaluationStats {
    /// Round-0 start positions considered.
    pub attempted: usize,
    /// Round-0 starts skipped by the Sahm filter.
    pub excluded: usize,
    pub simulated: usize,
    pub invalidated: usize,
    /// Extensions dropped at the end of the chart.
    pub truncated: usize,
    pub retired: usize,
}

/// A retained window history.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowHistory {
    pub round: usize,
    pub start_index: usize,
    pub states: Vec<State>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    /// Results per round, in start order.
    pub rounds: Vec<Vec<WindowResult>>,
    /// The final outcome of every chain that has one.
    pub finals: Vec<WindowResult>,
    /// Chains truncated or invalidated after round 0.
    pub unresolved: usize,
    /// Days credited to an unsold final outcome.
    pub unsold_days: usize,
    pub stats: EvaluationStats,
    pub histories: Vec<WindowHistory>,
}

/// Borrowed read-only inputs shared by every evaluation.
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'a> {
    market: &'a MarketData,
    sahm: Option<&'a SahmSeries>,
    settings: &'a EngineSettings,
    keep_histories: bool,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        market: &'a MarketData,
        sahm: Option<&'a SahmSeries>,
        settings: &'a EngineSettings,
    ) -> Self {
        Self {
            market,
            sahm,
            settings,
            keep_histories: false,
        }
    }

    pub fn keep_histories(mut self, keep: bool) -> Self {
        self.keep_histories = keep;
        self
    }

    pub fn market(&self) -> &MarketData {
        self.market
    }

    /// Round-0 start positions that pass the Sahm filter.
    pub fn start_positions(
        &self,
        config: &StrategyConfig,
        stats: &mut EvaluationStats,
    ) -> Result<Vec<usize>, LevtraderError> {
        let rows = self.market.chart.rows();
        let term = config.term;
        if term == 0 || rows.len() < term {
            return Ok(Vec::new());
        }

        let mut starts = Vec::with_capacity(rows.len() - term + 1);
        for start in 0..=rows.len() - term {
            stats.attempted += 1;
            if config.sahm_threshold != 0.0 {
                let date = rows[start].date;
                let sahm = self
                    .sahm
                    .ok_or(LevtraderError::MissingIndicator {
                        indicator: "sahm",
                        date,
                    })?
                    .lookup(date)?;
                if sahm > config.sahm_threshold {
                    stats.excluded += 1;
                    continue;
                }
            }
            starts.push(start);
        }
        Ok(starts)
    }

    pub fn evaluate(&self, config: &StrategyConfig) -> Result<Evaluation, LevtraderError> {
        let settings = self.settings;
        let term = config.term;
        let len = self.market.len();
        let last_round = settings.max_cycles.saturating_sub(1);

        let mut evaluation = Evaluation {
            unsold_days: settings.max_cycles * term,
            ..Evaluation::default()
        };
        let mut pending = self.start_positions(config, &mut evaluation.stats)?;

        for round in 0..settings.max_cycles {
            let window_len = (round + 1) * term;
            let mut results = Vec::with_capacity(pending.len());
            let mut carried = Vec::new();

            for start in pending {
                if start + window_len > len {
                    evaluation.stats.truncated += 1;
                    evaluation.unresolved += 1;
                    continue;
                }

                let run = simulate_window(
                    self.market,
                    start..start + window_len,
                    config,
                    settings.seed,
                    round,
                    settings.commission_rate,
                );
                evaluation.stats.simulated += 1;

                let result = match run.outcome {
                    WindowOutcome::Invalidated => None,
                    _ => WindowResult::from_run(&run, start, window_len),
                };
                let Some(result) = result else {
                    evaluation.stats.invalidated += 1;
                    if round > 0 {
                        evaluation.unresolved += 1;
                    }
                    continue;
                };
                if run.outcome == WindowOutcome::Retired {
                    evaluation.stats.retired += 1;
                }

                if result.sold || round == last_round {
                    evaluation.finals.push(result.clone());
                } else {
                    carried.push(start);
                }
                if self.keep_histories {
                    evaluation.histories.push(WindowHistory {
                        round,
                        start_index: start,
                        states: run.history,
                    });
                }
                results.push(result);
            }

            debug!(
                round,
                windows = results.len(),
                carried = carried.len(),
                "evaluated round"
            );
            evaluation.rounds.push(results);
            pending = carried;
        }

        let stats = &evaluation.stats;
        if stats.simulated > 0 && stats.retired as f64 > RETIRED_WARN_RATIO * stats.simulated as f64 {
            warn!(
                retired = stats.retired,
                simulated = stats.simulated,
                "windows retired without reaching a terminal state"
            );
        }

        Ok(evaluation)
    }
}
