//! Continuous full-chart backtest and its summary statistics.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::trace;

use crate::domain::chart::Chart;
use crate::domain::indicator::MarketData;
use crate::domain::settings::EngineSettings;
use crate::domain::state::{State, Status};
use crate::domain::strategy::StrategyConfig;
use crate::domain::transition::{step, DayStep};

const CALENDAR_DAYS_PER_YEAR: f64 = 365.0;

/// Runs the policy over every row of `market` with `max_cycles - 1`
/// exhaustion cycles. A day whose budget cannot buy one share is recorded
/// without trading. When `base` is given each state carries the base index
/// return since the first day.
pub fn full_backtest(
    market: &MarketData,
    base: Option<&Chart>,
    config: &StrategyConfig,
    settings: &EngineSettings,
) -> Vec<State> {
    let rows = market.chart.rows();
    let mut history = Vec::with_capacity(rows.len());
    let mut state = State::init(settings.seed, settings.max_cycles.saturating_sub(1)).complete();

    let base = base.filter(|chart| !chart.is_empty());
    let initial_base = base
        .and_then(|chart| chart.rows().first())
        .map(|row| row.close_price)
        .filter(|price| *price > 0.0);
    let mut last_base = initial_base;

    for (index, row) in rows.iter().enumerate() {
        let signals = market.indicators.at(index);
        state = match step(row, &signals, config, settings.commission_rate, &state) {
            DayStep::Advanced(next) => next,
            DayStep::SeedExhausted => {
                trace!(date = %row.date, "budget below one share, holding");
                state.advance(row).complete()
            }
        };

        if let (Some(chart), Some(initial)) = (base, initial_base) {
            if let Some(position) = chart.position(row.date) {
                last_base = Some(chart.rows()[position].close_price);
            }
            let price = last_base.unwrap_or(initial);
            state = state.with_base_ror(price / initial - 1.0);
        }

        trace!(state = %state, "day");
        history.push(state.clone());
    }

    history
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestSummary {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub final_ror: f64,
    pub annualized_ror: f64,
    pub base_ror: Option<f64>,
    pub base_annualized_ror: Option<f64>,
    pub n_exhausted: usize,
    pub n_failed: usize,
    pub n_sold: usize,
    pub exhaust_rate: f64,
    pub fail_rate: f64,
}

impl BacktestSummary {
    /// Summarizes a full-backtest history. `None` for an empty history.
    pub fn compute(history: &[State], base: Option<&Chart>) -> Option<Self> {
        let first = history.first()?;
        let last = history.last()?;
        let start_date = first.date?;
        let end_date = last.date?;

        let calendar_days = (end_date - start_date).num_days();
        let annualize = |ror: f64| {
            if calendar_days > 0 && ror > -1.0 {
                (1.0 + ror).powf(CALENDAR_DAYS_PER_YEAR / calendar_days as f64) - 1.0
            } else {
                0.0
            }
        };

        let base_ror = base.and_then(|chart| {
            let start = chart.position(start_date)?;
            let end = chart.position(end_date)?;
            let start_price = chart.rows()[start].close_price;
            (start_price > 0.0).then(|| chart.rows()[end].close_price / start_price - 1.0)
        });

        let mut n_exhausted = 0usize;
        let mut n_failed = 0usize;
        let mut n_sold = 0usize;
        for state in history {
            match state.status {
                Status::Exhausted if state.cycle != 0 => n_exhausted += 1,
                Status::Exhausted => n_failed += 1,
                Status::Sold => n_sold += 1,
                Status::Buying => {}
            }
        }

        let total = n_exhausted + n_failed + n_sold;
        let rate = |n: usize| if total > 0 { n as f64 / total as f64 } else { 0.0 };

        Some(BacktestSummary {
            start_date,
            end_date,
            final_ror: last.rate_of_return,
            annualized_ror: annualize(last.rate_of_return),
            base_ror,
            base_annualized_ror: base_ror.map(annualize),
            n_exhausted,
            n_failed,
            n_sold,
            exhaust_rate: rate(n_exhausted),
            fail_rate: rate(n_failed),
        })
    }
}
