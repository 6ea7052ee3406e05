//! Runs the day-step transition across one bounded window.

use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::domain::indicator::MarketData;
use crate::domain::state::State;
use crate::domain::strategy::StrategyConfig;
use crate::domain::transition::{step, DayStep};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowOutcome {
    /// Position liquidated at a profit.
    Sold,
    /// Forced liquidation with no cycles left.
    Failed,
    /// Window ended without reaching a terminal state.
    Retired,
    /// The daily budget could not buy one share on the first day.
    Invalidated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowRun {
    pub history: Vec<State>,
    pub outcome: WindowOutcome,
}

impl WindowRun {
    pub fn last(&self) -> Option<&State> {
        self.history.last()
    }
}

/// Simulates `range` of `market` from a fresh account.
pub fn simulate_window(
    market: &MarketData,
    range: Range<usize>,
    config: &StrategyConfig,
    seed: f64,
    max_cycle: usize,
    commission_rate: f64,
) -> WindowRun {
    let rows = &market.chart.rows()[range.clone()];
    let mut history = Vec::with_capacity(rows.len());
    let mut state = State::init(seed, max_cycle);

    for (offset, row) in rows.iter().enumerate() {
        let signals = market.indicators.at(range.start + offset);
        state = match step(row, &signals, config, commission_rate, &state) {
            DayStep::Advanced(next) => next,
            DayStep::SeedExhausted if offset == 0 => {
                trace!(date = %row.date, "seed exhausted, window invalidated");
                return WindowRun {
                    history,
                    outcome: WindowOutcome::Invalidated,
                };
            }
            DayStep::SeedExhausted => {
                trace!(date = %row.date, "budget below one share, holding");
                state.advance(row).complete()
            }
        };
        trace!(state = %state, "day");
        history.push(state.clone());

        if state.is_sold() {
            return WindowRun {
                history,
                outcome: WindowOutcome::Sold,
            };
        }
        if state.is_failed() {
            return WindowRun {
                history,
                outcome: WindowOutcome::Failed,
            };
        }
    }

    WindowRun {
        history,
        outcome: WindowOutcome::Retired,
    }
}
