//! Aggregates chain outcomes into fail rate, annualized return and score.
//!
//! Overlapping chains that exit on the same day with the same result are one
//! trading episode: final outcomes are grouped by `(end_date, sold)` and each
//! member of a group of `n` weighs `1 / n`. Chains without a final outcome
//! weigh 1 in the fail-rate denominator only.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::evaluator::{Evaluation, WindowResult};
use crate::domain::settings::{EngineSettings, MARKET_DAYS_PER_YEAR};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub fail_rate: f64,
    pub avg_ror_per_year: f64,
    pub score: f64,
}

impl Score {
    pub fn from_evaluation(evaluation: &Evaluation, settings: &EngineSettings) -> Self {
        let fail_rate = fail_rate(&evaluation.finals, evaluation.unresolved);
        let avg_ror_per_year = avg_ror_per_year(&evaluation.finals, evaluation.unsold_days);
        Self {
            fail_rate,
            avg_ror_per_year,
            score: score(fail_rate, avg_ror_per_year, settings),
        }
    }
}

/// One weight per final outcome, in input order.
pub fn terminal_weights(finals: &[WindowResult]) -> Vec<f64> {
    let mut groups: HashMap<(NaiveDate, bool), usize> = HashMap::new();
    for result in finals {
        *groups.entry((result.end_date, result.sold)).or_default() += 1;
    }
    finals
        .iter()
        .map(|r| 1.0 / groups[&(r.end_date, r.sold)] as f64)
        .collect()
}

pub fn fail_rate(finals: &[WindowResult], unresolved: usize) -> f64 {
    let weights = terminal_weights(finals);
    let total: f64 = weights.iter().sum::<f64>() + unresolved as f64;
    if total <= 0.0 {
        return 0.0;
    }
    let failed: f64 = finals
        .iter()
        .zip(&weights)
        .filter(|(r, _)| !r.sold)
        .map(|(_, w)| w)
        .sum();
    failed / total
}

/// Weighted return per weighted day, scaled to a market year. Unsold outcomes
/// are credited `unsold_days`.
pub fn avg_ror_per_year(finals: &[WindowResult], unsold_days: usize) -> f64 {
    let weights = terminal_weights(finals);
    let mut total_ror = 0.0;
    let mut total_days = 0.0;
    for (result, weight) in finals.iter().zip(&weights) {
        let days = if result.sold { result.days } else { unsold_days };
        total_ror += weight * result.ror;
        total_days += weight * days as f64;
    }
    if total_days > 0.0 {
        total_ror / total_days * MARKET_DAYS_PER_YEAR
    } else {
        0.0
    }
}

pub fn score(fail_rate: f64, avg_ror_per_year: f64, settings: &EngineSettings) -> f64 {
    if fail_rate < settings.fail_limit {
        (1.0 - settings.fail_penalty * fail_rate) * avg_ror_per_year * 100.0
    } else {
        0.0
    }
}
