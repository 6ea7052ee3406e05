//! Grid search over strategy parameters.

use std::collections::BTreeMap;
use std::ops::Range;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::domain::chart::Chart;
use crate::domain::error::LevtraderError;
use crate::domain::evaluator::Evaluator;
use crate::domain::indicator::{MarketData, SahmSeries};
use crate::domain::scoring::Score;
use crate::domain::settings::EngineSettings;
use crate::domain::strategy::{StrategyConfig, StrategyParam};

pub const DEFAULT_MAX_COMBINATIONS: usize = 100_000;

/// Inclusive `[min, max]` range walked in `step` increments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    pub param: StrategyParam,
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl ParamRange {
    pub const fn new(param: StrategyParam, min: f64, max: f64, step: f64) -> Self {
        Self {
            param,
            min,
            max,
            step,
        }
    }

    pub fn values(&self) -> Vec<f64> {
        if self.step <= 0.0 || self.max <= self.min {
            return vec![self.min];
        }
        let count = ((self.max - self.min) / self.step + 1e-9).floor() as usize + 1;
        (0..count)
            .map(|i| ((self.min + i as f64 * self.step) * 1e9).round() / 1e9)
            .collect()
    }
}

/// Default search space.
pub fn default_ranges() -> Vec<ParamRange> {
    use StrategyParam::*;
    vec![
        ParamRange::new(Term, 40.0, 40.0, 1.0),
        ParamRange::new(Margin, 0.05, 0.15, 0.01),
        ParamRange::new(BullishRsi, 60.0, 100.0, 5.0),
        ParamRange::new(BullishURate, 0.3, 0.8, 0.1),
        ParamRange::new(BurstScale, 0.0, 3.0, 0.5),
        ParamRange::new(BurstVol, 25.0, 50.0, 5.0),
        ParamRange::new(SellBase, 0.0, 0.5, 0.1),
        ParamRange::new(SellLimit, 0.5, 1.0, 0.1),
        ParamRange::new(SahmThreshold, 1.0, 1.0, 0.5),
    ]
}

/// Candidate values per parameter. Parameters absent from the grid keep the
/// base config's value.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamGrid {
    axes: BTreeMap<StrategyParam, Vec<f64>>,
}

impl ParamGrid {
    /// Builds the grid from `ranges`, pinning every parameter in `fixed` to a
    /// single value.
    pub fn new(ranges: &[ParamRange], fixed: &[(StrategyParam, f64)]) -> Self {
        let mut axes: BTreeMap<StrategyParam, Vec<f64>> = ranges
            .iter()
            .map(|range| (range.param, range.values()))
            .collect();
        for &(param, value) in fixed {
            axes.insert(param, vec![value]);
        }
        Self { axes }
    }

    pub fn size(&self) -> usize {
        self.axes
            .values()
            .map(Vec::len)
            .fold(1usize, |acc, n| acc.saturating_mul(n))
    }

    /// Cartesian product over the axes. Combinations that fail validation are
    /// skipped.
    pub fn generate_configs(&self, base: &StrategyConfig) -> Vec<StrategyConfig> {
        let mut configs = vec![*base];
        for (&param, values) in &self.axes {
            configs = configs
                .iter()
                .flat_map(|config| values.iter().filter_map(move |&v| config.with(param, v).ok()))
                .collect();
        }
        configs.retain(|config| config.validate().is_ok());
        configs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepEntry {
    pub config: StrategyConfig,
    pub score: Score,
}

/// Sweep outcomes ordered by descending score.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepResults {
    entries: Vec<SweepEntry>,
}

impl SweepResults {
    pub fn new(mut entries: Vec<SweepEntry>) -> Self {
        entries.sort_by(|a, b| b.score.score.total_cmp(&a.score.score));
        Self { entries }
    }

    pub fn all(&self) -> &[SweepEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn top_n(&self, n: usize) -> &[SweepEntry] {
        &self.entries[..n.min(self.entries.len())]
    }

    pub fn best(&self) -> Option<&SweepEntry> {
        self.entries.first()
    }
}

/// Scores strategy configs over one ticker's chart.
///
/// The u-rate window follows each config's `term`, so indicators are
/// computed over the full chart once per distinct term and then restricted
/// to `range`.
pub struct ParamSweep<'a> {
    chart: &'a Chart,
    range: Range<usize>,
    sahm: Option<&'a SahmSeries>,
    settings: &'a EngineSettings,
    max_combinations: usize,
}

impl<'a> ParamSweep<'a> {
    pub fn new(
        chart: &'a Chart,
        range: Range<usize>,
        sahm: Option<&'a SahmSeries>,
        settings: &'a EngineSettings,
    ) -> Self {
        Self {
            chart,
            range,
            sahm,
            settings,
            max_combinations: DEFAULT_MAX_COMBINATIONS,
        }
    }

    pub fn with_max_combinations(mut self, limit: usize) -> Self {
        self.max_combinations = limit;
        self
    }

    fn market_for_term(&self, term: usize) -> MarketData {
        MarketData::compute(self.chart.clone(), term).slice(self.range.clone())
    }

    /// Optimizer objective: the score of a single config.
    pub fn objective(&self, config: &StrategyConfig) -> Result<Score, LevtraderError> {
        let market = self.market_for_term(config.term);
        let evaluation = Evaluator::new(&market, self.sahm, self.settings).evaluate(config)?;
        Ok(Score::from_evaluation(&evaluation, self.settings))
    }

    pub fn sweep(&self, grid: &ParamGrid, base: &StrategyConfig) -> Result<SweepResults, LevtraderError> {
        let size = grid.size();
        if size > self.max_combinations {
            return Err(LevtraderError::SweepTooLarge {
                combinations: size,
                limit: self.max_combinations,
            });
        }

        let configs = grid.generate_configs(base);
        info!(combinations = configs.len(), "starting sweep");

        let mut by_term: BTreeMap<usize, Vec<StrategyConfig>> = BTreeMap::new();
        for config in configs {
            by_term.entry(config.term).or_default().push(config);
        }

        let mut entries = Vec::new();
        for (term, configs) in by_term {
            let market = self.market_for_term(term);
            let evaluator = Evaluator::new(&market, self.sahm, self.settings);
            debug!(term, configs = configs.len(), "sweeping term");

            let scored = configs
                .par_iter()
                .map(|config| {
                    let evaluation = evaluator.evaluate(config)?;
                    Ok(SweepEntry {
                        config: *config,
                        score: Score::from_evaluation(&evaluation, self.settings),
                    })
                })
                .collect::<Result<Vec<_>, LevtraderError>>()?;
            entries.extend(scored);
        }

        Ok(SweepResults::new(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chart::PriceRow;
    use chrono::{Duration, NaiveDate};

    fn rising_chart(n: usize) -> Chart {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        Chart::new(
            (0..n)
                .map(|i| {
                    let p = 100.0 * 1.01f64.powi(i as i32);
                    PriceRow::new(start + Duration::days(i as i64), p, p)
                })
                .collect(),
        )
    }

    #[test]
    fn range_values_are_inclusive() {
        let values = ParamRange::new(StrategyParam::Margin, 0.05, 0.15, 0.01).values();
        assert_eq!(values.len(), 11);
        assert_eq!(values[0], 0.05);
        assert_eq!(values[10], 0.15);
        assert_eq!(
            ParamRange::new(StrategyParam::Term, 40.0, 40.0, 1.0).values(),
            vec![40.0]
        );
    }

    #[test]
    fn default_grid_size() {
        let grid = ParamGrid::new(&default_ranges(), &[]);
        assert_eq!(grid.size(), 11 * 9 * 6 * 7 * 6 * 6 * 6);
    }

    #[test]
    fn fixed_params_pin_axes() {
        let fixed = [
            (StrategyParam::Margin, 0.1),
            (StrategyParam::BurstScale, 0.0),
        ];
        let grid = ParamGrid::new(&default_ranges(), &fixed);
        assert_eq!(grid.size(), 9 * 6 * 6 * 6 * 6);
        let configs = grid.generate_configs(&StrategyConfig::default());
        assert!(configs.iter().all(|c| c.margin == 0.1 && c.burst_scale == 0.0));
    }

    #[test]
    fn generate_skips_invalid_combinations() {
        let ranges = [
            ParamRange::new(StrategyParam::SellBase, 0.4, 0.6, 0.2),
            ParamRange::new(StrategyParam::SellLimit, 0.5, 0.5, 0.1),
        ];
        let configs = ParamGrid::new(&ranges, &[]).generate_configs(&StrategyConfig::default());
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].sell_base, 0.4);
    }

    #[test]
    fn oversized_grid_is_rejected() {
        let chart = rising_chart(10);
        let settings = EngineSettings::default();
        let sweep = ParamSweep::new(&chart, 0..10, None, &settings).with_max_combinations(10);
        let grid = ParamGrid::new(&default_ranges(), &[]);
        let err = sweep.sweep(&grid, &StrategyConfig::default()).unwrap_err();
        assert!(matches!(err, LevtraderError::SweepTooLarge { limit: 10, .. }));
    }

    #[test]
    fn results_sorted_by_descending_score() {
        let chart = rising_chart(120);
        let settings = EngineSettings {
            max_cycles: 1,
            ..EngineSettings::default()
        };
        let base = StrategyConfig {
            sahm_threshold: 0.0,
            ..StrategyConfig::default()
        };
        let ranges = [
            ParamRange::new(StrategyParam::Margin, 0.05, 0.15, 0.05),
            ParamRange::new(StrategyParam::Term, 20.0, 40.0, 20.0),
        ];
        let fixed = [(StrategyParam::SahmThreshold, 0.0)];
        let sweep = ParamSweep::new(&chart, 0..120, None, &settings);
        let results = sweep.sweep(&ParamGrid::new(&ranges, &fixed), &base).unwrap();

        assert_eq!(results.len(), 6);
        let scores: Vec<f64> = results.all().iter().map(|e| e.score.score).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(results.top_n(2).len(), 2);

        let best = results.best().unwrap();
        let objective = sweep.objective(&best.config).unwrap();
        assert_eq!(objective.score, best.score.score);
    }
}
