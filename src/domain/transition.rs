//! The day-step trading policy.
//!
//! Decision order for each day:
//! 1. take profit when the close clears `avg_price * (1 + margin)`
//! 2. signal seed exhaustion when the daily budget cannot buy one share
//! 3. modulate the buy rate by RSI and burst conditions
//! 4. on empty cash, sell part of the position (cycle left) or all of it
//! 5. otherwise buy the sized quantity, or as much as remaining cash allows

use crate::domain::chart::PriceRow;
use crate::domain::indicator::DaySignals;
use crate::domain::state::State;
use crate::domain::strategy::StrategyConfig;

/// Result of one transition.
#[derive(Debug, Clone, PartialEq)]
pub enum DayStep {
    Advanced(State),
    /// The daily budget cannot buy a single share at today's entry price.
    SeedExhausted,
}

/// Multiplier applied to the day's base quantity.
pub fn buy_rate(signals: &DaySignals, config: &StrategyConfig, prior: &State) -> f64 {
    let mut rate = 1.0;

    if signals.rsi > config.bullish_rsi {
        let seed_fraction = if prior.seed > 0.0 {
            prior.remaining_seed / prior.seed
        } else {
            0.0
        };
        let relaxed = config.min_seed_rate > 0.0 && seed_fraction < config.min_seed_rate;
        if !relaxed {
            rate = 0.0;
        }
    }

    let vol = signals.volatility;
    if signals.u_rate < config.bullish_u_rate && vol < 0.0 && vol.abs() > config.burst_vol {
        rate *= 1.0 + config.burst_scale * (vol.abs() - config.burst_vol) / config.burst_vol;
    }

    rate
}

/// Fraction of holdings sold on a partial exhaustion sale. Lower u-rate
/// sells more.
pub fn exhaustion_sell_rate(u_rate: f64, config: &StrategyConfig) -> f64 {
    config.sell_base + (config.sell_limit - config.sell_base) * (1.0 - u_rate)
}

pub fn step(
    row: &PriceRow,
    signals: &DaySignals,
    config: &StrategyConfig,
    commission_rate: f64,
    prior: &State,
) -> DayStep {
    let next = prior.clone().advance(row);

    if prior.stock_qty > 0 && row.close_price > prior.avg_price * (1.0 + config.margin) {
        let sold = next.sell(prior.stock_qty, row.close_price, commission_rate, true);
        return DayStep::Advanced(sold.complete());
    }

    let daily_budget = prior.seed / config.term as f64;
    let base_qty = daily_budget / row.entry_price;
    if !(base_qty >= 1.0) {
        return DayStep::SeedExhausted;
    }

    let rate = buy_rate(signals, config, prior);
    let unit_cost = row.entry_price * (1.0 + commission_rate);

    let next = if prior.remaining_seed < unit_cost {
        if prior.has_cycle_left() {
            let fraction = exhaustion_sell_rate(signals.u_rate, config).clamp(0.0, 1.0);
            let qty = (prior.stock_qty as f64 * fraction).floor() as u64;
            next.sell(qty, row.close_price, commission_rate, false)
        } else {
            next.sell(prior.stock_qty, row.close_price, commission_rate, false)
        }
    } else {
        let desired = (base_qty * rate).floor() as u64;
        let qty = if desired as f64 * unit_cost <= prior.remaining_seed {
            desired
        } else {
            (prior.remaining_seed / unit_cost).floor() as u64
        };
        next.buy(qty, row.entry_price, commission_rate)
    };

    DayStep::Advanced(next.complete())
}
