//! Simulated account state for one trading day.
//!
//! Every operation consumes the state and returns the next one. Capital is
//! conserved as `invested_seed + remaining_seed == seed - commission`, where
//! `commission` counts fees paid since `seed` was last set.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::chart::PriceRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Buying,
    Sold,
    Exhausted,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Buying => "Buying",
            Status::Sold => "Sold",
            Status::Exhausted => "Exhausted",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// `None` before the first simulated day.
    pub date: Option<NaiveDate>,
    pub elapsed_days: usize,
    pub principal: f64,
    pub entry_price: f64,
    pub close_price: f64,
    pub seed: f64,
    pub invested_seed: f64,
    pub remaining_seed: f64,
    pub stock_qty: u64,
    pub commission: f64,
    pub avg_price: f64,
    pub stock_eval: f64,
    pub status: Status,
    pub cycle: usize,
    pub max_cycle: usize,
    pub rate_of_return: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_ror: Option<f64>,
}

impl State {
    pub fn init(seed: f64, max_cycle: usize) -> Self {
        Self {
            date: None,
            elapsed_days: 0,
            principal: seed,
            entry_price: 0.0,
            close_price: 0.0,
            seed,
            invested_seed: 0.0,
            remaining_seed: seed,
            stock_qty: 0,
            commission: 0.0,
            avg_price: 0.0,
            stock_eval: 0.0,
            status: Status::Buying,
            cycle: 0,
            max_cycle,
            rate_of_return: 0.0,
            base_ror: None,
        }
    }

    /// Moves to `row`'s day without trading.
    pub fn advance(self, row: &PriceRow) -> Self {
        Self {
            date: Some(row.date),
            elapsed_days: self.elapsed_days + 1,
            entry_price: row.entry_price,
            close_price: row.close_price,
            base_ror: None,
            ..self
        }
    }

    pub fn has_cycle_left(&self) -> bool {
        self.cycle < self.max_cycle
    }

    pub fn is_sold(&self) -> bool {
        self.status == Status::Sold
    }

    /// Forced liquidation with no cycles left.
    pub fn is_failed(&self) -> bool {
        self.status == Status::Exhausted && self.cycle == 0
    }

    pub fn is_terminal(&self) -> bool {
        self.is_sold() || self.is_failed()
    }

    pub fn buy(self, qty: u64, price: f64, commission_rate: f64) -> Self {
        let cost = qty as f64 * price;
        let fee = cost * commission_rate;
        Self {
            invested_seed: self.invested_seed + cost,
            remaining_seed: self.remaining_seed - cost - fee,
            commission: self.commission + fee,
            stock_qty: self.stock_qty + qty,
            status: Status::Buying,
            ..self
        }
    }

    /// Sells `qty` shares at `price`.
    ///
    /// A profit-take rebases `seed` to the liquidated cash. Any other sale is
    /// an exhaustion sale: its realized gain or loss is folded into `seed`
    /// and it consumes a cycle, or resets the cycle counter when none are left.
    pub fn sell(self, qty: u64, price: f64, commission_rate: f64, take_profit: bool) -> Self {
        let qty = qty.min(self.stock_qty);
        let proceeds = qty as f64 * price;
        let fee = proceeds * commission_rate;
        let cost_basis = if qty == self.stock_qty {
            self.invested_seed
        } else {
            qty as f64 * self.avg_price
        };
        let all_cycles_used = !take_profit && self.cycle >= self.max_cycle;

        let remaining_seed = self.remaining_seed + proceeds - fee;
        let mut next = Self {
            invested_seed: self.invested_seed - cost_basis,
            remaining_seed,
            stock_qty: self.stock_qty - qty,
            commission: self.commission + fee,
            ..self
        };

        if take_profit {
            next.seed = remaining_seed;
            next.commission = 0.0;
            next.status = Status::Sold;
            next.cycle = 0;
        } else {
            next.seed = self.seed + proceeds - cost_basis;
            next.status = Status::Exhausted;
            next.cycle = if all_cycles_used { 0 } else { self.cycle + 1 };
        }
        next
    }

    /// Recomputes the derived fields.
    pub fn complete(self) -> Self {
        let (avg_price, stock_eval) = if self.stock_qty > 0 {
            (
                self.invested_seed / self.stock_qty as f64,
                self.stock_qty as f64 * self.close_price,
            )
        } else {
            (0.0, 0.0)
        };
        let invested_seed = if self.stock_qty > 0 { self.invested_seed } else { 0.0 };
        Self {
            avg_price,
            stock_eval,
            invested_seed,
            rate_of_return: (self.remaining_seed + stock_eval) / self.principal - 1.0,
            ..self
        }
    }

    pub fn with_base_ror(self, base_ror: f64) -> Self {
        Self {
            base_ror: Some(base_ror),
            ..self
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(date) = self.date else {
            return Ok(());
        };
        let price_pct = if self.avg_price > 0.0 {
            (self.close_price - self.avg_price) / self.avg_price
        } else {
            0.0
        };

        let head = format!(
            "[{date} ({:02})] [{}] seed={:.0}({:.0}+{:.0})",
            self.elapsed_days, self.cycle, self.seed, self.invested_seed, self.remaining_seed
        );
        let eval = format!(
            "eval={:.2}({}*{:.2})",
            self.stock_eval, self.stock_qty, self.close_price
        );
        let price = format!(
            "price={:.1}%({:.2}/{:.2})",
            price_pct * 100.0,
            self.close_price,
            self.avg_price
        );
        write!(
            f,
            "{head:<52}{eval:<32}{price:<30}ror={:.1}% [{}]",
            self.rate_of_return * 100.0,
            self.status
        )
    }
}
