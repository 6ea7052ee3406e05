//! Short-term signed volatility: the latest move as a percentage of the total
//! absolute movement over the last `period + 1` closes.

use crate::domain::chart::PriceRow;

pub fn calculate_volatility(rows: &[PriceRow], period: usize) -> Vec<f64> {
    let mut values = Vec::with_capacity(rows.len());

    for i in 0..rows.len() {
        if i < period || period == 0 {
            values.push(0.0);
            continue;
        }

        let window = &rows[i - period..=i];
        let total: f64 = window
            .windows(2)
            .map(|pair| (pair[1].close_price - pair[0].close_price).abs())
            .sum();
        let last = rows[i].close_price - rows[i - 1].close_price;

        values.push(if total > 0.0 { 100.0 * last / total } else { 0.0 });
    }

    values
}
