//! Short-window RSI.
//!
//! Over the last `period + 1` closes: RSI = 100 * sum(up moves) / sum(|moves|).
//! Warmup (fewer than `period + 1` closes) and flat windows read 50.

use crate::domain::chart::PriceRow;

const NEUTRAL_RSI: f64 = 50.0;

pub fn calculate_rsi(rows: &[PriceRow], period: usize) -> Vec<f64> {
    let mut values = Vec::with_capacity(rows.len());

    for i in 0..rows.len() {
        if i < period {
            values.push(NEUTRAL_RSI);
            continue;
        }

        let window = &rows[i - period..=i];
        let mut total = 0.0;
        let mut up = 0.0;
        for pair in window.windows(2) {
            let change = pair[1].close_price - pair[0].close_price;
            total += change.abs();
            if change > 0.0 {
                up += change;
            }
        }

        values.push(if total > 0.0 {
            100.0 * up / total
        } else {
            NEUTRAL_RSI
        });
    }

    values
}
