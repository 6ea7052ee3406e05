//! Moving average and "u-rate": the share of recent days that closed below
//! their moving average.

use crate::domain::chart::PriceRow;

/// Trailing mean of up to `period` closes.
pub fn calculate_moving_average(rows: &[PriceRow], period: usize) -> Vec<f64> {
    let period = period.max(1);
    let mut values = Vec::with_capacity(rows.len());
    let mut sum = 0.0;

    for i in 0..rows.len() {
        sum += rows[i].close_price;
        if i >= period {
            sum -= rows[i - period].close_price;
        }
        let count = (i + 1).min(period);
        values.push(sum / count as f64);
    }

    values
}

/// Fraction of the last up-to-`window` days whose close was below the
/// `ma_period` moving average. Always within [0, 1].
pub fn calculate_u_rate(rows: &[PriceRow], ma_period: usize, window: usize) -> Vec<f64> {
    let window = window.max(1);
    let averages = calculate_moving_average(rows, ma_period);
    let under: Vec<u32> = rows
        .iter()
        .zip(&averages)
        .map(|(row, avg)| u32::from(row.close_price < *avg))
        .collect();

    let mut values = Vec::with_capacity(rows.len());
    let mut count = 0u32;
    for i in 0..under.len() {
        count += under[i];
        if i >= window {
            count -= under[i - window];
        }
        let days = (i + 1).min(window);
        values.push(f64::from(count) / days as f64);
    }

    values
}
