//! Market data access port trait.

use crate::domain::chart::Chart;
use crate::domain::error::LevtraderError;
use crate::domain::indicator::SahmSeries;

pub trait DataPort {
    /// Full entry/close history of a leveraged ticker.
    fn fetch_chart(&self, ticker: &str) -> Result<Chart, LevtraderError>;

    /// Full history of the unleveraged base index a ticker tracks.
    fn fetch_base_chart(&self, base: &str) -> Result<Chart, LevtraderError>;

    /// Monthly Sahm recession indicator.
    fn fetch_sahm(&self) -> Result<SahmSeries, LevtraderError>;
}
