//! Result export port trait.

use crate::domain::error::LevtraderError;
use crate::domain::evaluator::WindowResult;
use crate::domain::state::State;

/// Port for writing simulation output.
pub trait ReportPort {
    fn write_history(&self, history: &[State], output_path: &str) -> Result<(), LevtraderError>;

    fn write_results(&self, results: &[WindowResult], output_path: &str)
        -> Result<(), LevtraderError>;
}
