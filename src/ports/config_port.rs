//! Configuration access port trait.

use crate::domain::error::LevtraderError;

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    /// `default` when the key is absent, an error when it is not an integer.
    fn get_int(&self, section: &str, key: &str, default: i64) -> Result<i64, LevtraderError>;
    /// `default` when the key is absent, an error when it is not a number.
    fn get_double(&self, section: &str, key: &str, default: f64) -> Result<f64, LevtraderError>;
    /// Keys present in `section`, empty when the section is absent.
    fn section_keys(&self, section: &str) -> Vec<String>;
}
