//! Core domain types and logic.

pub mod chart;
pub mod indicator;
pub mod settings;
pub mod strategy;
pub mod state;
pub mod transition;
pub mod window;
pub mod evaluator;
pub mod scoring;
pub mod backtest;
pub mod sweep;
pub mod universe;
pub mod service;
pub mod config_validation;
pub mod error;
