//! # Climate Math
//!
//! Numeric building blocks for the mortality forecasting pipeline.
//! This crate knows nothing about countries or causes of death; it provides
//! least-squares trend fitting, descriptive statistics and a penalized
//! least-squares solver used by the forecast model.

use thiserror::Error;

pub mod penalized;
pub mod stats;
pub mod trend;

pub use penalized::{CoordinateDescent, Penalty, Solution, SolveStatus};
pub use trend::LinearTrend;

/// Errors that can occur in numeric calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for numeric operations
pub type Result<T> = std::result::Result<T, MathError>;
