//! Error types for the mortality_forecast crate

use polars::prelude::PolarsError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that abort a whole forecasting run
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Error related to data validation or processing
    #[error("Data error: {0}")]
    DataError(String),

    /// Error related to parameter validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),

    /// Error reading or writing CSV output
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error reading configuration or writing reports
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Error from numeric routines
    #[error("Math error: {0}")]
    Math(#[from] climate_math::MathError),

    /// Every series in the batch failed
    #[error("No series could be forecast ({attempted} attempted)")]
    NoSuccessfulSeries { attempted: usize },
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}

/// Why a single (country, cause) series could not be forecast.
///
/// These never abort the batch; the orchestrator records them and leaves
/// the series out of the output table.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SeriesFailure {
    /// The table has no rows for the country
    #[error("no rows for country '{0}'")]
    UnknownCountry(String),

    /// A cause or climate column is absent from the table
    #[error("column '{0}' not found")]
    MissingColumn(String),

    /// Too few usable observations to fit
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// A regressor carries no usable information
    #[error("regressor '{0}' has no usable values")]
    RegressorDegenerate(String),

    /// The optimiser failed to reach a finite, converged solution
    #[error("model did not converge: {0}")]
    NonConvergence(String),

    /// Fitting exceeded the per-series time budget
    #[error("fit exceeded the time budget of {millis} ms")]
    TimedOut { millis: u64 },
}

impl SeriesFailure {
    /// Short machine-friendly label for log lines and reports
    pub fn kind(&self) -> &'static str {
        match self {
            SeriesFailure::UnknownCountry(_) => "unknown_country",
            SeriesFailure::MissingColumn(_) => "missing_column",
            SeriesFailure::InsufficientData(_) => "insufficient_data",
            SeriesFailure::RegressorDegenerate(_) => "regressor_degenerate",
            SeriesFailure::NonConvergence(_) => "non_convergence",
            SeriesFailure::TimedOut { .. } => "timed_out",
        }
    }
}

/// Result of a per-series pipeline stage
pub type SeriesResult<T> = std::result::Result<T, SeriesFailure>;
