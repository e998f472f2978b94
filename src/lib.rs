//! # Climate Mortality
//!
//! Workspace facade over the numeric building blocks and the forecasting
//! pipeline.
//!
//! ## Example
//!
//! ```
//! use climate_mortality_workspace::math::LinearTrend;
//!
//! let trend = LinearTrend::fit(&[0.0, 1.0, 2.0], &[1.0, 3.0, 5.0]).unwrap();
//! assert_eq!(trend.extrapolate(3, 2), vec![7.0, 9.0]);
//! ```

/// Least squares, statistics and the penalized solver
pub use climate_math as math;

/// Data loading, models and batch orchestration
pub use mortality_forecast as forecast;

pub use mortality_forecast::{BatchForecaster, ForecastConfig, ForecastTable};
