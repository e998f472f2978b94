//! # Mortality Forecast
//!
//! A Rust library for forecasting cause-specific mortality rates from
//! annual country data, conditioned on extrapolated climate trends.
//!
//! ## Features
//!
//! - Integrated country-year table loading (CSV or Parquet)
//! - Per-(country, cause) series extraction with aligned climate covariates
//! - Linear-trend projection of climate variables over the horizon
//! - Additive trend model with changepoints and climate regressors, with
//!   simulated forecast intervals
//! - Batch orchestration with per-series failure isolation and optional
//!   parallel execution
//! - Forecast table and run report writers
//!
//! ## Quick Start
//!
//! ```no_run
//! use mortality_forecast::config::ForecastConfig;
//! use mortality_forecast::data::DataLoader;
//! use mortality_forecast::pipeline::BatchForecaster;
//!
//! # fn main() -> mortality_forecast::error::Result<()> {
//! // Load the integrated table
//! let table = DataLoader::from_path("integrated_dataset.csv")?;
//!
//! // Forecast the default countries and top causes
//! let forecaster = BatchForecaster::new(ForecastConfig::default())?;
//! let report = forecaster.run(&table)?;
//!
//! // Write the flat forecast table
//! report.table.write_csv("results/mortality_predictions_2020_2030.csv")?;
//! # Ok(())
//! # }
//! ```

pub mod climate;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod series;
pub mod utils;

// Re-export commonly used types
pub use crate::climate::{ClimateProjection, ClimateTrendExtrapolator};
pub use crate::config::{ForecastConfig, ForecastHorizon, ModelSettings};
pub use crate::data::{DataLoader, IntegratedTable};
pub use crate::error::{ForecastError, SeriesFailure};
pub use crate::models::{AdditiveTrendModel, ForecastModel, ForecastResult, TrainedForecastModel};
pub use crate::output::{ForecastRow, ForecastTable};
pub use crate::pipeline::{BatchForecaster, BatchReport, SeriesTask};
pub use crate::series::{Series, SeriesExtractor};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
