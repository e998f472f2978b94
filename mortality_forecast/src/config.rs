//! Run configuration
//!
//! Everything the batch needs is carried by [`ForecastConfig`] and handed to
//! the orchestrator at construction time. Defaults reproduce the standard
//! run: eight countries across continents, the ten deadliest causes, five
//! climate regressors and an eleven-year horizon starting in 2020.

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

/// Column holding the country name in the integrated table
pub const COUNTRY_COLUMN: &str = "Country/Territory";
/// Column holding the calendar year in the integrated table
pub const YEAR_COLUMN: &str = "Year";
/// Suffix of per-100k mortality rate columns
pub const RATE_SUFFIX: &str = "_Rate_per_100k";

pub const DEFAULT_COUNTRIES: [&str; 8] = [
    "United States",
    "Germany",
    "China",
    "Brazil",
    "India",
    "Nigeria",
    "Australia",
    "Japan",
];

pub const DEFAULT_CLIMATE_VARIABLES: [&str; 5] = [
    "Temperature_C",
    "Precipitation_mm",
    "Surface_Pressure_Pa",
    "Dewpoint_K",
    "Wind_Speed_ms",
];

/// Annual forecast horizon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastHorizon {
    /// First forecast year
    pub start_year: i32,
    /// Number of consecutive years
    pub periods: usize,
}

impl Default for ForecastHorizon {
    fn default() -> Self {
        Self {
            start_year: 2020,
            periods: 11,
        }
    }
}

impl ForecastHorizon {
    pub fn new(start_year: i32, periods: usize) -> Self {
        Self {
            start_year,
            periods,
        }
    }

    pub fn years(&self) -> Vec<i32> {
        (0..self.periods)
            .map(|offset| self.start_year + offset as i32)
            .collect()
    }

    pub fn end_year(&self) -> i32 {
        self.start_year + self.periods as i32 - 1
    }
}

/// Settings of the additive trend model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Scale of the Laplace prior on trend changes; lower means a stiffer trend
    pub changepoint_prior_scale: f64,
    /// Standard deviation of the Gaussian prior on regressor coefficients
    pub regressor_prior_scale: f64,
    /// Standard deviation of the Gaussian prior on base growth and offset
    pub trend_prior_scale: f64,
    /// Scale of the half-normal prior on observation noise
    pub sigma_prior_scale: f64,
    /// Upper bound on the number of potential changepoints
    pub n_changepoints: usize,
    /// Share of history in which changepoints may be placed
    pub changepoint_range: f64,
    /// Coverage of the uncertainty interval
    pub interval_width: f64,
    /// Simulated trajectories per forecast
    pub uncertainty_samples: usize,
    /// Coordinate descent sweep budget per noise update
    pub max_sweeps: usize,
    /// Convergence tolerance on coefficient updates
    pub tolerance: f64,
    /// Alternations between coefficient and noise updates
    pub max_noise_updates: usize,
    /// Base seed of the uncertainty sampler
    pub seed: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            changepoint_prior_scale: 0.05,
            regressor_prior_scale: 10.0,
            trend_prior_scale: 5.0,
            sigma_prior_scale: 0.5,
            n_changepoints: 25,
            changepoint_range: 0.8,
            interval_width: 0.8,
            uncertainty_samples: 1000,
            max_sweeps: 20_000,
            tolerance: 1e-10,
            max_noise_updates: 50,
            seed: 42,
        }
    }
}

impl ModelSettings {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("changepoint_prior_scale", self.changepoint_prior_scale),
            ("regressor_prior_scale", self.regressor_prior_scale),
            ("trend_prior_scale", self.trend_prior_scale),
            ("sigma_prior_scale", self.sigma_prior_scale),
            ("tolerance", self.tolerance),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ForecastError::InvalidParameter(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        if !(self.changepoint_range > 0.0 && self.changepoint_range <= 1.0) {
            return Err(ForecastError::InvalidParameter(
                "changepoint_range must lie in (0, 1]".to_string(),
            ));
        }
        if !(self.interval_width > 0.0 && self.interval_width < 1.0) {
            return Err(ForecastError::InvalidParameter(
                "interval_width must lie in (0, 1)".to_string(),
            ));
        }
        if self.uncertainty_samples == 0 || self.max_sweeps == 0 || self.max_noise_updates == 0 {
            return Err(ForecastError::InvalidParameter(
                "uncertainty_samples, max_sweeps and max_noise_updates must be positive"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration of a batch forecasting run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Countries to forecast, in output order
    pub countries: Vec<String>,
    /// Explicit causes; ranked from the table when absent
    pub causes: Option<Vec<String>>,
    /// How many causes to take when ranking
    pub top_causes: usize,
    /// Climate columns used as regressors
    pub climate_variables: Vec<String>,
    pub horizon: ForecastHorizon,
    pub model: ModelSettings,
    /// Per-series fit time budget in seconds
    pub fit_timeout_secs: Option<u64>,
    /// Run series on a worker pool
    pub parallel: bool,
    /// Worker count; rayon's default when absent
    pub threads: Option<usize>,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            countries: DEFAULT_COUNTRIES.iter().map(|c| c.to_string()).collect(),
            causes: None,
            top_causes: 10,
            climate_variables: DEFAULT_CLIMATE_VARIABLES
                .iter()
                .map(|v| v.to_string())
                .collect(),
            horizon: ForecastHorizon::default(),
            model: ModelSettings::default(),
            fit_timeout_secs: Some(30),
            parallel: true,
            threads: None,
        }
    }
}

impl ForecastConfig {
    /// Load a configuration from a JSON file; missing fields take defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let config: ForecastConfig = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn fit_timeout(&self) -> Option<Duration> {
        self.fit_timeout_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.countries.is_empty() {
            return Err(ForecastError::InvalidParameter(
                "At least one country is required".to_string(),
            ));
        }
        match &self.causes {
            Some(causes) if causes.is_empty() => {
                return Err(ForecastError::InvalidParameter(
                    "An explicit cause list must not be empty".to_string(),
                ));
            }
            None if self.top_causes == 0 => {
                return Err(ForecastError::InvalidParameter(
                    "top_causes must be positive".to_string(),
                ));
            }
            _ => {}
        }
        if self.horizon.periods == 0 {
            return Err(ForecastError::InvalidParameter(
                "The forecast horizon must cover at least one year".to_string(),
            ));
        }
        if self.threads == Some(0) {
            return Err(ForecastError::InvalidParameter(
                "threads must be positive when set".to_string(),
            ));
        }
        if self.fit_timeout_secs == Some(0) {
            return Err(ForecastError::InvalidParameter(
                "fit_timeout_secs must be positive when set".to_string(),
            ));
        }
        self.model.validate()
    }
}
