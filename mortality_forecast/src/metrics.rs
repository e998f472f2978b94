//! Metrics for evaluating fitted models and summarising forecasts

use crate::error::{ForecastError, Result};
use crate::models::{ForecastResult, TrainedForecastModel};
use crate::series::Series;
use crate::utils::{forecast_accuracy, ForecastAccuracy};
use serde::Serialize;

/// In-sample fit quality of one series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitDiagnostics {
    pub country: String,
    pub cause: String,
    /// Observed years the model was fitted on
    pub observations: usize,
    pub accuracy: ForecastAccuracy,
}

/// Compare a trained model's fitted values with the observed rates
pub fn evaluate_fit<T: TrainedForecastModel>(series: &Series, trained: &T) -> Result<FitDiagnostics> {
    let fitted = trained.fitted();

    let (predicted, actual): (Vec<f64>, Vec<f64>) = fitted
        .iter()
        .filter_map(|(year, value)| {
            series
                .points()
                .iter()
                .find(|p| p.year == *year)
                .and_then(|p| p.rate)
                .map(|rate| (*value, rate))
        })
        .unzip();

    if predicted.len() != fitted.len() {
        return Err(ForecastError::ValidationError(format!(
            "{} fitted values but only {} observed rates for {} / {}",
            fitted.len(),
            predicted.len(),
            series.country(),
            series.cause()
        )));
    }

    Ok(FitDiagnostics {
        country: series.country().to_string(),
        cause: series.cause().to_string(),
        observations: predicted.len(),
        accuracy: forecast_accuracy(&predicted, &actual)?,
    })
}

/// Headline change statistics of one forecast, relative to history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSummary {
    pub country: String,
    pub cause: String,
    pub last_historical_year: i32,
    pub last_historical_rate: f64,
    pub first_predicted: f64,
    pub last_predicted: f64,
    /// Percent change from the last historical rate to the last prediction;
    /// `None` when the last historical rate is zero
    pub change_percent: Option<f64>,
    /// Change from the last historical rate to the last prediction,
    /// spread evenly over the forecast years
    pub avg_annual_change: f64,
}

impl TrendSummary {
    /// Summarise a forecast against its series; `None` when either has no values
    pub fn from_forecast(series: &Series, forecast: &ForecastResult) -> Option<Self> {
        let (last_year, last_rate) = series.last_observed()?;
        let first = forecast.points().first()?;
        let last = forecast.points().last()?;

        let change_percent = if last_rate != 0.0 {
            Some((last.predicted - last_rate) / last_rate * 100.0)
        } else {
            None
        };

        Some(Self {
            country: series.country().to_string(),
            cause: series.cause().to_string(),
            last_historical_year: last_year,
            last_historical_rate: last_rate,
            first_predicted: first.predicted,
            last_predicted: last.predicted,
            change_percent,
            avg_annual_change: (last.predicted - last_rate) / forecast.horizons() as f64,
        })
    }
}
