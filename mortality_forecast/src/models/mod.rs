//! Forecasting models for annual mortality series

use crate::climate::ClimateProjection;
use crate::error::{SeriesFailure, SeriesResult};
use crate::series::Series;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::{Duration, Instant};

pub mod additive;
pub mod uncertainty;

pub use additive::{AdditiveTrendModel, TrainedAdditiveTrend};

/// One forecast year
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub year: i32,
    pub predicted: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Forecast for one series over the horizon
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastResult {
    points: Vec<ForecastPoint>,
    /// Coverage of the interval between `lower` and `upper`
    interval_width: f64,
}

impl ForecastResult {
    /// Assemble a forecast from aligned years, point values and intervals
    pub fn new(
        years: &[i32],
        values: Vec<f64>,
        intervals: Vec<(f64, f64)>,
        interval_width: f64,
    ) -> SeriesResult<Self> {
        if values.len() != years.len() || intervals.len() != years.len() {
            return Err(SeriesFailure::NonConvergence(format!(
                "forecast produced {} values and {} intervals for {} years",
                values.len(),
                intervals.len(),
                years.len()
            )));
        }
        if years.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SeriesFailure::InsufficientData(
                "forecast years must be strictly ascending".to_string(),
            ));
        }

        let points = years
            .iter()
            .zip(values)
            .zip(intervals)
            .map(|((&year, predicted), (lower, upper))| ForecastPoint {
                year,
                predicted,
                lower,
                upper,
            })
            .collect::<Vec<_>>();

        if let Some(p) = points
            .iter()
            .find(|p| !(p.predicted.is_finite() && p.lower.is_finite() && p.upper.is_finite()))
        {
            return Err(SeriesFailure::NonConvergence(format!(
                "non-finite forecast for {}",
                p.year
            )));
        }

        Ok(Self {
            points,
            interval_width,
        })
    }

    pub fn points(&self) -> &[ForecastPoint] {
        &self.points
    }

    pub fn horizons(&self) -> usize {
        self.points.len()
    }

    pub fn interval_width(&self) -> f64 {
        self.interval_width
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.predicted).collect()
    }

    pub fn years(&self) -> Vec<i32> {
        self.points.iter().map(|p| p.year).collect()
    }
}

/// Wall-clock budget for a single fit.
///
/// Checked cooperatively by the optimiser, so a fit stops at its next
/// checkpoint after the deadline passes.
#[derive(Debug, Clone, Copy)]
pub struct FitBudget {
    limit: Option<Duration>,
    started: Instant,
}

impl FitBudget {
    /// Start a budget now; `None` never expires
    pub fn start(limit: Option<Duration>) -> Self {
        Self {
            limit,
            started: Instant::now(),
        }
    }

    pub fn unlimited() -> Self {
        Self::start(None)
    }

    pub fn is_exhausted(&self) -> bool {
        self.limit
            .map(|limit| self.started.elapsed() >= limit)
            .unwrap_or(false)
    }

    /// Fail with [`SeriesFailure::TimedOut`] once the budget is spent
    pub fn check(&self) -> SeriesResult<()> {
        match self.limit {
            Some(limit) if self.is_exhausted() => Err(SeriesFailure::TimedOut {
                millis: limit.as_millis() as u64,
            }),
            _ => Ok(()),
        }
    }
}

/// Trained forecast model
pub trait TrainedForecastModel: Debug {
    /// Forecast the years of `future` using its projected regressors
    fn predict(&self, future: &ClimateProjection) -> SeriesResult<ForecastResult>;

    /// In-sample fitted values in rate units, one per observed year
    fn fitted(&self) -> Vec<(i32, f64)>;

    /// Name of the model
    fn name(&self) -> &str;
}

/// Forecast model that can be trained on a series
pub trait ForecastModel: Debug + Clone + Send + Sync {
    /// The type of trained model produced
    type Trained: TrainedForecastModel;

    /// Train the model, giving up when `budget` runs out
    fn train(&self, series: &Series, budget: &FitBudget) -> SeriesResult<Self::Trained>;

    /// Get the name of the model
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forecast_result_checks_lengths() {
        let result = ForecastResult::new(&[2020, 2021], vec![1.0], vec![(0.0, 2.0)], 0.8);
        assert!(result.is_err());
    }

    #[test]
    fn test_forecast_result_rejects_unordered_years() {
        let result = ForecastResult::new(
            &[2021, 2020],
            vec![1.0, 1.0],
            vec![(0.0, 2.0), (0.0, 2.0)],
            0.8,
        );
        assert!(matches!(result, Err(SeriesFailure::InsufficientData(_))));
    }

    #[test]
    fn test_forecast_result_rejects_nan() {
        let result = ForecastResult::new(&[2020], vec![f64::NAN], vec![(0.0, 2.0)], 0.8);
        assert!(matches!(result, Err(SeriesFailure::NonConvergence(_))));
    }

    #[test]
    fn test_forecast_result_accessors() {
        let result = ForecastResult::new(
            &[2020, 2021],
            vec![1.0, 2.0],
            vec![(0.5, 1.5), (1.5, 2.5)],
            0.8,
        )
        .unwrap();
        assert_eq!(result.horizons(), 2);
        assert_eq!(result.values(), vec![1.0, 2.0]);
        assert_eq!(result.years(), vec![2020, 2021]);
        assert_eq!(result.points()[1].upper, 2.5);
    }

    #[test]
    fn test_zero_budget_expires() {
        let budget = FitBudget::start(Some(Duration::ZERO));
        assert!(budget.is_exhausted());
        assert_eq!(budget.check(), Err(SeriesFailure::TimedOut { millis: 0 }));
        assert!(FitBudget::unlimited().check().is_ok());
    }
}
