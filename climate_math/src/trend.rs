//! Least-squares linear trend fitting
//!
//! A degree-1 polynomial fit of `y` against `x`, used to project climate
//! covariates beyond the observed range. Degenerate inputs never fail once
//! at least one point is available: a single point or a series with no
//! spread in `x` yields a flat line through the mean.

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// Fitted linear trend `y = slope * x + intercept`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearTrend {
    slope: f64,
    intercept: f64,
    observations: usize,
}

impl LinearTrend {
    /// Fit a least-squares line through paired observations
    pub fn fit(xs: &[f64], ys: &[f64]) -> Result<Self> {
        if xs.len() != ys.len() {
            return Err(MathError::InvalidInput(format!(
                "x and y lengths differ ({} vs {})",
                xs.len(),
                ys.len()
            )));
        }
        if xs.is_empty() {
            return Err(MathError::InsufficientData(
                "Need at least one point to fit a trend".to_string(),
            ));
        }
        if xs.iter().chain(ys.iter()).any(|v| !v.is_finite()) {
            return Err(MathError::InvalidInput(
                "Trend inputs must be finite".to_string(),
            ));
        }

        let n = xs.len() as f64;
        let x_mean = xs.iter().sum::<f64>() / n;
        let y_mean = ys.iter().sum::<f64>() / n;

        let mut numerator = 0.0;
        let mut denominator = 0.0;
        for (&x, &y) in xs.iter().zip(ys) {
            numerator += (x - x_mean) * (y - y_mean);
            denominator += (x - x_mean) * (x - x_mean);
        }

        // No spread in x: flat line through the mean.
        let slope = if denominator.abs() < 1e-12 {
            0.0
        } else {
            numerator / denominator
        };

        Ok(Self {
            slope,
            intercept: y_mean - slope * x_mean,
            observations: xs.len(),
        })
    }

    /// Fit against zero-based positions, skipping missing values.
    ///
    /// Position `i` of `values` is treated as `x = i`, so gaps keep their
    /// place on the axis instead of shifting later observations.
    pub fn fit_indexed(values: &[Option<f64>]) -> Result<Self> {
        let (xs, ys): (Vec<f64>, Vec<f64>) = values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.filter(|v| v.is_finite()).map(|v| (i as f64, v)))
            .unzip();

        Self::fit(&xs, &ys)
    }

    /// Evaluate the line at `x`
    pub fn evaluate(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    /// Evaluate at the `count` consecutive positions starting at `start`
    pub fn extrapolate(&self, start: usize, count: usize) -> Vec<f64> {
        (start..start + count)
            .map(|i| self.evaluate(i as f64))
            .collect()
    }

    pub fn slope(&self) -> f64 {
        self.slope
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Number of points the line was fitted on
    pub fn observations(&self) -> usize {
        self.observations
    }

    /// Coefficient of determination against the given points
    pub fn r_squared(&self, xs: &[f64], ys: &[f64]) -> Result<f64> {
        if xs.len() != ys.len() || xs.len() < 2 {
            return Err(MathError::InsufficientData(
                "Need at least 2 paired points to calculate R-squared".to_string(),
            ));
        }

        let y_mean = ys.iter().sum::<f64>() / ys.len() as f64;
        let mut ss_total = 0.0;
        let mut ss_residual = 0.0;
        for (&x, &y) in xs.iter().zip(ys) {
            ss_total += (y - y_mean).powi(2);
            ss_residual += (y - self.evaluate(x)).powi(2);
        }

        if ss_total.abs() < 1e-12 {
            return Err(MathError::CalculationError(
                "Cannot calculate R-squared: total sum of squares is too small".to_string(),
            ));
        }

        Ok(1.0 - ss_residual / ss_total)
    }
}
