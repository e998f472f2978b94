//! Additive trend model with changepoints and linear climate regressors
//!
//! The fitted mean is
//!
//! ```text
//! y(t) = k t + m + sum_j d_j (t - s_j)+ + sum_r b_r x_r(t)
//! ```
//!
//! on a rescaled representation. Time is the year-start date of each year
//! measured in years, running from 0 to 1 across the observed history. The
//! target is divided by its largest absolute value and each regressor is
//! standardized with its historical mean and sample standard
//! deviation. Coefficients are the posterior mode under Gaussian priors on
//! `k`, `m` and `b`, a Laplace prior on the trend changes `d`, and a
//! half-normal prior on the noise level. No seasonal terms are fitted:
//! the series are annual.

use crate::climate::ClimateProjection;
use crate::config::ModelSettings;
use crate::error::{ForecastError, Result, SeriesFailure, SeriesResult};
use crate::models::uncertainty::{simulate_intervals, TrendUncertainty};
use crate::models::{FitBudget, ForecastModel, ForecastResult, TrainedForecastModel};
use crate::series::Series;
use crate::utils::series_seed;
use climate_math::stats::{max_abs, mean, sample_std_dev};
use climate_math::{CoordinateDescent, LinearTrend, Penalty, SolveStatus};
use log::debug;

/// Relative change of the noise level at which alternation stops
const SIGMA_TOLERANCE: f64 = 1e-6;
/// Smallest noise variance considered, in scaled units
const MIN_SIGMA_SQUARED: f64 = 1e-10;

/// Untrained additive trend model
#[derive(Debug, Clone)]
pub struct AdditiveTrendModel {
    name: String,
    settings: ModelSettings,
    solver: CoordinateDescent,
}

impl AdditiveTrendModel {
    pub fn new(settings: ModelSettings) -> Result<Self> {
        settings.validate()?;
        let solver = CoordinateDescent::new(settings.max_sweeps, settings.tolerance)
            .map_err(ForecastError::from)?;

        Ok(Self {
            name: format!(
                "Additive trend (changepoint_prior_scale={})",
                settings.changepoint_prior_scale
            ),
            settings,
            solver,
        })
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }
}

/// Standardization of one regressor
#[derive(Debug, Clone, PartialEq)]
struct RegressorScale {
    name: String,
    mean: f64,
    scale: f64,
}

impl RegressorScale {
    fn fit(name: &str, values: &[f64]) -> Self {
        let mean = mean(values).unwrap_or(0.0);
        // Constant regressors are only centred, which zeroes their column.
        let scale = match sample_std_dev(values) {
            Ok(sd) if sd.is_finite() && sd > 1e-12 => sd,
            _ => 1.0,
        };
        Self {
            name: name.to_string(),
            mean,
            scale,
        }
    }

    fn apply(&self, value: f64) -> f64 {
        (value - self.mean) / self.scale
    }
}

/// One observed year in scaled coordinates
#[derive(Debug, Clone)]
struct HistoryRow {
    year: i32,
    t: f64,
    regressors: Vec<f64>,
}

/// Additive trend model fitted to one series
#[derive(Debug, Clone)]
pub struct TrainedAdditiveTrend {
    name: String,
    start_year: i32,
    span_years: f64,
    y_scale: f64,
    growth: f64,
    offset: f64,
    changepoints: Vec<f64>,
    deltas: Vec<f64>,
    regressors: Vec<RegressorScale>,
    betas: Vec<f64>,
    sigma: f64,
    history: Vec<HistoryRow>,
    interval_width: f64,
    uncertainty_samples: usize,
    seed: u64,
}

/// Potential changepoint locations: observed times at evenly spaced
/// positions over the first `range` share of history, excluding the first.
fn changepoint_locations(t: &[f64], max_changepoints: usize, range: f64) -> Vec<f64> {
    let hist_size = (t.len() as f64 * range).floor() as usize;
    let count = max_changepoints.min(hist_size.saturating_sub(1));
    if count == 0 {
        return Vec::new();
    }

    let last = (hist_size - 1) as f64;
    (1..=count)
        .map(|j| {
            let index = (j as f64 * last / count as f64).round() as usize;
            t[index]
        })
        .collect()
}

/// Posterior-mode noise variance for a residual sum of squares under a
/// half-normal prior with scale `prior`.
fn noise_variance(rss: f64, n: usize, prior: f64) -> f64 {
    let n = n as f64;
    let inv_prior_sq = 1.0 / (prior * prior);
    let variance = 2.0 * rss / (n + (n * n + 4.0 * rss * inv_prior_sq).sqrt());
    variance.max(MIN_SIGMA_SQUARED)
}

impl ForecastModel for AdditiveTrendModel {
    type Trained = TrainedAdditiveTrend;

    fn train(&self, series: &Series, budget: &FitBudget) -> SeriesResult<TrainedAdditiveTrend> {
        let names = series.regressors();

        for (index, name) in names.iter().enumerate() {
            if series.regressor_values(index).iter().all(|v| v.is_none()) {
                return Err(SeriesFailure::RegressorDegenerate(name.clone()));
            }
        }

        let observed: Vec<_> = series
            .points()
            .iter()
            .filter(|p| p.rate.map(|r| r.is_finite()).unwrap_or(false))
            .collect();
        if observed.len() < 2 {
            return Err(SeriesFailure::InsufficientData(format!(
                "{} observed years, need at least 2",
                observed.len()
            )));
        }

        let mut raw_regressors = vec![Vec::with_capacity(observed.len()); names.len()];
        for point in &observed {
            for (index, name) in names.iter().enumerate() {
                match point.climate[index] {
                    Some(v) if v.is_finite() => raw_regressors[index].push(v),
                    _ => {
                        return Err(SeriesFailure::InsufficientData(format!(
                            "regressor '{}' is missing in {}",
                            name, point.year
                        )))
                    }
                }
            }
        }

        let start_year = observed[0].year;
        let span_years = (observed[observed.len() - 1].year - start_year) as f64;
        if span_years <= 0.0 {
            return Err(SeriesFailure::InsufficientData(
                "observed years span no time".to_string(),
            ));
        }

        let t: Vec<f64> = observed
            .iter()
            .map(|p| (p.year - start_year) as f64 / span_years)
            .collect();

        let y: Vec<f64> = observed.iter().filter_map(|p| p.rate).collect();
        let y_scale = match max_abs(&y) {
            s if s > 0.0 => s,
            _ => 1.0,
        };
        let y: Vec<f64> = y.iter().map(|v| v / y_scale).collect();

        let regressors: Vec<RegressorScale> = names
            .iter()
            .zip(&raw_regressors)
            .map(|(name, values)| RegressorScale::fit(name, values))
            .collect();
        let regressor_columns: Vec<Vec<f64>> = regressors
            .iter()
            .zip(&raw_regressors)
            .map(|(scale, values)| values.iter().map(|v| scale.apply(*v)).collect())
            .collect();

        let changepoints = changepoint_locations(
            &t,
            self.settings.n_changepoints,
            self.settings.changepoint_range,
        );

        let mut columns = Vec::with_capacity(2 + changepoints.len() + names.len());
        let mut penalties = Vec::with_capacity(columns.capacity());
        columns.push(t.clone());
        columns.push(vec![1.0; t.len()]);
        penalties.push(Penalty::gaussian(self.settings.trend_prior_scale));
        penalties.push(Penalty::gaussian(self.settings.trend_prior_scale));
        for &s in &changepoints {
            columns.push(t.iter().map(|&ti| (ti - s).max(0.0)).collect());
            penalties.push(Penalty::laplace(self.settings.changepoint_prior_scale));
        }
        for column in regressor_columns.iter() {
            columns.push(column.clone());
            penalties.push(Penalty::gaussian(self.settings.regressor_prior_scale));
        }

        // Warm start from the straight line through the data.
        let line = LinearTrend::fit(&t, &y)
            .map_err(|e| SeriesFailure::InsufficientData(e.to_string()))?;
        let mut coefficients = vec![0.0; columns.len()];
        coefficients[0] = line.slope();
        coefficients[1] = line.intercept();

        let line_rss: f64 = t
            .iter()
            .zip(&y)
            .map(|(&ti, &yi)| (yi - line.evaluate(ti)).powi(2))
            .sum();
        let mut sigma_sq = noise_variance(line_rss, y.len(), self.settings.sigma_prior_scale);

        let mut updates = 0;
        loop {
            budget.check()?;
            updates += 1;

            let solution = self
                .solver
                .solve_with_interrupt(
                    &columns,
                    &y,
                    &penalties,
                    1.0 / sigma_sq,
                    &coefficients,
                    || budget.is_exhausted(),
                )
                .map_err(|e| SeriesFailure::NonConvergence(e.to_string()))?;

            match solution.status {
                SolveStatus::Converged => {}
                SolveStatus::Interrupted => {
                    budget.check()?;
                    return Err(SeriesFailure::NonConvergence(
                        "optimiser interrupted".to_string(),
                    ));
                }
                SolveStatus::SweepLimit => {
                    return Err(SeriesFailure::NonConvergence(format!(
                        "coefficients still moving after {} sweeps",
                        solution.sweeps
                    )));
                }
            }

            coefficients = solution.coefficients;
            let next = noise_variance(
                solution.residual_sum_squares,
                y.len(),
                self.settings.sigma_prior_scale,
            );
            let settled = ((next.sqrt() - sigma_sq.sqrt()) / sigma_sq.sqrt()).abs() < SIGMA_TOLERANCE;
            sigma_sq = next;

            if settled || updates >= self.settings.max_noise_updates {
                break;
            }
        }

        if !sigma_sq.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
            return Err(SeriesFailure::NonConvergence(
                "fit produced non-finite parameters".to_string(),
            ));
        }

        let n_changepoints = changepoints.len();
        let deltas = coefficients[2..2 + n_changepoints].to_vec();
        let betas = coefficients[2 + n_changepoints..].to_vec();

        let history = observed
            .iter()
            .enumerate()
            .map(|(i, p)| HistoryRow {
                year: p.year,
                t: t[i],
                regressors: regressor_columns.iter().map(|col| col[i]).collect(),
            })
            .collect();

        let trained = TrainedAdditiveTrend {
            name: self.name.clone(),
            start_year,
            span_years,
            y_scale,
            growth: coefficients[0],
            offset: coefficients[1],
            changepoints,
            deltas,
            regressors,
            betas,
            sigma: sigma_sq.sqrt(),
            history,
            interval_width: self.settings.interval_width,
            uncertainty_samples: self.settings.uncertainty_samples,
            seed: series_seed(self.settings.seed, series.country(), series.cause()),
        };

        debug!(
            "{} / {}: fitted {} years, {} changepoints, sigma {:.3e}, {} noise updates, effects {:?}",
            series.country(),
            series.cause(),
            y.len(),
            n_changepoints,
            trained.sigma(),
            updates,
            trained.regressor_effects()
        );
        Ok(trained)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl TrainedAdditiveTrend {
    /// Trend component at scaled time `t`, in scaled units
    fn trend(&self, t: f64) -> f64 {
        let changes: f64 = self
            .changepoints
            .iter()
            .zip(&self.deltas)
            .map(|(s, d)| d * (t - s).max(0.0))
            .sum();
        self.growth * t + self.offset + changes
    }

    fn regression(&self, standardized: &[f64]) -> f64 {
        self.betas.iter().zip(standardized).map(|(b, x)| b * x).sum()
    }

    fn scaled_time(&self, year: i32) -> f64 {
        (year - self.start_year) as f64 / self.span_years
    }

    /// Regressor coefficients per standardized unit, in rate units
    pub fn regressor_effects(&self) -> Vec<(String, f64)> {
        self.regressors
            .iter()
            .zip(&self.betas)
            .map(|(r, b)| (r.name.clone(), b * self.y_scale))
            .collect()
    }

    /// Observation noise standard deviation, in rate units
    pub fn sigma(&self) -> f64 {
        self.sigma * self.y_scale
    }
}

impl TrainedForecastModel for TrainedAdditiveTrend {
    fn predict(&self, future: &ClimateProjection) -> SeriesResult<ForecastResult> {
        let projected = self
            .regressors
            .iter()
            .map(|r| {
                future
                    .values(&r.name)
                    .ok_or_else(|| SeriesFailure::MissingColumn(r.name.clone()))
            })
            .collect::<SeriesResult<Vec<_>>>()?;

        let years = future.years();
        let mut future_t = Vec::with_capacity(years.len());
        let mut point = Vec::with_capacity(years.len());
        for (i, &year) in years.iter().enumerate() {
            let t = self.scaled_time(year);
            let standardized: Vec<f64> = self
                .regressors
                .iter()
                .zip(&projected)
                .map(|(scale, values)| scale.apply(values[i]))
                .collect();
            future_t.push(t);
            point.push(self.trend(t) + self.regression(&standardized));
        }

        let mean_abs_delta = if self.deltas.is_empty() {
            0.0
        } else {
            self.deltas.iter().map(|d| d.abs()).sum::<f64>() / self.deltas.len() as f64
        };
        let uncertainty = TrendUncertainty {
            changepoint_rate: self.changepoints.len() as f64,
            delta_scale: mean_abs_delta,
            sigma: self.sigma,
        };
        let intervals = simulate_intervals(
            &future_t,
            &point,
            &uncertainty,
            self.uncertainty_samples,
            self.interval_width,
            self.seed,
        )?;

        let values: Vec<f64> = point.iter().map(|v| v * self.y_scale).collect();
        let intervals = intervals
            .into_iter()
            .zip(&values)
            .map(|((lower, upper), &yhat)| {
                (
                    (lower * self.y_scale).min(yhat),
                    (upper * self.y_scale).max(yhat),
                )
            })
            .collect();

        ForecastResult::new(years, values, intervals, self.interval_width)
    }

    fn fitted(&self) -> Vec<(i32, f64)> {
        self.history
            .iter()
            .map(|row| {
                let value = self.trend(row.t) + self.regression(&row.regressors);
                (row.year, value * self.y_scale)
            })
            .collect()
    }

    fn name(&self) -> &str {
        &self.name
    }
}
