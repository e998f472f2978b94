//! Simulation of forecast intervals
//!
//! Future trend changes are drawn the way history produced them: changes
//! arrive at the fitted changepoint rate per unit of scaled time beyond the
//! end of history, with Laplace-distributed magnitudes whose scale is the
//! mean absolute fitted change. Observation noise is added on top and the
//! interval bounds are empirical percentiles of the simulated paths.

use crate::error::{SeriesFailure, SeriesResult};
use climate_math::stats::percentile_sorted;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, Poisson};
use statrs::distribution::Laplace;

/// Parameters of the trend and noise perturbations, in scaled units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendUncertainty {
    /// Expected number of trend changes per unit of scaled time
    pub changepoint_rate: f64,
    /// Mean absolute size of the fitted trend changes
    pub delta_scale: f64,
    /// Observation noise standard deviation
    pub sigma: f64,
}

/// Lower and upper interval bounds around `point` at each time in `future_t`.
///
/// Paths are simulated with a generator seeded from `seed`, so the same
/// inputs always give the same bounds. Direct callers may pass zero
/// `samples` to get zero-width bounds at the point forecast; model settings
/// never do.
pub fn simulate_intervals(
    future_t: &[f64],
    point: &[f64],
    uncertainty: &TrendUncertainty,
    samples: usize,
    interval_width: f64,
    seed: u64,
) -> SeriesResult<Vec<(f64, f64)>> {
    if future_t.len() != point.len() {
        return Err(SeriesFailure::NonConvergence(format!(
            "{} forecast times for {} point values",
            future_t.len(),
            point.len()
        )));
    }
    if samples == 0 || future_t.is_empty() {
        return Ok(point.iter().map(|&p| (p, p)).collect());
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, uncertainty.sigma)
        .map_err(|e| SeriesFailure::NonConvergence(format!("noise distribution: {}", e)))?;
    let change_size = Laplace::new(0.0, uncertainty.delta_scale + 1e-8)
        .map_err(|e| SeriesFailure::NonConvergence(format!("change distribution: {}", e)))?;

    let horizon_end = future_t.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let expected_changes = uncertainty.changepoint_rate * (horizon_end - 1.0);
    let arrivals = if horizon_end > 1.0 && expected_changes > 0.0 {
        Some(Poisson::new(expected_changes).map_err(|e| {
            SeriesFailure::NonConvergence(format!("changepoint distribution: {}", e))
        })?)
    } else {
        None
    };

    // paths[i] holds every simulated value for time i
    let mut paths = vec![Vec::with_capacity(samples); future_t.len()];
    let mut changes: Vec<(f64, f64)> = Vec::new();
    for _ in 0..samples {
        changes.clear();
        if let Some(arrivals) = &arrivals {
            let count = arrivals.sample(&mut rng) as usize;
            for _ in 0..count {
                let at = rng.gen_range(1.0..horizon_end);
                let size: f64 = change_size.sample(&mut rng);
                changes.push((at, size));
            }
        }

        for (i, (&t, &p)) in future_t.iter().zip(point).enumerate() {
            let drift: f64 = changes
                .iter()
                .map(|(at, size)| size * (t - at).max(0.0))
                .sum();
            paths[i].push(p + drift + noise.sample(&mut rng));
        }
    }

    let lower_q = (1.0 - interval_width) / 2.0;
    let upper_q = (1.0 + interval_width) / 2.0;
    paths
        .into_iter()
        .map(|mut values| {
            values.sort_by(|a, b| a.total_cmp(b));
            let lower = percentile_sorted(&values, lower_q)
                .map_err(|e| SeriesFailure::NonConvergence(e.to_string()))?;
            let upper = percentile_sorted(&values, upper_q)
                .map_err(|e| SeriesFailure::NonConvergence(e.to_string()))?;
            Ok((lower, upper))
        })
        .collect()
}
