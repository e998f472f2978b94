//! Linear-trend projection of climate covariates
//!
//! Each climate variable is treated as a function of its zero-based position
//! in the historical series and extended along its least-squares line. This
//! is a scenario assumption, not a climate forecast.

use crate::config::ForecastHorizon;
use crate::error::{SeriesFailure, SeriesResult};
use crate::series::Series;
use climate_math::LinearTrend;

/// Projected climate values for the forecast years
#[derive(Debug, Clone, PartialEq)]
pub struct ClimateProjection {
    years: Vec<i32>,
    regressors: Vec<String>,
    /// One vector per regressor, aligned with `years`
    values: Vec<Vec<f64>>,
}

impl ClimateProjection {
    pub fn years(&self) -> &[i32] {
        &self.years
    }

    pub fn regressors(&self) -> &[String] {
        &self.regressors
    }

    pub fn len(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    /// Projected values of one regressor by name
    pub fn values(&self, regressor: &str) -> Option<&[f64]> {
        self.regressors
            .iter()
            .position(|r| r == regressor)
            .map(|i| self.values[i].as_slice())
    }

    /// Projected values of the regressor at `index`
    pub fn values_at(&self, index: usize) -> &[f64] {
        &self.values[index]
    }
}

/// Fits a per-variable linear trend and extends it over the horizon
#[derive(Debug, Clone, Copy)]
pub struct ClimateTrendExtrapolator {
    horizon: ForecastHorizon,
}

impl ClimateTrendExtrapolator {
    pub fn new(horizon: ForecastHorizon) -> Self {
        Self { horizon }
    }

    pub fn horizon(&self) -> ForecastHorizon {
        self.horizon
    }

    /// Project every regressor of `series` over the horizon.
    ///
    /// History positions are `0..N` for the `N` years of the series, and the
    /// projection is evaluated at `N..N + H`. Missing values are skipped
    /// without shifting later positions. A regressor with no values at all
    /// cannot be projected.
    pub fn project(&self, series: &Series) -> SeriesResult<ClimateProjection> {
        let n = series.len();
        let values = series
            .regressors()
            .iter()
            .enumerate()
            .map(|(index, name)| {
                let trend = LinearTrend::fit_indexed(&series.regressor_values(index))
                    .map_err(|_| SeriesFailure::RegressorDegenerate(name.clone()))?;
                Ok(trend.extrapolate(n, self.horizon.periods))
            })
            .collect::<SeriesResult<Vec<_>>>()?;

        Ok(ClimateProjection {
            years: self.horizon.years(),
            regressors: series.regressors().to_vec(),
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::SeriesPoint;
    use approx::assert_abs_diff_eq;

    fn series_with(regressors: Vec<(&str, Vec<Option<f64>>)>) -> Series {
        let names: Vec<String> = regressors.iter().map(|(n, _)| n.to_string()).collect();
        let len = regressors[0].1.len();
        let points = (0..len)
            .map(|i| SeriesPoint {
                year: 1990 + i as i32,
                rate: Some(1.0),
                climate: regressors.iter().map(|(_, v)| v[i]).collect(),
            })
            .collect();
        Series::new("A", "X", names, points).unwrap()
    }

    #[test]
    fn test_linear_history_extends_linearly() {
        let series = series_with(vec![(
            "Temperature_C",
            (0..30).map(|i| Some(i as f64)).collect(),
        )]);
        let projection = ClimateTrendExtrapolator::new(ForecastHorizon::default())
            .project(&series)
            .unwrap();

        assert_eq!(projection.years(), (2020..=2030).collect::<Vec<_>>().as_slice());
        let values = projection.values("Temperature_C").unwrap();
        assert_eq!(values.len(), 11);
        for (i, v) in values.iter().enumerate() {
            assert_abs_diff_eq!(*v, 30.0 + i as f64, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_constant_history_stays_constant() {
        let series = series_with(vec![("Dewpoint_K", vec![Some(5.0); 30])]);
        let projection = ClimateTrendExtrapolator::new(ForecastHorizon::default())
            .project(&series)
            .unwrap();

        for v in projection.values_at(0) {
            assert_abs_diff_eq!(*v, 5.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_short_history_is_defined() {
        let series = series_with(vec![("Wind_Speed_ms", vec![Some(3.2)])]);
        let projection = ClimateTrendExtrapolator::new(ForecastHorizon::new(2020, 4))
            .project(&series)
            .unwrap();
        assert_eq!(projection.values_at(0), &[3.2, 3.2, 3.2, 3.2]);
    }

    #[test]
    fn test_variables_are_projected_independently() {
        let series = series_with(vec![
            ("Temperature_C", (0..10).map(|i| Some(2.0 * i as f64)).collect()),
            ("Precipitation_mm", vec![Some(800.0); 10]),
        ]);
        let projection = ClimateTrendExtrapolator::new(ForecastHorizon::new(2000, 2))
            .project(&series)
            .unwrap();

        assert_eq!(projection.regressors().len(), 2);
        assert_abs_diff_eq!(projection.values_at(0)[0], 20.0, epsilon = 1e-9);
        assert_abs_diff_eq!(projection.values_at(1)[1], 800.0, epsilon = 1e-9);
    }

    #[test]
    fn test_all_missing_regressor_is_degenerate() {
        let series = series_with(vec![("Temperature_C", vec![None; 5])]);
        let result = ClimateTrendExtrapolator::new(ForecastHorizon::default()).project(&series);
        assert_eq!(
            result,
            Err(SeriesFailure::RegressorDegenerate("Temperature_C".into()))
        );
    }

    #[test]
    fn test_projection_is_deterministic() {
        let series = series_with(vec![(
            "Surface_Pressure_Pa",
            (0..30).map(|i| Some(101_000.0 + (i as f64).sin() * 50.0)).collect(),
        )]);
        let extrapolator = ClimateTrendExtrapolator::new(ForecastHorizon::default());
        let first = extrapolator.project(&series).unwrap();
        let second = extrapolator.project(&series).unwrap();
        assert_eq!(first, second);
    }
}
