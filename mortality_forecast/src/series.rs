//! Single-country, single-cause annual series

use crate::data::{rate_column, IntegratedTable};
use crate::error::{SeriesFailure, SeriesResult};

/// One year of a series
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint {
    pub year: i32,
    /// Mortality rate per 100k
    pub rate: Option<f64>,
    /// Climate values aligned with [`Series::regressors`]
    pub climate: Vec<Option<f64>>,
}

/// A country's annual history for one cause with aligned climate covariates
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    country: String,
    cause: String,
    regressors: Vec<String>,
    points: Vec<SeriesPoint>,
}

impl Series {
    /// Build a series from points; they are sorted by year
    pub fn new(
        country: impl Into<String>,
        cause: impl Into<String>,
        regressors: Vec<String>,
        mut points: Vec<SeriesPoint>,
    ) -> SeriesResult<Self> {
        if let Some(p) = points.iter().find(|p| p.climate.len() != regressors.len()) {
            return Err(SeriesFailure::InsufficientData(format!(
                "year {} has {} climate values for {} regressors",
                p.year,
                p.climate.len(),
                regressors.len()
            )));
        }
        points.sort_by_key(|p| p.year);
        if let Some(w) = points.windows(2).find(|w| w[0].year == w[1].year) {
            return Err(SeriesFailure::InsufficientData(format!(
                "year {} appears twice",
                w[0].year
            )));
        }

        Ok(Self {
            country: country.into(),
            cause: cause.into(),
            regressors,
            points,
        })
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn cause(&self) -> &str {
        &self.cause
    }

    pub fn regressors(&self) -> &[String] {
        &self.regressors
    }

    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn years(&self) -> Vec<i32> {
        self.points.iter().map(|p| p.year).collect()
    }

    pub fn rates(&self) -> Vec<Option<f64>> {
        self.points.iter().map(|p| p.rate).collect()
    }

    /// Values of the regressor at position `index`, one per year
    pub fn regressor_values(&self, index: usize) -> Vec<Option<f64>> {
        self.points
            .iter()
            .map(|p| p.climate.get(index).copied().flatten())
            .collect()
    }

    /// Last year with an observed rate
    pub fn last_observed(&self) -> Option<(i32, f64)> {
        self.points
            .iter()
            .rev()
            .find_map(|p| p.rate.map(|r| (p.year, r)))
    }
}

/// Slices the integrated table into per-(country, cause) series
#[derive(Debug, Clone)]
pub struct SeriesExtractor {
    climate_variables: Vec<String>,
}

impl SeriesExtractor {
    pub fn new(climate_variables: Vec<String>) -> Self {
        Self { climate_variables }
    }

    pub fn climate_variables(&self) -> &[String] {
        &self.climate_variables
    }

    /// Select the country's rows, sorted by year, with the cause's rate and
    /// every configured climate variable.
    pub fn extract(
        &self,
        table: &IntegratedTable,
        country: &str,
        cause: &str,
    ) -> SeriesResult<Series> {
        let rows = table.rows_for(country);
        if rows.is_empty() {
            return Err(SeriesFailure::UnknownCountry(country.to_string()));
        }

        let rate_name = rate_column(cause);
        let rates = table
            .column(&rate_name)
            .ok_or(SeriesFailure::MissingColumn(rate_name))?;

        let climate_columns = self
            .climate_variables
            .iter()
            .map(|name| {
                table
                    .column(name)
                    .ok_or_else(|| SeriesFailure::MissingColumn(name.clone()))
            })
            .collect::<SeriesResult<Vec<_>>>()?;

        let years = table.years();
        let points = rows
            .into_iter()
            .map(|row| SeriesPoint {
                year: years[row],
                rate: rates[row],
                climate: climate_columns.iter().map(|col| col[row]).collect(),
            })
            .collect();

        Series::new(country, cause, self.climate_variables.clone(), points)
    }
}
