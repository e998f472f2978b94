//! Integrated country-year table handling

use crate::config::{COUNTRY_COLUMN, RATE_SUFFIX, YEAR_COLUMN};
use crate::error::{ForecastError, Result};
use polars::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::path::Path;

/// One row per (country, year) with every numeric column of the source file
#[derive(Debug, Clone, PartialEq)]
pub struct IntegratedTable {
    countries: Vec<String>,
    years: Vec<i32>,
    columns: BTreeMap<String, Vec<Option<f64>>>,
}

/// Loader for the integrated table
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load a table, picking the reader from the file extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<IntegratedTable> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("parquet") => Self::from_parquet(path),
            _ => Self::from_csv(path),
        }
    }

    /// Load the integrated table from a CSV file with a header row
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<IntegratedTable> {
        let file = File::open(path)?;
        let df = CsvReader::new(file)
            .infer_schema(None)
            .has_header(true)
            .finish()?;

        Self::from_dataframe(&df)
    }

    /// Load the integrated table from a Parquet file
    pub fn from_parquet<P: AsRef<Path>>(path: P) -> Result<IntegratedTable> {
        let file = File::open(path)?;
        let df = ParquetReader::new(file).finish()?;

        Self::from_dataframe(&df)
    }

    /// Build the table from an existing DataFrame.
    ///
    /// Key columns are required; every other numeric column is kept and
    /// non-numeric ones (country codes and the like) are ignored.
    pub fn from_dataframe(df: &DataFrame) -> Result<IntegratedTable> {
        let countries = Self::country_column(df)?;
        let years = Self::year_column(df)?;

        let mut columns = BTreeMap::new();
        for series in df.get_columns() {
            let name = series.name();
            if name == COUNTRY_COLUMN || name == YEAR_COLUMN || !series.dtype().is_numeric() {
                continue;
            }
            let values = series.cast(&DataType::Float64)?;
            let values: Vec<Option<f64>> = values
                .f64()?
                .into_iter()
                .map(|v| v.filter(|v| v.is_finite()))
                .collect();
            columns.insert(name.to_string(), values);
        }

        IntegratedTable::new(countries, years)?.with_columns(columns)
    }

    fn country_column(df: &DataFrame) -> Result<Vec<String>> {
        let col = df.column(COUNTRY_COLUMN).map_err(|e| {
            ForecastError::DataError(format!("Column '{}' not found: {}", COUNTRY_COLUMN, e))
        })?;
        let col = col.cast(&DataType::Utf8)?;

        col.utf8()?
            .into_iter()
            .enumerate()
            .map(|(row, v)| {
                v.map(|s| s.to_string()).ok_or_else(|| {
                    ForecastError::DataError(format!("Missing country name in row {}", row))
                })
            })
            .collect()
    }

    fn year_column(df: &DataFrame) -> Result<Vec<i32>> {
        let col = df.column(YEAR_COLUMN).map_err(|e| {
            ForecastError::DataError(format!("Column '{}' not found: {}", YEAR_COLUMN, e))
        })?;
        let col = col.cast(&DataType::Int64)?;

        col.i64()?
            .into_iter()
            .enumerate()
            .map(|(row, v)| {
                v.and_then(|y| i32::try_from(y).ok()).ok_or_else(|| {
                    ForecastError::DataError(format!("Missing or invalid year in row {}", row))
                })
            })
            .collect()
    }
}

impl IntegratedTable {
    /// Create a table holding only the key columns.
    ///
    /// Fails when the key vectors differ in length or a (country, year)
    /// pair occurs twice.
    pub fn new(countries: Vec<String>, years: Vec<i32>) -> Result<Self> {
        if countries.len() != years.len() {
            return Err(ForecastError::DataError(format!(
                "Country and year columns differ in length ({} vs {})",
                countries.len(),
                years.len()
            )));
        }

        let mut seen = HashSet::with_capacity(countries.len());
        for (country, year) in countries.iter().zip(&years) {
            if !seen.insert((country.as_str(), *year)) {
                return Err(ForecastError::DataError(format!(
                    "Duplicate record for {} in {}",
                    country, year
                )));
            }
        }

        Ok(Self {
            countries,
            years,
            columns: BTreeMap::new(),
        })
    }

    /// Add or replace a numeric column
    pub fn with_column(mut self, name: impl Into<String>, values: Vec<Option<f64>>) -> Result<Self> {
        let name = name.into();
        if values.len() != self.len() {
            return Err(ForecastError::DataError(format!(
                "Column '{}' has {} values, expected {}",
                name,
                values.len(),
                self.len()
            )));
        }
        if name == COUNTRY_COLUMN || name == YEAR_COLUMN {
            return Err(ForecastError::DataError(format!(
                "'{}' is a key column",
                name
            )));
        }
        self.columns.insert(name, values);
        Ok(self)
    }

    /// Add a column of values with no gaps
    pub fn with_values(self, name: impl Into<String>, values: Vec<f64>) -> Result<Self> {
        self.with_column(name, values.into_iter().map(Some).collect())
    }

    fn with_columns(mut self, columns: BTreeMap<String, Vec<Option<f64>>>) -> Result<Self> {
        for (name, values) in columns {
            self = self.with_column(name, values)?;
        }
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    pub fn countries(&self) -> &[String] {
        &self.countries
    }

    pub fn years(&self) -> &[i32] {
        &self.years
    }

    /// Distinct countries in first-seen order
    pub fn distinct_countries(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.countries
            .iter()
            .filter(|c| seen.insert(c.as_str()))
            .map(|c| c.as_str())
            .collect()
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns.get(name).map(|v| v.as_slice())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(|k| k.as_str())
    }

    /// Row indices belonging to `country`, in table order
    pub fn rows_for(&self, country: &str) -> Vec<usize> {
        self.countries
            .iter()
            .enumerate()
            .filter(|(_, c)| c.as_str() == country)
            .map(|(i, _)| i)
            .collect()
    }

    /// (min, max) year present in the table
    pub fn year_range(&self) -> Option<(i32, i32)> {
        let min = self.years.iter().min()?;
        let max = self.years.iter().max()?;
        Some((*min, *max))
    }
}

/// Name of the rate column for a cause
pub fn rate_column(cause: &str) -> String {
    format!("{}{}", cause, RATE_SUFFIX)
}

/// A cause with its historical death total
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCause {
    pub cause: String,
    pub total_deaths: f64,
}

/// Rank causes by total historical deaths and keep the top `n`.
///
/// Candidates are causes with both a `<Cause>_Rate_per_100k` column and a
/// raw `<Cause>` count column. Ties are broken by name.
pub fn rank_top_causes(table: &IntegratedTable, n: usize) -> Result<Vec<RankedCause>> {
    let mut ranked: Vec<RankedCause> = table
        .column_names()
        .filter_map(|name| name.strip_suffix(RATE_SUFFIX))
        .filter_map(|cause| {
            table.column(cause).map(|counts| RankedCause {
                cause: cause.to_string(),
                total_deaths: counts.iter().flatten().sum(),
            })
        })
        .collect();

    if ranked.is_empty() {
        return Err(ForecastError::DataError(format!(
            "No cause has both a count column and a '{}' column",
            RATE_SUFFIX
        )));
    }

    ranked.sort_by(|a, b| {
        b.total_deaths
            .total_cmp(&a.total_deaths)
            .then_with(|| a.cause.cmp(&b.cause))
    });
    ranked.truncate(n);
    Ok(ranked)
}
