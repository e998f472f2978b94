//! Forecast table and run report writers

use crate::error::Result;
use crate::models::ForecastResult;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;

/// One forecast year of one (country, cause) series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "Cause")]
    pub cause: String,
    #[serde(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Predicted_Rate")]
    pub predicted_rate: f64,
    #[serde(rename = "Lower_Bound")]
    pub lower_bound: f64,
    #[serde(rename = "Upper_Bound")]
    pub upper_bound: f64,
}

/// Flat table of every successful forecast
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ForecastTable {
    rows: Vec<ForecastRow>,
}

impl ForecastTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a series' forecast, tagging each year with its country and cause
    pub fn push_forecast(&mut self, country: &str, cause: &str, forecast: &ForecastResult) {
        self.rows
            .extend(forecast.points().iter().map(|p| ForecastRow {
                country: country.to_string(),
                cause: cause.to_string(),
                year: p.year,
                predicted_rate: p.predicted,
                lower_bound: p.lower,
                upper_bound: p.upper,
            }));
    }

    pub fn rows(&self) -> &[ForecastRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct (country, cause) pairs in table order
    pub fn groups(&self) -> Vec<(&str, &str)> {
        let mut groups: Vec<(&str, &str)> = Vec::new();
        for row in &self.rows {
            let key = (row.country.as_str(), row.cause.as_str());
            if !groups.contains(&key) {
                groups.push(key);
            }
        }
        groups
    }

    /// Rows of one (country, cause) pair
    pub fn get(&self, country: &str, cause: &str) -> Vec<&ForecastRow> {
        self.rows
            .iter()
            .filter(|r| r.country == country && r.cause == cause)
            .collect()
    }

    /// Write the table as CSV with a header row
    pub fn write_csv_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Write the table to `path`, creating parent directories
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        create_parent(path)?;
        self.write_csv_to(BufWriter::new(File::create(path)?))
    }

    /// Read a table previously written by [`ForecastTable::write_csv`]
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(reader);
        let rows = reader
            .deserialize()
            .collect::<std::result::Result<Vec<ForecastRow>, csv::Error>>()?;
        Ok(Self { rows })
    }

    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_csv_reader(File::open(path)?)
    }
}

/// Serialize any report as pretty JSON to `path`, creating parent directories
pub fn write_json_report<T: Serialize, P: AsRef<Path>>(report: &T, path: P) -> Result<()> {
    let path = path.as_ref();
    create_parent(path)?;
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.flush()?;
    Ok(())
}

fn create_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Ok(fs::create_dir_all(parent)?),
        _ => Ok(()),
    }
}
