#![allow(dead_code)]

use mortality_forecast::config::DEFAULT_CLIMATE_VARIABLES;
use mortality_forecast::data::IntegratedTable;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::io::Write;
use tempfile::NamedTempFile;

pub const HISTORY: std::ops::Range<i32> = 1990..2020;

/// Country-year table with constant climate and one rate column per cause
pub fn build_table(countries: &[&str], causes: &[(&str, fn(&str, i32) -> Option<f64>)]) -> IntegratedTable {
    let mut country_col = Vec::new();
    let mut year_col = Vec::new();
    for country in countries {
        for year in HISTORY {
            country_col.push(country.to_string());
            year_col.push(year);
        }
    }

    let mut table = IntegratedTable::new(country_col.clone(), year_col.clone()).unwrap();
    for (i, variable) in DEFAULT_CLIMATE_VARIABLES.iter().enumerate() {
        table = table
            .with_values(*variable, vec![10.0 * (i + 1) as f64; year_col.len()])
            .unwrap();
    }
    for (cause, rate) in causes {
        let rates: Vec<Option<f64>> = country_col
            .iter()
            .zip(&year_col)
            .map(|(c, y)| rate(c, *y))
            .collect();
        let deaths = rates.iter().map(|r| r.map(|v| v * 10.0)).collect();
        table = table
            .with_column(format!("{}_Rate_per_100k", cause), rates)
            .unwrap()
            .with_column(*cause, deaths)
            .unwrap();
    }
    table
}

/// Rate rising by 2 per year from 100 in 1990 for "A", falling for others
pub fn linear_rate(country: &str, year: i32) -> Option<f64> {
    let step = (year - 1990) as f64;
    if country == "A" {
        Some(100.0 + 2.0 * step)
    } else {
        Some(80.0 - 0.5 * step)
    }
}

/// Write an integrated CSV with the given causes' linear rates
pub fn write_csv(countries: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        "Country/Territory,Code,Year,Temperature_C,Precipitation_mm,Surface_Pressure_Pa,Dewpoint_K,Wind_Speed_ms,X,X_Rate_per_100k"
    )
    .unwrap();
    for country in countries {
        for year in HISTORY {
            let rate = linear_rate(country, year).unwrap();
            writeln!(
                file,
                "{},{}X,{},15.5,800.0,101325.0,283.2,3.4,{},{}",
                country,
                country,
                year,
                rate * 10.0,
                rate
            )
            .unwrap();
        }
    }
    file.flush().unwrap();
    file
}

/// Country-year table where every climate variable trends upward with 1%
/// noise and every rate bends after 15 years under 3% noise.
///
/// Countries are named `C0..`, causes `K0..`.
pub fn trending_table(countries: usize, causes: usize, seed: u64) -> IntegratedTable {
    let mut rng = StdRng::seed_from_u64(seed);
    let unit = Normal::new(0.0, 1.0).unwrap();

    let mut country_col = Vec::new();
    let mut year_col = Vec::new();
    for c in 0..countries {
        for year in HISTORY {
            country_col.push(format!("C{}", c));
            year_col.push(year);
        }
    }

    let mut table = IntegratedTable::new(country_col.clone(), year_col.clone()).unwrap();
    for (i, variable) in DEFAULT_CLIMATE_VARIABLES.iter().enumerate() {
        let values = country_col
            .iter()
            .zip(&year_col)
            .map(|(country, year)| {
                let c: f64 = country[1..].parse().unwrap();
                let base = 10.0 * (i + 1) as f64 * (1.0 + 0.05 * c);
                let step = (year - HISTORY.start) as f64;
                let level = base + 0.02 * base * step;
                level + 0.01 * level * unit.sample(&mut rng)
            })
            .collect();
        table = table.with_values(*variable, values).unwrap();
    }

    for k in 0..causes {
        let rates: Vec<Option<f64>> = country_col
            .iter()
            .zip(&year_col)
            .map(|(country, year)| {
                let c: f64 = country[1..].parse().unwrap();
                let step = (year - HISTORY.start) as f64;
                let slope = 0.5 + 0.1 * c;
                let bend = if step > 15.0 { -1.5 * (step - 15.0) } else { 0.0 };
                let level = 100.0 + 10.0 * k as f64 + slope * step + bend;
                Some(level + 0.03 * level * unit.sample(&mut rng))
            })
            .collect();
        let deaths = rates.iter().map(|r| r.map(|v| v * 10.0)).collect();
        table = table
            .with_column(format!("K{}_Rate_per_100k", k), rates)
            .unwrap()
            .with_column(format!("K{}", k), deaths)
            .unwrap();
    }
    table
}
