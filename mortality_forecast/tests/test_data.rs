mod common;

use mortality_forecast::climate::ClimateTrendExtrapolator;
use mortality_forecast::config::ForecastHorizon;
use mortality_forecast::data::{rank_top_causes, DataLoader};
use mortality_forecast::error::{ForecastError, SeriesFailure};
use mortality_forecast::series::SeriesExtractor;
use polars::prelude::*;
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::fs::File;
use std::io::Write;
use tempfile::{tempdir, NamedTempFile};

fn csv_file(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file.flush().unwrap();
    file
}

#[test]
fn test_data_loader_from_csv() {
    let file = common::write_csv(&["A", "B"]);
    let table = DataLoader::from_csv(file.path()).unwrap();

    assert_eq!(table.len(), 60);
    assert_eq!(table.distinct_countries(), vec!["A", "B"]);
    assert_eq!(table.year_range(), Some((1990, 2019)));
    assert!(table.has_column("Temperature_C"));
    assert!(table.has_column("X_Rate_per_100k"));
    // Non-numeric columns other than the keys are dropped.
    assert!(!table.has_column("Code"));
}

#[test]
fn test_data_loader_keeps_missing_values() {
    let file = csv_file(&[
        "Country/Territory,Year,Temperature_C,X_Rate_per_100k",
        "A,1990,10.0,1.5",
        "A,1991,,2.5",
        "A,1992,11.0,",
    ]);
    let table = DataLoader::from_path(file.path()).unwrap();

    assert_eq!(
        table.column("Temperature_C").unwrap(),
        &[Some(10.0), None, Some(11.0)]
    );
    assert_eq!(
        table.column("X_Rate_per_100k").unwrap(),
        &[Some(1.5), Some(2.5), None]
    );
}

#[rstest]
#[case::missing_country_column(&["Country,Year,X", "A,1990,1.0"])]
#[case::missing_year_column(&["Country/Territory,Period,X", "A,1990,1.0"])]
#[case::duplicate_country_year(&["Country/Territory,Year,X", "A,1990,1.0", "A,1990,2.0"])]
#[case::null_country(&["Country/Territory,Year,X", "A,1990,1.0", ",1991,2.0"])]
fn test_malformed_tables_are_rejected(#[case] lines: &[&str]) {
    let file = csv_file(lines);
    let result = DataLoader::from_csv(file.path());
    assert!(
        matches!(result, Err(ForecastError::DataError(_))),
        "{:?}",
        result
    );
}

#[test]
fn test_data_loader_from_parquet() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("integrated.parquet");

    let mut df = df!(
        "Country/Territory" => &["A", "A", "B"],
        "Year" => &[1990i64, 1991, 1990],
        "Temperature_C" => &[10.0, 10.5, 25.0],
        "Stroke" => &[100.0, 110.0, 50.0],
        "Stroke_Rate_per_100k" => &[1.0, 1.1, 0.5]
    )
    .unwrap();
    ParquetWriter::new(File::create(&path).unwrap())
        .finish(&mut df)
        .unwrap();

    let table = DataLoader::from_path(&path).unwrap();
    assert_eq!(table.len(), 3);
    assert_eq!(table.years(), &[1990, 1991, 1990]);
    assert_eq!(table.rows_for("A"), vec![0, 1]);

    let ranked = rank_top_causes(&table, 10).unwrap();
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].cause, "Stroke");
    assert_eq!(ranked[0].total_deaths, 260.0);
}

#[test]
fn test_rank_top_causes_from_csv() {
    let file = csv_file(&[
        "Country/Territory,Year,Malaria,Malaria_Rate_per_100k,Stroke,Stroke_Rate_per_100k,Burns,Burns_Rate_per_100k,Drowning",
        "A,1990,5,0.5,40,4.0,7,0.7,3",
        "B,1990,30,3.0,10,1.0,,,9",
    ]);
    let table = DataLoader::from_csv(file.path()).unwrap();

    let ranked: Vec<String> = rank_top_causes(&table, 2)
        .unwrap()
        .into_iter()
        .map(|r| r.cause)
        .collect();
    // Drowning has no rate column and is never a candidate.
    assert_eq!(ranked, vec!["Stroke".to_string(), "Malaria".to_string()]);
}

#[test]
fn test_extraction_and_projection_are_repeatable() {
    let file = common::write_csv(&["A", "B"]);
    let table = DataLoader::from_csv(file.path()).unwrap();
    let extractor = SeriesExtractor::new(vec!["Temperature_C".into(), "Wind_Speed_ms".into()]);
    let extrapolator = ClimateTrendExtrapolator::new(ForecastHorizon::default());

    let first = extractor.extract(&table, "B", "X").unwrap();
    let second = extractor.extract(&table, "B", "X").unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 30);
    assert_eq!(
        extrapolator.project(&first).unwrap(),
        extrapolator.project(&second).unwrap()
    );

    assert_eq!(
        extractor.extract(&table, "C", "X"),
        Err(SeriesFailure::UnknownCountry("C".into()))
    );
}
