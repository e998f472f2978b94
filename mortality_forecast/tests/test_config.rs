use mortality_forecast::config::{ForecastConfig, DEFAULT_COUNTRIES};
use mortality_forecast::error::{ForecastError, SeriesFailure};
use pretty_assertions::assert_eq;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

#[test]
fn test_partial_json_takes_defaults() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"{{ "countries": ["Japan", "Brazil"], "top_causes": 3, "model": {{ "seed": 9 }} }}"#
    )
    .unwrap();

    let config = ForecastConfig::from_json_file(file.path()).unwrap();
    assert_eq!(config.countries, vec!["Japan".to_string(), "Brazil".to_string()]);
    assert_eq!(config.top_causes, 3);
    assert_eq!(config.model.seed, 9);
    assert_eq!(config.model.changepoint_prior_scale, 0.05);
    assert_eq!(config.horizon.years(), (2020..=2030).collect::<Vec<_>>());
    assert_eq!(config.fit_timeout(), Some(Duration::from_secs(30)));
}

#[test]
fn test_invalid_json_config() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, r#"{{ "countries": [] }}"#).unwrap();
    assert!(matches!(
        ForecastConfig::from_json_file(file.path()),
        Err(ForecastError::InvalidParameter(_))
    ));

    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "not json").unwrap();
    assert!(matches!(
        ForecastConfig::from_json_file(file.path()),
        Err(ForecastError::JsonError(_))
    ));
}

#[test]
fn test_default_config() {
    let config = ForecastConfig::default();
    assert_eq!(config.countries.len(), DEFAULT_COUNTRIES.len());
    assert_eq!(config.climate_variables.len(), 5);
    assert!(config.validate().is_ok());
}

#[test]
fn test_series_failure_serializes_with_kind() {
    let failure = SeriesFailure::MissingColumn("Malaria_Rate_per_100k".into());
    let json = serde_json::to_value(&failure).unwrap();
    assert_eq!(json["kind"], "missing_column");
    assert_eq!(json["detail"], "Malaria_Rate_per_100k");
    assert_eq!(failure.kind(), "missing_column");

    let timeout = SeriesFailure::TimedOut { millis: 1500 };
    assert_eq!(timeout.to_string(), "fit exceeded the time budget of 1500 ms");
    let back: SeriesFailure =
        serde_json::from_value(serde_json::to_value(&timeout).unwrap()).unwrap();
    assert_eq!(back, timeout);
}
