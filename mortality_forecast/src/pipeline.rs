//! Batch orchestration over (country, cause) series
//!
//! The batch is an explicit list of [`SeriesTask`]s, country outer and cause
//! inner. Each task runs extraction, climate projection, fitting and
//! prediction on its own and yields either a forecast or a typed
//! [`SeriesFailure`]; a failed task never stops the others. The output table
//! follows task order whether the tasks ran sequentially or in parallel.

use crate::climate::ClimateTrendExtrapolator;
use crate::config::ForecastConfig;
use crate::data::{rank_top_causes, IntegratedTable};
use crate::error::{ForecastError, Result, SeriesFailure, SeriesResult};
use crate::metrics::{evaluate_fit, FitDiagnostics, TrendSummary};
use crate::models::{
    AdditiveTrendModel, FitBudget, ForecastModel, ForecastResult, TrainedForecastModel,
};
use crate::output::ForecastTable;
use crate::series::SeriesExtractor;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;

/// One unit of work: forecast `cause` for `country`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SeriesTask {
    pub country: String,
    pub cause: String,
}

/// A successful series forecast with its fit diagnostics
#[derive(Debug, Clone)]
pub struct SeriesForecast {
    pub forecast: ForecastResult,
    pub diagnostics: Option<FitDiagnostics>,
    pub summary: Option<TrendSummary>,
}

/// Result of one task
#[derive(Debug, Clone)]
pub struct SeriesOutcome {
    pub task: SeriesTask,
    pub result: SeriesResult<SeriesForecast>,
}

/// A series left out of the output, with the reason
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedSeries {
    pub country: String,
    pub cause: String,
    pub reason: SeriesFailure,
}

/// Forecasts generated for one country
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryProgress {
    pub country: String,
    pub succeeded: usize,
    pub attempted: usize,
}

/// Everything a batch run produced
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub model: String,
    pub causes: Vec<String>,
    pub attempted: usize,
    pub succeeded: usize,
    pub countries: Vec<CountryProgress>,
    pub failures: Vec<FailedSeries>,
    pub diagnostics: Vec<FitDiagnostics>,
    pub summaries: Vec<TrendSummary>,
    #[serde(skip)]
    pub table: ForecastTable,
}

/// Runs the per-series pipeline over every selected country and cause
#[derive(Debug, Clone)]
pub struct BatchForecaster<M: ForecastModel = AdditiveTrendModel> {
    config: ForecastConfig,
    model: M,
    extractor: SeriesExtractor,
    extrapolator: ClimateTrendExtrapolator,
}

impl BatchForecaster<AdditiveTrendModel> {
    /// Create an orchestrator using the additive trend model from `config`
    pub fn new(config: ForecastConfig) -> Result<Self> {
        let model = AdditiveTrendModel::new(config.model.clone())?;
        Self::with_model(config, model)
    }
}

impl<M: ForecastModel> BatchForecaster<M> {
    pub fn with_model(config: ForecastConfig, model: M) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            extractor: SeriesExtractor::new(config.climate_variables.clone()),
            extrapolator: ClimateTrendExtrapolator::new(config.horizon),
            config,
            model,
        })
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Causes to forecast: the configured list, or the top-ranked causes by
    /// total deaths in `table`
    pub fn resolve_causes(&self, table: &IntegratedTable) -> Result<Vec<String>> {
        if let Some(causes) = &self.config.causes {
            return Ok(causes.clone());
        }

        let ranked = rank_top_causes(table, self.config.top_causes)?;
        info!("Top {} causes by total deaths:", ranked.len());
        for (rank, cause) in ranked.iter().enumerate() {
            info!("  {:>2}. {} ({:.0})", rank + 1, cause.cause, cause.total_deaths);
        }
        Ok(ranked.into_iter().map(|r| r.cause).collect())
    }

    /// Cross product of countries and causes, country outer
    pub fn tasks(&self, causes: &[String]) -> Vec<SeriesTask> {
        self.config
            .countries
            .iter()
            .flat_map(|country| {
                causes.iter().map(move |cause| SeriesTask {
                    country: country.clone(),
                    cause: cause.clone(),
                })
            })
            .collect()
    }

    /// Run every stage for one series
    pub fn forecast_series(&self, table: &IntegratedTable, task: &SeriesTask) -> SeriesOutcome {
        SeriesOutcome {
            task: task.clone(),
            result: self.run_stages(table, task),
        }
    }

    fn run_stages(&self, table: &IntegratedTable, task: &SeriesTask) -> SeriesResult<SeriesForecast> {
        let series = self.extractor.extract(table, &task.country, &task.cause)?;
        let projection = self.extrapolator.project(&series)?;

        let budget = FitBudget::start(self.config.fit_timeout());
        let trained = self.model.train(&series, &budget)?;
        let forecast = trained.predict(&projection)?;

        let diagnostics = match evaluate_fit(&series, &trained) {
            Ok(d) => {
                debug!(
                    "{} / {}: in-sample MAE {:.4}, RMSE {:.4}",
                    task.country, task.cause, d.accuracy.mae, d.accuracy.rmse
                );
                Some(d)
            }
            Err(e) => {
                debug!("{} / {}: no fit diagnostics: {}", task.country, task.cause, e);
                None
            }
        };
        let summary = TrendSummary::from_forecast(&series, &forecast);

        Ok(SeriesForecast {
            forecast,
            diagnostics,
            summary,
        })
    }

    /// Forecast every task and assemble the report.
    ///
    /// Fails only when no series succeeds.
    pub fn run(&self, table: &IntegratedTable) -> Result<BatchReport> {
        let causes = self.resolve_causes(table)?;
        let tasks = self.tasks(&causes);
        info!(
            "Forecasting {} series ({} countries x {} causes) for {}-{} with {}",
            tasks.len(),
            self.config.countries.len(),
            causes.len(),
            self.config.horizon.start_year,
            self.config.horizon.end_year(),
            self.model.name()
        );

        let outcomes = self.execute(table, &tasks)?;
        let report = self.assemble(causes, outcomes);

        if report.succeeded == 0 {
            return Err(ForecastError::NoSuccessfulSeries {
                attempted: report.attempted,
            });
        }
        info!(
            "Generated {} of {} forecasts ({} rows)",
            report.succeeded,
            report.attempted,
            report.table.len()
        );
        Ok(report)
    }

    fn execute(&self, table: &IntegratedTable, tasks: &[SeriesTask]) -> Result<Vec<SeriesOutcome>> {
        if !self.config.parallel {
            return Ok(tasks
                .iter()
                .map(|task| self.forecast_series(table, task))
                .collect());
        }

        let run = || {
            tasks
                .par_iter()
                .map(|task| self.forecast_series(table, task))
                .collect::<Vec<_>>()
        };
        match self.config.threads {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| {
                        ForecastError::InvalidParameter(format!("Cannot build worker pool: {}", e))
                    })?;
                Ok(pool.install(run))
            }
            None => Ok(run()),
        }
    }

    fn assemble(&self, causes: Vec<String>, outcomes: Vec<SeriesOutcome>) -> BatchReport {
        let mut table = ForecastTable::new();
        let mut failures = Vec::new();
        let mut diagnostics = Vec::new();
        let mut summaries = Vec::new();
        let mut countries: Vec<CountryProgress> = Vec::new();

        for outcome in &outcomes {
            let task = &outcome.task;
            let index = match countries.iter().position(|c| c.country == task.country) {
                Some(index) => index,
                None => {
                    countries.push(CountryProgress {
                        country: task.country.clone(),
                        succeeded: 0,
                        attempted: 0,
                    });
                    countries.len() - 1
                }
            };
            let progress = &mut countries[index];
            progress.attempted += 1;

            match &outcome.result {
                Ok(done) => {
                    progress.succeeded += 1;
                    table.push_forecast(&task.country, &task.cause, &done.forecast);
                    diagnostics.extend(done.diagnostics.clone());
                    summaries.extend(done.summary.clone());
                }
                Err(reason) => {
                    warn!(
                        "Error predicting {} for {}: {} ({})",
                        task.cause,
                        task.country,
                        reason,
                        reason.kind()
                    );
                    failures.push(FailedSeries {
                        country: task.country.clone(),
                        cause: task.cause.clone(),
                        reason: reason.clone(),
                    });
                }
            }
        }

        for progress in &countries {
            info!(
                "{}: generated {} of {} forecasts",
                progress.country, progress.succeeded, progress.attempted
            );
        }

        BatchReport {
            model: self.model.name().to_string(),
            causes,
            attempted: outcomes.len(),
            succeeded: outcomes.len() - failures.len(),
            countries,
            failures,
            diagnostics,
            summaries,
            table,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ForecastHorizon;
    use pretty_assertions::assert_eq;

    fn config(countries: &[&str], causes: Option<&[&str]>) -> ForecastConfig {
        ForecastConfig {
            countries: countries.iter().map(|c| c.to_string()).collect(),
            causes: causes.map(|c| c.iter().map(|s| s.to_string()).collect()),
            climate_variables: vec!["Temperature_C".into()],
            horizon: ForecastHorizon::new(2020, 3),
            ..ForecastConfig::default()
        }
    }

    fn table() -> IntegratedTable {
        let mut countries = Vec::new();
        let mut years = Vec::new();
        for country in ["A", "B"] {
            for year in 1990..2010 {
                countries.push(country.to_string());
                years.push(year);
            }
        }
        let rate: Vec<f64> = years.iter().map(|y| 10.0 + 0.5 * (y - 1990) as f64).collect();
        IntegratedTable::new(countries, years.clone())
            .unwrap()
            .with_values("X_Rate_per_100k", rate.clone())
            .unwrap()
            .with_values("X", rate.iter().map(|r| r * 100.0).collect())
            .unwrap()
            .with_values("Y_Rate_per_100k", vec![1.0; 40])
            .unwrap()
            .with_values("Y", vec![1.0; 40])
            .unwrap()
            .with_values("Temperature_C", years.iter().map(|y| 0.01 * *y as f64).collect())
            .unwrap()
    }

    #[test]
    fn test_tasks_are_country_major() {
        let forecaster = BatchForecaster::new(config(&["B", "A"], Some(&["X", "Y"]))).unwrap();
        let causes = forecaster.resolve_causes(&table()).unwrap();
        let tasks: Vec<(String, String)> = forecaster
            .tasks(&causes)
            .into_iter()
            .map(|t| (t.country, t.cause))
            .collect();

        assert_eq!(
            tasks,
            vec![
                ("B".to_string(), "X".to_string()),
                ("B".to_string(), "Y".to_string()),
                ("A".to_string(), "X".to_string()),
                ("A".to_string(), "Y".to_string()),
            ]
        );
    }

    #[test]
    fn test_causes_are_ranked_when_not_configured() {
        let mut cfg = config(&["A"], None);
        cfg.top_causes = 1;
        let forecaster = BatchForecaster::new(cfg).unwrap();
        assert_eq!(forecaster.resolve_causes(&table()).unwrap(), vec!["X".to_string()]);
    }

    #[test]
    fn test_unknown_country_is_a_series_failure() {
        let forecaster = BatchForecaster::new(config(&["A", "Atlantis"], Some(&["X"]))).unwrap();
        let report = forecaster.run(&table()).unwrap();

        assert_eq!(report.attempted, 2);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.table.len(), 3);
        assert_eq!(
            report.failures,
            vec![FailedSeries {
                country: "Atlantis".into(),
                cause: "X".into(),
                reason: SeriesFailure::UnknownCountry("Atlantis".into()),
            }]
        );
        assert_eq!(
            report.countries[1],
            CountryProgress {
                country: "Atlantis".into(),
                succeeded: 0,
                attempted: 1
            }
        );
    }

    #[test]
    fn test_all_failures_is_fatal() {
        let forecaster = BatchForecaster::new(config(&["Atlantis"], Some(&["X"]))).unwrap();
        assert!(matches!(
            forecaster.run(&table()),
            Err(ForecastError::NoSuccessfulSeries { attempted: 1 })
        ));
    }

    #[test]
    fn test_sequential_and_parallel_agree() {
        let mut sequential = config(&["A", "B"], Some(&["X", "Y"]));
        sequential.parallel = false;
        let mut pooled = sequential.clone();
        pooled.parallel = true;
        pooled.threads = Some(2);

        let first = BatchForecaster::new(sequential).unwrap().run(&table()).unwrap();
        let second = BatchForecaster::new(pooled).unwrap().run(&table()).unwrap();
        assert_eq!(first.table, second.table);
        assert_eq!(first.summaries.len(), 4);
        assert_eq!(first.diagnostics.len(), 4);
    }
}
