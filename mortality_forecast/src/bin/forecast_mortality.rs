//! forecast-mortality - forecast cause-specific mortality rates from an
//! integrated country-year table.

use anyhow::Context;
use clap::Parser;
use log::info;
use mortality_forecast::config::ForecastConfig;
use mortality_forecast::data::DataLoader;
use mortality_forecast::output::write_json_report;
use mortality_forecast::pipeline::BatchForecaster;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "forecast-mortality",
    version,
    about = "Forecast mortality rates conditioned on extrapolated climate trends"
)]
struct Cli {
    /// Integrated country-year table (.csv or .parquet)
    #[arg(short, long)]
    input: PathBuf,

    /// Where to write the forecast table
    #[arg(short, long, default_value = "results/mortality_predictions_2020_2030.csv")]
    output: PathBuf,

    /// JSON configuration file; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write a JSON run report with failures and fit diagnostics
    #[arg(long)]
    report: Option<PathBuf>,

    /// Comma-separated countries to forecast
    #[arg(long, value_delimiter = ',')]
    countries: Option<Vec<String>>,

    /// Comma-separated causes, instead of ranking by total deaths
    #[arg(long, value_delimiter = ',')]
    causes: Option<Vec<String>>,

    /// Number of top causes to forecast when ranking
    #[arg(long)]
    top_causes: Option<usize>,

    /// Worker threads
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Forecast one series at a time
    #[arg(long)]
    sequential: bool,

    /// Seed for interval simulation
    #[arg(long)]
    seed: Option<u64>,

    /// Per-series fit time limit in seconds; 0 disables it
    #[arg(long)]
    timeout_secs: Option<u64>,
}

impl Cli {
    fn config(&self) -> anyhow::Result<ForecastConfig> {
        let mut config = match &self.config {
            Some(path) => ForecastConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => ForecastConfig::default(),
        };

        if let Some(countries) = &self.countries {
            config.countries = countries.clone();
        }
        if let Some(causes) = &self.causes {
            config.causes = Some(causes.clone());
        }
        if let Some(top_causes) = self.top_causes {
            config.top_causes = top_causes;
        }
        if let Some(jobs) = self.jobs {
            config.threads = Some(jobs);
        }
        if self.sequential {
            config.parallel = false;
        }
        if let Some(seed) = self.seed {
            config.model.seed = seed;
        }
        if let Some(secs) = self.timeout_secs {
            config.fit_timeout_secs = if secs == 0 { None } else { Some(secs) };
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let config = cli.config()?;

    let table = DataLoader::from_path(&cli.input)
        .with_context(|| format!("Failed to load {}", cli.input.display()))?;
    if let Some((first, last)) = table.year_range() {
        info!(
            "Loaded {} rows for {} countries ({}-{})",
            table.len(),
            table.distinct_countries().len(),
            first,
            last
        );
    }

    let forecaster = BatchForecaster::new(config)?;
    let report = forecaster.run(&table)?;

    report
        .table
        .write_csv(&cli.output)
        .with_context(|| format!("Failed to write {}", cli.output.display()))?;
    info!("Saved {} forecast rows to {}", report.table.len(), cli.output.display());

    if let Some(path) = &cli.report {
        write_json_report(&report, path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Saved run report to {}", path.display());
    }

    Ok(())
}
