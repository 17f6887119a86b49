use clap::Parser;
use epicast::config::Config;
use epicast::data::DataLoader;
use epicast::env::{Environment, ForecastRun};
use epicast::locations::Locations;
use epicast::models::{BayesianLinear, Scaled, HUB_QUANTILES};
use epicast::utils::parse_date;
use epicast::{ForecastError, Result};
use log::info;
use std::path::PathBuf;
use std::process;

#[derive(Parser, Debug)]
#[command(
    name = "epicast",
    about = "Weekly incident case forecasts in hub format",
    long_about = "Builds national, state and county features from raw metric panels, fits one \
                  model per universe and horizon and writes a hub submission CSV."
)]
struct Cli {
    /// Directory of `<MetricName>.csv` panels with dates,id,value columns
    #[arg(long, value_name = "DIR")]
    data_dir: PathBuf,

    /// Location metadata CSV
    #[arg(long, value_name = "FILE")]
    locations: PathBuf,

    /// Forecast date (YYYY-MM-DD), defaults to the local date
    #[arg(long)]
    today: Option<String>,

    /// TOML run configuration; defaults apply when omitted
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory for the hub and visualization files
    #[arg(long, value_name = "DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Weeks back from the end of the grid to forecast from
    #[arg(long, default_value = "0")]
    instance_offset: usize,

    /// Comma separated quantile levels, defaults to the 23 hub levels
    #[arg(long, value_delimiter = ',')]
    quantiles: Option<Vec<f64>>,

    /// Write point forecasts only
    #[arg(long)]
    point_only: bool,

    /// Skip the visualization exports
    #[arg(long)]
    skip_visualization: bool,
}

fn init_logging() {
    let filter = std::env::var("EPICAST_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    env_logger::Builder::new().parse_filters(&filter).init();
}

fn run(cli: Cli) -> Result<()> {
    let today = match &cli.today {
        Some(text) => parse_date(text)?,
        None => chrono::Local::now().date_naive(),
    };
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let locations = Locations::from_csv(&cli.locations)?;
    let env = Environment::new(today, locations, config)?;

    let data = DataLoader::from_dir(&cli.data_dir)?;
    if data.is_empty() {
        return Err(ForecastError::DataError(format!(
            "No metric panels found in {}",
            cli.data_dir.display()
        )));
    }

    let levels = cli.quantiles.unwrap_or_else(|| HUB_QUANTILES.to_vec());
    let mut forecast =
        ForecastRun::new(&env, data, Scaled::new(BayesianLinear::default())).with_quantiles(levels)?;
    forecast.build_features()?;
    forecast.train_models(cli.instance_offset)?;

    let path = forecast.write_hub_csv(&cli.output_dir, cli.instance_offset, !cli.point_only)?;
    info!("Hub submission written to {}", path.display());

    if !cli.skip_visualization {
        let written = forecast.write_visualization(&cli.output_dir, cli.instance_offset)?;
        info!("{} visualization files written", written.len());
    }
    Ok(())
}

fn main() {
    init_logging();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
