use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use nws_forecast_table::config::DEFAULT_CONFIG_PATH;
use nws_forecast_table::ingest::http::build_client;
use nws_forecast_table::logging;
use nws_forecast_table::output::{CurrentConditions, DEFAULT_OUTPUT_PATH};
use nws_forecast_table::pipeline::{self, RunOptions};

#[derive(Parser, Debug)]
#[command(name = "nws_forecast_table")]
#[command(about = "Fetch the NWS hourly forecast for a location and write it as a JSON table")]
#[command(version)]
struct Cli {
    /// Configuration file (YAML, or TOML with a .toml extension)
    #[arg(long, env = "WEATHER_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Parse this DWML document instead of fetching one
    #[arg(long, value_name = "FORECAST_XML")]
    input: Option<PathBuf>,

    /// Where to write the assembled forecast
    #[arg(long, value_name = "OUTPUT_JSON", default_value = DEFAULT_OUTPUT_PATH)]
    output: PathBuf,

    /// Sleep a random 0..=SECONDS before fetching
    #[arg(long, value_name = "SECONDS", default_value_t = 0)]
    delay: u64,

    /// Print current conditions after writing the output
    #[arg(long)]
    summary: bool,

    /// Also append log lines to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let _log_guard = logging::init_logging(cli.verbose, cli.log_file.as_deref());

    let options = RunOptions {
        config_path: cli.config,
        input: cli.input,
        output: cli.output,
        max_delay: Duration::from_secs(cli.delay),
    };

    // Failures are already logged with their source by the pipeline.
    match pipeline::run_to_file(&options, |config| build_client(config.user_agent(), None)) {
        Ok(document) => {
            if cli.summary {
                if let Some(current) = CurrentConditions::from_output(&document) {
                    println!("{}", current.summary());
                }
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}
