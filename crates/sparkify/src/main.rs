//! Sparkify CLI: build the star schema from raw song and log data.

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use sparkify::{CliArgs, Config, init_metrics, init_tracing, run_pipeline};

fn load_config(args: &CliArgs) -> Result<Config, sparkify::error::ConfigError> {
    let mut config = Config::from_file(&args.config)?;
    if let Some(input) = &args.input {
        config.input.path = input.clone();
    }
    if let Some(output) = &args.output {
        config.output.path = output.clone();
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args = CliArgs::parse();
    info!("Loading config from {}", args.config.display());

    let config = match load_config(&args) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(address) = &config.metrics.address {
        if let Err(e) = init_metrics(address) {
            error!("Failed to start metrics exporter: {e}");
            return ExitCode::FAILURE;
        }
    }

    info!(
        "Starting sparkify ({} -> {})",
        config.input.path, config.output.path
    );

    match run_pipeline(&config).await {
        Ok(stats) => {
            for (table, written) in &stats.tables {
                info!(
                    table,
                    rows = written.rows,
                    files = written.files,
                    partitions = written.partitions,
                    "Table written"
                );
            }
            info!(
                match_rate = stats.join.match_rate(),
                duration_secs = stats.duration.as_secs_f64(),
                "Done"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Pipeline failed: {e}");
            ExitCode::FAILURE
        }
    }
}
