//! Command line arguments and config path helpers.

use std::path::PathBuf;

use clap::Parser;

/// Check if a path has a YAML extension.
pub fn is_yaml_file(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext == "yaml" || ext == "yml")
        .unwrap_or(false)
}

#[derive(Parser, Debug)]
#[command(version, about = "Build the sparkify star schema from raw song and log data")]
pub struct CliArgs {
    /// Path to the YAML configuration file
    #[arg(short, long)]
    pub config: PathBuf,

    /// Override the input root from the config file
    #[arg(long)]
    pub input: Option<String>,

    /// Override the output root from the config file
    #[arg(long)]
    pub output: Option<String>,
}
