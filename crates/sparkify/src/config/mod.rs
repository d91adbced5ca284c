//! Configuration for the sparkify loader.

use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::collections::HashMap;
use std::path::Path;

use crate::engine::DEFAULT_PARTITION_ROWS;
use crate::error::ConfigError;
use crate::sink::parquet::{DEFAULT_MAX_ROWS_PER_FILE, ParquetWriterConfig};
use crate::sink::writer::DEFAULT_MAX_CONCURRENT_UPLOADS;
use crate::source::DEFAULT_MAX_CONCURRENT_FILES;
use crate::transform::UserLevelPolicy;
pub use sparkify_core::config::{MetricsConfig, ParquetCompression};
use sparkify_core::error::{
    EmptyInputPathSnafu, EmptyOutputPathSnafu, InvalidMatchRateSnafu, ZeroConcurrencySnafu,
};

/// Where the raw corpora live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputConfig {
    /// Input root (S3 or local).
    pub path: String,
    /// Storage options for the input store (credentials, region, etc.)
    #[serde(default)]
    pub storage_options: HashMap<String, String>,
    /// Maximum concurrent file downloads.
    #[serde(default = "default_max_concurrent_files")]
    pub max_concurrent_files: usize,
    /// Song metadata directory under the input root.
    #[serde(default = "default_song_prefix")]
    pub song_prefix: String,
    /// Activity log directory under the input root.
    #[serde(default = "default_log_prefix")]
    pub log_prefix: String,
}

fn default_max_concurrent_files() -> usize {
    DEFAULT_MAX_CONCURRENT_FILES
}

fn default_song_prefix() -> String {
    "song_data".to_string()
}

fn default_log_prefix() -> String {
    "log_data".to_string()
}

/// Where and how the tables are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Output root (S3 or local). Each table is a directory below it.
    pub path: String,
    /// Storage options for the output store.
    #[serde(default)]
    pub storage_options: HashMap<String, String>,
    /// Parquet compression codec.
    #[serde(default)]
    pub compression: ParquetCompression,
    /// Maximum concurrent file uploads.
    #[serde(default = "default_max_concurrent_uploads")]
    pub max_concurrent_uploads: usize,
    /// Rows per file before a partition is split.
    #[serde(default = "default_max_rows_per_file")]
    pub max_rows_per_file: usize,
}

fn default_max_concurrent_uploads() -> usize {
    DEFAULT_MAX_CONCURRENT_UPLOADS
}

fn default_max_rows_per_file() -> usize {
    DEFAULT_MAX_ROWS_PER_FILE
}

impl OutputConfig {
    pub fn writer_config(&self) -> ParquetWriterConfig {
        ParquetWriterConfig::default()
            .with_compression(self.compression)
            .with_max_rows_per_file(self.max_rows_per_file)
    }
}

/// Transform behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransformConfig {
    /// How users with several levels are represented.
    #[serde(default)]
    pub user_level_policy: UserLevelPolicy,
    /// Worker threads for transforms. 0 uses one per core.
    #[serde(default)]
    pub parallelism: usize,
    /// Rows per in-memory partition.
    #[serde(default = "default_partition_rows")]
    pub partition_rows: usize,
}

fn default_partition_rows() -> usize {
    DEFAULT_PARTITION_ROWS
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            user_level_policy: UserLevelPolicy::default(),
            parallelism: 0,
            partition_rows: DEFAULT_PARTITION_ROWS,
        }
    }
}

/// Songplay join reporting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinConfig {
    /// Warn when fewer than this fraction of play events match a song.
    #[serde(default)]
    pub min_match_rate_warn: f64,
}

/// Main configuration for sparkify.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub input: InputConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub transform: TransformConfig,
    #[serde(default)]
    pub join: JoinConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load and validate configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config: Config = sparkify_core::load_yaml(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = sparkify_core::parse_yaml(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(!self.input.path.is_empty(), EmptyInputPathSnafu);
        ensure!(!self.output.path.is_empty(), EmptyOutputPathSnafu);

        for (field, value) in [
            ("input.max_concurrent_files", self.input.max_concurrent_files),
            ("output.max_concurrent_uploads", self.output.max_concurrent_uploads),
            ("output.max_rows_per_file", self.output.max_rows_per_file),
            ("transform.partition_rows", self.transform.partition_rows),
        ] {
            ensure!(value > 0, ZeroConcurrencySnafu { field });
        }

        let rate = self.join.min_match_rate_warn;
        ensure!(
            (0.0..=1.0).contains(&rate),
            InvalidMatchRateSnafu { value: rate }
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
input:
  path: s3://udacity-dend
output:
  path: /tmp/sparkify
"#;

    #[test]
    fn test_parse_minimal_config_uses_defaults() {
        let config = Config::parse(MINIMAL).unwrap();

        assert_eq!(config.input.song_prefix, "song_data");
        assert_eq!(config.input.log_prefix, "log_data");
        assert_eq!(config.input.max_concurrent_files, DEFAULT_MAX_CONCURRENT_FILES);
        assert_eq!(config.output.compression, ParquetCompression::Snappy);
        assert_eq!(config.transform.user_level_policy, UserLevelPolicy::Distinct);
        assert_eq!(config.transform.partition_rows, DEFAULT_PARTITION_ROWS);
        assert_eq!(config.join.min_match_rate_warn, 0.0);
        assert!(config.metrics.address.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
input:
  path: s3://udacity-dend
  storage_options:
    aws_region: us-west-2
  max_concurrent_files: 32
output:
  path: s3://sparkify-lake/star
  compression: zstd
  max_concurrent_uploads: 4
transform:
  user_level_policy: latest
  parallelism: 2
join:
  min_match_rate_warn: 0.05
metrics:
  address: 0.0.0.0:9090
"#;
        let config = Config::parse(yaml).unwrap();

        assert_eq!(config.input.storage_options["aws_region"], "us-west-2");
        assert_eq!(config.input.max_concurrent_files, 32);
        assert_eq!(config.output.compression, ParquetCompression::Zstd);
        assert_eq!(config.output.max_concurrent_uploads, 4);
        assert_eq!(config.transform.user_level_policy, UserLevelPolicy::Latest);
        assert_eq!(config.transform.parallelism, 2);
        assert_eq!(config.metrics.address.as_deref(), Some("0.0.0.0:9090"));
        assert_eq!(
            config.output.writer_config().compression,
            ParquetCompression::Zstd
        );
    }

    #[test]
    fn test_empty_output_path_rejected() {
        let err = Config::parse("input:\n  path: /data\noutput:\n  path: \"\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::EmptyOutputPath));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let yaml = format!("{MINIMAL}  max_concurrent_uploads: 0\n");
        let err = Config::parse(&yaml).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ZeroConcurrency { ref field } if field == "output.max_concurrent_uploads"
        ));
    }

    #[test]
    fn test_match_rate_out_of_range_rejected() {
        let yaml = format!("{MINIMAL}join:\n  min_match_rate_warn: 1.5\n");
        let err = Config::parse(&yaml).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidMatchRate { .. }));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = format!("{MINIMAL}transform:\n  engine: spark\n");
        assert!(matches!(
            Config::parse(&yaml).unwrap_err(),
            ConfigError::YamlParse { .. }
        ));
    }
}
