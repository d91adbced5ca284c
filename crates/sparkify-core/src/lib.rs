//! sparkify-core: plumbing shared by the sparkify loader.
//!
//! - `storage/` - object storage abstraction (S3, local)
//! - `metrics/` - metrics events and the optional Prometheus exporter
//! - `config/` - YAML loading, environment variable interpolation, CLI args
//! - `partition` - Hive-style partition paths
//! - `error` - common error types

pub mod config;
pub mod error;
pub mod metrics;
pub mod partition;
pub mod storage;
pub mod tracing;

// Re-export commonly used items
pub use config::{CliArgs, MetricsConfig, ParquetCompression, load_yaml, parse_yaml};
pub use error::{ConfigError, MetricsError, StorageError};
pub use self::metrics::init as init_metrics;
pub use partition::{DEFAULT_PARTITION, PartitionExtractor, partition_prefix};
pub use storage::{StorageProvider, StorageProviderRef};
pub use self::tracing::init_tracing;
