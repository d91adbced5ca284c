//! Sparkify: batch ETL from raw song and listening-log JSON to a Parquet
//! star schema.
//!
//! This crate handles:
//! - Reading raw song metadata and log events (plain or gzipped JSON) from
//!   local or S3 storage
//! - Validating records against static field manifests
//! - Extracting the songs, artists, users and time dimensions
//! - Joining play events to songs to build the songplays fact table
//! - Writing each table as Hive-partitioned Parquet with a `_SUCCESS` marker

pub mod config;
pub mod engine;
pub mod error;
pub mod join;
pub mod model;
pub mod pipeline;
pub mod schema;
pub mod sink;
pub mod source;
pub mod transform;

// Re-export commonly used items
pub use config::Config;
pub use engine::Dataset;
pub use error::PipelineError;
pub use pipeline::{PipelineStats, run_pipeline};

// Re-export from sparkify-core
pub use sparkify_core::{
    CliArgs, MetricsConfig, ParquetCompression, StorageProvider, StorageProviderRef, init_metrics,
    init_tracing,
};
