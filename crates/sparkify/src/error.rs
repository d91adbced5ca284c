//! Error types for the sparkify loader.

use snafu::prelude::*;

// Re-export common errors
pub use sparkify_core::error::{ConfigError, MetricsError, StorageError};

use crate::schema::MismatchReason;

/// Errors raised while decoding raw input against a schema manifest.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SchemaError {
    /// A record does not satisfy its manifest.
    #[snafu(display("Schema mismatch in {path} (record {record}): field '{field}' {reason}"))]
    SchemaMismatch {
        path: String,
        record: usize,
        field: String,
        reason: MismatchReason,
    },

    /// The file is not a sequence of JSON values.
    #[snafu(display("Malformed JSON in {path} (record {record}): {source}"))]
    MalformedJson {
        path: String,
        record: usize,
        source: serde_json::Error,
    },
}

/// Errors that can occur while reading raw input files.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SourceError {
    /// Listing or downloading from storage failed.
    #[snafu(display("Failed to read input under {prefix}: {source}"))]
    SourceStorage { prefix: String, source: StorageError },

    /// Failed to decompress an input file.
    #[snafu(display("Failed to decompress {path}: {source}"))]
    Decompression {
        path: String,
        source: std::io::Error,
    },

    /// An input file failed schema validation.
    #[snafu(display("{source}"))]
    Decode { source: SchemaError },
}

/// Errors raised by the dimension transforms.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum TransformError {
    /// Two song records share a song_id but disagree on the payload.
    #[snafu(display("Conflicting records for song_id '{song_id}': {first} vs {second}"))]
    ConflictingSong {
        song_id: String,
        first: String,
        second: String,
    },
}

/// Errors that can occur while writing an output table.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum WriteError {
    /// A partition column is not part of the table schema.
    #[snafu(display("Unknown partition column '{column}' for table '{table}'"))]
    UnknownPartitionColumn { table: String, column: String },

    /// Failed to assemble a record batch.
    #[snafu(display("Failed to build record batch for table '{table}': {source}"))]
    Arrow {
        table: String,
        source: arrow::error::ArrowError,
    },

    /// Failed to encode a Parquet file.
    #[snafu(display("Failed to encode Parquet for table '{table}': {source}"))]
    Parquet {
        table: String,
        source: parquet::errors::ParquetError,
    },

    /// A partition directory does not form a valid object path.
    #[snafu(display("Invalid object path '{path}' for table '{table}': {source}"))]
    ObjectPath {
        table: String,
        path: String,
        source: object_store::path::Error,
    },

    /// The output store rejected a write or delete.
    #[snafu(display("Failed to write table '{table}': {source}"))]
    WriteFailure { table: String, source: StorageError },
}

/// Errors that can occur while reading a written table back.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ReadError {
    /// The table has no `_SUCCESS` marker.
    #[snafu(display("Table '{table}' is missing or incomplete"))]
    IncompleteTable { table: String },

    /// Listing or downloading table files failed.
    #[snafu(display("Failed to read table '{table}': {source}"))]
    ReadStorage { table: String, source: StorageError },

    /// A table file could not be decoded.
    #[snafu(display("Failed to decode {path}: {source}"))]
    ParquetRead {
        path: String,
        source: parquet::errors::ParquetError,
    },

    /// A decoded batch could not be assembled.
    #[snafu(display("Failed to assemble batch from {path}: {source}"))]
    BatchDecode {
        path: String,
        source: arrow::error::ArrowError,
    },
}

/// Top-level errors for a pipeline run.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    /// Configuration error.
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },

    /// Could not open an input or output location.
    #[snafu(display("Storage error: {source}"))]
    Storage { source: StorageError },

    /// Reading raw input failed.
    #[snafu(display("Source error: {source}"))]
    Source { source: SourceError },

    /// A transform rejected its input.
    #[snafu(display("Transform error: {source}"))]
    Transform { source: TransformError },

    /// Writing a table failed.
    #[snafu(display("Write error: {source}"))]
    Write { source: WriteError },

    /// Metrics exporter could not start.
    #[snafu(display("Metrics error: {source}"))]
    Metrics { source: MetricsError },

    /// Could not build the worker pool.
    #[snafu(display("Failed to build worker pool: {source}"))]
    WorkerPool {
        source: rayon::ThreadPoolBuildError,
    },

    /// A blocking task panicked or was cancelled.
    #[snafu(display("Worker task failed: {source}"))]
    TaskJoin { source: tokio::task::JoinError },
}

impl From<ConfigError> for PipelineError {
    fn from(source: ConfigError) -> Self {
        PipelineError::Config { source }
    }
}

impl From<StorageError> for PipelineError {
    fn from(source: StorageError) -> Self {
        PipelineError::Storage { source }
    }
}

impl From<SourceError> for PipelineError {
    fn from(source: SourceError) -> Self {
        PipelineError::Source { source }
    }
}

impl From<SchemaError> for PipelineError {
    fn from(source: SchemaError) -> Self {
        PipelineError::Source {
            source: SourceError::Decode { source },
        }
    }
}

impl From<TransformError> for PipelineError {
    fn from(source: TransformError) -> Self {
        PipelineError::Transform { source }
    }
}

impl From<WriteError> for PipelineError {
    fn from(source: WriteError) -> Self {
        PipelineError::Write { source }
    }
}

impl From<MetricsError> for PipelineError {
    fn from(source: MetricsError) -> Self {
        PipelineError::Metrics { source }
    }
}
