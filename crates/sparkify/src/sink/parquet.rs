//! Parquet encoding of table partitions.
//!
//! Each partition directory is encoded in memory and uploaded as whole files.
//! Large partitions are split into several files by row count.

use arrow::array::RecordBatch;
use bytes::Bytes;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::errors::ParquetError;
use parquet::file::properties::WriterProperties;
use sparkify_core::metrics::events::ParquetEncodeCompleted;
use sparkify_core::{ParquetCompression, emit};
use std::time::Instant;
use uuid::Uuid;

/// Default upper bound on rows per output file.
pub const DEFAULT_MAX_ROWS_PER_FILE: usize = 1_000_000;

/// Default rows per Parquet row group.
pub const DEFAULT_ROW_GROUP_ROWS: usize = 128 * 1024;

/// Configuration for the Parquet encoder.
#[derive(Debug, Clone)]
pub struct ParquetWriterConfig {
    /// Compression codec.
    pub compression: ParquetCompression,
    /// Rows per file before a partition is split into another file.
    pub max_rows_per_file: usize,
    /// Rows per row group.
    pub row_group_rows: usize,
}

impl Default for ParquetWriterConfig {
    fn default() -> Self {
        Self {
            compression: ParquetCompression::Snappy,
            max_rows_per_file: DEFAULT_MAX_ROWS_PER_FILE,
            row_group_rows: DEFAULT_ROW_GROUP_ROWS,
        }
    }
}

impl ParquetWriterConfig {
    /// Set the compression codec.
    pub fn with_compression(mut self, compression: ParquetCompression) -> Self {
        self.compression = compression;
        self
    }

    /// Set the maximum rows per file.
    pub fn with_max_rows_per_file(mut self, rows: usize) -> Self {
        self.max_rows_per_file = rows.max(1);
        self
    }

    fn writer_properties(&self) -> WriterProperties {
        let compression = match self.compression {
            ParquetCompression::Uncompressed => Compression::UNCOMPRESSED,
            ParquetCompression::Snappy => Compression::SNAPPY,
            ParquetCompression::Gzip => Compression::GZIP(GzipLevel::default()),
            ParquetCompression::Zstd => Compression::ZSTD(ZstdLevel::default()),
            ParquetCompression::Lz4 => Compression::LZ4,
        };

        WriterProperties::builder()
            .set_compression(compression)
            .set_max_row_group_size(self.row_group_rows.max(1))
            .build()
    }
}

/// An encoded file ready to upload.
#[derive(Debug, Clone)]
pub struct FinishedFile {
    /// Path relative to the table directory, e.g. `year=2018/month=11/part-<uuid>.parquet`.
    pub path: String,
    pub bytes: Bytes,
    pub record_count: usize,
}

impl FinishedFile {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// File name for a new part file.
pub fn part_file_name() -> String {
    format!("part-{}.parquet", Uuid::now_v7())
}

/// Encode one batch as a complete Parquet file.
pub fn encode_batch(
    batch: &RecordBatch,
    config: &ParquetWriterConfig,
) -> Result<Bytes, ParquetError> {
    let start = Instant::now();
    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(
        &mut buffer,
        batch.schema(),
        Some(config.writer_properties()),
    )?;
    writer.write(batch)?;
    writer.close()?;

    emit!(ParquetEncodeCompleted {
        duration: start.elapsed(),
    });
    Ok(Bytes::from(buffer))
}

/// Encode a partition's rows, splitting into files of at most
/// `max_rows_per_file` rows. `dir` is the partition prefix, empty for an
/// unpartitioned table.
pub fn encode_partition(
    dir: &str,
    batch: &RecordBatch,
    config: &ParquetWriterConfig,
) -> Result<Vec<FinishedFile>, ParquetError> {
    let max_rows = config.max_rows_per_file.max(1);
    let mut files = Vec::with_capacity(batch.num_rows().div_ceil(max_rows));

    let mut offset = 0;
    while offset < batch.num_rows() {
        let length = max_rows.min(batch.num_rows() - offset);
        let chunk = batch.slice(offset, length);
        let bytes = encode_batch(&chunk, config)?;

        let name = part_file_name();
        let path = if dir.is_empty() {
            name
        } else {
            format!("{dir}/{name}")
        };
        files.push(FinishedFile {
            path,
            bytes,
            record_count: length,
        });
        offset += length;
    }
    Ok(files)
}
