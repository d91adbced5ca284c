//! Partitioned table writer.
//!
//! A write replaces the whole table: rows are grouped by their partition
//! values and encoded, the old table is deleted, the new files are uploaded
//! and a `_SUCCESS` marker is written last. A table without the marker is
//! incomplete and must be rewritten.

use futures::stream::{self, StreamExt, TryStreamExt};
use object_store::PutPayload;
use object_store::path::Path;
use rayon::prelude::*;
use snafu::prelude::*;
use sparkify_core::metrics::events::{ParquetFileWritten, RowsWritten};
use sparkify_core::{StorageProviderRef, emit, partition_prefix};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info};

use super::parquet::{FinishedFile, ParquetWriterConfig, encode_partition};
use super::table::{TableRow, TableSpec};
use crate::engine::Dataset;
use crate::error::{
    ArrowSnafu, ObjectPathSnafu, ParquetSnafu, UnknownPartitionColumnSnafu, WriteError,
    WriteFailureSnafu,
};

/// Name of the completion marker written after all table files.
pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// Default number of concurrent file uploads.
pub const DEFAULT_MAX_CONCURRENT_UPLOADS: usize = 8;

/// Summary of one table write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableWriteStats {
    pub rows: usize,
    pub files: usize,
    pub partitions: usize,
    pub bytes: usize,
    /// Objects removed from the previous version of the table.
    pub replaced: usize,
}

/// Writes datasets as Hive-partitioned Parquet tables under an output root.
pub struct PartitionedWriter {
    storage: StorageProviderRef,
    config: ParquetWriterConfig,
    max_concurrent_uploads: usize,
}

impl PartitionedWriter {
    pub fn new(storage: StorageProviderRef, config: ParquetWriterConfig) -> Self {
        Self {
            storage,
            config,
            max_concurrent_uploads: DEFAULT_MAX_CONCURRENT_UPLOADS,
        }
    }

    /// Set the upload concurrency limit.
    pub fn with_max_concurrent_uploads(mut self, limit: usize) -> Self {
        self.max_concurrent_uploads = limit.max(1);
        self
    }

    /// Write a table with its declared partition layout.
    pub async fn write_table<T: TableRow>(
        &self,
        spec: TableSpec,
        rows: &Dataset<T>,
    ) -> Result<TableWriteStats, WriteError> {
        self.write(spec.name, rows, spec.partition_by).await
    }

    /// Replace `table` with `rows`, partitioned by `partition_by` in order.
    pub async fn write<T: TableRow>(
        &self,
        table: &str,
        rows: &Dataset<T>,
        partition_by: &[&str],
    ) -> Result<TableWriteStats, WriteError> {
        let schema = T::schema();
        let mut partition_indices = Vec::with_capacity(partition_by.len());
        for column in partition_by {
            let index = schema
                .index_of(column)
                .ok()
                .context(UnknownPartitionColumnSnafu { table, column: *column })?;
            partition_indices.push(index);
        }
        let data_columns: Vec<usize> = (0..schema.fields().len())
            .filter(|index| !partition_indices.contains(index))
            .collect();

        let files = self.encode(table, rows, partition_by, &data_columns)?;
        let partitions = files
            .iter()
            .map(|f| f.path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or(""))
            .collect::<std::collections::BTreeSet<_>>()
            .len();

        let replaced = self
            .storage
            .delete_prefix(table)
            .await
            .context(WriteFailureSnafu { table })?;
        if replaced > 0 {
            debug!(table, replaced, "Removed previous table version");
        }

        let stats = self.upload(table, files).await?;

        let marker = Path::from(format!("{table}/{SUCCESS_MARKER}"));
        self.storage
            .put_payload(&marker, PutPayload::new())
            .await
            .context(WriteFailureSnafu { table })?;

        let stats = TableWriteStats {
            partitions,
            replaced,
            ..stats
        };
        emit!(RowsWritten {
            rows: stats.rows,
            table: table.to_string(),
        });
        info!(
            table,
            rows = stats.rows,
            files = stats.files,
            partitions = stats.partitions,
            bytes = stats.bytes,
            "Table written"
        );
        Ok(stats)
    }

    /// Group rows by partition and encode every group in parallel.
    fn encode<T: TableRow>(
        &self,
        table: &str,
        rows: &Dataset<T>,
        partition_by: &[&str],
        data_columns: &[usize],
    ) -> Result<Vec<FinishedFile>, WriteError> {
        let start = Instant::now();
        let mut groups: BTreeMap<Vec<Option<String>>, Vec<&T>> = BTreeMap::new();
        for row in rows.iter() {
            let key = partition_by
                .iter()
                .map(|column| row.partition_value(column))
                .collect();
            groups.entry(key).or_default().push(row);
        }

        let files: Vec<Vec<FinishedFile>> = groups
            .into_par_iter()
            .map(|(values, group)| {
                let dir = partition_prefix(
                    &partition_by
                        .iter()
                        .copied()
                        .zip(values)
                        .collect::<Vec<_>>(),
                );
                let batch = T::to_batch(&group)
                    .and_then(|batch| batch.project(data_columns))
                    .context(ArrowSnafu { table })?;
                encode_partition(&dir, &batch, &self.config).context(ParquetSnafu { table })
            })
            .collect::<Result<_, WriteError>>()?;

        let files: Vec<FinishedFile> = files.into_iter().flatten().collect();
        debug!(
            table,
            files = files.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "Encoded table"
        );
        Ok(files)
    }

    async fn upload(
        &self,
        table: &str,
        files: Vec<FinishedFile>,
    ) -> Result<TableWriteStats, WriteError> {
        let uploaded: Vec<(usize, usize)> = stream::iter(files)
            .map(|file| async move {
                // Partition values are already Hive-escaped; `Path::from` would escape `%` again
                let location = format!("{table}/{}", file.path);
                let path = Path::parse(&location).context(ObjectPathSnafu {
                    table,
                    path: &location,
                })?;
                let size = file.size();
                let record_count = file.record_count;
                self.storage
                    .put_parquet(&path, PutPayload::from_bytes(file.bytes))
                    .await
                    .context(WriteFailureSnafu { table })?;

                emit!(ParquetFileWritten {
                    bytes: size,
                    table: table.to_string(),
                });
                Ok::<_, WriteError>((record_count, size))
            })
            .buffer_unordered(self.max_concurrent_uploads)
            .try_collect()
            .await?;

        Ok(TableWriteStats {
            rows: uploaded.iter().map(|(rows, _)| rows).sum(),
            files: uploaded.len(),
            bytes: uploaded.iter().map(|(_, bytes)| bytes).sum(),
            ..Default::default()
        })
    }
}
