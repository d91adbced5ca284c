//! Read written tables back as Arrow batches.
//!
//! Used to audit a run and by the tests. Partition columns are re-attached
//! from the directory names as nullable string columns, in directory order.

use arrow::array::{ArrayRef, RecordBatch, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use futures::stream::{self, StreamExt, TryStreamExt};
use object_store::path::Path;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use snafu::prelude::*;
use sparkify_core::{PartitionExtractor, StorageProvider};
use std::sync::Arc;

use super::writer::SUCCESS_MARKER;
use crate::error::{
    BatchDecodeSnafu, IncompleteTableSnafu, ParquetReadSnafu, ReadError, ReadStorageSnafu,
};

const READ_CONCURRENCY: usize = 8;

fn attach_partitions(
    batch: RecordBatch,
    columns: &[(String, Option<String>)],
) -> Result<RecordBatch, arrow::error::ArrowError> {
    if columns.is_empty() {
        return Ok(batch);
    }

    let rows = batch.num_rows();
    let mut fields: Vec<Field> = batch
        .schema()
        .fields()
        .iter()
        .map(|f| f.as_ref().clone())
        .collect();
    let mut arrays: Vec<ArrayRef> = batch.columns().to_vec();

    for (name, value) in columns {
        fields.push(Field::new(name, DataType::Utf8, true));
        arrays.push(Arc::new(StringArray::from(vec![value.as_deref(); rows])));
    }
    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
}

fn decode_file(path: &Path, data: bytes::Bytes) -> Result<Vec<RecordBatch>, ReadError> {
    let location = path.as_ref();
    let columns = PartitionExtractor::columns(location);

    let reader = ParquetRecordBatchReaderBuilder::try_new(data)
        .and_then(|builder| builder.build())
        .context(ParquetReadSnafu { path: location })?;

    reader
        .map(|batch| {
            batch
                .and_then(|batch| attach_partitions(batch, &columns))
                .context(BatchDecodeSnafu { path: location })
        })
        .collect()
}

/// Read every file of a completed table.
///
/// Fails with [`ReadError::IncompleteTable`] when the `_SUCCESS` marker is
/// missing. Batch order follows file path order.
pub async fn read_table(
    storage: &StorageProvider,
    table: &str,
) -> Result<Vec<RecordBatch>, ReadError> {
    let marker = Path::from(format!("{table}/{SUCCESS_MARKER}"));
    let complete = storage
        .exists(&marker)
        .await
        .context(ReadStorageSnafu { table })?;
    ensure!(complete, IncompleteTableSnafu { table });

    let files = storage
        .list_files(table, &[".parquet"])
        .await
        .context(ReadStorageSnafu { table })?;

    let batches: Vec<Vec<RecordBatch>> = stream::iter(files)
        .map(|path| async move {
            let data = storage
                .get(path.clone())
                .await
                .context(ReadStorageSnafu { table })?;
            decode_file(&path, data)
        })
        .buffered(READ_CONCURRENCY)
        .try_collect()
        .await?;

    Ok(batches.into_iter().flatten().collect())
}

/// Total rows across batches.
pub fn row_count(batches: &[RecordBatch]) -> usize {
    batches.iter().map(RecordBatch::num_rows).sum()
}
