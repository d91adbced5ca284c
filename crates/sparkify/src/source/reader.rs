//! Concurrent download and parallel decoding of raw input files.

use bytes::Bytes;
use futures::stream::{self, StreamExt, TryStreamExt};
use rayon::prelude::*;
use snafu::prelude::*;
use sparkify_core::metrics::events::{FileRead, RecordsDecoded};
use sparkify_core::{StorageProviderRef, emit};
use tracing::{debug, info};

use super::compression::CompressionFormat;
use super::listing::list_input_files;
use crate::engine::Dataset;
use crate::error::{DecodeSnafu, DecompressionSnafu, SourceError, SourceStorageSnafu};
use crate::schema::{RawRecord, RecordKind, decode_file};

/// Default number of concurrent file downloads.
pub const DEFAULT_MAX_CONCURRENT_FILES: usize = 16;

/// A downloaded, still compressed input file.
#[derive(Debug, Clone)]
pub struct RawFile {
    pub path: String,
    pub data: Bytes,
}

/// Downloads every input file of one corpus.
pub struct CorpusReader {
    storage: StorageProviderRef,
    max_concurrent_files: usize,
}

impl CorpusReader {
    pub fn new(storage: StorageProviderRef, max_concurrent_files: usize) -> Self {
        Self {
            storage,
            max_concurrent_files: max_concurrent_files.max(1),
        }
    }

    /// Download all input files under `prefix`, in path order.
    pub async fn fetch(&self, prefix: &str, kind: RecordKind) -> Result<Vec<RawFile>, SourceError> {
        let paths = list_input_files(&self.storage, prefix)
            .await
            .context(SourceStorageSnafu { prefix })?;

        let files: Vec<RawFile> = stream::iter(paths)
            .map(|path| async move {
                let data = self
                    .storage
                    .get(path.clone())
                    .await
                    .context(SourceStorageSnafu { prefix })?;
                emit!(FileRead {
                    bytes: data.len(),
                    kind: kind.as_str(),
                });
                Ok::<_, SourceError>(RawFile {
                    path: path.to_string(),
                    data,
                })
            })
            .buffered(self.max_concurrent_files)
            .try_collect()
            .await?;

        let bytes: usize = files.iter().map(|f| f.data.len()).sum();
        info!(
            prefix,
            files = files.len(),
            bytes,
            kind = kind.as_str(),
            "Downloaded input files"
        );
        Ok(files)
    }
}

fn decode_one<R: RawRecord>(file: &RawFile) -> Result<Vec<R>, SourceError> {
    let format = CompressionFormat::from_path(&file.path);
    let data = format
        .decompress(file.data.clone())
        .context(DecompressionSnafu { path: &file.path })?;
    let records = decode_file::<R>(&file.path, &data).context(DecodeSnafu)?;
    debug!(
        path = %file.path,
        compression = format.name(),
        records = records.len(),
        "Decoded input file"
    );
    Ok(records)
}

/// Decompress and decode files in parallel.
///
/// When several files fail, the error of the first failing file in path
/// order is returned.
pub fn decode_files<R: RawRecord>(
    files: &[RawFile],
    partition_rows: usize,
) -> Result<Dataset<R>, SourceError> {
    let decoded: Vec<Result<Vec<R>, SourceError>> =
        files.par_iter().map(decode_one::<R>).collect();

    let mut records = Vec::new();
    for result in decoded {
        records.extend(result?);
    }

    emit!(RecordsDecoded {
        count: records.len(),
        kind: R::KIND.as_str(),
    });
    Ok(Dataset::from_vec(records, partition_rows))
}
