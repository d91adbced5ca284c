//! Internal events for metrics emission.
//!
//! Each event struct represents a measurable occurrence in the loader.
//! Events implement the `InternalEvent` trait which emits the corresponding
//! metric.
//!
//! ## Labels
//!
//! Per-corpus events carry a `kind` label (`"song"`, `"log"`), per-table
//! events a `table` label (`"songs"`, `"songplays"`, ...).

use metrics::{counter, histogram};
use std::time::Duration;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

// ============================================================================
// Source events
// ============================================================================

/// Event emitted when a raw input file has been downloaded.
pub struct FileRead {
    pub bytes: usize,
    pub kind: &'static str,
}

impl InternalEvent for FileRead {
    fn emit(self) {
        trace!(bytes = self.bytes, kind = self.kind, "File read");
        counter!("sparkify_files_read_total", "kind" => self.kind).increment(1);
        counter!("sparkify_bytes_read_total", "kind" => self.kind).increment(self.bytes as u64);
    }
}

/// Event emitted when raw records have been decoded against their manifest.
pub struct RecordsDecoded {
    pub count: usize,
    pub kind: &'static str,
}

impl InternalEvent for RecordsDecoded {
    fn emit(self) {
        trace!(count = self.count, kind = self.kind, "Records decoded");
        counter!("sparkify_records_decoded_total", "kind" => self.kind)
            .increment(self.count as u64);
    }
}

// ============================================================================
// Transform events
// ============================================================================

/// Reason a row was excluded from an output table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Event was not a song play.
    NotPlayEvent,
    /// Required identifying key was null or empty.
    NullKey,
    /// Play event matched no dimension row.
    JoinMiss,
    /// Row was identical to another row of the same table.
    Duplicate,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::NotPlayEvent => "not_play_event",
            DropReason::NullKey => "null_key",
            DropReason::JoinMiss => "join_miss",
            DropReason::Duplicate => "duplicate",
        }
    }
}

/// Event emitted when rows are filtered out of a table.
pub struct RowsDropped {
    pub count: usize,
    pub reason: DropReason,
    pub table: &'static str,
}

impl InternalEvent for RowsDropped {
    fn emit(self) {
        trace!(
            count = self.count,
            reason = self.reason.as_str(),
            table = self.table,
            "Rows dropped"
        );
        counter!(
            "sparkify_rows_dropped_total",
            "reason" => self.reason.as_str(),
            "table" => self.table
        )
        .increment(self.count as u64);
    }
}

/// Event emitted when a pipeline stage finishes.
pub struct StageCompleted {
    pub stage: &'static str,
    pub duration: Duration,
}

impl InternalEvent for StageCompleted {
    fn emit(self) {
        trace!(
            stage = self.stage,
            duration_ms = self.duration.as_millis(),
            "Stage completed"
        );
        histogram!("sparkify_stage_duration_seconds", "stage" => self.stage)
            .record(self.duration.as_secs_f64());
    }
}

// ============================================================================
// Sink events
// ============================================================================

/// Event emitted when a table has been fully written.
pub struct RowsWritten {
    pub rows: usize,
    pub table: String,
}

impl InternalEvent for RowsWritten {
    fn emit(self) {
        trace!(rows = self.rows, table = %self.table, "Rows written");
        counter!("sparkify_rows_written_total", "table" => self.table)
            .increment(self.rows as u64);
    }
}

/// Event emitted when a parquet file is written to a table directory.
pub struct ParquetFileWritten {
    pub bytes: usize,
    pub table: String,
}

impl InternalEvent for ParquetFileWritten {
    fn emit(self) {
        trace!(bytes = self.bytes, table = %self.table, "Parquet file written");
        counter!("sparkify_parquet_files_written_total", "table" => self.table.clone())
            .increment(1);
        counter!("sparkify_parquet_bytes_written_total", "table" => self.table)
            .increment(self.bytes as u64);
    }
}

/// Event emitted when Parquet encoding of one partition completes.
pub struct ParquetEncodeCompleted {
    pub duration: Duration,
}

impl InternalEvent for ParquetEncodeCompleted {
    fn emit(self) {
        trace!(
            duration_ms = self.duration.as_millis(),
            "Parquet encode completed"
        );
        histogram!("sparkify_parquet_encode_duration_seconds").record(self.duration.as_secs_f64());
    }
}

// ============================================================================
// Storage operation events
// ============================================================================

/// Storage operation types.
#[derive(Debug, Clone, Copy)]
pub enum StorageOperation {
    Get,
    Put,
    Delete,
    List,
}

impl StorageOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageOperation::Get => "get",
            StorageOperation::Put => "put",
            StorageOperation::Delete => "delete",
            StorageOperation::List => "list",
        }
    }
}

/// Status of a storage request.
#[derive(Debug, Clone, Copy)]
pub enum RequestStatus {
    Success,
    Error,
}

impl RequestStatus {
    fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Success => "success",
            RequestStatus::Error => "error",
        }
    }
}

/// Event emitted when a storage request completes.
pub struct StorageRequest {
    pub operation: StorageOperation,
    pub status: RequestStatus,
}

impl InternalEvent for StorageRequest {
    fn emit(self) {
        trace!(
            operation = self.operation.as_str(),
            status = self.status.as_str(),
            "Storage request"
        );
        counter!(
            "sparkify_storage_requests_total",
            "operation" => self.operation.as_str(),
            "status" => self.status.as_str()
        )
        .increment(1);
    }
}

/// Event emitted when a storage request completes with duration.
pub struct StorageRequestDuration {
    pub operation: StorageOperation,
    pub duration: Duration,
}

impl InternalEvent for StorageRequestDuration {
    fn emit(self) {
        trace!(
            operation = self.operation.as_str(),
            duration_ms = self.duration.as_millis(),
            "Storage request duration"
        );
        histogram!(
            "sparkify_storage_request_duration_seconds",
            "operation" => self.operation.as_str()
        )
        .record(self.duration.as_secs_f64());
    }
}
