//! Arrow layout of the star-schema tables.

use arrow::array::{
    ArrayRef, Float64Array, Int32Array, RecordBatch, StringArray, TimestampMicrosecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::error::ArrowError;
use std::sync::{Arc, LazyLock};

use crate::model::{ArtistRecord, SongRecord, SongplayRecord, TimeRecord, UserRecord};

/// Name and partition layout of an output table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSpec {
    pub name: &'static str,
    pub partition_by: &'static [&'static str],
}

pub const SONGS: TableSpec = TableSpec {
    name: "songs",
    partition_by: &["year", "artist_id"],
};

pub const ARTISTS: TableSpec = TableSpec {
    name: "artists",
    partition_by: &[],
};

pub const USERS: TableSpec = TableSpec {
    name: "users",
    partition_by: &[],
};

pub const TIME: TableSpec = TableSpec {
    name: "time",
    partition_by: &["year", "month"],
};

pub const SONGPLAYS: TableSpec = TableSpec {
    name: "songplays",
    partition_by: &["year", "month"],
};

/// A row type that can be written as a table.
pub trait TableRow: Send + Sync {
    /// Full schema of the table, partition columns included.
    fn schema() -> SchemaRef;

    /// String form of a column value used in partition directory names.
    /// `None` for a null value.
    fn partition_value(&self, column: &str) -> Option<String>;

    /// Build a record batch with every column of [`TableRow::schema`].
    fn to_batch(rows: &[&Self]) -> Result<RecordBatch, ArrowError>
    where
        Self: Sized;
}

fn utc_micros() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
}

fn strings<'a>(values: impl Iterator<Item = &'a str>) -> ArrayRef {
    Arc::new(StringArray::from_iter_values(values))
}

fn nullable_strings<'a>(values: impl Iterator<Item = Option<&'a str>>) -> ArrayRef {
    Arc::new(StringArray::from_iter(values))
}

fn ints(values: impl Iterator<Item = i32>) -> ArrayRef {
    Arc::new(Int32Array::from_iter_values(values))
}

static SONGS_SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![
        Field::new("song_id", DataType::Utf8, false),
        Field::new("title", DataType::Utf8, false),
        Field::new("artist_id", DataType::Utf8, false),
        Field::new("year", DataType::Int32, false),
        Field::new("duration", DataType::Float64, false),
    ]))
});

impl TableRow for SongRecord {
    fn schema() -> SchemaRef {
        SONGS_SCHEMA.clone()
    }

    fn partition_value(&self, column: &str) -> Option<String> {
        match column {
            "song_id" => Some(self.song_id.clone()),
            "title" => Some(self.title.clone()),
            "artist_id" => Some(self.artist_id.clone()),
            "year" => Some(self.year.to_string()),
            "duration" => Some(self.duration.to_string()),
            _ => None,
        }
    }

    fn to_batch(rows: &[&Self]) -> Result<RecordBatch, ArrowError> {
        RecordBatch::try_new(
            Self::schema(),
            vec![
                strings(rows.iter().map(|r| r.song_id.as_str())),
                strings(rows.iter().map(|r| r.title.as_str())),
                strings(rows.iter().map(|r| r.artist_id.as_str())),
                ints(rows.iter().map(|r| r.year)),
                Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.duration))),
            ],
        )
    }
}

static ARTISTS_SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![
        Field::new("artist_id", DataType::Utf8, false),
        Field::new("name", DataType::Utf8, false),
        Field::new("location", DataType::Utf8, true),
        Field::new("latitude", DataType::Float64, true),
        Field::new("longitude", DataType::Float64, true),
    ]))
});

impl TableRow for ArtistRecord {
    fn schema() -> SchemaRef {
        ARTISTS_SCHEMA.clone()
    }

    fn partition_value(&self, column: &str) -> Option<String> {
        match column {
            "artist_id" => Some(self.artist_id.clone()),
            "name" => Some(self.name.clone()),
            "location" => self.location.clone(),
            "latitude" => self.latitude.map(|v| v.to_string()),
            "longitude" => self.longitude.map(|v| v.to_string()),
            _ => None,
        }
    }

    fn to_batch(rows: &[&Self]) -> Result<RecordBatch, ArrowError> {
        RecordBatch::try_new(
            Self::schema(),
            vec![
                strings(rows.iter().map(|r| r.artist_id.as_str())),
                strings(rows.iter().map(|r| r.name.as_str())),
                nullable_strings(rows.iter().map(|r| r.location.as_deref())),
                Arc::new(Float64Array::from_iter(rows.iter().map(|r| r.latitude))),
                Arc::new(Float64Array::from_iter(rows.iter().map(|r| r.longitude))),
            ],
        )
    }
}

static USERS_SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![
        Field::new("user_id", DataType::Utf8, false),
        Field::new("first_name", DataType::Utf8, true),
        Field::new("last_name", DataType::Utf8, true),
        Field::new("gender", DataType::Utf8, true),
        Field::new("level", DataType::Utf8, false),
    ]))
});

impl TableRow for UserRecord {
    fn schema() -> SchemaRef {
        USERS_SCHEMA.clone()
    }

    fn partition_value(&self, column: &str) -> Option<String> {
        match column {
            "user_id" => Some(self.user_id.clone()),
            "first_name" => self.first_name.clone(),
            "last_name" => self.last_name.clone(),
            "gender" => self.gender.clone(),
            "level" => Some(self.level.clone()),
            _ => None,
        }
    }

    fn to_batch(rows: &[&Self]) -> Result<RecordBatch, ArrowError> {
        RecordBatch::try_new(
            Self::schema(),
            vec![
                strings(rows.iter().map(|r| r.user_id.as_str())),
                nullable_strings(rows.iter().map(|r| r.first_name.as_deref())),
                nullable_strings(rows.iter().map(|r| r.last_name.as_deref())),
                nullable_strings(rows.iter().map(|r| r.gender.as_deref())),
                strings(rows.iter().map(|r| r.level.as_str())),
            ],
        )
    }
}

static TIME_SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![
        Field::new("start_time", utc_micros(), false),
        Field::new("hour", DataType::Int32, false),
        Field::new("day", DataType::Int32, false),
        Field::new("week", DataType::Int32, false),
        Field::new("month", DataType::Int32, false),
        Field::new("year", DataType::Int32, false),
        Field::new("weekday", DataType::Int32, false),
    ]))
});

impl TableRow for TimeRecord {
    fn schema() -> SchemaRef {
        TIME_SCHEMA.clone()
    }

    fn partition_value(&self, column: &str) -> Option<String> {
        let value = match column {
            "start_time" => return Some(self.start_time.to_rfc3339()),
            "hour" => self.hour,
            "day" => self.day,
            "week" => self.week,
            "month" => self.month,
            "year" => self.year,
            "weekday" => self.weekday,
            _ => return None,
        };
        Some(value.to_string())
    }

    fn to_batch(rows: &[&Self]) -> Result<RecordBatch, ArrowError> {
        let start_time = TimestampMicrosecondArray::from_iter_values(
            rows.iter().map(|r| r.start_time.timestamp_micros()),
        )
        .with_timezone("UTC");

        RecordBatch::try_new(
            Self::schema(),
            vec![
                Arc::new(start_time),
                ints(rows.iter().map(|r| r.hour)),
                ints(rows.iter().map(|r| r.day)),
                ints(rows.iter().map(|r| r.week)),
                ints(rows.iter().map(|r| r.month)),
                ints(rows.iter().map(|r| r.year)),
                ints(rows.iter().map(|r| r.weekday)),
            ],
        )
    }
}

static SONGPLAYS_SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![
        Field::new("start_time", utc_micros(), false),
        Field::new("user_id", DataType::Utf8, true),
        Field::new("level", DataType::Utf8, false),
        Field::new("song_id", DataType::Utf8, false),
        Field::new("artist_id", DataType::Utf8, false),
        Field::new("session_id", DataType::Int32, false),
        Field::new("location", DataType::Utf8, true),
        Field::new("user_agent", DataType::Utf8, true),
        Field::new("year", DataType::Int32, false),
        Field::new("month", DataType::Int32, false),
    ]))
});

impl TableRow for SongplayRecord {
    fn schema() -> SchemaRef {
        SONGPLAYS_SCHEMA.clone()
    }

    fn partition_value(&self, column: &str) -> Option<String> {
        match column {
            "start_time" => Some(self.start_time.to_rfc3339()),
            "user_id" => self.user_id.clone(),
            "level" => Some(self.level.clone()),
            "song_id" => Some(self.song_id.clone()),
            "artist_id" => Some(self.artist_id.clone()),
            "session_id" => Some(self.session_id.to_string()),
            "location" => self.location.clone(),
            "user_agent" => self.user_agent.clone(),
            "year" => Some(self.year.to_string()),
            "month" => Some(self.month.to_string()),
            _ => None,
        }
    }

    fn to_batch(rows: &[&Self]) -> Result<RecordBatch, ArrowError> {
        let start_time = TimestampMicrosecondArray::from_iter_values(
            rows.iter().map(|r| r.start_time.timestamp_micros()),
        )
        .with_timezone("UTC");

        RecordBatch::try_new(
            Self::schema(),
            vec![
                Arc::new(start_time),
                nullable_strings(rows.iter().map(|r| r.user_id.as_deref())),
                strings(rows.iter().map(|r| r.level.as_str())),
                strings(rows.iter().map(|r| r.song_id.as_str())),
                strings(rows.iter().map(|r| r.artist_id.as_str())),
                ints(rows.iter().map(|r| r.session_id)),
                nullable_strings(rows.iter().map(|r| r.location.as_deref())),
                nullable_strings(rows.iter().map(|r| r.user_agent.as_deref())),
                ints(rows.iter().map(|r| r.year)),
                ints(rows.iter().map(|r| r.month)),
            ],
        )
    }
}
