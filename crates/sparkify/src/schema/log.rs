//! User activity log corpus: one record per event, newline-delimited.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{FieldSpec, FieldType, RawRecord, RecordKind};

/// Page value of a song-play event.
pub const NEXT_SONG_PAGE: &str = "NextSong";

/// A raw user activity event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEventRecord {
    pub artist: Option<String>,
    pub auth: String,
    pub first_name: Option<String>,
    pub gender: Option<String>,
    pub item_in_session: i32,
    pub last_name: Option<String>,
    pub length: Option<f64>,
    pub level: String,
    pub location: Option<String>,
    pub method: String,
    pub page: String,
    pub registration: Option<f64>,
    pub session_id: i32,
    pub song: Option<String>,
    pub status: i32,
    pub ts: i64,
    pub user_agent: Option<String>,
    pub user_id: Option<String>,
}

impl LogEventRecord {
    /// Whether this event is a song play.
    pub fn is_song_play(&self) -> bool {
        self.page == NEXT_SONG_PAGE
    }

    /// Event time as a UTC instant.
    ///
    /// `ts` is validated as a representable millisecond timestamp when the
    /// record is decoded.
    pub fn start_time(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.ts).unwrap_or_default()
    }
}

impl RawRecord for LogEventRecord {
    const KIND: RecordKind = RecordKind::LogEvent;
    const MANIFEST: &'static [FieldSpec] = &[
        FieldSpec::nullable("artist", FieldType::String),
        FieldSpec::required("auth", FieldType::String),
        FieldSpec::nullable("firstName", FieldType::String),
        FieldSpec::nullable("gender", FieldType::String),
        FieldSpec::required("itemInSession", FieldType::Int),
        FieldSpec::nullable("lastName", FieldType::String),
        FieldSpec::nullable("length", FieldType::Float),
        FieldSpec::required("level", FieldType::String),
        FieldSpec::nullable("location", FieldType::String),
        FieldSpec::required("method", FieldType::String),
        FieldSpec::required("page", FieldType::String),
        FieldSpec::nullable("registration", FieldType::Float),
        FieldSpec::required("sessionId", FieldType::Int),
        FieldSpec::nullable("song", FieldType::String),
        FieldSpec::required("status", FieldType::Int),
        FieldSpec::required("ts", FieldType::EpochMillis),
        FieldSpec::nullable("userAgent", FieldType::String),
        FieldSpec::nullable("userId", FieldType::String),
    ];
}
