//! Row types of the star schema.
//!
//! Dimension rows with float columns compare floats by bit pattern (after
//! folding `-0.0` into `0.0`), which keeps `Eq` and `Hash` consistent so they
//! can be deduplicated.

use chrono::{DateTime, Datelike, Timelike, Utc};
use std::hash::{Hash, Hasher};

use crate::schema::LogEventRecord;

/// Canonical bit pattern of a float for equality and hashing.
fn float_bits(value: f64) -> u64 {
    if value == 0.0 { 0 } else { value.to_bits() }
}

fn opt_float_bits(value: Option<f64>) -> Option<u64> {
    value.map(float_bits)
}

/// A row of the `songs` dimension.
#[derive(Debug, Clone)]
pub struct SongRecord {
    pub song_id: String,
    pub title: String,
    pub artist_id: String,
    pub year: i32,
    pub duration: f64,
}

impl PartialEq for SongRecord {
    fn eq(&self, other: &Self) -> bool {
        self.song_id == other.song_id
            && self.title == other.title
            && self.artist_id == other.artist_id
            && self.year == other.year
            && float_bits(self.duration) == float_bits(other.duration)
    }
}

impl Eq for SongRecord {}

impl Hash for SongRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.song_id.hash(state);
        self.title.hash(state);
        self.artist_id.hash(state);
        self.year.hash(state);
        float_bits(self.duration).hash(state);
    }
}

/// A row of the `artists` dimension.
#[derive(Debug, Clone)]
pub struct ArtistRecord {
    pub artist_id: String,
    pub name: String,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl PartialEq for ArtistRecord {
    fn eq(&self, other: &Self) -> bool {
        self.artist_id == other.artist_id
            && self.name == other.name
            && self.location == other.location
            && opt_float_bits(self.latitude) == opt_float_bits(other.latitude)
            && opt_float_bits(self.longitude) == opt_float_bits(other.longitude)
    }
}

impl Eq for ArtistRecord {}

impl Hash for ArtistRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.artist_id.hash(state);
        self.name.hash(state);
        self.location.hash(state);
        opt_float_bits(self.latitude).hash(state);
        opt_float_bits(self.longitude).hash(state);
    }
}

/// A row of the `users` dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserRecord {
    pub user_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: String,
}

/// A row of the `time` dimension: one decomposed play timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeRecord {
    pub start_time: DateTime<Utc>,
    pub hour: i32,
    pub day: i32,
    /// ISO-8601 week of year.
    pub week: i32,
    pub month: i32,
    /// Calendar year, which can differ from the ISO week-year near new year.
    pub year: i32,
    /// Day of week, 0 = Sunday through 6 = Saturday.
    pub weekday: i32,
}

impl TimeRecord {
    /// Decompose an instant in UTC.
    pub fn from_start_time(start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            hour: start_time.hour() as i32,
            day: start_time.day() as i32,
            week: start_time.iso_week().week() as i32,
            month: start_time.month() as i32,
            year: start_time.year(),
            weekday: start_time.weekday().num_days_from_sunday() as i32,
        }
    }
}

/// A row of the `songplays` fact table.
#[derive(Debug, Clone, PartialEq)]
pub struct SongplayRecord {
    pub start_time: DateTime<Utc>,
    pub user_id: Option<String>,
    pub level: String,
    pub song_id: String,
    pub artist_id: String,
    pub session_id: i32,
    pub location: Option<String>,
    pub user_agent: Option<String>,
    pub year: i32,
    pub month: i32,
}

/// Join-side view of a song with its artist, keyed on (title, artist name).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SongDimensionRow {
    pub song_id: String,
    pub artist_id: String,
    pub title: String,
    pub artist_name: String,
}

/// A song-play event with its parsed event time.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayEvent {
    pub event: LogEventRecord,
    pub start_time: DateTime<Utc>,
}

impl From<LogEventRecord> for PlayEvent {
    fn from(event: LogEventRecord) -> Self {
        let start_time = event.start_time();
        Self { event, start_time }
    }
}
