//! Song metadata corpus: one record per song, carrying its artist.

use serde::Deserialize;

use super::{FieldSpec, FieldType, RawRecord, RecordKind};

/// A raw song metadata record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SongMetadataRecord {
    pub artist_id: String,
    pub artist_latitude: Option<f64>,
    pub artist_location: Option<String>,
    pub artist_longitude: Option<f64>,
    pub artist_name: String,
    pub duration: f64,
    pub num_songs: i32,
    pub song_id: String,
    pub title: String,
    pub year: i32,
}

impl RawRecord for SongMetadataRecord {
    const KIND: RecordKind = RecordKind::SongMetadata;
    const MANIFEST: &'static [FieldSpec] = &[
        FieldSpec::required("artist_id", FieldType::String),
        FieldSpec::nullable("artist_latitude", FieldType::Float),
        FieldSpec::nullable("artist_location", FieldType::String),
        FieldSpec::nullable("artist_longitude", FieldType::Float),
        FieldSpec::required("artist_name", FieldType::String),
        FieldSpec::required("duration", FieldType::Float),
        FieldSpec::required("num_songs", FieldType::Int),
        FieldSpec::required("song_id", FieldType::String),
        FieldSpec::required("title", FieldType::String),
        FieldSpec::required("year", FieldType::Int),
    ];
}
