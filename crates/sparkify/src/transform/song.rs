//! Song metadata transforms.

use sparkify_core::emit;
use sparkify_core::metrics::events::{DropReason, RowsDropped};
use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::engine::Dataset;
use crate::error::TransformError;
use crate::model::{ArtistRecord, SongDimensionRow, SongRecord};
use crate::schema::SongMetadataRecord;

fn project_song(record: &SongMetadataRecord) -> SongRecord {
    SongRecord {
        song_id: record.song_id.clone(),
        title: record.title.clone(),
        artist_id: record.artist_id.clone(),
        year: record.year,
        duration: record.duration,
    }
}

/// Project the `songs` dimension, one row per song_id.
///
/// Identical records for the same song collapse into one row. Two records
/// that share a song_id but disagree on any other column fail the run.
pub fn extract_songs(
    records: &Dataset<SongMetadataRecord>,
) -> Result<Dataset<SongRecord>, TransformError> {
    let projected = records.map(project_song);
    let total = projected.len();

    let songs = projected
        .shuffle(|song| song.song_id.clone())
        .try_map_partitions(|partition| {
            let mut by_id: HashMap<String, SongRecord> = HashMap::with_capacity(partition.len());
            let mut unique = Vec::with_capacity(partition.len());
            for song in partition {
                match by_id.entry(song.song_id.clone()) {
                    Entry::Occupied(existing) if existing.get() == &song => {}
                    Entry::Occupied(existing) => {
                        return Err(TransformError::ConflictingSong {
                            song_id: song.song_id.clone(),
                            first: format!("{:?}", existing.get()),
                            second: format!("{song:?}"),
                        });
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(song.clone());
                        unique.push(song);
                    }
                }
            }
            Ok(unique)
        })?;

    emit!(RowsDropped {
        count: total - songs.len(),
        reason: DropReason::Duplicate,
        table: "songs",
    });
    Ok(songs)
}

/// Project the `artists` dimension, deduplicated on every column.
///
/// An artist whose records disagree on location or coordinates keeps one row
/// per variant.
pub fn extract_artists(records: &Dataset<SongMetadataRecord>) -> Dataset<ArtistRecord> {
    let projected = records.map(|record| ArtistRecord {
        artist_id: record.artist_id.clone(),
        name: record.artist_name.clone(),
        location: record.artist_location.clone(),
        latitude: record.artist_latitude,
        longitude: record.artist_longitude,
    });
    let total = projected.len();

    let artists = projected.distinct();
    emit!(RowsDropped {
        count: total - artists.len(),
        reason: DropReason::Duplicate,
        table: "artists",
    });
    artists
}

/// Distinct (song, artist name) pairs for matching play events.
pub fn song_dimension(records: &Dataset<SongMetadataRecord>) -> Dataset<SongDimensionRow> {
    records
        .map(|record| SongDimensionRow {
            song_id: record.song_id.clone(),
            artist_id: record.artist_id.clone(),
            title: record.title.clone(),
            artist_name: record.artist_name.clone(),
        })
        .distinct()
}
