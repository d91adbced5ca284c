//! Dimension extraction from the raw corpora.
//!
//! - `song`: songs, artists and the song dimension used by the joiner
//! - `log`: play events, users and the time dimension

pub mod log;
pub mod song;

pub use log::{UserLevelPolicy, extract_time, extract_users, filter_play_events};
pub use song::{extract_artists, extract_songs, song_dimension};
