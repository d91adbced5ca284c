//! Songplay fact construction.
//!
//! Play events are matched to the song dimension on exact, case-sensitive
//! (song title, artist name) equality. The dimension is indexed once and each
//! event probes it once; every matching dimension row yields its own fact row.

use chrono::Datelike;
use sparkify_core::emit;
use sparkify_core::metrics::events::{DropReason, RowsDropped};
use tracing::{info, warn};

use crate::engine::{Dataset, HashIndex};
use crate::model::{PlayEvent, SongDimensionRow, SongplayRecord};

/// Outcome counts of one join.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct JoinStats {
    pub play_events: usize,
    pub matched_events: usize,
    pub missed_events: usize,
    pub fact_rows: usize,
}

impl JoinStats {
    /// Fraction of play events that matched at least one song.
    ///
    /// An empty input counts as fully matched.
    pub fn match_rate(&self) -> f64 {
        if self.play_events == 0 {
            1.0
        } else {
            self.matched_events as f64 / self.play_events as f64
        }
    }

    /// Log the stats, warning when the match rate is below `min_match_rate`.
    pub fn report(&self, min_match_rate: f64) {
        let match_rate = self.match_rate();
        if match_rate < min_match_rate {
            warn!(
                play_events = self.play_events,
                matched = self.matched_events,
                missed = self.missed_events,
                match_rate,
                min_match_rate,
                "Songplay match rate below threshold"
            );
        } else {
            info!(
                play_events = self.play_events,
                matched = self.matched_events,
                missed = self.missed_events,
                fact_rows = self.fact_rows,
                match_rate,
                "Songplay join completed"
            );
        }
    }
}

/// Matches play events against an indexed song dimension.
#[derive(Debug)]
pub struct SongplayJoiner {
    /// Dimension rows by title; the artist name is checked on probe.
    by_title: HashIndex<String, SongDimensionRow>,
}

impl SongplayJoiner {
    /// Index the song dimension for (title, artist name) lookups.
    pub fn new(dimension: &Dataset<SongDimensionRow>) -> Self {
        let by_title = HashIndex::build(dimension, |row| Some(row.title.clone()));
        Self { by_title }
    }

    fn matches<'a>(&'a self, play: &'a PlayEvent) -> impl Iterator<Item = &'a SongDimensionRow> {
        let candidates: &[SongDimensionRow] = match (&play.event.song, &play.event.artist) {
            (Some(song), Some(_)) => self.by_title.probe(song.as_str()),
            _ => &[],
        };
        candidates
            .iter()
            .filter(move |row| play.event.artist.as_deref() == Some(row.artist_name.as_str()))
    }

    /// Build songplay facts. Events without a match produce no rows.
    pub fn join(&self, plays: &Dataset<PlayEvent>) -> (Dataset<SongplayRecord>, JoinStats) {
        let per_event = plays.map(|play| {
            self.matches(play)
                .map(|song| songplay(play, song))
                .collect::<Vec<_>>()
        });

        let play_events = plays.len();
        let matched_events = per_event.count_where(|facts| !facts.is_empty());
        let facts = per_event.map_partitions(|partition| partition.into_iter().flatten().collect());
        let stats = JoinStats {
            play_events,
            matched_events,
            missed_events: play_events - matched_events,
            fact_rows: facts.len(),
        };

        emit!(RowsDropped {
            count: stats.missed_events,
            reason: DropReason::JoinMiss,
            table: "songplays",
        });
        (facts, stats)
    }
}

fn songplay(play: &PlayEvent, song: &SongDimensionRow) -> SongplayRecord {
    SongplayRecord {
        start_time: play.start_time,
        user_id: play.event.user_id.clone(),
        level: play.event.level.clone(),
        song_id: song.song_id.clone(),
        artist_id: song.artist_id.clone(),
        session_id: play.event.session_id,
        location: play.event.location.clone(),
        user_agent: play.event.user_agent.clone(),
        year: play.start_time.year(),
        month: play.start_time.month() as i32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::LogEventRecord;

    fn dimension_row(
        song_id: &str,
        artist_id: &str,
        title: &str,
        artist: &str,
    ) -> SongDimensionRow {
        SongDimensionRow {
            song_id: song_id.into(),
            artist_id: artist_id.into(),
            title: title.into(),
            artist_name: artist.into(),
        }
    }

    fn play(song: Option<&str>, artist: Option<&str>) -> PlayEvent {
        PlayEvent::from(LogEventRecord {
            artist: artist.map(str::to_string),
            auth: "Logged In".into(),
            first_name: None,
            gender: None,
            item_in_session: 3,
            last_name: None,
            length: None,
            level: "paid".into(),
            location: Some("Lansing-East Lansing, MI".into()),
            method: "PUT".into(),
            page: "NextSong".into(),
            registration: None,
            session_id: 7,
            song: song.map(str::to_string),
            status: 200,
            ts: 1542000000000,
            user_agent: Some("Mozilla/5.0".into()),
            user_id: Some("42".into()),
        })
    }

    fn joiner(rows: Vec<SongDimensionRow>) -> SongplayJoiner {
        SongplayJoiner::new(&Dataset::from_vec(rows, 2))
    }

    #[test]
    fn test_join_projects_fact_row() {
        let joiner = joiner(vec![dimension_row("S1", "A1", "Yellow", "Coldplay")]);
        let plays = Dataset::from_vec(vec![play(Some("Yellow"), Some("Coldplay"))], 2);
        let (facts, stats) = joiner.join(&plays);

        let facts = facts.into_vec();
        assert_eq!(facts.len(), 1);
        let fact = &facts[0];
        assert_eq!(fact.start_time.timestamp_millis(), 1542000000000);
        assert_eq!(fact.song_id, "S1");
        assert_eq!(fact.artist_id, "A1");
        assert_eq!(fact.user_id.as_deref(), Some("42"));
        assert_eq!(fact.session_id, 7);
        assert_eq!((fact.year, fact.month), (2018, 11));
        assert_eq!(stats.matched_events, 1);
        assert_eq!(stats.match_rate(), 1.0);
    }

    #[test]
    fn test_join_projects_every_fact_column() {
        let joiner = joiner(vec![dimension_row("SONG1", "ART1", "Yellow", "Coldplay")]);
        let mut event = play(Some("Yellow"), Some("Coldplay")).event;
        event.user_id = Some("10".into());
        event.session_id = 100;
        event.level = "paid".into();
        event.location = Some("NY".into());
        event.user_agent = Some("agent-x".into());

        let (facts, _) = joiner.join(&Dataset::from_vec(vec![PlayEvent::from(event)], 2));

        let start_time = chrono::DateTime::from_timestamp_millis(1542000000000).unwrap();
        assert_eq!(
            facts.into_vec(),
            vec![SongplayRecord {
                start_time,
                user_id: Some("10".into()),
                level: "paid".into(),
                song_id: "SONG1".into(),
                artist_id: "ART1".into(),
                session_id: 100,
                location: Some("NY".into()),
                user_agent: Some("agent-x".into()),
                year: 2018,
                month: 11,
            }]
        );
    }

    #[test]
    fn test_join_requires_artist_match() {
        let joiner = joiner(vec![dimension_row("S1", "A1", "Yellow", "Coldplay")]);
        let (facts, stats) =
            joiner.join(&Dataset::from_vec(vec![play(Some("Yellow"), Some("Other"))], 2));

        assert!(facts.is_empty());
        assert_eq!(stats.missed_events, 1);
    }

    #[test]
    fn test_join_is_case_sensitive() {
        let joiner = joiner(vec![dimension_row("S1", "A1", "Yellow", "Coldplay")]);
        let (facts, stats) =
            joiner.join(&Dataset::from_vec(vec![play(Some("yellow"), Some("Coldplay"))], 2));

        assert!(facts.is_empty());
        assert_eq!(stats.missed_events, 1);
        assert_eq!(stats.match_rate(), 0.0);
    }

    #[test]
    fn test_join_null_fields_never_match() {
        let joiner = joiner(vec![dimension_row("S1", "A1", "Yellow", "Coldplay")]);
        let plays = Dataset::from_vec(
            vec![play(None, Some("Coldplay")), play(Some("Yellow"), None)],
            2,
        );
        let (facts, stats) = joiner.join(&plays);

        assert!(facts.is_empty());
        assert_eq!(stats.missed_events, 2);
    }

    #[test]
    fn test_join_fans_out_over_matching_rows() {
        let joiner = joiner(vec![
            dimension_row("S1", "A1", "Yellow", "Coldplay"),
            dimension_row("S2", "A1", "Yellow", "Coldplay"),
            dimension_row("S3", "A2", "Yellow", "Other"),
        ]);
        let plays = Dataset::from_vec(vec![play(Some("Yellow"), Some("Coldplay"))], 2);
        let (facts, stats) = joiner.join(&plays);

        let mut song_ids: Vec<String> = facts.into_vec().into_iter().map(|f| f.song_id).collect();
        song_ids.sort();
        assert_eq!(song_ids, vec!["S1", "S2"]);
        assert_eq!(stats.matched_events, 1);
        assert_eq!(stats.fact_rows, 2);
    }

    #[test]
    fn test_match_rate_of_empty_input() {
        assert_eq!(JoinStats::default().match_rate(), 1.0);
    }
}
