//! User activity log transforms.

use serde::{Deserialize, Serialize};
use sparkify_core::emit;
use sparkify_core::metrics::events::{DropReason, RowsDropped};
use std::collections::HashMap;

use crate::engine::Dataset;
use crate::model::{PlayEvent, TimeRecord, UserRecord};
use crate::schema::LogEventRecord;

/// How user rows are chosen when a user appears with several levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserLevelPolicy {
    /// Keep every distinct (user, name, gender, level) row.
    #[default]
    Distinct,
    /// Keep only the row from each user's latest play event.
    Latest,
}

/// Keep only song-play events.
pub fn filter_play_events(events: Dataset<LogEventRecord>) -> Dataset<PlayEvent> {
    let total = events.len();
    let plays = events
        .filter(LogEventRecord::is_song_play)
        .into_map(PlayEvent::from);

    emit!(RowsDropped {
        count: total - plays.len(),
        reason: DropReason::NotPlayEvent,
        table: "songplays",
    });
    plays
}

fn project_user(play: &PlayEvent) -> Option<UserRecord> {
    let user_id = play.event.user_id.as_deref().filter(|id| !id.is_empty())?;
    Some(UserRecord {
        user_id: user_id.to_string(),
        first_name: play.event.first_name.clone(),
        last_name: play.event.last_name.clone(),
        gender: play.event.gender.clone(),
        level: play.event.level.clone(),
    })
}

/// Project the `users` dimension from play events.
///
/// Events without a user id are skipped.
pub fn extract_users(plays: &Dataset<PlayEvent>, policy: UserLevelPolicy) -> Dataset<UserRecord> {
    let total = plays.len();
    let users = match policy {
        UserLevelPolicy::Distinct => plays.filter_map(project_user).distinct(),
        UserLevelPolicy::Latest => latest_per_user(plays),
    };

    let null_keys = plays.count_where(|play| project_user(play).is_none());
    emit!(RowsDropped {
        count: null_keys,
        reason: DropReason::NullKey,
        table: "users",
    });
    emit!(RowsDropped {
        count: total - null_keys - users.len(),
        reason: DropReason::Duplicate,
        table: "users",
    });
    users
}

/// One row per user, taken from the latest event. Ties on `ts` go to the
/// greater level string so the result does not depend on input order.
fn latest_per_user(plays: &Dataset<PlayEvent>) -> Dataset<UserRecord> {
    plays
        .filter_map(|play| project_user(play).map(|user| (play.event.ts, user)))
        .shuffle(|(_, user)| user.user_id.clone())
        .map_partitions(|partition| {
            let mut latest: HashMap<String, (i64, UserRecord)> = HashMap::new();
            for (ts, user) in partition {
                let superseded = latest
                    .get(&user.user_id)
                    .is_some_and(|(best_ts, best)| (*best_ts, &best.level) >= (ts, &user.level));
                if !superseded {
                    latest.insert(user.user_id.clone(), (ts, user));
                }
            }
            latest.into_values().map(|(_, user)| user).collect()
        })
}

/// Project the `time` dimension: one row per distinct play timestamp.
pub fn extract_time(plays: &Dataset<PlayEvent>) -> Dataset<TimeRecord> {
    plays
        .map(|play| TimeRecord::from_start_time(play.start_time))
        .distinct()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(page: &str, user_id: Option<&str>, level: &str, ts: i64) -> LogEventRecord {
        LogEventRecord {
            artist: Some("Coldplay".to_string()),
            auth: "Logged In".to_string(),
            first_name: Some("Lily".to_string()),
            gender: Some("F".to_string()),
            item_in_session: 0,
            last_name: Some("Koch".to_string()),
            length: Some(269.0),
            level: level.to_string(),
            location: Some("Chicago-Naperville-Elgin, IL-IN-WI".to_string()),
            method: "PUT".to_string(),
            page: page.to_string(),
            registration: None,
            session_id: 818,
            song: Some("Yellow".to_string()),
            status: 200,
            ts,
            user_agent: None,
            user_id: user_id.map(str::to_string),
        }
    }

    fn plays(events: Vec<LogEventRecord>) -> Dataset<PlayEvent> {
        filter_play_events(Dataset::from_vec(events, 2))
    }

    #[test]
    fn test_filter_play_events_keeps_next_song_only() {
        let plays = plays(vec![
            event("NextSong", Some("15"), "paid", 1),
            event("Home", Some("15"), "paid", 2),
            event("Logout", Some("15"), "paid", 3),
            event("NextSong", Some("15"), "paid", 4),
        ]);

        let ts: Vec<i64> = plays.iter().map(|p| p.event.ts).collect();
        assert_eq!(ts, vec![1, 4]);
    }

    #[test]
    fn test_extract_users_distinct_keeps_level_changes() {
        let plays = plays(vec![
            event("NextSong", Some("15"), "free", 1),
            event("NextSong", Some("15"), "free", 2),
            event("NextSong", Some("15"), "paid", 3),
        ]);

        let mut levels: Vec<String> = extract_users(&plays, UserLevelPolicy::Distinct)
            .into_vec()
            .into_iter()
            .map(|u| u.level)
            .collect();
        levels.sort();
        assert_eq!(levels, vec!["free", "paid"]);
    }

    #[test]
    fn test_extract_users_skips_missing_ids() {
        let plays = plays(vec![
            event("NextSong", None, "free", 1),
            event("NextSong", Some(""), "free", 2),
            event("NextSong", Some("15"), "free", 3),
        ]);

        let users = extract_users(&plays, UserLevelPolicy::Distinct).into_vec();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].user_id, "15");
    }

    #[test]
    fn test_extract_users_latest_policy() {
        let plays = plays(vec![
            event("NextSong", Some("15"), "paid", 5),
            event("NextSong", Some("15"), "free", 9),
            event("NextSong", Some("26"), "free", 4),
            event("NextSong", Some("26"), "paid", 4),
        ]);

        let mut users = extract_users(&plays, UserLevelPolicy::Latest).into_vec();
        users.sort_by(|a, b| a.user_id.cmp(&b.user_id));

        assert_eq!(users.len(), 2);
        assert_eq!(users[0].level, "free");
        // Same ts: the greater level wins
        assert_eq!(users[1].level, "paid");
    }

    #[test]
    fn test_extract_time_one_row_per_timestamp() {
        let plays = plays(vec![
            event("NextSong", Some("15"), "free", 1542000000000),
            event("NextSong", Some("26"), "free", 1542000000000),
            event("NextSong", Some("26"), "free", 1542000000001),
        ]);

        let time = extract_time(&plays);
        assert_eq!(time.len(), 2);
        assert!(time.iter().all(|t| t.year == 2018 && t.month == 11 && t.hour == 5));
    }

    #[test]
    fn test_user_level_policy_deserializes() {
        let policy: UserLevelPolicy = serde_json::from_str("\"latest\"").unwrap();
        assert_eq!(policy, UserLevelPolicy::Latest);
    }
}
