//! Integration tests for sparkify

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use arrow::array::{ArrayRef, AsArray, RecordBatch};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Int32Type};
use arrow::util::display::{ArrayFormatter, FormatOptions};
use tempfile::TempDir;

use sparkify::config::Config;
use sparkify::error::{PipelineError, SourceError, TransformError};
use sparkify::sink::{SUCCESS_MARKER, read_table, row_count};
use sparkify::{StorageProvider, run_pipeline};

fn song_json(song_id: &str, title: &str, artist_id: &str, artist_name: &str, year: i32) -> String {
    format!(
        r#"{{"num_songs": 1, "artist_id": "{artist_id}", "artist_latitude": null, "artist_longitude": null, "artist_location": "", "artist_name": "{artist_name}", "song_id": "{song_id}", "title": "{title}", "duration": 266.5, "year": {year}}}"#
    )
}

fn event_json(page: &str, user_id: &str, level: &str, song: &str, artist: &str, ts: i64) -> String {
    format!(
        r#"{{"artist":{artist},"auth":"Logged In","firstName":"Lily","gender":"F","itemInSession":0,"lastName":"Koch","length":null,"level":"{level}","location":"Chicago-Naperville-Elgin, IL-IN-WI","method":"PUT","page":"{page}","registration":1541048010796.0,"sessionId":818,"song":{song},"status":200,"ts":{ts},"userAgent":"Mozilla/5.0","userId":{user_id}}}"#
    )
}

fn write_file(root: &Path, relative: &str, contents: &[u8]) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// Input tree with three songs and a handful of events.
///
/// Events at ts 1542000000000 (2018-11-12 05:20 UTC):
/// - user 42 plays "Yellow" by Coldplay (matches S1)
/// - user 42 plays a song that is not in the catalog
/// - user 7 visits Home (not a play)
/// - a logged-out play with a null user id
fn seed_input(root: &Path) {
    write_file(
        root,
        "song_data/A/A/TRAAA01.json",
        song_json("S1", "Yellow", "AR1", "Coldplay", 2000).as_bytes(),
    );
    write_file(
        root,
        "song_data/A/B/TRAAB01.json",
        song_json("S2", "Fix You", "AR1", "Coldplay", 2005).as_bytes(),
    );
    write_file(
        root,
        "song_data/B/A/TRBAA01.json",
        song_json("S3", "Hey Jude", "AR2", "The Beatles", 0).as_bytes(),
    );

    let events = [
        event_json("NextSong", "\"42\"", "free", "\"Yellow\"", "\"Coldplay\"", 1542000000000),
        event_json("NextSong", "42", "free", "\"Unknown\"", "\"Nobody\"", 1542000001000),
        event_json("Home", "\"7\"", "paid", "null", "null", 1542000002000),
        event_json("NextSong", "null", "free", "\"Unknown\"", "\"Nobody\"", 1542000003000),
    ];
    write_file(
        root,
        "log_data/2018/11/2018-11-12-events.json",
        events.join("\n").as_bytes(),
    );
}

fn config(input: &Path, output: &Path, extra: &str) -> Config {
    let yaml = format!(
        "input:\n  path: {}\noutput:\n  path: {}\n{extra}",
        input.display(),
        output.display()
    );
    Config::parse(&yaml).unwrap()
}

async fn output_store(output: &Path) -> StorageProvider {
    StorageProvider::for_url_with_options(output.to_str().unwrap(), HashMap::new())
        .await
        .unwrap()
}

fn strings(batches: &[RecordBatch], column: &str) -> Vec<Option<String>> {
    let mut values: Vec<Option<String>> = batches
        .iter()
        .flat_map(|batch| {
            let array = batch.column_by_name(column).unwrap().as_string::<i32>();
            array
                .iter()
                .map(|v| v.map(str::to_string))
                .collect::<Vec<_>>()
        })
        .collect();
    values.sort();
    values
}

const TABLES: [&str; 5] = ["songs", "artists", "users", "time", "songplays"];

/// Every row of a table rendered as text, sorted.
fn table_rows(batches: &[RecordBatch]) -> Vec<String> {
    let options = FormatOptions::default();
    let mut rows = Vec::new();
    for batch in batches {
        // Timestamps are compared as raw micros; rendering a named zone needs chrono-tz
        let columns: Vec<ArrayRef> = batch
            .columns()
            .iter()
            .map(|column| match column.data_type() {
                DataType::Timestamp(..) => cast(column, &DataType::Int64).unwrap(),
                _ => column.clone(),
            })
            .collect();
        let formatters: Vec<ArrayFormatter> = columns
            .iter()
            .map(|column| ArrayFormatter::try_new(column.as_ref(), &options).unwrap())
            .collect();
        for row in 0..batch.num_rows() {
            let cells: Vec<String> = formatters.iter().map(|f| f.value(row).to_string()).collect();
            rows.push(cells.join("|"));
        }
    }
    rows.sort();
    rows
}

fn relative_files(root: &Path) -> Vec<String> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                pending.push(path);
            } else {
                let relative = path.strip_prefix(root).unwrap();
                files.push(relative.to_string_lossy().to_string());
            }
        }
    }
    files.sort();
    files
}

mod pipeline_tests {
    use super::*;

    #[tokio::test]
    async fn test_run_builds_every_table() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        seed_input(input.path());

        let stats = run_pipeline(&config(input.path(), output.path(), ""))
            .await
            .unwrap();

        assert_eq!(stats.song_records, 3);
        assert_eq!(stats.log_records, 4);
        assert_eq!(stats.play_events, 3);
        assert_eq!(stats.join.matched_events, 1);
        assert_eq!(stats.join.missed_events, 2);
        assert_eq!(stats.table("songs").unwrap().rows, 3);
        assert_eq!(stats.table("artists").unwrap().rows, 2);
        assert_eq!(stats.table("users").unwrap().rows, 1);
        assert_eq!(stats.table("time").unwrap().rows, 3);
        assert_eq!(stats.table("songplays").unwrap().rows, 1);

        for table in TABLES {
            assert!(
                output.path().join(table).join(SUCCESS_MARKER).is_file(),
                "missing marker for {table}"
            );
        }
    }

    #[tokio::test]
    async fn test_songplay_row_references_matched_song() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        seed_input(input.path());
        run_pipeline(&config(input.path(), output.path(), ""))
            .await
            .unwrap();

        let store = output_store(output.path()).await;
        let songplays = read_table(&store, "songplays").await.unwrap();
        assert_eq!(row_count(&songplays), 1);

        let batch = &songplays[0];
        assert_eq!(strings(&songplays, "song_id"), vec![Some("S1".to_string())]);
        assert_eq!(strings(&songplays, "artist_id"), vec![Some("AR1".to_string())]);
        assert_eq!(strings(&songplays, "user_id"), vec![Some("42".to_string())]);
        assert_eq!(strings(&songplays, "year"), vec![Some("2018".to_string())]);
        assert_eq!(strings(&songplays, "month"), vec![Some("11".to_string())]);

        let session = batch
            .column_by_name("session_id")
            .unwrap()
            .as_primitive::<Int32Type>();
        assert_eq!(session.value(0), 818);
    }

    #[tokio::test]
    async fn test_tables_use_partition_directories() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        seed_input(input.path());
        run_pipeline(&config(input.path(), output.path(), ""))
            .await
            .unwrap();

        let songs = relative_files(&output.path().join("songs"));
        assert!(
            songs
                .iter()
                .any(|f| f.starts_with("year=2000/artist_id=AR1/part-") && f.ends_with(".parquet"))
        );
        assert!(songs.iter().any(|f| f.starts_with("year=0/artist_id=AR2/")));

        let time = relative_files(&output.path().join("time"));
        assert!(time.iter().all(|f| f == SUCCESS_MARKER || f.starts_with("year=2018/month=11/")));

        let users = relative_files(&output.path().join("users"));
        assert!(users.iter().all(|f| !f.contains('=')));
    }

    #[tokio::test]
    async fn test_users_skip_null_ids_and_non_plays() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        seed_input(input.path());
        run_pipeline(&config(input.path(), output.path(), ""))
            .await
            .unwrap();

        let store = output_store(output.path()).await;
        let users = read_table(&store, "users").await.unwrap();
        assert_eq!(strings(&users, "user_id"), vec![Some("42".to_string())]);
        assert_eq!(strings(&users, "level"), vec![Some("free".to_string())]);
    }

    #[tokio::test]
    async fn test_rerun_replaces_output() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        seed_input(input.path());
        let config = config(input.path(), output.path(), "");

        run_pipeline(&config).await.unwrap();
        let store = output_store(output.path()).await;
        let mut first = Vec::new();
        for table in TABLES {
            let rows = table_rows(&read_table(&store, table).await.unwrap());
            let files = relative_files(&output.path().join(table)).len();
            first.push((rows, files));
        }

        let stats = run_pipeline(&config).await.unwrap();
        for (table, (rows, files)) in TABLES.into_iter().zip(first) {
            let second = table_rows(&read_table(&store, table).await.unwrap());
            assert_eq!(second, rows, "rows of {table} changed on rerun");
            assert_eq!(
                relative_files(&output.path().join(table)).len(),
                files,
                "files of {table} changed on rerun"
            );
            assert_eq!(stats.table(table).unwrap().replaced, files);
        }
    }

    #[tokio::test]
    async fn test_latest_policy_keeps_one_row_per_user() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        seed_input(input.path());
        write_file(
            input.path(),
            "log_data/2018/11/2018-11-13-events.json",
            event_json("NextSong", "\"42\"", "paid", "\"Fix You\"", "\"Coldplay\"", 1542100000000)
                .as_bytes(),
        );

        let distinct = run_pipeline(&config(input.path(), output.path(), ""))
            .await
            .unwrap();
        assert_eq!(distinct.table("users").unwrap().rows, 2);

        let latest = config(
            input.path(),
            output.path(),
            "transform:\n  user_level_policy: latest\n",
        );
        run_pipeline(&latest).await.unwrap();

        let store = output_store(output.path()).await;
        let users = read_table(&store, "users").await.unwrap();
        assert_eq!(strings(&users, "level"), vec![Some("paid".to_string())]);
    }

    #[tokio::test]
    async fn test_gzip_log_files_are_read() {
        use flate2::Compression;
        use flate2::write::GzEncoder;
        use std::io::Write;

        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        seed_input(input.path());

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        let event = event_json(
            "NextSong",
            "\"9\"",
            "paid",
            "\"Hey Jude\"",
            "\"The Beatles\"",
            1542200000000,
        );
        encoder.write_all(event.as_bytes()).unwrap();
        write_file(
            input.path(),
            "log_data/2018/11/2018-11-14-events.json.gz",
            &encoder.finish().unwrap(),
        );

        let stats = run_pipeline(&config(input.path(), output.path(), ""))
            .await
            .unwrap();
        assert_eq!(stats.log_records, 5);
        assert_eq!(stats.join.fact_rows, 2);
    }

    #[tokio::test]
    async fn test_conflicting_song_records_fail_the_run() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        seed_input(input.path());
        write_file(
            input.path(),
            "song_data/C/C/TRCCC01.json",
            song_json("S1", "Yellow (Live)", "AR1", "Coldplay", 2000).as_bytes(),
        );

        let err = run_pipeline(&config(input.path(), output.path(), ""))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Transform {
                source: TransformError::ConflictingSong { .. }
            }
        ));
        assert!(!output.path().join("songs").join(SUCCESS_MARKER).exists());
    }

    #[tokio::test]
    async fn test_schema_mismatch_fails_the_run() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        seed_input(input.path());
        write_file(
            input.path(),
            "log_data/2018/11/2018-11-15-events.json",
            br#"{"auth":"Logged In","itemInSession":0,"level":"free","method":"GET","page":"Home","sessionId":1,"status":200,"ts":"yesterday"}"#,
        );

        let err = run_pipeline(&config(input.path(), output.path(), ""))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Source {
                source: SourceError::Decode { .. }
            }
        ));
        assert!(err.to_string().contains("'ts'"));
        assert!(err.to_string().contains("record 1"));
    }

    #[tokio::test]
    async fn test_empty_log_corpus_writes_empty_tables() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write_file(
            input.path(),
            "song_data/A/A/TRAAA01.json",
            song_json("S1", "Yellow", "AR1", "Coldplay", 2000).as_bytes(),
        );
        fs::create_dir_all(input.path().join("log_data")).unwrap();

        let stats = run_pipeline(&config(input.path(), output.path(), ""))
            .await
            .unwrap();
        assert_eq!(stats.join.match_rate(), 1.0);
        assert_eq!(
            relative_files(&output.path().join("songplays")),
            vec![SUCCESS_MARKER.to_string()]
        );
    }
}

mod config_tests {
    use super::*;
    use sparkify::error::ConfigError;

    #[test]
    fn test_config_rejects_unknown_fields() {
        let yaml = "input:\n  path: /in\n  bucket: x\noutput:\n  path: /out\n";
        assert!(matches!(
            Config::parse(yaml),
            Err(ConfigError::YamlParse { .. })
        ));
    }

    #[tokio::test]
    async fn test_run_rejects_invalid_config() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let mut config = config(input.path(), output.path(), "");
        config.join.min_match_rate_warn = 1.5;

        let err = run_pipeline(&config).await.unwrap_err();
        assert!(matches!(err, PipelineError::Config { .. }));
    }
}
