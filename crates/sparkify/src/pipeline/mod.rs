//! End-to-end run: raw corpora in, five tables out.
//!
//! The song stage is decoded, transformed and written before the log stage
//! starts, because the songplay join needs the song dimension. CPU work runs
//! on a dedicated rayon pool behind `spawn_blocking`; listing, downloads and
//! uploads stay on the tokio runtime.

use rayon::{ThreadPool, ThreadPoolBuilder};
use snafu::prelude::*;
use sparkify_core::metrics::events::StageCompleted;
use sparkify_core::{StorageProvider, emit};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use crate::config::Config;
use crate::engine::Dataset;
use crate::error::{PipelineError, TaskJoinSnafu, WorkerPoolSnafu};
use crate::join::{JoinStats, SongplayJoiner};
use crate::model::SongDimensionRow;
use crate::schema::{LogEventRecord, RecordKind, SongMetadataRecord};
use crate::sink::{ARTISTS, PartitionedWriter, SONGPLAYS, SONGS, TIME, TableWriteStats, USERS};
use crate::source::{CorpusReader, decode_files};
use crate::transform::{
    extract_artists, extract_songs, extract_time, extract_users, filter_play_events,
    song_dimension,
};

/// Summary of a completed run.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub song_records: usize,
    pub log_records: usize,
    pub play_events: usize,
    pub join: JoinStats,
    /// Per-table write stats, in write order.
    pub tables: Vec<(&'static str, TableWriteStats)>,
    pub duration: Duration,
}

impl PipelineStats {
    /// Write stats of one table.
    pub fn table(&self, name: &str) -> Option<&TableWriteStats> {
        self.tables
            .iter()
            .find(|(table, _)| *table == name)
            .map(|(_, stats)| stats)
    }
}

fn build_pool(parallelism: usize) -> Result<ThreadPool, PipelineError> {
    ThreadPoolBuilder::new()
        .num_threads(parallelism)
        .thread_name(|i| format!("sparkify-worker-{i}"))
        .build()
        .context(WorkerPoolSnafu)
}

/// Run `f` on the worker pool without blocking the runtime.
async fn run_cpu<T, F>(pool: &Arc<ThreadPool>, f: F) -> Result<T, PipelineError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, PipelineError> + Send + 'static,
{
    let pool = Arc::clone(pool);
    tokio::task::spawn_blocking(move || pool.install(f))
        .await
        .context(TaskJoinSnafu)?
}

struct Pipeline<'a> {
    config: &'a Config,
    pool: Arc<ThreadPool>,
    reader: CorpusReader,
    writer: PartitionedWriter,
    stats: PipelineStats,
}

impl Pipeline<'_> {
    /// Songs and artists. Returns the song dimension for the join.
    async fn song_stage(&mut self) -> Result<Dataset<SongDimensionRow>, PipelineError> {
        let start = Instant::now();
        let files = self
            .reader
            .fetch(&self.config.input.song_prefix, RecordKind::SongMetadata)
            .await?;
        let partition_rows = self.config.transform.partition_rows;

        let (records, songs, artists, dimension) = run_cpu(&self.pool, move || {
            let records = decode_files::<SongMetadataRecord>(&files, partition_rows)?;
            let songs = extract_songs(&records)?;
            let artists = extract_artists(&records);
            let dimension = song_dimension(&records);
            Ok((records.len(), songs, artists, dimension))
        })
        .await?;
        self.stats.song_records = records;

        let written = self.writer.write_table(SONGS, &songs).await?;
        self.stats.tables.push((SONGS.name, written));
        let written = self.writer.write_table(ARTISTS, &artists).await?;
        self.stats.tables.push((ARTISTS.name, written));

        emit!(StageCompleted {
            stage: "songs",
            duration: start.elapsed(),
        });
        Ok(dimension)
    }

    /// Users, time and songplays.
    async fn log_stage(
        &mut self,
        dimension: Dataset<SongDimensionRow>,
    ) -> Result<(), PipelineError> {
        let start = Instant::now();
        let files = self
            .reader
            .fetch(&self.config.input.log_prefix, RecordKind::LogEvent)
            .await?;
        let partition_rows = self.config.transform.partition_rows;
        let policy = self.config.transform.user_level_policy;

        let (records, play_events, users, time, songplays, join) =
            run_cpu(&self.pool, move || {
                let events = decode_files::<LogEventRecord>(&files, partition_rows)?;
                let records = events.len();
                let plays = filter_play_events(events);
                let users = extract_users(&plays, policy);
                let time = extract_time(&plays);
                let (songplays, join) = SongplayJoiner::new(&dimension).join(&plays);
                Ok((records, plays.len(), users, time, songplays, join))
            })
            .await?;
        self.stats.log_records = records;
        self.stats.play_events = play_events;
        self.stats.join = join;
        join.report(self.config.join.min_match_rate_warn);

        let written = self.writer.write_table(USERS, &users).await?;
        self.stats.tables.push((USERS.name, written));
        let written = self.writer.write_table(TIME, &time).await?;
        self.stats.tables.push((TIME.name, written));
        let written = self.writer.write_table(SONGPLAYS, &songplays).await?;
        self.stats.tables.push((SONGPLAYS.name, written));

        emit!(StageCompleted {
            stage: "logs",
            duration: start.elapsed(),
        });
        Ok(())
    }
}

/// Build the star schema from the configured input into the configured output.
///
/// Every table is fully replaced. A failure aborts the run and leaves the
/// failing table without its `_SUCCESS` marker; rerunning is the recovery path.
pub async fn run_pipeline(config: &Config) -> Result<PipelineStats, PipelineError> {
    let start = Instant::now();
    config.validate()?;

    let input = StorageProvider::for_url_with_options(
        &config.input.path,
        config.input.storage_options.clone(),
    )
    .await?;
    let output = StorageProvider::for_url_with_options(
        &config.output.path,
        config.output.storage_options.clone(),
    )
    .await?;
    info!(
        input = input.canonical_url(),
        output = output.canonical_url(),
        "Starting sparkify run"
    );

    let mut pipeline = Pipeline {
        config,
        pool: Arc::new(build_pool(config.transform.parallelism)?),
        reader: CorpusReader::new(Arc::new(input), config.input.max_concurrent_files),
        writer: PartitionedWriter::new(Arc::new(output), config.output.writer_config())
            .with_max_concurrent_uploads(config.output.max_concurrent_uploads),
        stats: PipelineStats::default(),
    };

    let dimension = pipeline.song_stage().await?;
    pipeline.log_stage(dimension).await?;

    let mut stats = pipeline.stats;
    stats.duration = start.elapsed();
    info!(
        song_records = stats.song_records,
        log_records = stats.log_records,
        play_events = stats.play_events,
        songplays = stats.join.fact_rows,
        duration_ms = stats.duration.as_millis(),
        "Sparkify run completed"
    );
    Ok(stats)
}
