//! In-memory partitioned collections with data-parallel operators.
//!
//! A [`Dataset`] is a list of row partitions. Operators run one rayon task per
//! partition, so transforms stay element-wise and the only cross-partition
//! steps are [`Dataset::shuffle`] (hash repartitioning) and [`HashIndex`]
//! builds for joins.

use rayon::prelude::*;
use std::borrow::Borrow;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

/// Default number of rows per partition.
pub const DEFAULT_PARTITION_ROWS: usize = 8192;

/// A partitioned, immutable collection of rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset<T> {
    partitions: Vec<Vec<T>>,
}

impl<T> Default for Dataset<T> {
    fn default() -> Self {
        Self {
            partitions: Vec::new(),
        }
    }
}

impl<T: Send + Sync> Dataset<T> {
    /// Wrap existing partitions. Empty partitions are dropped.
    pub fn from_partitions(partitions: Vec<Vec<T>>) -> Self {
        Self {
            partitions: partitions.into_iter().filter(|p| !p.is_empty()).collect(),
        }
    }

    /// Split rows into partitions of at most `partition_rows` rows.
    pub fn from_vec(rows: Vec<T>, partition_rows: usize) -> Self {
        let partition_rows = partition_rows.max(1);
        let mut partitions = Vec::with_capacity(rows.len().div_ceil(partition_rows));
        let mut rows = rows.into_iter().peekable();
        while rows.peek().is_some() {
            partitions.push(rows.by_ref().take(partition_rows).collect());
        }
        Self { partitions }
    }

    pub fn len(&self) -> usize {
        self.partitions.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.iter().all(Vec::is_empty)
    }

    pub fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    pub fn partitions(&self) -> &[Vec<T>] {
        &self.partitions
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.partitions.iter().flatten()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.partitions.into_iter().flatten().collect()
    }

    /// Apply `f` to every row.
    pub fn map<U, F>(&self, f: F) -> Dataset<U>
    where
        U: Send + Sync,
        F: Fn(&T) -> U + Sync + Send,
    {
        let partitions = self
            .partitions
            .par_iter()
            .map(|partition| partition.iter().map(&f).collect())
            .collect();
        Dataset { partitions }
    }

    /// Apply `f` to every row, consuming the dataset.
    pub fn into_map<U, F>(self, f: F) -> Dataset<U>
    where
        U: Send + Sync,
        F: Fn(T) -> U + Sync + Send,
    {
        let partitions = self
            .partitions
            .into_par_iter()
            .map(|partition| partition.into_iter().map(&f).collect())
            .collect();
        Dataset { partitions }
    }

    /// Keep rows matching `predicate`.
    pub fn filter<F>(self, predicate: F) -> Dataset<T>
    where
        F: Fn(&T) -> bool + Sync + Send,
    {
        let partitions = self
            .partitions
            .into_par_iter()
            .map(|partition| partition.into_iter().filter(|row| predicate(row)).collect())
            .collect();
        Dataset::from_partitions(partitions)
    }

    /// Map every row and keep the `Some` results.
    pub fn filter_map<U, F>(&self, f: F) -> Dataset<U>
    where
        U: Send + Sync,
        F: Fn(&T) -> Option<U> + Sync + Send,
    {
        let partitions = self
            .partitions
            .par_iter()
            .map(|partition| partition.iter().filter_map(&f).collect())
            .collect();
        Dataset::from_partitions(partitions)
    }

    /// Map every row to zero or more rows.
    pub fn flat_map<U, I, F>(&self, f: F) -> Dataset<U>
    where
        U: Send + Sync,
        I: IntoIterator<Item = U>,
        F: Fn(&T) -> I + Sync + Send,
    {
        let partitions = self
            .partitions
            .par_iter()
            .map(|partition| partition.iter().flat_map(&f).collect())
            .collect();
        Dataset::from_partitions(partitions)
    }

    /// Run `f` over whole partitions.
    pub fn map_partitions<U, F>(self, f: F) -> Dataset<U>
    where
        U: Send + Sync,
        F: Fn(Vec<T>) -> Vec<U> + Sync + Send,
    {
        let partitions = self.partitions.into_par_iter().map(f).collect();
        Dataset::from_partitions(partitions)
    }

    /// Run `f` over whole partitions, failing on the first error.
    pub fn try_map_partitions<U, E, F>(self, f: F) -> Result<Dataset<U>, E>
    where
        U: Send + Sync,
        E: Send,
        F: Fn(Vec<T>) -> Result<Vec<U>, E> + Sync + Send,
    {
        let partitions = self
            .partitions
            .into_par_iter()
            .map(f)
            .collect::<Result<Vec<_>, E>>()?;
        Ok(Dataset::from_partitions(partitions))
    }

    /// Count rows matching `predicate`.
    pub fn count_where<F>(&self, predicate: F) -> usize
    where
        F: Fn(&T) -> bool + Sync + Send,
    {
        self.partitions
            .par_iter()
            .map(|partition| partition.iter().filter(|row| predicate(row)).count())
            .sum()
    }

    /// Hash-repartition rows so equal keys land in the same partition.
    ///
    /// The partition count is kept. Relative row order within a key is
    /// preserved.
    pub fn shuffle<K, F>(self, key: F) -> Dataset<T>
    where
        K: Hash,
        F: Fn(&T) -> K + Sync + Send,
    {
        let buckets = self.partitions.len().max(1);

        // Scatter each partition into per-bucket runs, then gather runs bucket by bucket.
        let scattered: Vec<Vec<Vec<T>>> = self
            .partitions
            .into_par_iter()
            .map(|partition| {
                let mut runs: Vec<Vec<T>> = (0..buckets).map(|_| Vec::new()).collect();
                for row in partition {
                    runs[bucket_of(&key(&row), buckets)].push(row);
                }
                runs
            })
            .collect();

        let mut partitions: Vec<Vec<T>> = (0..buckets).map(|_| Vec::new()).collect();
        for runs in scattered {
            for (bucket, run) in runs.into_iter().enumerate() {
                partitions[bucket].extend(run);
            }
        }
        Dataset::from_partitions(partitions)
    }
}

impl<T: Send + Sync + Eq + Hash + Clone> Dataset<T> {
    /// Remove duplicate rows, keeping the first occurrence of each.
    pub fn distinct(self) -> Dataset<T> {
        let shuffled = self.shuffle(|row| hash_of(row));
        let partitions = shuffled
            .partitions
            .into_par_iter()
            .map(|partition| {
                let mut seen = HashSet::with_capacity(partition.len());
                partition
                    .into_iter()
                    .filter(|row| seen.insert(row.clone()))
                    .collect()
            })
            .collect();
        Dataset::from_partitions(partitions)
    }
}

fn hash_of<K: Hash>(key: &K) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

fn bucket_of<K: Hash>(key: &K, buckets: usize) -> usize {
    (hash_of(key) % buckets as u64) as usize
}

/// A build-side lookup table for hash joins.
///
/// Rows whose key is `None` are never indexed, so they never match.
#[derive(Debug)]
pub struct HashIndex<K, R> {
    entries: HashMap<K, Vec<R>>,
}

impl<K, R> HashIndex<K, R>
where
    K: Eq + Hash + Send,
    R: Clone + Send + Sync,
{
    /// Index every row of `build` under `key(row)`.
    pub fn build<F>(build: &Dataset<R>, key: F) -> Self
    where
        F: Fn(&R) -> Option<K> + Sync + Send,
    {
        let partials: Vec<HashMap<K, Vec<R>>> = build
            .partitions
            .par_iter()
            .map(|partition| {
                let mut entries: HashMap<K, Vec<R>> = HashMap::new();
                for row in partition {
                    if let Some(k) = key(row) {
                        entries.entry(k).or_default().push(row.clone());
                    }
                }
                entries
            })
            .collect();

        let mut entries: HashMap<K, Vec<R>> = HashMap::new();
        for partial in partials {
            for (k, rows) in partial {
                entries.entry(k).or_default().extend(rows);
            }
        }
        Self { entries }
    }

    /// Rows indexed under `key`. Empty when nothing matches.
    pub fn probe<Q>(&self, key: &Q) -> &[R]
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
