//! File-backed sweeps: one logical snapshot, compared against a fresh
//! source on every run.

use std::convert::Infallible;
use std::fmt::Display;
use std::time::Instant;

use crate::config::SweepConfig;
use crate::error::Result;
use crate::key::Key;
use crate::merge::{ChangeSink, ItemAdapter, ItemSink, Merge, MergeOptions, SweepStats};
use crate::push::PushSweep;
use crate::record::{Converter, IntoRecord};
use crate::snapshot::{self, NextFileGuard, NextWriter, SnapshotInfo, SnapshotPaths, SnapshotReader};

/// Merge wired to the snapshot files of a [`Sweeper`].
pub(crate) type FileMerge<S> = Merge<Option<SnapshotReader>, NextWriter, S>;

/// Runs sweeps against `<data_dir>/<name>.snapshot`.
///
/// Each run reads the persisted snapshot alongside the source, writes the
/// source to `<name>.next` and, only when the whole merge succeeded, swaps
/// the next file in. A failed run leaves the snapshot exactly as it was.
///
/// A `Sweeper` does not lock its files. Running two sweeps over the same
/// name at once is not supported.
#[derive(Debug, Clone)]
pub struct Sweeper {
    config: SweepConfig,
    name: String,
    paths: SnapshotPaths,
}

impl Sweeper {
    pub fn new(config: SweepConfig, name: impl Into<String>) -> Result<Self> {
        config.validate()?;
        let name = name.into();
        let paths = SnapshotPaths::resolve(&config.data_dir, &name)?;
        Ok(Self {
            config,
            name,
            paths,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    pub fn paths(&self) -> &SnapshotPaths {
        &self.paths
    }

    /// Sweeps an infallible, key-ordered source.
    pub fn run<I, S>(&self, source: I, sink: S) -> Result<SweepStats>
    where
        I: IntoIterator,
        I::Item: IntoRecord,
        S: ChangeSink,
    {
        self.try_run(source.into_iter().map(Ok::<_, Infallible>), sink)
    }

    /// Sweeps a fallible source. The first source error aborts the run.
    pub fn try_run<I, T, E, S>(&self, source: I, sink: S) -> Result<SweepStats>
    where
        I: IntoIterator<Item = std::result::Result<T, E>>,
        T: IntoRecord,
        E: Display,
        S: ChangeSink,
    {
        let started = Instant::now();
        let (merge, guard) = self.begin(sink)?;
        let outcome = merge.try_run(source);
        self.commit(outcome, guard, started)
    }

    /// Sweeps domain items through a key/payload converter.
    pub fn run_items<I, FK, FP, FD, S>(
        &self,
        items: I,
        converter: &Converter<FK, FP, FD>,
        sink: S,
    ) -> Result<SweepStats>
    where
        I: IntoIterator,
        FK: Fn(&I::Item) -> Key,
        FP: Fn(&I::Item) -> Vec<u8>,
        S: ChangeSink,
    {
        self.run(items.into_iter().map(|item| converter.convert(&item)), sink)
    }

    /// Sweeps domain items and reports changes as typed identities.
    ///
    /// Inserts and updates hand the sink the source item; deletes hand it
    /// the identity decoded from the snapshot key by the converter's key
    /// decoder.
    pub fn run_typed<I, FK, FP, FD, Id, S>(
        &self,
        items: I,
        converter: &Converter<FK, FP, FD>,
        sink: S,
    ) -> Result<SweepStats>
    where
        I: IntoIterator,
        FK: Fn(&I::Item) -> Key,
        FP: Fn(&I::Item) -> Vec<u8>,
        FD: Fn(&[u8]) -> Id,
        S: ItemSink<Id, I::Item>,
    {
        let started = Instant::now();
        let adapter = ItemAdapter::new(|key: &[u8]| converter.decode_key(key), sink);
        let (mut merge, guard) = self.begin(adapter)?;
        let fed = items.into_iter().try_for_each(|item| {
            let record = converter.convert(&item);
            merge.sink_mut().current = Some(item);
            merge.feed(record)
        });
        let outcome = fed.and_then(|()| merge.finish());
        self.commit(outcome, guard, started)
    }

    /// Starts a push-mode sweep: the producer hands records over one by
    /// one and ends with a completion or error signal.
    pub fn subscribe<S: ChangeSink>(&self, sink: S) -> Result<PushSweep<S>> {
        let started = Instant::now();
        let (merge, guard) = self.begin(sink)?;
        Ok(PushSweep::new(self.clone(), merge, guard, started))
    }

    /// Summarises the persisted snapshot without sweeping.
    pub fn inspect(&self) -> Result<SnapshotInfo> {
        snapshot::inspect(&self.paths, &self.config)
    }

    /// Removes a `<name>.next` left behind by an interrupted run.
    pub fn discard_next(&self) -> Result<()> {
        snapshot::discard(&self.paths)
    }

    /// Opens both snapshot files and positions a merge over them.
    fn begin<S: ChangeSink>(&self, sink: S) -> Result<(FileMerge<S>, NextFileGuard)> {
        tracing::info!(sweep = %self.name, path = %self.paths.snapshot.display(), "sweep started");
        let reader = snapshot::open_snapshot(&self.paths, &self.config)?;
        let writer = snapshot::create_next(&self.paths, &self.config)?;
        let guard = NextFileGuard::new(&self.paths.next, self.config.keep_failed_next);
        let merge = Merge::new(reader, writer, sink, MergeOptions::from(&self.config))?;
        Ok((merge, guard))
    }

    /// Swaps the next snapshot in after a successful merge. On failure the
    /// guard discards the next file.
    pub(crate) fn commit(
        &self,
        outcome: Result<(SweepStats, NextWriter)>,
        guard: NextFileGuard,
        started: Instant,
    ) -> Result<SweepStats> {
        let (stats, writer) = match outcome {
            Ok(done) => done,
            Err(e) => {
                tracing::error!(sweep = %self.name, "Sweep failed, snapshot left untouched: {}", e);
                return Err(e);
            }
        };

        snapshot::seal(writer, self.config.sync_on_finish)?;
        if let Err(e) = snapshot::finalize(
            &self.paths,
            self.config.replace_strategy,
            self.config.io_max_retries,
            self.config.io_retry_delay_ms,
        ) {
            if !self.paths.snapshot.exists() && self.paths.next.exists() {
                // The old snapshot is gone; the next file is the only copy left.
                guard.disarm();
                tracing::error!(
                    sweep = %self.name,
                    path = %self.paths.next.display(),
                    "Snapshot swap failed, next snapshot kept for recovery: {}",
                    e
                );
            }
            return Err(e);
        }
        guard.disarm();

        tracing::info!(
            sweep = %self.name,
            inserted = stats.inserted,
            updated = stats.updated,
            deleted = stats.deleted,
            unchanged = stats.unchanged,
            out_of_order = stats.out_of_order,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "sweep completed"
        );
        Ok(stats)
    }
}
