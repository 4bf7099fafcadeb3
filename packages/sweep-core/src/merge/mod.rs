//! Three-way merge of a sorted source stream against a sorted snapshot.
//!
//! [`Merge`] is a state machine: each source record goes through
//! [`Merge::feed`], and [`Merge::finish`] drains the snapshot once the
//! source is exhausted. Pull and push drivers both sit on top of it, so
//! the classification logic exists once.
//!
//! At every step exactly one source record and one snapshot record (the
//! cursor) are in flight:
//! - source key < cursor key, or no cursor left: insert
//! - keys equal: update when payload bytes differ, then advance the cursor
//! - source key > cursor key: delete the cursor, advance it, and compare
//!   the same source record again
//!
//! Every inserted or matched source record is written to the next
//! snapshot in source order. Deleted records are never written.

mod change;
mod item;

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::config::SweepConfig;
use crate::error::{Result, SweepError};
use crate::key::compare;
use crate::record::{IntoRecord, Record, RecordReader, RecordWriter};

pub use change::{
    from_fn, Change, ChangeEvent, ChangeKind, ChangeSink, ChannelSink, CollectingSink, FnSink,
    SinkError, TracingSink,
};
pub(crate) use item::ItemAdapter;
pub use item::{ItemChange, ItemSink};

/// Counters collected over one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepStats {
    /// Records fed from the source
    pub source_records: u64,
    /// Records read from the previous snapshot
    pub snapshot_records: u64,
    pub inserted: u64,
    pub updated: u64,
    pub deleted: u64,
    /// Matched records with identical payloads
    pub unchanged: u64,
    /// Records written to the next snapshot
    pub written: u64,
    /// Ordering violations tolerated with `strict_ordering` off
    pub out_of_order: u64,
}

impl SweepStats {
    /// Whether the merge found any change at all.
    pub fn has_changes(&self) -> bool {
        self.inserted + self.updated + self.deleted > 0
    }
}

/// Knobs of the merge itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOptions {
    /// Fail on out-of-order keys instead of logging them
    pub strict_ordering: bool,
    /// Log progress every N written records (0 = never)
    pub progress_interval: u64,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            strict_ordering: true,
            progress_interval: 0,
        }
    }
}

impl From<&SweepConfig> for MergeOptions {
    fn from(config: &SweepConfig) -> Self {
        Self {
            strict_ordering: config.strict_ordering,
            progress_interval: config.progress_interval,
        }
    }
}

/// Merge state machine over a snapshot reader, a next-snapshot writer and
/// a change sink.
///
/// A failed [`Merge::feed`] poisons the machine; any later call returns
/// [`SweepError::Poisoned`].
#[derive(Debug)]
pub struct Merge<R, W, S> {
    snapshot: R,
    writer: W,
    sink: S,
    options: MergeOptions,
    /// Current snapshot record, `None` once the snapshot is exhausted
    cursor: Option<Record>,
    last_source_key: Option<Vec<u8>>,
    stats: SweepStats,
    poisoned: bool,
}

impl<R, W, S> Merge<R, W, S>
where
    R: RecordReader,
    W: RecordWriter,
    S: ChangeSink,
{
    /// Creates the machine and positions the cursor on the first snapshot
    /// record.
    pub fn new(snapshot: R, writer: W, sink: S, options: MergeOptions) -> Result<Self> {
        let mut merge = Self {
            snapshot,
            writer,
            sink,
            options,
            cursor: None,
            last_source_key: None,
            stats: SweepStats::default(),
            poisoned: false,
        };
        merge.advance(None)?;
        Ok(merge)
    }

    /// Processes one source record.
    pub fn feed(&mut self, record: Record) -> Result<()> {
        if self.poisoned {
            return Err(SweepError::Poisoned);
        }
        let result = self.step(record);
        if result.is_err() {
            self.poisoned = true;
        }
        result
    }

    /// Drains the remaining snapshot records as deletions and flushes the
    /// writer, handing it back for finalisation.
    pub fn finish(mut self) -> Result<(SweepStats, W)> {
        if self.poisoned {
            return Err(SweepError::Poisoned);
        }
        while let Some(old) = self.cursor.take() {
            self.emit(ChangeEvent::Delete(&old))?;
            self.stats.deleted += 1;
            self.advance(Some(&old))?;
        }
        self.writer.finish()?;
        tracing::debug!(
            written = self.stats.written,
            deleted = self.stats.deleted,
            "merge finished"
        );
        Ok((self.stats, self.writer))
    }

    /// Pull driver: feeds every item of `source`, then finishes.
    pub fn run<I>(mut self, source: I) -> Result<(SweepStats, W)>
    where
        I: IntoIterator,
        I::Item: IntoRecord,
    {
        for item in source {
            self.feed(item.into_record())?;
        }
        self.finish()
    }

    /// Pull driver for fallible sources. A source error aborts the merge
    /// as [`SweepError::Source`].
    pub fn try_run<I, T, E>(mut self, source: I) -> Result<(SweepStats, W)>
    where
        I: IntoIterator<Item = std::result::Result<T, E>>,
        T: IntoRecord,
        E: std::fmt::Display,
    {
        for item in source {
            match item {
                Ok(item) => self.feed(item.into_record())?,
                Err(e) => {
                    self.poisoned = true;
                    return Err(SweepError::source(e));
                }
            }
        }
        self.finish()
    }

    pub fn stats(&self) -> &SweepStats {
        &self.stats
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    fn step(&mut self, record: Record) -> Result<()> {
        self.stats.source_records += 1;
        self.check_source_order(&record)?;

        loop {
            let Some(old) = self.cursor.take() else {
                self.insert(&record)?;
                break;
            };
            match compare(&record.key, &old.key) {
                Ordering::Less => {
                    self.cursor = Some(old);
                    self.insert(&record)?;
                    break;
                }
                Ordering::Equal => {
                    if old.payload != record.payload {
                        self.emit(ChangeEvent::Update {
                            old: &old,
                            new: &record,
                        })?;
                        self.stats.updated += 1;
                    } else {
                        self.stats.unchanged += 1;
                    }
                    self.write(&record)?;
                    self.advance(Some(&old))?;
                    break;
                }
                Ordering::Greater => {
                    // The source record is compared again against the new cursor.
                    self.emit(ChangeEvent::Delete(&old))?;
                    self.stats.deleted += 1;
                    self.advance(Some(&old))?;
                }
            }
        }

        self.last_source_key = Some(record.key);
        Ok(())
    }

    fn insert(&mut self, record: &Record) -> Result<()> {
        self.emit(ChangeEvent::Insert(record))?;
        self.stats.inserted += 1;
        self.write(record)
    }

    /// Reads the next snapshot record into the cursor.
    fn advance(&mut self, previous: Option<&Record>) -> Result<()> {
        let next = self.snapshot.read()?;
        if let Some(next) = &next {
            self.stats.snapshot_records += 1;
            if let Some(previous) = previous {
                if compare(&next.key, &previous.key) == Ordering::Less {
                    self.ordering_violation("snapshot", self.stats.snapshot_records)?;
                }
            }
        }
        self.cursor = next;
        Ok(())
    }

    fn check_source_order(&mut self, record: &Record) -> Result<()> {
        let regressed = self
            .last_source_key
            .as_deref()
            .is_some_and(|last| compare(&record.key, last) == Ordering::Less);
        if regressed {
            self.ordering_violation("source", self.stats.source_records)?;
        }
        Ok(())
    }

    fn ordering_violation(&mut self, stream: &'static str, position: u64) -> Result<()> {
        if self.options.strict_ordering {
            return Err(SweepError::OutOfOrder { stream, position });
        }
        self.stats.out_of_order += 1;
        tracing::warn!(stream, position, "key sorts before its predecessor");
        Ok(())
    }

    fn emit(&mut self, event: ChangeEvent<'_>) -> Result<()> {
        self.sink.on_change(event).map_err(SweepError::sink)
    }

    fn write(&mut self, record: &Record) -> Result<()> {
        self.writer.write(record)?;
        self.stats.written += 1;
        let interval = self.options.progress_interval;
        if interval > 0 && self.stats.written % interval == 0 {
            tracing::debug!(written = self.stats.written, "sweep progress");
        }
        Ok(())
    }
}
