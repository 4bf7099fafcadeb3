//! Change events and the sinks that receive them.

use std::fmt;
use std::sync::mpsc;

use serde::{Deserialize, Serialize};

use crate::record::Record;

/// Error type returned by sinks.
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// Classification of one merge position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Insert => write!(f, "insert"),
            ChangeKind::Update => write!(f, "update"),
            ChangeKind::Delete => write!(f, "delete"),
        }
    }
}

/// A change detected during the merge, borrowed from the records in
/// flight. Sinks that need to keep it call [`ChangeEvent::to_change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent<'a> {
    /// Source record with no counterpart in the snapshot
    Insert(&'a Record),
    /// Same key in both streams with different payload bytes
    Update { old: &'a Record, new: &'a Record },
    /// Snapshot record whose key is gone from the source
    Delete(&'a Record),
}

impl<'a> ChangeEvent<'a> {
    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeEvent::Insert(_) => ChangeKind::Insert,
            ChangeEvent::Update { .. } => ChangeKind::Update,
            ChangeEvent::Delete(_) => ChangeKind::Delete,
        }
    }

    /// Key the event refers to.
    pub fn key(&self) -> &'a [u8] {
        match *self {
            ChangeEvent::Insert(record) | ChangeEvent::Delete(record) => &record.key,
            ChangeEvent::Update { new, .. } => &new.key,
        }
    }

    pub fn to_change(&self) -> Change {
        match *self {
            ChangeEvent::Insert(record) => Change::Insert {
                record: record.clone(),
            },
            ChangeEvent::Update { old, new } => Change::Update {
                key: new.key.clone(),
                old: old.payload.clone(),
                new: new.payload.clone(),
            },
            ChangeEvent::Delete(record) => Change::Delete {
                key: record.key.clone(),
            },
        }
    }
}

/// Owned form of a [`ChangeEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Change {
    Insert { record: Record },
    Update { key: Vec<u8>, old: Vec<u8>, new: Vec<u8> },
    Delete { key: Vec<u8> },
}

impl Change {
    pub fn kind(&self) -> ChangeKind {
        match self {
            Change::Insert { .. } => ChangeKind::Insert,
            Change::Update { .. } => ChangeKind::Update,
            Change::Delete { .. } => ChangeKind::Delete,
        }
    }

    pub fn key(&self) -> &[u8] {
        match self {
            Change::Insert { record } => &record.key,
            Change::Update { key, .. } | Change::Delete { key } => key,
        }
    }
}

/// Receives one call per change, in merge order.
///
/// An error aborts the sweep. Events delivered before the failure are not
/// retracted, so sinks must tolerate an abort after partial delivery.
pub trait ChangeSink {
    fn on_change(&mut self, event: ChangeEvent<'_>) -> Result<(), SinkError>;
}

impl<T: ChangeSink + ?Sized> ChangeSink for &mut T {
    fn on_change(&mut self, event: ChangeEvent<'_>) -> Result<(), SinkError> {
        (**self).on_change(event)
    }
}

impl<T: ChangeSink + ?Sized> ChangeSink for Box<T> {
    fn on_change(&mut self, event: ChangeEvent<'_>) -> Result<(), SinkError> {
        (**self).on_change(event)
    }
}

/// Sink backed by a closure. See [`from_fn`].
pub struct FnSink<F>(F);

/// Wraps a closure as a [`ChangeSink`].
pub fn from_fn<F>(f: F) -> FnSink<F>
where
    F: FnMut(ChangeEvent<'_>) -> Result<(), SinkError>,
{
    FnSink(f)
}

impl<F> ChangeSink for FnSink<F>
where
    F: FnMut(ChangeEvent<'_>) -> Result<(), SinkError>,
{
    fn on_change(&mut self, event: ChangeEvent<'_>) -> Result<(), SinkError> {
        (self.0)(event)
    }
}

/// Keeps every change in memory.
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    pub changes: Vec<Change>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, kind: ChangeKind) -> usize {
        self.changes.iter().filter(|c| c.kind() == kind).count()
    }
}

impl ChangeSink for CollectingSink {
    fn on_change(&mut self, event: ChangeEvent<'_>) -> Result<(), SinkError> {
        self.changes.push(event.to_change());
        Ok(())
    }
}

/// Logs every change through `tracing`.
#[derive(Debug, Clone)]
pub struct TracingSink {
    name: String,
}

impl TracingSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl ChangeSink for TracingSink {
    fn on_change(&mut self, event: ChangeEvent<'_>) -> Result<(), SinkError> {
        match event {
            ChangeEvent::Update { old, new } => tracing::info!(
                sweep = %self.name,
                kind = %event.kind(),
                key = ?new.key,
                old_len = old.payload.len(),
                new_len = new.payload.len(),
                "change"
            ),
            _ => tracing::info!(
                sweep = %self.name,
                kind = %event.kind(),
                key = ?event.key(),
                "change"
            ),
        }
        Ok(())
    }
}

/// Forwards owned changes to a channel, e.g. a consumer thread.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Change>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<Change>) -> Self {
        Self { tx }
    }
}

impl ChangeSink for ChannelSink {
    fn on_change(&mut self, event: ChangeEvent<'_>) -> Result<(), SinkError> {
        self.tx
            .send(event.to_change())
            .map_err(|_| "change receiver disconnected".into())
    }
}
