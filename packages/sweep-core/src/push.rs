//! Push-mode sweeps, for producers that call back instead of being
//! iterated.
//!
//! The producer feeds records through [`PushSweep::on_next`] and ends the
//! run with exactly one terminal call: [`PushSweep::on_completed`] swaps
//! the snapshot, [`PushSweep::on_error`] abandons it. Both consume the
//! sweep, so nothing can be fed after termination.

use std::fmt::Display;
use std::sync::mpsc;
use std::time::Instant;

use crate::error::{Result, SweepError};
use crate::merge::{ChangeSink, SweepStats};
use crate::record::Record;
use crate::snapshot::NextFileGuard;
use crate::sweeper::{FileMerge, Sweeper};

/// One message from a push producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Next(Record),
    Error(String),
    Completed,
}

/// A sweep in progress, driven by its producer.
///
/// Dropping it without a terminal call discards the next snapshot.
#[derive(Debug)]
pub struct PushSweep<S> {
    sweeper: Sweeper,
    merge: FileMerge<S>,
    guard: NextFileGuard,
    started: Instant,
}

impl<S: ChangeSink> PushSweep<S> {
    pub(crate) fn new(
        sweeper: Sweeper,
        merge: FileMerge<S>,
        guard: NextFileGuard,
        started: Instant,
    ) -> Self {
        Self {
            sweeper,
            merge,
            guard,
            started,
        }
    }

    /// Feeds one record. After an error the sweep is poisoned and can only
    /// be terminated.
    pub fn on_next(&mut self, record: Record) -> Result<()> {
        self.merge.feed(record)
    }

    /// Abandons the sweep. The snapshot is left untouched.
    pub fn on_error(self, reason: impl Display) -> SweepError {
        let reason = reason.to_string();
        tracing::warn!(sweep = %self.sweeper.name(), "Producer aborted sweep: {}", reason);
        SweepError::Aborted(reason)
    }

    /// Finishes the merge and swaps the next snapshot in.
    pub fn on_completed(self) -> Result<SweepStats> {
        let outcome = self.merge.finish();
        self.sweeper.commit(outcome, self.guard, self.started)
    }

    pub fn stats(&self) -> &SweepStats {
        self.merge.stats()
    }

    /// Drives the sweep from a channel until a terminal signal arrives.
    ///
    /// A producer that hangs up without one aborts the sweep.
    pub fn drive_channel(self, rx: mpsc::Receiver<Signal>) -> Result<SweepStats> {
        self.drive(|| rx.recv().ok())
    }

    fn drive<F>(mut self, mut recv: F) -> Result<SweepStats>
    where
        F: FnMut() -> Option<Signal>,
    {
        loop {
            match recv() {
                Some(Signal::Next(record)) => self.on_next(record)?,
                Some(Signal::Error(reason)) => return Err(self.on_error(reason)),
                Some(Signal::Completed) => return self.on_completed(),
                None => {
                    return Err(self.on_error("producer disconnected without a terminal signal"))
                }
            }
        }
    }
}

#[cfg(feature = "async")]
impl<S: ChangeSink + Send + 'static> PushSweep<S> {
    /// Drives the sweep from a tokio channel. File I/O runs on the blocking
    /// pool.
    pub async fn drive_async(
        self,
        mut rx: tokio::sync::mpsc::Receiver<Signal>,
    ) -> Result<SweepStats> {
        tokio::task::spawn_blocking(move || self.drive(|| rx.blocking_recv()))
            .await
            .map_err(|e| SweepError::Aborted(format!("sweep task failed: {}", e)))?
    }
}
