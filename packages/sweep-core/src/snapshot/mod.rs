//! Snapshot file pair and replace-on-success lifecycle.
//!
//! A logical name resolves to `<dir>/<name>.snapshot`, the last
//! known-good state, and `<dir>/<name>.next`, rewritten from scratch on
//! every run. The next file only replaces the snapshot after a merge
//! completes without error; on any failure it is removed (or left orphaned
//! when configured) and the snapshot is untouched.

mod inspect;

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::SweepConfig;
use crate::error::{Result, SweepError};
use crate::io_utils::{classify_io_error, retry_io_operation};
use crate::record::{FormatReader, FormatWriter};

pub use inspect::{inspect, SnapshotInfo};

/// Extension of the persisted snapshot.
pub const SNAPSHOT_EXTENSION: &str = "snapshot";
/// Extension of the snapshot being written.
pub const NEXT_EXTENSION: &str = "next";

/// Reader over a persisted snapshot file.
pub type SnapshotReader = FormatReader<BufReader<File>>;
/// Writer onto the next snapshot file.
pub type NextWriter = FormatWriter<BufWriter<File>>;

/// How the next snapshot replaces the persisted one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplaceStrategy {
    /// Delete the snapshot, then rename the next file into place. A crash
    /// between the two steps leaves only `<name>.next` behind.
    #[default]
    DeleteThenRename,
    /// Rename the next file over the snapshot in one step, where the
    /// platform replaces the target atomically.
    AtomicRename,
}

/// The two files backing one logical snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotPaths {
    pub snapshot: PathBuf,
    pub next: PathBuf,
}

impl SnapshotPaths {
    /// Resolves `name` inside `dir`.
    pub fn resolve(dir: impl AsRef<Path>, name: &str) -> Result<Self> {
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(SweepError::Config(format!(
                "Invalid snapshot name '{}'",
                name
            )));
        }
        let dir = dir.as_ref();
        Ok(Self {
            snapshot: dir.join(format!("{}.{}", name, SNAPSHOT_EXTENSION)),
            next: dir.join(format!("{}.{}", name, NEXT_EXTENSION)),
        })
    }
}

/// Opens the persisted snapshot, or `None` when there is none yet.
pub fn open_snapshot(paths: &SnapshotPaths, config: &SweepConfig) -> Result<Option<SnapshotReader>> {
    match File::open(&paths.snapshot) {
        Ok(file) => {
            let reader = BufReader::with_capacity(config.buffer_capacity, file);
            Ok(Some(config.format.reader(reader, config.max_frame_len)))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::info!(
                path = %paths.snapshot.display(),
                "No previous snapshot, starting from empty state"
            );
            Ok(None)
        }
        Err(e) => Err(classify_io_error(e, "Failed to open snapshot")),
    }
}

/// Creates (or truncates) the next snapshot file.
pub fn create_next(paths: &SnapshotPaths, config: &SweepConfig) -> Result<NextWriter> {
    if let Some(parent) = paths.next.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| classify_io_error(e, "Failed to create data directory"))?;
    }
    let file = File::create(&paths.next)
        .map_err(|e| classify_io_error(e, "Failed to create next snapshot"))?;
    Ok(config
        .format
        .writer(BufWriter::with_capacity(config.buffer_capacity, file)))
}

/// Flushes and closes the next snapshot, optionally syncing it to disk.
pub fn seal(writer: NextWriter, sync: bool) -> Result<()> {
    let file = writer
        .into_inner()
        .into_inner()
        .map_err(|e| classify_io_error(e.into_error(), "Failed to flush next snapshot"))?;
    if sync {
        file.sync_all()
            .map_err(|e| classify_io_error(e, "Failed to sync next snapshot"))?;
    }
    Ok(())
}

/// Replaces the persisted snapshot with the next one.
///
/// Only call this after a merge finished without error.
pub fn finalize(
    paths: &SnapshotPaths,
    strategy: ReplaceStrategy,
    max_retries: u32,
    retry_delay_ms: u64,
) -> Result<()> {
    if strategy == ReplaceStrategy::DeleteThenRename {
        retry_io_operation(
            || remove_if_exists(&paths.snapshot, "Failed to delete snapshot"),
            max_retries,
            retry_delay_ms,
            "finalize",
        )?;
    }
    retry_io_operation(
        || {
            fs::rename(&paths.next, &paths.snapshot)
                .map_err(|e| classify_io_error(e, "Failed to rename next snapshot"))
        },
        max_retries,
        retry_delay_ms,
        "finalize",
    )?;
    tracing::debug!(path = %paths.snapshot.display(), ?strategy, "snapshot replaced");
    Ok(())
}

/// Removes a leftover next snapshot.
pub fn discard(paths: &SnapshotPaths) -> Result<()> {
    remove_if_exists(&paths.next, "Failed to discard next snapshot")
}

fn remove_if_exists(path: &Path, context: &str) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(classify_io_error(e, context)),
    }
}

/// Removes the next snapshot file when dropped, unless disarmed.
///
/// Held for the whole sweep so every exit path, including panics and
/// early returns, cleans up the partial file.
#[derive(Debug)]
pub struct NextFileGuard {
    path: PathBuf,
    armed: bool,
}

impl NextFileGuard {
    /// Guards `path`; with `keep` set the file is never removed.
    pub fn new(path: impl Into<PathBuf>, keep: bool) -> Self {
        Self {
            path: path.into(),
            armed: !keep,
        }
    }

    /// Leaves the file in place.
    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for NextFileGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "discarded next snapshot"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                "Failed to discard next snapshot: {}",
                e
            ),
        }
    }
}
