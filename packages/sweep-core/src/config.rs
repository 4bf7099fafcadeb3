//! Sweep configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SweepError};
use crate::record::RecordFormat;
use crate::snapshot::ReplaceStrategy;

/// Sweep configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Directory holding `<name>.snapshot` and `<name>.next`
    pub data_dir: PathBuf,
    /// Record framing used for both snapshot files
    pub format: RecordFormat,
    /// How the next snapshot replaces the persisted one
    pub replace_strategy: ReplaceStrategy,
    /// Treat out-of-order keys as fatal instead of logging them
    pub strict_ordering: bool,
    /// Log progress every N written records (0 = never)
    pub progress_interval: u64,
    /// Largest framed envelope accepted when reading, in bytes
    pub max_frame_len: u32,
    /// Buffer capacity for snapshot readers and writers
    pub buffer_capacity: usize,
    /// fsync the next snapshot before swapping it in
    pub sync_on_finish: bool,
    /// Leave `<name>.next` on disk after a failed sweep
    pub keep_failed_next: bool,
    /// Maximum retry attempts for transient I/O errors
    pub io_max_retries: u32,
    /// Delay between retry attempts in milliseconds
    pub io_retry_delay_ms: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            format: RecordFormat::Framed,
            replace_strategy: ReplaceStrategy::DeleteThenRename,
            strict_ordering: true,
            progress_interval: 1000,
            max_frame_len: 64 * 1024 * 1024,
            buffer_capacity: 64 * 1024,
            sync_on_finish: true,
            keep_failed_next: false,
            io_max_retries: 3,
            io_retry_delay_ms: 100,
        }
    }
}

impl SweepConfig {
    /// Loads a configuration from a JSON file.
    ///
    /// Missing fields fall back to [`SweepConfig::default`].
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            SweepError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: SweepConfig = serde_json::from_str(&contents).map_err(|e| {
            SweepError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings no sweep could run with.
    pub fn validate(&self) -> Result<()> {
        if let RecordFormat::FixedWidth { id_size, data_size } = self.format {
            if id_size == 0 {
                return Err(SweepError::Config("id_size must be positive".into()));
            }
            if data_size == 0 {
                return Err(SweepError::Config("data_size must be positive".into()));
            }
        }
        if self.max_frame_len == 0 {
            return Err(SweepError::Config("max_frame_len must be positive".into()));
        }
        if self.buffer_capacity == 0 {
            return Err(SweepError::Config("buffer_capacity must be positive".into()));
        }
        Ok(())
    }
}
