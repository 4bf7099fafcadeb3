//! Shared fixtures.

use std::path::Path;

use sweep_core::record::RecordReader;
use sweep_core::snapshot::open_snapshot;
use sweep_core::{Key, Record, SweepConfig, Sweeper};

/// Config rooted at `dir` with retries disabled.
pub fn config(dir: &Path) -> SweepConfig {
    SweepConfig {
        data_dir: dir.to_path_buf(),
        sync_on_finish: false,
        io_max_retries: 0,
        io_retry_delay_ms: 0,
        ..Default::default()
    }
}

pub fn rec(id: i64, payload: &str) -> Record {
    Record::keyed(Key::i64(id), payload.as_bytes().to_vec())
}

/// Reads every record of the sweeper's persisted snapshot.
pub fn read_snapshot(sweeper: &Sweeper) -> Vec<Record> {
    let mut reader = open_snapshot(sweeper.paths(), sweeper.config()).unwrap();
    let mut records = Vec::new();
    while let Some(record) = reader.read().unwrap() {
        records.push(record);
    }
    records
}
