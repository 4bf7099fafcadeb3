//! Read-only snapshot inspection.

use std::fs::File;
use std::io::{self, BufReader, ErrorKind, Read};
use std::path::PathBuf;

use crc32fast::Hasher;
use serde::Serialize;

use crate::config::SweepConfig;
use crate::error::Result;
use crate::io_utils::classify_io_error;
use crate::record::RecordReader;

use super::SnapshotPaths;

/// Summary of a persisted snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotInfo {
    pub path: PathBuf,
    pub exists: bool,
    /// Number of records the file decodes to
    pub records: u64,
    /// File size in bytes
    pub bytes: u64,
    /// CRC32 over the raw file contents
    pub crc32: u32,
}

/// Feeds every byte read through a CRC32 hasher.
struct HashingReader<R> {
    inner: R,
    hasher: Hasher,
    bytes: u64,
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        self.bytes += n as u64;
        Ok(n)
    }
}

/// Decodes every record of the snapshot and checksums the file.
///
/// Fails with `MalformedRecord` on the same inputs a sweep would.
pub fn inspect(paths: &SnapshotPaths, config: &SweepConfig) -> Result<SnapshotInfo> {
    let file = match File::open(&paths.snapshot) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Ok(SnapshotInfo {
                path: paths.snapshot.clone(),
                exists: false,
                records: 0,
                bytes: 0,
                crc32: 0,
            });
        }
        Err(e) => return Err(classify_io_error(e, "Failed to open snapshot")),
    };

    let mut hashing = HashingReader {
        inner: BufReader::with_capacity(config.buffer_capacity, file),
        hasher: Hasher::new(),
        bytes: 0,
    };
    let mut records = 0u64;
    {
        let mut reader = config.format.reader(&mut hashing, config.max_frame_len);
        while reader.read()?.is_some() {
            records += 1;
        }
    }

    Ok(SnapshotInfo {
        path: paths.snapshot.clone(),
        exists: true,
        records,
        bytes: hashing.bytes,
        crc32: hashing.hasher.finalize(),
    })
}
