//! Fixed-width record framing.

use std::io::{Read, Write};

use crate::error::{Result, SweepError};
use crate::io_utils::{classify_io_error, read_full};

use super::{Record, RecordReader, RecordWriter};

/// Reads records of exactly `id_size + data_size` bytes.
#[derive(Debug)]
pub struct FixedWidthReader<R> {
    inner: R,
    id_size: usize,
    data_size: usize,
    position: u64,
}

impl<R> FixedWidthReader<R> {
    pub fn new(inner: R, id_size: usize, data_size: usize) -> Self {
        Self {
            inner,
            id_size,
            data_size,
            position: 0,
        }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.position
    }
}

impl<R: Read> RecordReader for FixedWidthReader<R> {
    fn read(&mut self) -> Result<Option<Record>> {
        let offset = self.position;

        let mut key = vec![0u8; self.id_size];
        let got = read_full(&mut self.inner, &mut key)
            .map_err(|e| classify_io_error(e, "Failed to read record id"))?;
        if got == 0 {
            return Ok(None);
        }
        if got < self.id_size {
            return Err(SweepError::MalformedRecord {
                offset,
                reason: format!("truncated id: {} of {} bytes", got, self.id_size),
            });
        }

        let mut payload = vec![0u8; self.data_size];
        let got = read_full(&mut self.inner, &mut payload)
            .map_err(|e| classify_io_error(e, "Failed to read record data"))?;
        if got < self.data_size {
            return Err(SweepError::MalformedRecord {
                offset,
                reason: format!("truncated data: {} of {} bytes", got, self.data_size),
            });
        }

        self.position += (self.id_size + self.data_size) as u64;
        Ok(Some(Record { key, payload }))
    }
}

/// Writes records as raw `id_size` key bytes followed by `data_size`
/// payload bytes.
///
/// Keys shorter than `id_size` are zero-padded, which the key comparator
/// treats as absence. Payloads must match `data_size` exactly.
#[derive(Debug)]
pub struct FixedWidthWriter<W> {
    inner: W,
    id_size: usize,
    data_size: usize,
    position: u64,
}

impl<W> FixedWidthWriter<W> {
    pub fn new(inner: W, id_size: usize, data_size: usize) -> Self {
        Self {
            inner,
            id_size,
            data_size,
            position: 0,
        }
    }

    /// Bytes written so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> RecordWriter for FixedWidthWriter<W> {
    fn write(&mut self, record: &Record) -> Result<()> {
        if record.key.len() > self.id_size {
            return Err(SweepError::FieldWidth {
                field: "id",
                expected: self.id_size,
                got: record.key.len(),
            });
        }
        if record.payload.len() != self.data_size {
            return Err(SweepError::FieldWidth {
                field: "data",
                expected: self.data_size,
                got: record.payload.len(),
            });
        }

        let padding = self.id_size - record.key.len();
        write_fields(&mut self.inner, &record.key, padding, &record.payload)
            .map_err(|e| classify_io_error(e, "Failed to write record"))?;

        self.position += (self.id_size + self.data_size) as u64;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.inner
            .flush()
            .map_err(|e| classify_io_error(e, "Failed to flush records"))
    }
}

fn write_fields<W: Write>(
    out: &mut W,
    key: &[u8],
    padding: usize,
    payload: &[u8],
) -> std::io::Result<()> {
    out.write_all(key)?;
    if padding > 0 {
        out.write_all(&vec![0u8; padding])?;
    }
    out.write_all(payload)
}
