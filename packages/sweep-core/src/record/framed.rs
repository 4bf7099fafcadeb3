//! Length-prefixed record framing.
//!
//! Each record is stored as a `u32` little-endian byte count followed by a
//! bincode-encoded envelope holding the key and payload, so a reader knows
//! where a record ends before decoding it.

use std::io::{Read, Write};

use bincode::Options;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SweepError};
use crate::io_utils::{classify_io_error, read_full};

use super::{Record, RecordReader, RecordWriter};

/// Width of the length prefix in bytes.
pub const FRAME_PREFIX_LEN: usize = 4;

/// Envelope codec: fixed-width integers, and a frame must be consumed
/// exactly by its envelope.
fn envelope_codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    key: &'a [u8],
    payload: &'a [u8],
}

#[derive(Deserialize)]
struct Envelope {
    key: Vec<u8>,
    payload: Vec<u8>,
}

/// Reads length-prefixed envelopes until the stream is exhausted.
#[derive(Debug)]
pub struct FramedReader<R> {
    inner: R,
    max_frame_len: u32,
    position: u64,
}

impl<R> FramedReader<R> {
    pub fn new(inner: R, max_frame_len: u32) -> Self {
        Self {
            inner,
            max_frame_len,
            position: 0,
        }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.position
    }
}

impl<R: Read> RecordReader for FramedReader<R> {
    fn read(&mut self) -> Result<Option<Record>> {
        let offset = self.position;

        let mut prefix = [0u8; FRAME_PREFIX_LEN];
        let got = read_full(&mut self.inner, &mut prefix)
            .map_err(|e| classify_io_error(e, "Failed to read frame length"))?;
        if got == 0 {
            return Ok(None);
        }
        if got < FRAME_PREFIX_LEN {
            return Err(SweepError::MalformedRecord {
                offset,
                reason: format!("truncated length prefix: {} of {} bytes", got, FRAME_PREFIX_LEN),
            });
        }

        let len = u32::from_le_bytes(prefix);
        if len > self.max_frame_len {
            return Err(SweepError::MalformedRecord {
                offset,
                reason: format!("declared length {} exceeds limit {}", len, self.max_frame_len),
            });
        }

        let mut body = vec![0u8; len as usize];
        let got = read_full(&mut self.inner, &mut body)
            .map_err(|e| classify_io_error(e, "Failed to read frame body"))?;
        if got < body.len() {
            return Err(SweepError::MalformedRecord {
                offset,
                reason: format!("truncated envelope: {} of {} bytes", got, len),
            });
        }

        let envelope: Envelope = envelope_codec().deserialize(&body).map_err(|e| {
            SweepError::MalformedRecord {
                offset,
                reason: format!("undecodable envelope: {}", e),
            }
        })?;

        self.position += (FRAME_PREFIX_LEN + body.len()) as u64;
        Ok(Some(Record {
            key: envelope.key,
            payload: envelope.payload,
        }))
    }
}

/// Writes one length-prefixed envelope per record.
#[derive(Debug)]
pub struct FramedWriter<W> {
    inner: W,
    position: u64,
}

impl<W> FramedWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, position: 0 }
    }

    /// Bytes written so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> RecordWriter for FramedWriter<W> {
    fn write(&mut self, record: &Record) -> Result<()> {
        let body = envelope_codec().serialize(&EnvelopeRef {
            key: &record.key,
            payload: &record.payload,
        })?;
        let len = u32::try_from(body.len()).map_err(|_| {
            SweepError::Serialization(format!("envelope of {} bytes exceeds u32 framing", body.len()))
        })?;

        self.inner
            .write_all(&len.to_le_bytes())
            .and_then(|_| self.inner.write_all(&body))
            .map_err(|e| classify_io_error(e, "Failed to write record"))?;

        self.position += (FRAME_PREFIX_LEN + body.len()) as u64;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.inner
            .flush()
            .map_err(|e| classify_io_error(e, "Failed to flush records"))
    }
}
