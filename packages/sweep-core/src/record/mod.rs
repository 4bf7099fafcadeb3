//! Sequential record store with pluggable framing.
//!
//! Two strategies persist the same logical [`Record`]:
//! - [`FramedReader`]/[`FramedWriter`]: a 32-bit little-endian length
//!   prefix followed by a serialized `{ key, payload }` envelope.
//! - [`FixedWidthReader`]/[`FixedWidthWriter`]: raw `id_size` key bytes
//!   followed by raw `data_size` payload bytes, no delimiters.

mod fixed;
mod framed;

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::key::Key;

pub use fixed::{FixedWidthReader, FixedWidthWriter};
pub use framed::{FramedReader, FramedWriter, FRAME_PREFIX_LEN};

/// A key/payload pair read from or written to a record stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    /// Encoded key bytes
    pub key: Vec<u8>,
    /// Opaque payload bytes
    pub payload: Vec<u8>,
}

impl Record {
    pub fn new(key: impl Into<Vec<u8>>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            payload: payload.into(),
        }
    }

    /// Builds a record from an encoded key, padded to its logical length.
    pub fn keyed(key: Key, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into_bytes(),
            payload: payload.into(),
        }
    }
}

/// Sequential reader over a record stream.
pub trait RecordReader {
    /// Returns the next record, or `None` at a clean end-of-stream.
    fn read(&mut self) -> Result<Option<Record>>;
}

/// Sequential writer onto a record stream.
pub trait RecordWriter {
    /// Appends one record.
    fn write(&mut self, record: &Record) -> Result<()>;

    /// Flushes buffered bytes to the underlying stream.
    fn finish(&mut self) -> Result<()>;
}

impl<T: RecordReader + ?Sized> RecordReader for &mut T {
    fn read(&mut self) -> Result<Option<Record>> {
        (**self).read()
    }
}

impl<T: RecordReader + ?Sized> RecordReader for Box<T> {
    fn read(&mut self) -> Result<Option<Record>> {
        (**self).read()
    }
}

/// An absent stream reads as empty.
impl<T: RecordReader> RecordReader for Option<T> {
    fn read(&mut self) -> Result<Option<Record>> {
        match self {
            Some(reader) => reader.read(),
            None => Ok(None),
        }
    }
}

impl<T: RecordWriter + ?Sized> RecordWriter for &mut T {
    fn write(&mut self, record: &Record) -> Result<()> {
        (**self).write(record)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}

impl<T: RecordWriter + ?Sized> RecordWriter for Box<T> {
    fn write(&mut self, record: &Record) -> Result<()> {
        (**self).write(record)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}

/// In-memory writer, mostly useful for tests and dry runs.
impl RecordWriter for Vec<Record> {
    fn write(&mut self, record: &Record) -> Result<()> {
        self.push(record.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Record framing used by a snapshot file.
///
/// The widths of [`RecordFormat::FixedWidth`] are not stored in the file;
/// they must be agreed on out-of-band and stay the same between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordFormat {
    Framed,
    FixedWidth { id_size: usize, data_size: usize },
}

impl RecordFormat {
    /// Opens a reader of this format over `inner`.
    pub fn reader<R: Read>(&self, inner: R, max_frame_len: u32) -> FormatReader<R> {
        match *self {
            RecordFormat::Framed => FormatReader::Framed(FramedReader::new(inner, max_frame_len)),
            RecordFormat::FixedWidth { id_size, data_size } => {
                FormatReader::FixedWidth(FixedWidthReader::new(inner, id_size, data_size))
            }
        }
    }

    /// Opens a writer of this format over `inner`.
    pub fn writer<W: Write>(&self, inner: W) -> FormatWriter<W> {
        match *self {
            RecordFormat::Framed => FormatWriter::Framed(FramedWriter::new(inner)),
            RecordFormat::FixedWidth { id_size, data_size } => {
                FormatWriter::FixedWidth(FixedWidthWriter::new(inner, id_size, data_size))
            }
        }
    }
}

/// Reader chosen at runtime from a [`RecordFormat`].
#[derive(Debug)]
pub enum FormatReader<R> {
    Framed(FramedReader<R>),
    FixedWidth(FixedWidthReader<R>),
}

impl<R> FormatReader<R> {
    /// Bytes consumed so far.
    pub fn position(&self) -> u64 {
        match self {
            FormatReader::Framed(r) => r.position(),
            FormatReader::FixedWidth(r) => r.position(),
        }
    }
}

impl<R: Read> RecordReader for FormatReader<R> {
    fn read(&mut self) -> Result<Option<Record>> {
        match self {
            FormatReader::Framed(r) => r.read(),
            FormatReader::FixedWidth(r) => r.read(),
        }
    }
}

/// Writer chosen at runtime from a [`RecordFormat`].
#[derive(Debug)]
pub enum FormatWriter<W> {
    Framed(FramedWriter<W>),
    FixedWidth(FixedWidthWriter<W>),
}

impl<W> FormatWriter<W> {
    /// Bytes written so far.
    pub fn position(&self) -> u64 {
        match self {
            FormatWriter::Framed(w) => w.position(),
            FormatWriter::FixedWidth(w) => w.position(),
        }
    }

    /// Unwraps the underlying stream.
    pub fn into_inner(self) -> W {
        match self {
            FormatWriter::Framed(w) => w.into_inner(),
            FormatWriter::FixedWidth(w) => w.into_inner(),
        }
    }
}

impl<W: Write> RecordWriter for FormatWriter<W> {
    fn write(&mut self, record: &Record) -> Result<()> {
        match self {
            FormatWriter::Framed(w) => w.write(record),
            FormatWriter::FixedWidth(w) => w.write(record),
        }
    }

    fn finish(&mut self) -> Result<()> {
        match self {
            FormatWriter::Framed(w) => w.finish(),
            FormatWriter::FixedWidth(w) => w.finish(),
        }
    }
}

/// Conversion of a domain item into a [`Record`].
pub trait IntoRecord {
    fn into_record(self) -> Record;
}

impl IntoRecord for Record {
    fn into_record(self) -> Record {
        self
    }
}

impl<P: Into<Vec<u8>>> IntoRecord for (Key, P) {
    fn into_record(self) -> Record {
        Record::keyed(self.0, self.1)
    }
}

/// Injected functions mapping domain items to key and payload bytes,
/// keeping domain types out of the merge.
///
/// An optional key decoder (`FD`) maps stored key bytes back to a typed
/// identity, for sweeps that report changes through an
/// [`ItemSink`](crate::merge::ItemSink).
#[derive(Debug, Clone, Copy)]
pub struct Converter<FK, FP, FD = ()> {
    key: FK,
    payload: FP,
    decode: FD,
}

impl<FK, FP> Converter<FK, FP> {
    pub fn new(key: FK, payload: FP) -> Self {
        Self {
            key,
            payload,
            decode: (),
        }
    }
}

impl<FK, FP, FD> Converter<FK, FP, FD> {
    /// Attaches a decoder from key bytes to the item's identity. Keys read
    /// back from a fixed-width snapshot arrive zero-padded to `id_size`.
    pub fn with_key_decoder<G>(self, decode: G) -> Converter<FK, FP, G> {
        Converter {
            key: self.key,
            payload: self.payload,
            decode,
        }
    }

    /// Maps one item to its record.
    pub fn convert<T>(&self, item: &T) -> Record
    where
        FK: Fn(&T) -> Key,
        FP: Fn(&T) -> Vec<u8>,
    {
        Record::keyed((self.key)(item), (self.payload)(item))
    }

    /// Maps stored key bytes back to an identity.
    pub fn decode_key<Id>(&self, key: &[u8]) -> Id
    where
        FD: Fn(&[u8]) -> Id,
    {
        (self.decode)(key)
    }
}
