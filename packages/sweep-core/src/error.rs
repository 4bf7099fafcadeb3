//! Sweep error types.

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, SweepError>;

/// Errors raised while encoding, reading, merging or swapping snapshots.
///
/// Every variant except [`SweepError::TransientIo`] is fatal to a sweep:
/// the run aborts, the partial next-snapshot is discarded and the
/// persisted snapshot stays untouched.
#[derive(Error, Debug, Clone)]
pub enum SweepError {
    /// I/O error on a snapshot stream or during the swap
    #[error("I/O error: {0}")]
    Io(String),

    /// Transient I/O error that may succeed on retry
    #[error("Transient I/O error: {0}")]
    TransientIo(String),

    /// Disk full while writing the next snapshot
    #[error("Disk full: {0}")]
    DiskFull(String),

    /// A persisted record is truncated or its framing is inconsistent
    #[error("Malformed record at byte {offset}: {reason}")]
    MalformedRecord { offset: u64, reason: String },

    /// A field does not fit the declared fixed-width layout
    #[error("Field '{field}' is {got} bytes, expected {expected}")]
    FieldWidth {
        field: &'static str,
        expected: usize,
        got: usize,
    },

    /// A stream yielded a key that sorts before its predecessor
    #[error("Out-of-order key in {stream} stream at record {position}")]
    OutOfOrder {
        stream: &'static str,
        position: u64,
    },

    /// The source sequence failed while being iterated
    #[error("Source error: {0}")]
    Source(String),

    /// The notification sink rejected an event
    #[error("Sink error: {0}")]
    Sink(String),

    /// The push producer signalled an error or went away
    #[error("Sweep aborted: {0}")]
    Aborted(String),

    /// Envelope encoding/decoding error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The merge already failed and cannot accept more input
    #[error("Merge is poisoned by an earlier failure")]
    Poisoned,
}

impl SweepError {
    /// Wraps an arbitrary source-side error.
    pub fn source<E: std::fmt::Display>(err: E) -> Self {
        SweepError::Source(err.to_string())
    }

    /// Wraps an arbitrary sink-side error.
    pub fn sink<E: std::fmt::Display>(err: E) -> Self {
        SweepError::Sink(err.to_string())
    }
}

impl From<bincode::Error> for SweepError {
    fn from(err: bincode::Error) -> Self {
        SweepError::Serialization(err.to_string())
    }
}
