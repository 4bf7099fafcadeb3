//! Change detection over ordered record streams.
//!
//! A source is read in key order alongside the snapshot persisted by the
//! previous run. Both streams are walked once, every difference is
//! reported as an insert, update or delete, and the source becomes the
//! next snapshot. Memory use stays constant regardless of data size.
//!
//! - [`key`]: order-preserving binary key encoding
//! - [`record`]: framed and fixed-width record streams
//! - [`merge`]: the merge state machine and change sinks
//! - [`snapshot`]: snapshot files and the replace-on-success swap
//! - [`Sweeper`] and [`PushSweep`]: pull and push drivers over the files

pub mod config;
pub mod error;
pub mod io_utils;
pub mod key;
pub mod merge;
pub mod push;
pub mod record;
pub mod snapshot;
pub mod sweeper;

pub use config::SweepConfig;
pub use error::{Result, SweepError};
pub use key::{Direction, Key};
pub use merge::{Change, ChangeEvent, ChangeKind, ChangeSink, ItemChange, ItemSink, SweepStats};
pub use push::{PushSweep, Signal};
pub use record::{Converter, Record, RecordFormat};
pub use snapshot::ReplaceStrategy;
pub use sweeper::Sweeper;
