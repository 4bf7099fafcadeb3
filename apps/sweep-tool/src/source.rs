//! Line-oriented sources and the JSON-lines change printer.

use std::io::{BufRead, Write};

use anyhow::{anyhow, bail, Context, Result};
use serde_json::json;
use sweep_core::key::{CaseInsensitiveCollation, Collation, OrdinalCollation};
use sweep_core::merge::{ChangeEvent, ChangeSink, SinkError};
use sweep_core::{Direction, Key, Record};

use crate::cli::{KeyArgs, KeyType};

/// Turns the key column of a source line into an encoded key.
pub struct KeyEncoder {
    key_type: KeyType,
    text_chars: usize,
    hex_bytes: usize,
    direction: Direction,
    collation: Box<dyn Collation>,
}

impl KeyEncoder {
    pub fn new(args: &KeyArgs) -> Self {
        let collation: Box<dyn Collation> = if args.ignore_case {
            Box::new(CaseInsensitiveCollation)
        } else {
            Box::new(OrdinalCollation)
        };
        Self {
            key_type: args.key_type,
            text_chars: args.text_chars,
            hex_bytes: args.hex_bytes,
            direction: if args.descending {
                Direction::Descending
            } else {
                Direction::Ascending
            },
            collation,
        }
    }

    pub fn encode(&self, raw: &str) -> Result<Key> {
        let key = match self.key_type {
            KeyType::I64 => Key::i64(raw.parse().context("invalid i64 key")?),
            KeyType::I32 => Key::i32(raw.parse().context("invalid i32 key")?),
            KeyType::Text => {
                return Ok(Key::text(
                    raw,
                    self.text_chars,
                    self.collation.as_ref(),
                    self.direction,
                ))
            }
            KeyType::Hex => {
                let bytes = hex::decode(raw).context("invalid hex key")?;
                if bytes.len() > self.hex_bytes {
                    bail!("hex key of {} bytes exceeds --hex-bytes {}", bytes.len(), self.hex_bytes);
                }
                Key::fixed(bytes, self.hex_bytes)
            }
        };
        Ok(key.with_direction(self.direction))
    }

    /// Parses one `key<TAB>payload` line. A line without a tab has an empty
    /// payload.
    pub fn parse_line(&self, line: &str) -> Result<Record> {
        let (raw_key, payload) = line.split_once('\t').unwrap_or((line, ""));
        let key = self.encode(raw_key)?;
        Ok(Record::keyed(key, payload.as_bytes().to_vec()))
    }

    /// Lazily parses every non-empty line of `input`.
    pub fn records<'a, R: BufRead + 'a>(
        &'a self,
        input: R,
    ) -> impl Iterator<Item = Result<Record>> + 'a {
        input
            .lines()
            .enumerate()
            .filter(|(_, line)| !matches!(line, Ok(l) if l.is_empty()))
            .map(move |(index, line)| {
                let line = line.with_context(|| format!("failed to read line {}", index + 1))?;
                self.parse_line(&line)
                    .map_err(|e| anyhow!("line {}: {:#}", index + 1, e))
            })
    }
}

/// Writes one JSON object per change.
pub struct JsonLinesSink<W> {
    out: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> ChangeSink for JsonLinesSink<W> {
    fn on_change(&mut self, event: ChangeEvent<'_>) -> Result<(), SinkError> {
        let value = match event {
            ChangeEvent::Insert(record) => json!({
                "op": "insert",
                "key": hex::encode(&record.key),
                "payload": String::from_utf8_lossy(&record.payload),
            }),
            ChangeEvent::Update { old, new } => json!({
                "op": "update",
                "key": hex::encode(&new.key),
                "old": String::from_utf8_lossy(&old.payload),
                "new": String::from_utf8_lossy(&new.payload),
            }),
            ChangeEvent::Delete(record) => json!({
                "op": "delete",
                "key": hex::encode(&record.key),
            }),
        };
        serde_json::to_writer(&mut self.out, &value)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }
}
