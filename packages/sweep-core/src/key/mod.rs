//! Order-preserving binary keys.
//!
//! Every constructor produces bytes whose unsigned lexicographic order
//! matches the logical order of the encoded value. A key also carries a
//! logical length that may exceed its physical bytes; the missing tail is
//! implicitly zero, and [`compare`] treats trailing zeros as absence so
//! padded fixed-width keys interoperate with naturally shorter ones.

mod collation;

use std::cmp::Ordering;

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use collation::{CaseInsensitiveCollation, Collation, OrdinalCollation};

/// Bytes reserved per declared character of a text key.
pub const TEXT_EXPANSION: usize = 6;

/// Ticks (100ns units) between 0001-01-01T00:00:00Z and the Unix epoch.
pub const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

/// Tick count of 0001-01-01T00:00:00Z, the earliest encodable instant.
pub const MIN_TICKS: i64 = 0;

/// Tick count of 9999-12-31T23:59:59.9999999Z, the latest encodable instant.
pub const MAX_TICKS: i64 = 3_155_378_975_999_999_999;

const TICKS_PER_SECOND: i64 = 10_000_000;
const NANOS_PER_TICK: u32 = 100;

/// Byte order SQL Server uses when sorting `uniqueidentifier` values,
/// indexed into the mixed-endian (`to_bytes_le`) GUID layout.
const SQL_GUID_SORT_ORDER: [usize; 16] = [10, 11, 12, 13, 14, 15, 8, 9, 6, 7, 4, 5, 0, 1, 2, 3];

/// Sort direction of a key component.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

/// An encoded key: physical bytes plus a logical length.
///
/// Physical bytes never exceed the logical length. Equality and ordering
/// follow [`compare`], so keys differing only in trailing zero bytes are
/// equal.
#[derive(Debug, Clone, Default)]
pub struct Key {
    bytes: Vec<u8>,
    len: usize,
}

impl Key {
    /// Wraps pre-encoded bytes with a logical length.
    ///
    /// Bytes beyond `len` are dropped; a shorter buffer is implicitly
    /// zero-padded up to `len`.
    pub fn fixed(bytes: impl Into<Vec<u8>>, len: usize) -> Self {
        let mut bytes = bytes.into();
        bytes.truncate(len);
        Self { bytes, len }
    }

    /// Wraps pre-encoded bytes, using their length as the logical length.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        let len = bytes.len();
        Self { bytes, len }
    }

    /// Encodes a signed 32-bit integer (sign bit flipped, big-endian).
    pub fn i32(value: i32) -> Self {
        let flipped = (value as u32) ^ (1 << 31);
        Self::from_bytes(flipped.to_be_bytes().to_vec())
    }

    /// Encodes a signed 64-bit integer (sign bit flipped, big-endian).
    pub fn i64(value: i64) -> Self {
        let flipped = (value as u64) ^ (1 << 63);
        Self::from_bytes(flipped.to_be_bytes().to_vec())
    }

    /// Descending variant of [`Key::i32`].
    pub fn desc_i32(value: i32) -> Self {
        Self::i32(value).with_direction(Direction::Descending)
    }

    /// Descending variant of [`Key::i64`].
    pub fn desc_i64(value: i64) -> Self {
        Self::i64(value).with_direction(Direction::Descending)
    }

    /// Encodes a point in time as its UTC tick count since 0001-01-01.
    ///
    /// Only instants between [`MIN_TICKS`] and [`MAX_TICKS`] (years 1
    /// through 9999) keep distinct keys; instants outside are clamped to
    /// the nearest bound.
    pub fn timestamp<Tz: TimeZone>(value: &DateTime<Tz>) -> Self {
        Self::i64(ticks(value))
    }

    /// Descending variant of [`Key::timestamp`].
    pub fn desc_timestamp<Tz: TimeZone>(value: &DateTime<Tz>) -> Self {
        Self::timestamp(value).with_direction(Direction::Descending)
    }

    /// Encodes collated text bounded to `chars` characters.
    ///
    /// The collation supplies the sort-key bytes. The logical length is
    /// `chars * TEXT_EXPANSION`; longer sort keys are truncated, shorter
    /// ones are zero-padded. Direction is applied to the sort key only,
    /// never to the padding, so the declared width does not affect
    /// equality. Descending order is only exact for prefix-free sort keys,
    /// which the bundled collations produce.
    pub fn text(value: &str, chars: usize, collation: &dyn Collation, direction: Direction) -> Self {
        let mut bytes = collation.sort_key(value);
        if direction == Direction::Descending {
            invert_bits(&mut bytes);
        }
        Self::fixed(bytes, chars * TEXT_EXPANSION)
    }

    /// Encodes a GUID in SQL Server `uniqueidentifier` sort order.
    pub fn sql_guid(value: &Uuid) -> Self {
        Self::sql_guid_bytes(value.to_bytes_le())
    }

    /// Encodes a GUID given in its mixed-endian wire layout.
    pub fn sql_guid_bytes(raw: [u8; 16]) -> Self {
        let bytes: Vec<u8> = SQL_GUID_SORT_ORDER.iter().map(|&i| raw[i]).collect();
        Self::from_bytes(bytes)
    }

    /// Concatenates sub-keys in declared order, each padded to its
    /// logical length.
    ///
    /// The result compares as one flat byte string; sub-key boundaries are
    /// not tracked, so variable-width parts should be length-prefixed by
    /// the caller when prefix-freeness matters.
    pub fn composite(parts: &[Key]) -> Self {
        let len = parts.iter().map(|k| k.len).sum();
        let mut bytes = Vec::with_capacity(len);
        for part in parts {
            bytes.extend_from_slice(&part.bytes);
            bytes.resize(bytes.len() + (part.len - part.bytes.len()), 0);
        }
        Self { bytes, len }
    }

    /// Returns the key inverted when descending.
    ///
    /// The zero tail is materialised first, so a short key padded to its
    /// logical length sorts after its longer extensions once inverted.
    pub fn with_direction(mut self, direction: Direction) -> Self {
        if direction == Direction::Descending {
            self.bytes.resize(self.len, 0);
            invert_bits(&mut self.bytes);
        }
        self
    }

    /// Logical length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Physical bytes, without the implicit zero tail.
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Materialises the key zero-padded to its logical length.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.bytes.clone();
        out.resize(self.len, 0);
        out
    }

    /// Consumes the key, returning the zero-padded bytes.
    pub fn into_bytes(mut self) -> Vec<u8> {
        self.bytes.resize(self.len, 0);
        self.bytes
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        compare(&self.bytes, &other.bytes) == Ordering::Equal
    }
}

impl Eq for Key {}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(&self.bytes, &other.bytes)
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Key::i32(value)
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::i64(value)
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for Key {
    fn from(value: DateTime<Tz>) -> Self {
        Key::timestamp(&value)
    }
}

impl From<Uuid> for Key {
    fn from(value: Uuid) -> Self {
        Key::sql_guid(&value)
    }
}

/// Compares two encoded keys.
///
/// Bytes are compared unsigned over the common prefix. When the prefix is
/// equal, the longer key only sorts after the shorter one if its remaining
/// tail holds a non-zero byte.
pub fn compare(a: &[u8], b: &[u8]) -> Ordering {
    let common = a.len().min(b.len());
    match a[..common].cmp(&b[..common]) {
        Ordering::Equal => {}
        ord => return ord,
    }
    if a.len() < b.len() && has_non_zero(&b[common..]) {
        Ordering::Less
    } else if a.len() > b.len() && has_non_zero(&a[common..]) {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

/// UTC tick count (100ns units) since 0001-01-01T00:00:00Z, clamped to
/// `MIN_TICKS..=MAX_TICKS`.
pub fn ticks<Tz: TimeZone>(value: &DateTime<Tz>) -> i64 {
    let sub_ticks = i128::from(value.timestamp_subsec_nanos() / NANOS_PER_TICK);
    let ticks = i128::from(value.timestamp()) * i128::from(TICKS_PER_SECOND)
        + i128::from(UNIX_EPOCH_TICKS)
        + sub_ticks;
    // Clamped into the i64 range, so the narrowing cast is lossless.
    ticks.clamp(i128::from(MIN_TICKS), i128::from(MAX_TICKS)) as i64
}

/// Decodes the first four bytes of an ascending [`Key::i32`] encoding.
pub fn decode_i32(bytes: &[u8]) -> Option<i32> {
    let raw: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
    Some((u32::from_be_bytes(raw) ^ (1 << 31)) as i32)
}

/// Decodes the first eight bytes of an ascending [`Key::i64`] encoding.
pub fn decode_i64(bytes: &[u8]) -> Option<i64> {
    let raw: [u8; 8] = bytes.get(..8)?.try_into().ok()?;
    Some((u64::from_be_bytes(raw) ^ (1 << 63)) as i64)
}

fn has_non_zero(tail: &[u8]) -> bool {
    tail.iter().any(|&b| b != 0)
}

fn invert_bits(bytes: &mut [u8]) {
    for b in bytes.iter_mut() {
        *b ^= 0xff;
    }
}
