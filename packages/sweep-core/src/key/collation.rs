//! Collation services that turn text into sort-key bytes.

/// Produces the byte form of a string whose unsigned order matches the
/// collation's order.
///
/// Sort keys should be prefix-free: no key may be a strict prefix of
/// another. Descending text keys invert the sort key, which only reverses
/// the order when distinct keys differ at some byte both of them hold.
pub trait Collation: Send + Sync {
    fn sort_key(&self, value: &str) -> Vec<u8>;
}

impl<F> Collation for F
where
    F: Fn(&str) -> Vec<u8> + Send + Sync,
{
    fn sort_key(&self, value: &str) -> Vec<u8> {
        self(value)
    }
}

/// Marks a code unit in an ordinal sort key.
const UNIT_MARKER: u8 = 0x01;

/// Ends an ordinal sort key. Sorts below [`UNIT_MARKER`], so a string
/// sorts before its extensions and the key set is prefix-free.
const TERMINATOR: u8 = 0x00;

/// Code-unit order: each UTF-16 unit stored big-endian behind a marker
/// byte, followed by a terminator.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrdinalCollation;

impl Collation for OrdinalCollation {
    fn sort_key(&self, value: &str) -> Vec<u8> {
        let mut out = Vec::with_capacity(value.len() * 3 + 1);
        for unit in value.encode_utf16() {
            out.push(UNIT_MARKER);
            out.extend_from_slice(&unit.to_be_bytes());
        }
        out.push(TERMINATOR);
        out
    }
}

/// Ordinal order after Unicode lowercasing.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaseInsensitiveCollation;

impl Collation for CaseInsensitiveCollation {
    fn sort_key(&self, value: &str) -> Vec<u8> {
        OrdinalCollation.sort_key(&value.to_lowercase())
    }
}
