//! Low-level length-prefixed record framing over a byte buffer.
//!
//! This is the "record reader" collaborator from the design: it knows
//! nothing about document contents, only where one length-prefixed
//! record ends and the next begins. The core treats it as an external
//! contract (advanced / clean-eof / malformed); this module is the
//! concrete implementation that contract is checked against.

use crate::error::BadInput;
use byteorder::{ByteOrder, LittleEndian};

pub(crate) enum Advance {
    Advanced { end: usize },
    CleanEof,
    Malformed(BadInput),
}

/// Attempt to read one record starting at `start` within `bytes`.
/// A BSON record is a little-endian i32 total length (inclusive of
/// itself) followed by `length - 4` bytes ending in a 0x00 terminator.
pub(crate) fn advance(bytes: &[u8], start: usize) -> Advance {
    if start == bytes.len() {
        return Advance::CleanEof;
    }
    if start + 4 > bytes.len() {
        return Advance::Malformed(BadInput::new(
            "truncated length prefix at end of buffer",
        ));
    }
    let length = LittleEndian::read_i32(&bytes[start..start + 4]);
    if length < 5 {
        return Advance::Malformed(BadInput::new(format!(
            "document length {length} is smaller than the minimum of 5"
        )));
    }
    let length = length as usize;
    let end = match start.checked_add(length) {
        Some(end) => end,
        None => {
            return Advance::Malformed(BadInput::new("document length overflows buffer offset"))
        }
    };
    if end > bytes.len() {
        return Advance::Malformed(BadInput::new(format!(
            "document of length {length} starting at {start} exceeds the {} remaining bytes",
            bytes.len() - start
        )));
    }
    if bytes[end - 1] != 0x00 {
        return Advance::Malformed(BadInput::new("document is missing its terminating null byte"));
    }
    Advance::Advanced { end }
}
