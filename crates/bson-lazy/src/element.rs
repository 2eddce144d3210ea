//! Low-level element scanning over a single document's field list.
//!
//! This is the "element iterator" collaborator from the design: given
//! the byte range of one document's *body* (after its length prefix,
//! before its terminating null), it walks one `(tag, key, value)`
//! triple at a time. The core (`Document`, the value decoder) treats
//! this as an external contract; this module is the concrete
//! implementation that contract is checked against.

use crate::error::BadInput;
use byteorder::{ByteOrder, LittleEndian};

/// One parsed element: its type tag, decoded key, and the absolute
/// `[start, end)` byte range of its *value* within the owning buffer.
pub(crate) struct ElementView<'a> {
    pub tag: u8,
    pub key: &'a str,
    pub value_start: usize,
    pub value_end: usize,
}

/// Given a document's absolute `(offset, length)` in `bytes`, return the
/// `[start, end)` range of its field body: past the 4-byte length
/// prefix, up to (excluding) the terminating 0x00.
pub(crate) fn body_bounds(offset: usize, length: usize) -> (usize, usize) {
    (offset + 4, offset + length - 1)
}

fn read_cstring(bytes: &[u8], pos: usize, limit: usize) -> Result<(&str, usize), BadInput> {
    let nul = bytes[pos..limit]
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| BadInput::new("unterminated element key"))?;
    let s = std::str::from_utf8(&bytes[pos..pos + nul])
        .map_err(|_| BadInput::new("element key is not valid UTF-8"))?;
    Ok((s, pos + nul + 1))
}

/// Parse the element beginning at `pos`, where `[pos, end)` is the
/// remaining field body of the owning document. Returns `None` once
/// `pos` reaches `end` (normal exhaustion), the parsed element and the
/// position of the next element otherwise.
pub(crate) fn next_element<'a>(
    bytes: &'a [u8],
    pos: usize,
    end: usize,
) -> Result<Option<(ElementView<'a>, usize)>, BadInput> {
    if pos >= end {
        return Ok(None);
    }
    let tag = bytes[pos];
    let (key, pos) = read_cstring(bytes, pos + 1, end)?;

    let value_len = |need: usize| -> Result<usize, BadInput> {
        if pos + need > end {
            Err(BadInput::new("element value runs past end of document"))
        } else {
            Ok(need)
        }
    };

    let (value_start, value_end) = match tag {
        // double
        0x01 => (pos, pos + value_len(8)?),
        // utf8 string: i32 length (includes trailing NUL) then bytes
        0x02 => {
            if pos + 4 > end {
                return Err(BadInput::new("truncated string length"));
            }
            let str_len = LittleEndian::read_i32(&bytes[pos..pos + 4]);
            if str_len < 1 {
                return Err(BadInput::new("string length must be at least 1"));
            }
            let total = 4usize
                .checked_add(str_len as usize)
                .ok_or_else(|| BadInput::new("string length overflow"))?;
            (pos, pos + value_len(total)?)
        }
        // nested document or array: i32 total length, self-inclusive
        0x03 | 0x04 => {
            if pos + 4 > end {
                return Err(BadInput::new("truncated sub-document length"));
            }
            let total = LittleEndian::read_i32(&bytes[pos..pos + 4]);
            if total < 5 {
                return Err(BadInput::new("sub-document length smaller than minimum"));
            }
            (pos, pos + value_len(total as usize)?)
        }
        // binary: i32 length, 1 subtype byte, then payload
        0x05 => {
            if pos + 4 > end {
                return Err(BadInput::new("truncated binary length"));
            }
            let bin_len = LittleEndian::read_i32(&bytes[pos..pos + 4]);
            if bin_len < 0 {
                return Err(BadInput::new("binary length is negative"));
            }
            let total = 5usize
                .checked_add(bin_len as usize)
                .ok_or_else(|| BadInput::new("binary length overflow"))?;
            (pos, pos + value_len(total)?)
        }
        // object id: 12 raw bytes
        0x07 => (pos, pos + value_len(12)?),
        // int32
        0x10 => (pos, pos + value_len(4)?),
        // int64
        0x12 => (pos, pos + value_len(8)?),
        other => return Err(BadInput::unknown_type(other)),
    };

    Ok(Some((
        ElementView {
            tag,
            key,
            value_start,
            value_end,
        },
        value_end,
    )))
}
