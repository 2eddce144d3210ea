//! The value decoder: maps one scanned element to a host [`Value`].
//!
//! Nested documents are promoted to lazy [`crate::Document`]s attached
//! to the same root buffer as their parent, never to the parent
//! itself — see `Document::decode_child` in `document.rs`.

use crate::buffer::BufferHandle;
use crate::document::Document;
use crate::element::{next_element, ElementView};
use crate::error::BadInput;
use byteorder::{ByteOrder, LittleEndian};

/// A 12-byte BSON ObjectId, carried opaquely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(pub [u8; 12]);

/// The generic BSON binary wrapper for any subtype not promoted to a
/// richer host value (i.e. everything but the UUID subtypes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binary {
    pub subtype: u8,
    pub bytes: Vec<u8>,
}

const SUBTYPE_UUID_DEPRECATED: u8 = 0x03;
const SUBTYPE_UUID: u8 = 0x04;

/// A decoded BSON value. Nested documents are lazy; arrays are eager.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Double(f64),
    String(String),
    Document(Document),
    Array(Vec<Value>),
    Binary(Binary),
    Uuid(uuid::Uuid),
    ObjectId(ObjectId),
    Int32(i32),
    Int64(i64),
}

/// Apply the legacy byte-order fix-up MongoDB drivers historically used
/// for the deprecated UUID binary subtype (0x03): each 8-byte half of
/// the 16-byte payload is stored reversed relative to subtype 0x04.
fn legacy_uuid_bytes(raw: &[u8]) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[..8].copy_from_slice(raw[..8].iter().rev().copied().collect::<Vec<_>>().as_slice());
    out[8..].copy_from_slice(raw[8..].iter().rev().copied().collect::<Vec<_>>().as_slice());
    out
}

fn decode_binary(bytes: &[u8], start: usize, end: usize) -> Result<Value, BadInput> {
    let len = LittleEndian::read_i32(&bytes[start..start + 4]) as usize;
    let subtype = bytes[start + 4];
    let payload = &bytes[start + 5..start + 5 + len];
    debug_assert_eq!(start + 5 + len, end);

    if subtype == SUBTYPE_UUID || subtype == SUBTYPE_UUID_DEPRECATED {
        if len != 16 {
            return Err(BadInput::new(format!(
                "UUID binary subtype {subtype:#04x} must be 16 bytes, got {len}"
            )));
        }
        let raw: [u8; 16] = if subtype == SUBTYPE_UUID_DEPRECATED {
            legacy_uuid_bytes(payload)
        } else {
            payload.try_into().unwrap()
        };
        return Ok(Value::Uuid(uuid::Uuid::from_bytes(raw)));
    }

    Ok(Value::Binary(Binary {
        subtype,
        bytes: payload.to_vec(),
    }))
}

/// Decode the array value occupying `[start, end)` of `bytes`: the same
/// framing as a document, but eagerly materialized into a `Vec`.
fn decode_array(bytes: &[u8], start: usize, end: usize, handle: &BufferHandle) -> Result<Value, BadInput> {
    let body_start = start + 4;
    let body_end = end - 1;
    if bytes[end - 1] != 0x00 {
        return Err(BadInput::new("array is missing its terminating null byte"));
    }

    let mut items = Vec::new();
    let mut pos = body_start;
    while let Some((elem, next_pos)) = next_element(bytes, pos, body_end)? {
        items.push(decode(bytes, &elem, handle)?);
        pos = next_pos;
    }
    Ok(Value::Array(items))
}

/// Decode the element `elem`, whose value bytes live in `bytes`. `handle`
/// is the root buffer a nested document (if any) attaches to.
pub(crate) fn decode(bytes: &[u8], elem: &ElementView, handle: &BufferHandle) -> Result<Value, BadInput> {
    let (start, end) = (elem.value_start, elem.value_end);

    match elem.tag {
        0x01 => Ok(Value::Double(f64::from_bits(LittleEndian::read_u64(
            &bytes[start..end],
        )))),
        0x02 => {
            let str_len = LittleEndian::read_i32(&bytes[start..start + 4]) as usize;
            let str_bytes = &bytes[start + 4..start + 4 + str_len - 1];
            let s = std::str::from_utf8(str_bytes)
                .map_err(|_| BadInput::new("string value is not valid UTF-8"))?;
            Ok(Value::String(s.to_string()))
        }
        0x03 => Ok(Value::Document(Document::new_linear(
            handle.clone(),
            start,
            end - start,
        ))),
        0x04 => decode_array(bytes, start, end, handle),
        0x05 => decode_binary(bytes, start, end),
        0x07 => {
            let mut raw = [0u8; 12];
            raw.copy_from_slice(&bytes[start..end]);
            Ok(Value::ObjectId(ObjectId(raw)))
        }
        0x10 => Ok(Value::Int32(LittleEndian::read_i32(&bytes[start..end]))),
        0x12 => Ok(Value::Int64(LittleEndian::read_i64(&bytes[start..end]))),
        other => Err(BadInput::unknown_type(other)),
    }
}
