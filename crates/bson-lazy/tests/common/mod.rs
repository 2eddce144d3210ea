//! Minimal BSON byte builders shared across integration tests. These
//! intentionally mirror only what the element scanner in `src/element.rs`
//! needs to parse, not a general-purpose encoder.

pub fn cstring(s: &str) -> Vec<u8> {
    let mut v = s.as_bytes().to_vec();
    v.push(0);
    v
}

pub fn int32_elem(key: &str, val: i32) -> Vec<u8> {
    let mut v = vec![0x10];
    v.extend(cstring(key));
    v.extend(val.to_le_bytes());
    v
}

pub fn int64_elem(key: &str, val: i64) -> Vec<u8> {
    let mut v = vec![0x12];
    v.extend(cstring(key));
    v.extend(val.to_le_bytes());
    v
}

pub fn double_elem(key: &str, val: f64) -> Vec<u8> {
    let mut v = vec![0x01];
    v.extend(cstring(key));
    v.extend(val.to_bits().to_le_bytes());
    v
}

pub fn string_elem(key: &str, val: &str) -> Vec<u8> {
    let mut v = vec![0x02];
    v.extend(cstring(key));
    let payload_len = (val.len() + 1) as i32;
    v.extend(payload_len.to_le_bytes());
    v.extend(val.as_bytes());
    v.push(0);
    v
}

fn wrap_body(fields: &[u8]) -> Vec<u8> {
    let total = 4 + fields.len() + 1;
    let mut v = (total as i32).to_le_bytes().to_vec();
    v.extend(fields);
    v.push(0);
    v
}

pub fn doc_elem(key: &str, fields: &[Vec<u8>]) -> Vec<u8> {
    let concatenated: Vec<u8> = fields.iter().flat_map(|f| f.iter().copied()).collect();
    let mut v = vec![0x03];
    v.extend(cstring(key));
    v.extend(wrap_body(&concatenated));
    v
}

/// A standalone document (the unit a Buffer iterates over), built from
/// already-encoded element byte sequences.
pub fn document(fields: &[Vec<u8>]) -> Vec<u8> {
    let concatenated: Vec<u8> = fields.iter().flat_map(|f| f.iter().copied()).collect();
    wrap_body(&concatenated)
}
