#[path = "common/mod.rs"]
mod common;

use bson_lazy::{Buffer, Value};
use pretty_assertions::assert_eq;

#[test]
fn e1_single_empty_document() {
    let bytes = common::document(&[]);
    let buffer = Buffer::new(bytes).unwrap();
    let mut iter = buffer.iter();

    let doc = iter.next().unwrap().unwrap();
    assert_eq!(doc.len().unwrap(), 0);
    assert_eq!(doc.keys().unwrap(), Vec::<String>::new());
    assert!(iter.next().is_none());
}

#[test]
fn e2_survives_buffer_release() {
    let bytes = [
        common::document(&[common::int32_elem("a", 1)]),
        common::document(&[common::string_elem("b", "hi")]),
    ]
    .concat();

    let (d0, d1) = {
        let buffer = Buffer::new(bytes).unwrap();
        let mut iter = buffer.iter();
        let d0 = iter.next().unwrap().unwrap();
        let d1 = iter.next().unwrap().unwrap();
        assert!(iter.next().is_none());

        assert_eq!(d0.get("a").unwrap(), Value::Int32(1));
        assert_eq!(d1.get("b").unwrap(), Value::String("hi".to_string()));
        (d0, d1)
        // `buffer` drops here.
    };

    assert!(d0.is_inflated());
    assert_eq!(d0.get("a").unwrap(), Value::Int32(1));
    assert_eq!(d1.get("b").unwrap(), Value::String("hi".to_string()));
}

#[test]
fn e3_child_survives_parent_inflate() {
    let bytes = common::document(&[common::doc_elem(
        "x",
        &[common::int32_elem("y", 7)],
    )]);
    let buffer = Buffer::new(bytes).unwrap();
    let doc = buffer.iter().next().unwrap().unwrap();

    let child = match doc.get("x").unwrap() {
        Value::Document(child) => child,
        other => panic!("expected a nested document, got {other:?}"),
    };
    assert_eq!(child.get("y").unwrap(), Value::Int32(7));

    doc.inflate().unwrap();

    assert_eq!(child.get("y").unwrap(), Value::Int32(7));
}

#[test]
fn e4_threshold_ten() {
    let bytes = common::document(&[common::int32_elem("a", 1)]);
    let buffer = Buffer::new(bytes).unwrap();
    let doc = buffer.iter().next().unwrap().unwrap();

    for _ in 0..9 {
        doc.get("a").unwrap();
        assert!(!doc.is_inflated());
    }
    doc.get("a").unwrap();
    assert!(doc.is_inflated());
}

#[test]
fn e5_mid_iteration_inflate() {
    let bytes = common::document(&[
        common::int32_elem("a", 1),
        common::int32_elem("b", 2),
        common::int32_elem("c", 3),
    ]);
    let buffer = Buffer::new(bytes).unwrap();
    let doc = buffer.iter().next().unwrap().unwrap();

    let mut items = doc.iter_items();
    let (key, value) = items.next().unwrap().unwrap();
    assert_eq!((key.as_str(), value), ("a", Value::Int32(1)));

    doc.inflate().unwrap();

    let rest: Vec<_> = items.map(|item| item.unwrap()).collect();
    assert_eq!(
        rest,
        vec![
            ("b".to_string(), Value::Int32(2)),
            ("c".to_string(), Value::Int32(3)),
        ]
    );
}

#[test]
fn e6_error_then_end() {
    let mut bytes = common::document(&[common::int32_elem("a", 1)]);
    bytes.push(0xff); // truncated length prefix: not enough bytes for a record.

    let buffer = Buffer::new(bytes).unwrap();
    let mut iter = buffer.iter();

    assert!(iter.next().unwrap().is_ok());
    assert!(iter.next().unwrap().is_err());
    assert!(iter.next().is_none());
}

#[test]
fn boundary_empty_buffer_signals_end_immediately() {
    let buffer = Buffer::new(Vec::new()).unwrap();
    assert!(buffer.iter().next().is_none());
}

#[test]
fn boundary_length_exceeds_remaining_bytes() {
    // Declares a 20-byte record but supplies only 5 bytes total.
    let bytes = 20i32.to_le_bytes().to_vec();
    let buffer = Buffer::new(bytes).unwrap();
    let mut iter = buffer.iter();

    assert!(iter.next().unwrap().is_err());
    assert!(iter.next().is_none());
}

#[test]
fn unknown_type_tag_during_inflate_keeps_document_linear() {
    let mut bad_field = common::int32_elem("bad", 0);
    bad_field[0] = 0x99; // corrupt the type tag of the second field only

    let bytes = common::document(&[common::int32_elem("a", 1), bad_field]);
    let buffer = Buffer::new(bytes).unwrap();
    let doc = buffer.iter().next().unwrap().unwrap();

    // A targeted lookup of the first field never reaches the corrupt
    // one, so it succeeds while the document is still linear.
    assert_eq!(doc.get("a").unwrap(), Value::Int32(1));
    assert!(!doc.is_inflated());

    // A full scan (inflate) does reach it.
    assert!(doc.inflate().is_err());
    assert!(!doc.is_inflated());
}

/// Regression test: a Document still `Linear` when its Buffer tears
/// down, whose forced inflate fails (an unrecognized type tag past an
/// already-accessed field), must not panic when the caller later drops
/// it. Teardown must leave a failed dependent's registry membership
/// intact rather than discarding it unconditionally.
#[test]
fn teardown_failure_does_not_double_detach() {
    let mut bad_field = common::int32_elem("bad", 0);
    bad_field[0] = 0x99;

    let bytes = common::document(&[common::int32_elem("a", 1), bad_field]);
    let buffer = Buffer::new(bytes).unwrap();
    let doc = buffer.iter().next().unwrap().unwrap();

    // Below the inflation threshold, and never reaches the corrupt field.
    assert_eq!(doc.get("a").unwrap(), Value::Int32(1));
    assert!(!doc.is_inflated());

    drop(buffer); // Teardown's forced inflate fails and leaves `doc` linear.
    assert!(!doc.is_inflated());

    // `doc` is still usable, and dropping it must not panic.
    assert_eq!(doc.get("a").unwrap(), Value::Int32(1));
    drop(doc);
}

#[test]
fn set_appends_new_key_and_preserves_existing_position() {
    let bytes = common::document(&[
        common::int32_elem("a", 1),
        common::int32_elem("b", 2),
    ]);
    let buffer = Buffer::new(bytes).unwrap();
    let doc = buffer.iter().next().unwrap().unwrap();

    doc.set("c", Value::Int32(3)).unwrap();
    assert_eq!(doc.keys().unwrap(), vec!["a", "b", "c"]);
    assert_eq!(doc.get("c").unwrap(), Value::Int32(3));

    // Re-setting an existing key updates the value without moving it.
    doc.set("a", Value::Int32(100)).unwrap();
    assert_eq!(doc.keys().unwrap(), vec!["a", "b", "c"]);
    assert_eq!(doc.get("a").unwrap(), Value::Int32(100));

    assert!(doc.is_inflated());
}

#[test]
fn delete_removes_key_and_preserves_order_of_survivors() {
    let bytes = common::document(&[
        common::int32_elem("a", 1),
        common::int32_elem("b", 2),
        common::int32_elem("c", 3),
    ]);
    let buffer = Buffer::new(bytes).unwrap();
    let doc = buffer.iter().next().unwrap().unwrap();

    doc.delete("b").unwrap();
    assert_eq!(doc.keys().unwrap(), vec!["a", "c"]);
    assert!(!doc.contains_key("b").unwrap());

    let missing = doc.delete("b");
    assert!(missing.is_err());
}

#[test]
fn contains_key_in_linear_and_inflated_state() {
    let bytes = common::document(&[common::int32_elem("a", 1)]);
    let buffer = Buffer::new(bytes).unwrap();
    let doc = buffer.iter().next().unwrap().unwrap();

    assert!(doc.contains_key("a").unwrap());
    assert!(!doc.contains_key("missing").unwrap());
    assert!(!doc.is_inflated());

    doc.inflate().unwrap();

    assert!(doc.contains_key("a").unwrap());
    assert!(!doc.contains_key("missing").unwrap());
}
