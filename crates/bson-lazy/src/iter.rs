use crate::buffer::BufferHandle;
use crate::document::{Document, DocumentCell};
use crate::element::{body_bounds, next_element};
use crate::error::BadInput;
use crate::record::{advance, Advance};
use crate::value::{decode, Value};

/// Produces Documents for successive records in a Buffer. Once a
/// `BadInput` is reported, every subsequent call reports end-of-stream
/// rather than re-raising or resuming.
pub struct BufferIterator {
    handle: BufferHandle,
    pos: usize,
    valid: bool,
}

impl BufferIterator {
    pub(crate) fn new(handle: BufferHandle) -> Self {
        BufferIterator {
            handle,
            pos: 0,
            valid: true,
        }
    }
}

impl Iterator for BufferIterator {
    type Item = Result<Document, BadInput>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.valid {
            return None;
        }
        let start = self.pos;
        match advance(&self.handle.bytes, start) {
            Advance::Advanced { end } => {
                self.pos = end;
                Some(Ok(Document::new_linear(self.handle.clone(), start, end - start)))
            }
            Advance::CleanEof => {
                self.valid = false;
                None
            }
            Advance::Malformed(err) => {
                self.valid = false;
                Some(Err(err))
            }
        }
    }
}

/// Shared cursor logic for both Document iterator kinds: a linear
/// element-scan position, plus enough bookkeeping to rebind onto the
/// ordered key sequence the moment the Document inflates mid-iteration.
struct Cursor {
    doc: Option<Document>,
    linear_pos: usize,
    inflated_idx: usize,
    rebounded: bool,
    last_key: Option<String>,
    done: bool,
}

impl Cursor {
    fn new(doc: Document) -> Self {
        Cursor {
            doc: Some(doc),
            linear_pos: 0,
            inflated_idx: 0,
            rebounded: false,
            last_key: None,
            done: false,
        }
    }

    /// Advance to the next `(key, value)` pair, or `None` at exhaustion.
    /// `want_value` controls whether a linear-mode scan bothers to
    /// decode the value (the key iterator never needs it).
    fn advance(&mut self, want_value: bool) -> Option<Result<(String, Option<Value>), BadInput>> {
        if self.done {
            return None;
        }
        let doc = self.doc.clone()?;
        let mut borrow = doc.cell().borrow_mut();

        match &mut *borrow {
            DocumentCell::Linear(st) => {
                let (body_start, end) = body_bounds(st.offset, st.length);
                if self.linear_pos == 0 {
                    self.linear_pos = body_start;
                }
                match next_element(&st.handle.bytes, self.linear_pos, end) {
                    Ok(Some((elem, next_pos))) => {
                        self.linear_pos = next_pos;
                        let key = elem.key.to_string();
                        let value = if want_value {
                            match decode(&st.handle.bytes, &elem, &st.handle) {
                                Ok(v) => Some(v),
                                Err(e) => return Some(Err(e)),
                            }
                        } else {
                            None
                        };
                        self.last_key = Some(key.clone());
                        Some(Ok((key, value)))
                    }
                    Ok(None) => {
                        self.done = true;
                        self.doc = None;
                        None
                    }
                    Err(e) => {
                        self.done = true;
                        Some(Err(e))
                    }
                }
            }
            DocumentCell::Inflated(ist) => {
                if !self.rebounded {
                    self.rebounded = true;
                    self.inflated_idx = match &self.last_key {
                        Some(k) => ist.map.get_index_of(k.as_str()).map(|i| i + 1).unwrap_or(0),
                        None => 0,
                    };
                }
                if self.inflated_idx >= ist.map.len() {
                    self.done = true;
                    self.doc = None;
                    return None;
                }
                let (key, value) = ist.map.get_index(self.inflated_idx).unwrap();
                self.inflated_idx += 1;
                let key = key.clone();
                self.last_key = Some(key.clone());
                let value = if want_value { Some(value.clone()) } else { None };
                Some(Ok((key, value)))
            }
        }
    }
}

/// Stable key traversal that survives inflation mid-iteration.
pub struct KeyIterator {
    cursor: Cursor,
}

impl KeyIterator {
    pub(crate) fn new(doc: Document) -> Self {
        KeyIterator {
            cursor: Cursor::new(doc),
        }
    }
}

impl Iterator for KeyIterator {
    type Item = Result<String, BadInput>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor
            .advance(false)
            .map(|r| r.map(|(key, _)| key))
    }
}

/// Stable (key, value) traversal that survives inflation mid-iteration.
pub struct ItemIterator {
    cursor: Cursor,
}

impl ItemIterator {
    pub(crate) fn new(doc: Document) -> Self {
        ItemIterator {
            cursor: Cursor::new(doc),
        }
    }
}

impl Iterator for ItemIterator {
    type Item = Result<(String, Value), BadInput>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.advance(true).map(|r| {
            r.map(|(key, value)| (key, value.expect("item iterator always decodes a value")))
        })
    }
}
