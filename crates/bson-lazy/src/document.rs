use crate::buffer::BufferHandle;
use crate::element::{body_bounds, next_element};
use crate::error::{BadInput, KeyError, LookupError};
use crate::iter::{ItemIterator, KeyIterator};
use crate::value::{decode, Value};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Accesses (length, lookup, contains, keys listing, iterator
/// construction) before a linear Document inflates on its own. Fixed
/// per the design; not exposed as a runtime knob.
pub const DEFAULT_INFLATE_THRESHOLD: u32 = 10;

pub(crate) struct LinearState {
    pub(crate) handle: BufferHandle,
    pub(crate) offset: usize,
    pub(crate) length: usize,
    accesses: u32,
    doc_id: u64,
}

pub(crate) struct InflatedState {
    pub(crate) map: IndexMap<String, Value>,
}

pub(crate) enum DocumentCell {
    Linear(LinearState),
    Inflated(InflatedState),
}

impl Drop for DocumentCell {
    fn drop(&mut self) {
        if let DocumentCell::Linear(st) = self {
            st.handle.detach(st.doc_id);
        }
    }
}

impl DocumentCell {
    /// Build the inflated map from a linear scan without touching the
    /// registry. Used both by `Document::inflate` (which additionally
    /// detaches) and by buffer teardown (which has already drained the
    /// registry wholesale and must not detach a second time).
    fn build_map(st: &LinearState) -> Result<IndexMap<String, Value>, BadInput> {
        let (mut pos, end) = body_bounds(st.offset, st.length);
        let mut map = IndexMap::new();
        while let Some((elem, next_pos)) = next_element(&st.handle.bytes, pos, end)? {
            let value = decode(&st.handle.bytes, &elem, &st.handle)?;
            // First-seen order is preserved: re-inserting an existing
            // key in IndexMap updates the value in place without
            // moving it, matching "if it already exists, do not
            // re-append."
            map.insert(elem.key.to_string(), value);
            pos = next_pos;
        }
        Ok(map)
    }

    /// Force this cell to Inflated, bypassing the registry entirely.
    /// Only valid to call once the caller has already removed this
    /// cell's entry from its buffer's registry (buffer teardown).
    pub(crate) fn force_inflate(cell: &Rc<RefCell<Self>>) -> Result<(), BadInput> {
        let mut borrow = cell.borrow_mut();
        if let DocumentCell::Linear(st) = &*borrow {
            let map = Self::build_map(st)?;
            *borrow = DocumentCell::Inflated(InflatedState { map });
        }
        Ok(())
    }
}

/// Document is a keyed mapping backed either by a slice of a Buffer
/// (linear) or by its own inflated mapping (inflated). It is a cheap
/// `Rc` handle: cloning shares the same underlying state, so a teardown
/// or an explicit inflate is visible through every clone.
#[derive(Clone)]
pub struct Document {
    cell: Rc<RefCell<DocumentCell>>,
}

impl Document {
    pub(crate) fn new_linear(handle: BufferHandle, offset: usize, length: usize) -> Self {
        let cell = Rc::new(RefCell::new(DocumentCell::Linear(LinearState {
            handle: handle.clone(),
            offset,
            length,
            accesses: 0,
            doc_id: 0,
        })));
        let doc_id = handle.attach(&cell);
        if let DocumentCell::Linear(st) = &mut *cell.borrow_mut() {
            st.doc_id = doc_id;
        }
        Document { cell }
    }

    fn bump_accesses(st: &mut LinearState) -> bool {
        st.accesses += 1;
        st.accesses >= DEFAULT_INFLATE_THRESHOLD
    }

    /// Force inflation if still linear. Idempotent.
    pub fn inflate(&self) -> Result<(), BadInput> {
        let should_detach = {
            let borrow = self.cell.borrow();
            matches!(&*borrow, DocumentCell::Linear(_))
        };
        if !should_detach {
            return Ok(());
        }

        let (map, handle, doc_id) = {
            let borrow = self.cell.borrow();
            let st = match &*borrow {
                DocumentCell::Linear(st) => st,
                DocumentCell::Inflated(_) => unreachable!(),
            };
            (DocumentCell::build_map(st)?, st.handle.clone(), st.doc_id)
        };

        *self.cell.borrow_mut() = DocumentCell::Inflated(InflatedState { map });
        handle.detach(doc_id);
        tracing::trace!(doc_id, "document inflated");
        Ok(())
    }

    pub fn is_inflated(&self) -> bool {
        matches!(&*self.cell.borrow(), DocumentCell::Inflated(_))
    }

    fn maybe_auto_inflate(&self) -> Result<(), BadInput> {
        let hit_threshold = {
            let mut borrow = self.cell.borrow_mut();
            match &mut *borrow {
                DocumentCell::Linear(st) => Self::bump_accesses(st),
                DocumentCell::Inflated(_) => false,
            }
        };
        if hit_threshold {
            self.inflate()?;
        }
        Ok(())
    }

    /// Number of fields. Counts as a qualifying access for the
    /// inflation threshold, but the linear-scan count itself does not.
    pub fn len(&self) -> Result<usize, BadInput> {
        self.maybe_auto_inflate()?;
        match &*self.cell.borrow() {
            DocumentCell::Inflated(ist) => Ok(ist.map.len()),
            DocumentCell::Linear(st) => {
                let (mut pos, end) = body_bounds(st.offset, st.length);
                let mut count = 0;
                while let Some((_, next_pos)) = next_element(&st.handle.bytes, pos, end)? {
                    count += 1;
                    pos = next_pos;
                }
                Ok(count)
            }
        }
    }

    pub fn is_empty(&self) -> Result<bool, BadInput> {
        Ok(self.len()? == 0)
    }

    pub fn get(&self, key: &str) -> Result<Value, LookupError> {
        self.maybe_auto_inflate()?;
        match &*self.cell.borrow() {
            DocumentCell::Inflated(ist) => ist
                .map
                .get(key)
                .cloned()
                .ok_or_else(|| KeyError(key.to_string()).into()),
            DocumentCell::Linear(st) => {
                let (mut pos, end) = body_bounds(st.offset, st.length);
                while let Some((elem, next_pos)) = next_element(&st.handle.bytes, pos, end)? {
                    if elem.key == key {
                        return Ok(decode(&st.handle.bytes, &elem, &st.handle)?);
                    }
                    pos = next_pos;
                }
                Err(KeyError(key.to_string()).into())
            }
        }
    }

    pub fn contains_key(&self, key: &str) -> Result<bool, BadInput> {
        self.maybe_auto_inflate()?;
        match &*self.cell.borrow() {
            DocumentCell::Inflated(ist) => Ok(ist.map.contains_key(key)),
            DocumentCell::Linear(st) => {
                let (mut pos, end) = body_bounds(st.offset, st.length);
                while let Some((elem, next_pos)) = next_element(&st.handle.bytes, pos, end)? {
                    if elem.key == key {
                        return Ok(true);
                    }
                    pos = next_pos;
                }
                Ok(false)
            }
        }
    }

    /// Ordered keys. Forces inflation on repeated calls the same as any
    /// other qualifying access, but does not itself mutate the Document.
    pub fn keys(&self) -> Result<Vec<String>, BadInput> {
        self.maybe_auto_inflate()?;
        match &*self.cell.borrow() {
            DocumentCell::Inflated(ist) => Ok(ist.map.keys().cloned().collect()),
            DocumentCell::Linear(st) => {
                let (mut pos, end) = body_bounds(st.offset, st.length);
                let mut out = Vec::new();
                while let Some((elem, next_pos)) = next_element(&st.handle.bytes, pos, end)? {
                    out.push(elem.key.to_string());
                    pos = next_pos;
                }
                Ok(out)
            }
        }
    }

    /// Any mutating operation forces inflation first, then delegates to
    /// the inflated mapping. A new key is appended to the ordered key
    /// sequence; an existing key keeps its first-seen position.
    pub fn set(&self, key: impl Into<String>, value: Value) -> Result<(), BadInput> {
        self.inflate()?;
        let mut borrow = self.cell.borrow_mut();
        let DocumentCell::Inflated(ist) = &mut *borrow else {
            unreachable!("inflate() guarantees Inflated")
        };
        ist.map.insert(key.into(), value);
        Ok(())
    }

    pub fn delete(&self, key: &str) -> Result<(), LookupError> {
        self.inflate()?;
        let mut borrow = self.cell.borrow_mut();
        let DocumentCell::Inflated(ist) = &mut *borrow else {
            unreachable!("inflate() guarantees Inflated")
        };
        ist.map
            .shift_remove(key)
            .map(|_| ())
            .ok_or_else(|| KeyError(key.to_string()).into())
    }

    pub fn iter_keys(&self) -> KeyIterator {
        let _ = self.maybe_auto_inflate();
        KeyIterator::new(self.clone())
    }

    pub fn iter_items(&self) -> ItemIterator {
        let _ = self.maybe_auto_inflate();
        ItemIterator::new(self.clone())
    }

    pub(crate) fn cell(&self) -> &Rc<RefCell<DocumentCell>> {
        &self.cell
    }
}

thread_local! {
    static FORMATTING: RefCell<Vec<*const RefCell<DocumentCell>>> = RefCell::new(Vec::new());
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ptr = Rc::as_ptr(&self.cell);
        let reentered = FORMATTING.with(|stack| stack.borrow().contains(&ptr));
        if reentered {
            return write!(f, "{{...}}");
        }

        FORMATTING.with(|stack| stack.borrow_mut().push(ptr));
        let result = (|| {
            write!(f, "{{")?;
            let mut first = true;
            for item in self.iter_items() {
                let (key, value) = item.map_err(|_| fmt::Error)?;
                if !first {
                    write!(f, ", ")?;
                }
                first = false;
                write!(f, "{key:?}: {value:?}")?;
            }
            write!(f, "}}")
        })();
        FORMATTING.with(|stack| {
            stack.borrow_mut().pop();
        });
        result
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }
}
