use crate::document::DocumentCell;
use crate::error::BadInput;
use crate::iter::BufferIterator;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

/// The dependent registry: linear Documents borrowing from this
/// buffer's bytes, keyed by an id unique within this buffer. Entries
/// are weak — the registry never keeps a Document alive, it only
/// needs to be able to reach one to force its inflation at teardown.
#[derive(Default)]
pub(crate) struct Registry {
    next_id: u64,
    docs: HashMap<u64, Weak<RefCell<DocumentCell>>>,
}

impl Registry {
    fn attach(&mut self, cell: &Rc<RefCell<DocumentCell>>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.docs.insert(id, Rc::downgrade(cell));
        id
    }

    /// Idempotent detachment is a programming error: a Document's
    /// `doc_id` is only ever removed once, by whichever of {inflate,
    /// drop} observes it first.
    pub(crate) fn detach(&mut self, doc_id: u64) {
        let removed = self.docs.remove(&doc_id);
        debug_assert!(removed.is_some(), "document {doc_id} was already detached");
    }

    /// Put a dependent back under its original id. Used only by buffer
    /// teardown, to restore an entry it pulled out via `drain` but
    /// whose forced inflate failed — the Document is still `Linear`
    /// and must remain reachable for its own, later `detach`.
    fn reattach(&mut self, doc_id: u64, cell: &Rc<RefCell<DocumentCell>>) {
        self.docs.insert(doc_id, Rc::downgrade(cell));
    }
}

/// `BufferHandle` is the shared, cheaply-clonable core every linear
/// Document and the public `Buffer` itself hold: the owned byte
/// sequence plus the dependent registry. Cloning a `BufferHandle` only
/// clones two `Rc`s.
#[derive(Clone)]
pub(crate) struct BufferHandle {
    pub(crate) bytes: Rc<Vec<u8>>,
    pub(crate) registry: Rc<RefCell<Registry>>,
}

impl BufferHandle {
    pub(crate) fn attach(&self, cell: &Rc<RefCell<DocumentCell>>) -> u64 {
        self.registry.borrow_mut().attach(cell)
    }

    pub(crate) fn detach(&self, doc_id: u64) {
        self.registry.borrow_mut().detach(doc_id);
    }
}

/// Buffer owns a contiguous sequence of length-prefixed BSON documents.
/// Iterating it yields lazy [`crate::Document`]s that borrow directly
/// from its bytes until they inflate. Dropping the last `Buffer` handle
/// forces every still-linear dependent to inflate before the bytes are
/// released — see the `Drop` impl below.
pub struct Buffer {
    pub(crate) handle: BufferHandle,
}

impl Buffer {
    /// Build a Buffer around `bytes`, taking ownership of them. Bytes
    /// are always a readable contiguous octet source in Rust's type
    /// system, so this is infallible in practice; the `Result` is kept
    /// to match the documented contract and to leave room for a future
    /// cheap validity pre-check without an API break.
    pub fn new(bytes: Vec<u8>) -> Result<Self, BadInput> {
        tracing::trace!(len = bytes.len(), "constructing BSON buffer");
        Ok(Buffer {
            handle: BufferHandle {
                bytes: Rc::new(bytes),
                registry: Rc::new(RefCell::new(Registry::default())),
            },
        })
    }

    /// Start a fresh iterator at the first record. Multiple concurrent
    /// iterators are permitted, each with its own cursor.
    pub fn iter(&self) -> BufferIterator {
        BufferIterator::new(self.handle.clone())
    }

    #[cfg(test)]
    pub(crate) fn registry_len(&self) -> usize {
        self.handle.registry.borrow().docs.len()
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        let drained: Vec<_> = self.handle.registry.borrow_mut().docs.drain().collect();
        for (doc_id, weak) in drained {
            let Some(cell) = weak.upgrade() else {
                continue;
            };
            // `drain` already pulled this entry out of the registry. On
            // success the Document is now `Inflated` and has no further
            // business with the registry, so leaving it out is correct.
            // On failure it's still `Linear` and will try to detach
            // itself when the caller eventually drops it; put it back
            // under its original id so that detach finds an entry
            // instead of tripping the "already detached" assertion.
            if let Err(err) = DocumentCell::force_inflate(&cell) {
                tracing::debug!(%err, "buffer teardown: dependent failed to inflate, leaving it linear");
                self.handle.registry.borrow_mut().reattach(doc_id, &cell);
            }
        }
        tracing::trace!("BSON buffer torn down");
    }
}
