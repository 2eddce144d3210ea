//! Lazy BSON documents over an owned byte buffer.
//!
//! A [`Buffer`] owns a contiguous run of length-prefixed BSON documents
//! and yields lazy [`Document`]s that scan directly over its bytes.
//! Each `Document` starts in a linear, scan-on-access state and
//! transitions once — never back — into an inflated, materialized
//! mapping once it has seen enough accesses (or as soon as it is
//! mutated). Buffer teardown forces every still-linear dependent to
//! inflate first, so a `Document` always outlives the `Buffer` it was
//! read from.

mod buffer;
mod document;
mod element;
mod error;
mod iter;
mod record;
mod value;

pub use buffer::Buffer;
pub use document::{Document, DEFAULT_INFLATE_THRESHOLD};
pub use error::{BadInput, KeyError, LookupError};
pub use iter::{BufferIterator, ItemIterator, KeyIterator};
pub use value::{Binary, ObjectId, Value};
