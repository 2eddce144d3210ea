/// BadInput is raised for any malformed byte framing, any unrecognized
/// BSON element type tag, any invalid UTF-8, or any sub-structure that
/// fails to open. It is never swallowed: callers always see it.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid BSON input: {0}")]
pub struct BadInput(pub(crate) String);

impl BadInput {
    pub(crate) fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    pub(crate) fn unknown_type(tag: u8) -> Self {
        Self(format!("unrecognized BSON element type tag {tag:#04x}"))
    }
}

/// KeyError is raised when a lookup or deletion misses. It carries the
/// offending key, distinct from BadInput.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("key not found: {0:?}")]
pub struct KeyError(pub String);

/// LookupError is the combined failure mode of an operation that may
/// force an inflate (and so hit BadInput) before performing a lookup
/// that may itself miss (KeyError).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error(transparent)]
    BadInput(#[from] BadInput),
    #[error(transparent)]
    KeyError(#[from] KeyError),
}
