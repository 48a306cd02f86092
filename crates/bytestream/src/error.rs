//! Error types returned by the encoding, decoding and file-loading entry
//! points.
//!
//! Callers that only care whether a blob was malformed match on
//! [`DecodeError::Malformed`]; [`Malformed`] carries the detail that tells a
//! truncated stream apart from a shape mismatch.

use std::{io, path::PathBuf};

use crate::tagged::Tag;

/// Reasons a structured value cannot be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum Unsupported {
    /// The value nests deeper than the configured limit. A reference cycle
    /// built from `Rc<RefCell<_>>` ends up here as well.
    #[error("nesting exceeds the depth limit of {limit}")]
    DepthExceeded {
        /// The configured maximum depth.
        limit: usize,
    },

    /// A `RefCell` was mutably borrowed while it was being encoded.
    #[error("value is mutably borrowed")]
    AlreadyBorrowed,
}

/// Error produced by [`encode`](crate::encode).
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// The value presented at the top level was absent (`None`).
    #[error("cannot encode nil value")]
    NilValue,

    /// The value's shape cannot be represented.
    #[error("unsupported value: {0}")]
    Unsupported(#[from] Unsupported),

    /// The underlying sink failed to accept bytes.
    #[error("failed to write encoded bytes: {0}")]
    Io(#[from] io::Error),
}

/// Ways a byte stream can fail to match the destination's shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Malformed {
    /// The stream ended in the middle of a value.
    #[error("unexpected end of input")]
    Truncated,

    /// A tag of a different kind was found where a specific one was expected.
    #[error("expected {expected}, found {found}")]
    TagMismatch {
        /// The tag the destination type requires.
        expected: Tag,
        /// The tag present in the stream.
        found: Tag,
    },

    /// The byte at a tag position is not a known tag.
    #[error("unknown tag byte {0:#04x}")]
    UnknownTag(u8),

    /// A struct carried a different number of fields than its destination.
    #[error("expected {expected} fields for `{type_name}`, found {found}")]
    FieldCount {
        /// Name of the destination type.
        type_name: &'static str,
        /// Number of fields the destination type has.
        expected: usize,
        /// Number of fields present in the stream.
        found: usize,
    },

    /// A struct field's name differs from the destination's field.
    #[error("expected field `{expected}`, found `{found}`")]
    FieldName {
        /// Name of the destination field.
        expected: &'static str,
        /// Name present in the stream.
        found: String,
    },

    /// A tuple or fixed-size array had the wrong number of elements.
    #[error("expected {expected} elements, found {found}")]
    Arity {
        /// Arity of the destination type.
        expected: usize,
        /// Arity present in the stream.
        found: usize,
    },

    /// An enum variant index outside the destination enum.
    #[error("invalid variant index {index} for enum {enum_name}")]
    UnknownVariant {
        /// Name of the destination enum.
        enum_name: &'static str,
        /// Index present in the stream.
        index: u32,
    },

    /// A boolean byte other than 0 or 1.
    #[error("invalid boolean byte {0}")]
    InvalidBool(u8),

    /// A `char` payload that is not a Unicode scalar value.
    #[error("invalid Unicode scalar value {0}")]
    InvalidChar(u32),

    /// Text that is not valid UTF-8.
    #[error("invalid UTF-8")]
    InvalidUtf8,

    /// A varint longer than its destination integer allows.
    #[error("varint too long for its integer type")]
    VarintOverflow,

    /// An integer that does not fit this platform's `usize`/`isize`.
    #[error("integer out of range for this platform")]
    OutOfRange,

    /// A well-formed payload carrying a value its type rejects.
    #[error("invalid value: {0}")]
    InvalidValue(&'static str),

    /// The stream nests deeper than the configured limit.
    #[error("nesting exceeds the depth limit of {limit}")]
    DepthExceeded {
        /// The configured maximum depth.
        limit: usize,
    },

    /// Bytes remained after the value was fully decoded.
    #[error("{0} trailing bytes after the value")]
    TrailingBytes(usize),
}

/// Error produced by [`decode`](crate::decode).
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// No destination slot was supplied.
    #[error("cannot decode into nil value")]
    NilTarget,

    /// Zero bytes were given for a structured destination.
    #[error("cannot decode empty data")]
    EmptyInput,

    /// The bytes do not describe a value of the destination's type.
    #[error("malformed input: {0}")]
    Malformed(#[from] Malformed),

    /// The underlying source failed for a reason other than running out of
    /// bytes.
    #[error("failed to read encoded bytes: {0}")]
    Io(io::Error),
}

impl From<io::Error> for DecodeError {
    fn from(error: io::Error) -> Self {
        if error.kind() == io::ErrorKind::UnexpectedEof {
            Self::Malformed(Malformed::Truncated)
        } else {
            Self::Io(error)
        }
    }
}

/// Error produced by [`load_file`](crate::load_file).
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// The file does not exist.
    #[error("file does not exist: {}", .path.display())]
    NotFound {
        /// The path that was requested.
        path: PathBuf,
    },

    /// Any other I/O failure.
    #[error("failed to read {}: {source}", .path.display())]
    Other {
        /// The path that was requested.
        path: PathBuf,
        /// The underlying failure.
        source: io::Error,
    },
}
