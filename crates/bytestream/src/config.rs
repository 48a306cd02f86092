//! Limits applied while encoding and decoding structured values.
//!
//! The [`Config`] trait is a set of associated functions, so a configuration
//! is chosen at the type level and costs nothing at run time. Most callers
//! never name it: [`encode`](crate::encode) and [`decode`](crate::decode) use
//! [`DefaultConfig`]. Use [`encode_with`](crate::encode_with) and
//! [`decode_with`](crate::decode_with) to pick another one.
//!
//! # Example
//!
//! ```
//! use bytestream::{Config, decode_with, encode};
//!
//! struct Lenient;
//!
//! impl Config for Lenient {
//!     fn allow_trailing_bytes() -> bool { true }
//! }
//!
//! let mut blob = encode(&7u32).unwrap();
//! blob.push(0xFF);
//!
//! let mut value = 0u32;
//! decode_with::<Lenient, _>(&blob, &mut value).unwrap();
//! assert_eq!(value, 7);
//! ```

/// Configuration trait for the tagged encoder and decoder.
///
/// Every method has a default, so an implementation only overrides what it
/// needs.
pub trait Config: 'static {
    /// The maximum number of nested structs, tuples and enum variants.
    ///
    /// Exceeding it while encoding yields
    /// [`Unsupported::DepthExceeded`](crate::Unsupported::DepthExceeded); a
    /// value that refers to itself through `Rc<RefCell<_>>` hits this limit
    /// instead of overflowing the stack. Exceeding it while decoding yields
    /// [`Malformed::DepthExceeded`](crate::Malformed::DepthExceeded).
    #[must_use]
    fn max_depth() -> usize { 128 }

    /// The maximum number of elements reserved up front for a collection.
    ///
    /// Length prefixes come from untrusted input, so collections grow past
    /// this only as elements actually decode.
    #[must_use]
    fn max_preallocation() -> usize { 4096 }

    /// Whether bytes left over after a top-level value are accepted.
    #[must_use]
    fn allow_trailing_bytes() -> bool { false }
}

/// The configuration used by [`encode`](crate::encode) and
/// [`decode`](crate::decode).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
pub struct DefaultConfig;

impl Config for DefaultConfig {}
