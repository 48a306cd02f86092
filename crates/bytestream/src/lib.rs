//! Bytestream Serialization Library
//!
//! Turns typed values into bytes and back. Byte sequences and text strings
//! pass through unchanged; every other value is written in a compact,
//! self-describing tagged format that the decoder checks against the
//! destination type.
//!
//! # Overview
//!
//! The entry points are [`encode`] and [`decode`]:
//!
//! ```
//! use bytestream::{Decode, Encode};
//!
//! #[derive(Debug, Default, PartialEq, Encode, Decode)]
//! struct User {
//!     name: String,
//!     age: u32,
//! }
//!
//! let user = User { name: "Alice".to_string(), age: 30 };
//! let blob = bytestream::encode(&user).unwrap();
//!
//! let mut decoded = User::default();
//! bytestream::decode(&blob, &mut decoded).unwrap();
//! assert_eq!(decoded, user);
//!
//! // raw values are their own encoding
//! assert_eq!(bytestream::encode("hello").unwrap(), b"hello");
//! ```
//!
//! Underneath sit four traits:
//!
//! - [`Encoder`]: low-level sink for the structured format
//! - [`Encode`]: types that can be serialized
//! - [`Decoder`]: low-level source for the structured format
//! - [`Decode`]: types that can be deserialized
//!
//! [`TaggedEncoder`] and [`TaggedDecoder`] implement the low-level traits
//! over any `Write`/`Read`, and [`load_file`] reads a file into bytes.
//!
//! # Derive Macros
//!
//! `Encode` and `Decode` can be derived for structs and enums:
//!
//! ```
//! use bytestream::{Decode, Encode};
//!
//! #[derive(Encode, Decode)]
//! struct Id(u64);
//!
//! #[derive(Encode, Decode)]
//! struct Marker;
//!
//! #[derive(Encode, Decode)]
//! enum Message {
//!     Quit,
//!     Move { x: i32, y: i32 },
//!     Write(String),
//! }
//! ```
//!
//! ## Field Attributes
//!
//! Use `#[bytestream(skip)]` to leave a field out of the encoding. The field
//! must implement `Default`, which supplies its value when decoding:
//!
//! ```
//! use bytestream::{Decode, Encode};
//!
//! #[derive(Encode, Decode)]
//! struct Config {
//!     name: String,
//!     #[bytestream(skip)]
//!     cache: Vec<u8>,
//! }
//! ```

// Allow derive macros to reference this crate as `bytestream` internally
extern crate self as bytestream;

pub mod codec;
pub mod config;
pub mod decode;
pub mod encode;
pub mod error;
pub mod file;
pub mod tagged;

// Re-export the entry points and main types at the crate root
pub use codec::{
    decode, decode_owned, decode_owned_with, decode_with, encode, encode_with,
};
pub use config::{Config, DefaultConfig};
pub use decode::{Decode, Decoder, Destination};
pub use encode::{Encode, Encoder, Form};
pub use error::{DecodeError, EncodeError, IoError, Malformed, Unsupported};
pub use file::load_file;
pub use tagged::{Tag, TaggedDecoder, TaggedEncoder};
// Re-export derive macros
pub use bytestream_derive::{Decode, Encode};
