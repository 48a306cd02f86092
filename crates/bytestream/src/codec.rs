//! The dual-mode entry points.
//!
//! [`encode`] and [`decode`] resolve a value's [`Form`] once at the top:
//! byte sequences and text pass through untouched, everything else goes
//! through the tagged structured format of [`crate::tagged`].

use crate::{
    config::{Config, DefaultConfig},
    decode::{Decode, Destination},
    encode::{Encode, Form},
    error::{DecodeError, EncodeError},
    tagged::{TaggedDecoder, TaggedEncoder},
};


/// Encodes a value into a fresh byte vector.
///
/// Byte sequences are copied as-is and strings yield their UTF-8 bytes with
/// no length prefix; any other value is written with the structured format.
///
/// # Errors
///
/// - [`EncodeError::NilValue`] if `value` is a top-level `None`.
/// - [`EncodeError::Unsupported`] if the value nests deeper than
///   [`Config::max_depth`] or a `RefCell` inside it is mutably borrowed.
///
/// # Example
///
/// ```
/// assert_eq!(bytestream::encode("hello").unwrap(), b"hello");
/// assert_eq!(bytestream::encode(&vec![1u8, 2, 3]).unwrap(), [1, 2, 3]);
/// assert!(matches!(
///     bytestream::encode(&None::<u32>),
///     Err(bytestream::EncodeError::NilValue)
/// ));
/// ```
pub fn encode<T: Encode + ?Sized>(value: &T) -> Result<Vec<u8>, EncodeError> {
    encode_with::<DefaultConfig, T>(value)
}

/// [`encode`] with a custom [`Config`].
///
/// # Errors
///
/// See [`encode`].
pub fn encode_with<C: Config, T: Encode + ?Sized>(
    value: &T,
) -> Result<Vec<u8>, EncodeError> {
    if value.is_absent() {
        return Err(EncodeError::NilValue);
    }

    let form = value.form();
    let bytes = match form {
        Form::Bytes(bytes) => bytes.to_vec(),
        Form::Text(text) => text.as_bytes().to_vec(),
        Form::Structured => {
            let mut encoder = TaggedEncoder::<_, C>::with_config(Vec::new());
            value.encode(&mut encoder)?;
            encoder.into_inner()
        }
    };

    tracing::debug!(form = form.name(), len = bytes.len(), "encoded value");

    Ok(bytes)
}

/// Decodes `bytes` into `destination`.
///
/// A `Vec<u8>` (or boxed byte slice) destination receives a copy of the
/// input and a `String` (or boxed `str`) destination receives its UTF-8
/// interpretation. Any other destination is parsed from the structured
/// format. The destination is only written when decoding succeeds.
///
/// # Errors
///
/// - [`DecodeError::NilTarget`] if `destination` has no slot.
/// - [`DecodeError::EmptyInput`] if `bytes` is empty and the destination is
///   structured.
/// - [`DecodeError::Malformed`] if the bytes do not describe a value of the
///   destination's type, including invalid UTF-8 for a text destination.
///
/// # Example
///
/// ```
/// let blob = bytestream::encode(&vec![1i32, 2, 3]).unwrap();
///
/// let mut numbers = Vec::<i32>::new();
/// bytestream::decode(&blob, &mut numbers).unwrap();
/// assert_eq!(numbers, [1, 2, 3]);
///
/// assert!(matches!(
///     bytestream::decode(&blob, None::<&mut Vec<i32>>),
///     Err(bytestream::DecodeError::NilTarget)
/// ));
/// ```
pub fn decode<D: Destination>(
    bytes: &[u8],
    destination: D,
) -> Result<(), DecodeError> {
    decode_with::<DefaultConfig, D>(bytes, destination)
}

/// [`decode`] with a custom [`Config`].
///
/// # Errors
///
/// See [`decode`].
pub fn decode_with<C: Config, D: Destination>(
    bytes: &[u8],
    mut destination: D,
) -> Result<(), DecodeError> {
    let slot = destination.slot().ok_or(DecodeError::NilTarget)?;
    *slot = decode_owned_with::<C, D::Target>(bytes)?;
    Ok(())
}

/// Decodes `bytes` into a new value of type `T`.
///
/// Follows the same raw-or-structured dispatch as [`decode`].
///
/// # Errors
///
/// See [`decode`]; this form never returns [`DecodeError::NilTarget`].
pub fn decode_owned<T: Decode>(bytes: &[u8]) -> Result<T, DecodeError> {
    decode_owned_with::<DefaultConfig, T>(bytes)
}

/// [`decode_owned`] with a custom [`Config`].
///
/// # Errors
///
/// See [`decode`].
pub fn decode_owned_with<C: Config, T: Decode>(
    bytes: &[u8],
) -> Result<T, DecodeError> {
    if let Some(raw) = T::decode_raw(bytes) {
        tracing::debug!(len = bytes.len(), "decoded raw value");
        return raw;
    }

    if bytes.is_empty() {
        return Err(DecodeError::EmptyInput);
    }

    let mut decoder = TaggedDecoder::<_, C>::with_config(bytes);
    let value = T::decode(&mut decoder)?;
    decoder.finish()?;

    tracing::debug!(len = bytes.len(), "decoded structured value");

    Ok(value)
}
