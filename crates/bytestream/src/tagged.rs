//! The self-describing structured wire format.
//!
//! This module provides [`TaggedEncoder`] and [`TaggedDecoder`], which
//! implement the [`Encoder`] and [`Decoder`] traits over any
//! [`Write`]/[`Read`] implementation.
//!
//! # Format Overview
//!
//! Every item starts with a one-byte [`Tag`] naming its kind, so a decoder
//! can check the stream against the destination type without any external
//! schema:
//!
//! - **Integers**: LEB128 varints; signed integers are zigzag encoded first.
//!   `u8`, `i8` and `bool` are a single raw byte.
//! - **Floats**: little-endian IEEE 754.
//! - **Strings/bytes**: varint length followed by the bytes.
//! - **Sequences/maps/tuples**: varint element count followed by the
//!   elements.
//! - **Structs**: varint field count, then each field as its name (varint
//!   length and UTF-8) followed by its value.
//! - **Variants**: varint variant index followed by the variant's payload.
//!
//! # Example
//!
//! ```
//! use bytestream::{Decode, Encode, TaggedDecoder, TaggedEncoder};
//!
//! let mut encoder = TaggedEncoder::new(Vec::<u8>::new());
//! 300u32.encode(&mut encoder).unwrap();
//! "hi".encode(&mut encoder).unwrap();
//! let bytes = encoder.into_inner();
//! assert_eq!(bytes, [0x04, 0xAC, 0x02, 0x0F, 0x02, b'h', b'i']);
//!
//! let mut decoder = TaggedDecoder::new(&bytes[..]);
//! assert_eq!(u32::decode(&mut decoder).unwrap(), 300);
//! assert_eq!(String::decode(&mut decoder).unwrap(), "hi");
//! ```

use std::{
    fmt,
    io::{Read, Write},
    marker::PhantomData,
};

use crate::{
    Decoder, Encoder,
    config::{Config, DefaultConfig},
    error::{DecodeError, EncodeError, Malformed, Unsupported},
};

#[cfg(test)]
mod test;

// =============================================================================
// Tags
// =============================================================================

/// The kind byte that prefixes every structured item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Tag {
    Unit = 0x00,
    Bool = 0x01,
    U8 = 0x02,
    U16 = 0x03,
    U32 = 0x04,
    U64 = 0x05,
    U128 = 0x06,
    I8 = 0x07,
    I16 = 0x08,
    I32 = 0x09,
    I64 = 0x0A,
    I128 = 0x0B,
    F32 = 0x0C,
    F64 = 0x0D,
    Char = 0x0E,
    Str = 0x0F,
    Bytes = 0x10,
    None = 0x11,
    Some = 0x12,
    Seq = 0x13,
    Map = 0x14,
    Tuple = 0x15,
    Struct = 0x16,
    Variant = 0x17,
}

impl Tag {
    const ALL: [Self; 24] = [
        Self::Unit,
        Self::Bool,
        Self::U8,
        Self::U16,
        Self::U32,
        Self::U64,
        Self::U128,
        Self::I8,
        Self::I16,
        Self::I32,
        Self::I64,
        Self::I128,
        Self::F32,
        Self::F64,
        Self::Char,
        Self::Str,
        Self::Bytes,
        Self::None,
        Self::Some,
        Self::Seq,
        Self::Map,
        Self::Tuple,
        Self::Struct,
        Self::Variant,
    ];

    /// Looks up the tag for a byte.
    #[must_use]
    pub fn from_byte(byte: u8) -> Option<Self> {
        Self::ALL.get(usize::from(byte)).copied()
    }

    /// A human-readable name for the tag.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Bool => "bool",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::U128 => "u128",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::I128 => "i128",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Char => "char",
            Self::Str => "string",
            Self::Bytes => "bytes",
            Self::None => "none",
            Self::Some => "some",
            Self::Seq => "sequence",
            Self::Map => "map",
            Self::Tuple => "tuple",
            Self::Struct => "struct",
            Self::Variant => "enum variant",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Varint helpers
// =============================================================================

/// Maximum number of bytes of a varint carrying a `u128`.
const MAX_VARINT_BYTES: usize = 19;

/// Encodes an unsigned integer as a LEB128 varint into the buffer.
/// Returns the number of bytes written.
#[inline]
#[allow(clippy::cast_possible_truncation)]
const fn encode_varint(
    mut value: u128,
    buf: &mut [u8; MAX_VARINT_BYTES],
) -> usize {
    let mut i = 0;
    while value >= 0x80 {
        buf[i] = (value as u8) | 0x80;
        value >>= 7;
        i += 1;
    }
    buf[i] = value as u8;
    i + 1
}

/// Maps signed integers onto unsigned ones so that small magnitudes stay
/// small: 0, -1, 1, -2, ... become 0, 1, 2, 3, ...
#[inline]
#[allow(clippy::cast_sign_loss)]
const fn zigzag_encode(value: i128) -> u128 {
    ((value << 1) ^ (value >> 127)) as u128
}

#[inline]
#[allow(clippy::cast_possible_wrap)]
const fn zigzag_decode(value: u128) -> i128 {
    ((value >> 1) as i128) ^ (-((value & 1) as i128))
}

// =============================================================================
// TaggedEncoder
// =============================================================================

/// An encoder for the tagged format that writes to any [`Write`]
/// implementation.
///
/// # Type Parameters
///
/// * `W` - The writer type that implements [`std::io::Write`].
/// * `C` - The [`Config`] supplying the depth limit.
///
/// # Example
///
/// ```
/// use bytestream::TaggedEncoder;
///
/// // Write to a Vec<u8>
/// let encoder = TaggedEncoder::new(Vec::<u8>::new());
///
/// // Write to a cursor
/// let encoder = TaggedEncoder::new(std::io::Cursor::new(Vec::<u8>::new()));
/// ```
pub struct TaggedEncoder<W, C = DefaultConfig> {
    writer: W,
    depth: usize,
    _config: PhantomData<fn() -> C>,
}

impl<W> TaggedEncoder<W> {
    /// Creates a new encoder with [`DefaultConfig`] wrapping the given
    /// writer.
    #[must_use]
    pub const fn new(writer: W) -> Self { Self::with_config(writer) }
}

impl<W, C> TaggedEncoder<W, C> {
    /// Creates a new encoder with the configuration `C`.
    #[must_use]
    pub const fn with_config(writer: W) -> Self {
        Self { writer, depth: 0, _config: PhantomData }
    }

    /// Returns a reference to the underlying writer.
    #[must_use]
    pub const fn get_ref(&self) -> &W { &self.writer }

    /// Consumes the encoder and returns the underlying writer.
    #[must_use]
    pub fn into_inner(self) -> W { self.writer }
}

impl<W, C> fmt::Debug for TaggedEncoder<W, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaggedEncoder").field("depth", &self.depth).finish()
    }
}

impl<W: Write, C: Config> TaggedEncoder<W, C> {
    fn write_tag(&mut self, tag: Tag) -> Result<(), EncodeError> {
        Ok(self.writer.write_all(&[tag as u8])?)
    }

    fn write_varint(&mut self, value: u128) -> Result<(), EncodeError> {
        let mut buf = [0u8; MAX_VARINT_BYTES];
        let len = encode_varint(value, &mut buf);
        Ok(self.writer.write_all(&buf[..len])?)
    }

    fn write_len(&mut self, len: usize) -> Result<(), EncodeError> {
        self.write_varint(len as u128)
    }

    fn write_tagged_varint(
        &mut self,
        tag: Tag,
        value: u128,
    ) -> Result<(), EncodeError> {
        self.write_tag(tag)?;
        self.write_varint(value)
    }

    fn write_tagged_raw(
        &mut self,
        tag: Tag,
        bytes: &[u8],
    ) -> Result<(), EncodeError> {
        self.write_tag(tag)?;
        Ok(self.writer.write_all(bytes)?)
    }

    fn descend(&mut self) -> Result<(), EncodeError> {
        let limit = C::max_depth();
        if self.depth >= limit {
            return Err(Unsupported::DepthExceeded { limit }.into());
        }
        self.depth += 1;
        Ok(())
    }
}

impl<W: Write, C: Config> Encoder for TaggedEncoder<W, C> {
    fn emit_unit(&mut self) -> Result<(), EncodeError> {
        self.write_tag(Tag::Unit)
    }

    fn emit_bool(&mut self, v: bool) -> Result<(), EncodeError> {
        self.write_tagged_raw(Tag::Bool, &[u8::from(v)])
    }

    fn emit_u8(&mut self, v: u8) -> Result<(), EncodeError> {
        self.write_tagged_raw(Tag::U8, &[v])
    }

    fn emit_u16(&mut self, v: u16) -> Result<(), EncodeError> {
        self.write_tagged_varint(Tag::U16, u128::from(v))
    }

    fn emit_u32(&mut self, v: u32) -> Result<(), EncodeError> {
        self.write_tagged_varint(Tag::U32, u128::from(v))
    }

    fn emit_u64(&mut self, v: u64) -> Result<(), EncodeError> {
        self.write_tagged_varint(Tag::U64, u128::from(v))
    }

    fn emit_u128(&mut self, v: u128) -> Result<(), EncodeError> {
        self.write_tagged_varint(Tag::U128, v)
    }

    fn emit_i8(&mut self, v: i8) -> Result<(), EncodeError> {
        self.write_tagged_raw(Tag::I8, &v.to_le_bytes())
    }

    fn emit_i16(&mut self, v: i16) -> Result<(), EncodeError> {
        self.write_tagged_varint(Tag::I16, zigzag_encode(i128::from(v)))
    }

    fn emit_i32(&mut self, v: i32) -> Result<(), EncodeError> {
        self.write_tagged_varint(Tag::I32, zigzag_encode(i128::from(v)))
    }

    fn emit_i64(&mut self, v: i64) -> Result<(), EncodeError> {
        self.write_tagged_varint(Tag::I64, zigzag_encode(i128::from(v)))
    }

    fn emit_i128(&mut self, v: i128) -> Result<(), EncodeError> {
        self.write_tagged_varint(Tag::I128, zigzag_encode(v))
    }

    fn emit_f32(&mut self, v: f32) -> Result<(), EncodeError> {
        self.write_tagged_raw(Tag::F32, &v.to_le_bytes())
    }

    fn emit_f64(&mut self, v: f64) -> Result<(), EncodeError> {
        self.write_tagged_raw(Tag::F64, &v.to_le_bytes())
    }

    fn emit_char(&mut self, v: char) -> Result<(), EncodeError> {
        self.write_tagged_varint(Tag::Char, u128::from(u32::from(v)))
    }

    fn emit_str(&mut self, v: &str) -> Result<(), EncodeError> {
        self.emit_bytes_as(Tag::Str, v.as_bytes())
    }

    fn emit_bytes(&mut self, v: &[u8]) -> Result<(), EncodeError> {
        self.emit_bytes_as(Tag::Bytes, v)
    }

    fn emit_option(&mut self, present: bool) -> Result<(), EncodeError> {
        self.write_tag(if present { Tag::Some } else { Tag::None })
    }

    fn emit_seq(&mut self, len: usize) -> Result<(), EncodeError> {
        self.write_tag(Tag::Seq)?;
        self.write_len(len)
    }

    fn emit_map(&mut self, len: usize) -> Result<(), EncodeError> {
        self.write_tag(Tag::Map)?;
        self.write_len(len)
    }

    fn begin_tuple(&mut self, arity: usize) -> Result<(), EncodeError> {
        self.write_tag(Tag::Tuple)?;
        self.write_len(arity)?;
        self.descend()
    }

    fn begin_struct(
        &mut self,
        _name: &'static str,
        fields: usize,
    ) -> Result<(), EncodeError> {
        self.write_tag(Tag::Struct)?;
        self.write_len(fields)?;
        self.descend()
    }

    fn emit_field(&mut self, name: &'static str) -> Result<(), EncodeError> {
        self.write_len(name.len())?;
        Ok(self.writer.write_all(name.as_bytes())?)
    }

    fn begin_variant(
        &mut self,
        _enum_name: &'static str,
        index: u32,
        _variant: &'static str,
    ) -> Result<(), EncodeError> {
        self.write_tagged_varint(Tag::Variant, u128::from(index))?;
        self.descend()
    }

    fn end_aggregate(&mut self) { self.depth = self.depth.saturating_sub(1); }
}

impl<W: Write, C: Config> TaggedEncoder<W, C> {
    fn emit_bytes_as(
        &mut self,
        tag: Tag,
        bytes: &[u8],
    ) -> Result<(), EncodeError> {
        self.write_tag(tag)?;
        self.write_len(bytes.len())?;
        Ok(self.writer.write_all(bytes)?)
    }
}

// =============================================================================
// TaggedDecoder
// =============================================================================

/// A decoder for the tagged format that reads from any [`Read`]
/// implementation.
///
/// # Type Parameters
///
/// * `R` - The reader type that implements [`std::io::Read`].
/// * `C` - The [`Config`] supplying the depth and preallocation limits.
///
/// # Example
///
/// ```
/// use bytestream::{Decode, TaggedDecoder};
///
/// let data = [0x02, 42];
/// let mut decoder = TaggedDecoder::new(&data[..]);
/// assert_eq!(u8::decode(&mut decoder).unwrap(), 42);
/// decoder.finish().unwrap();
/// ```
pub struct TaggedDecoder<R, C = DefaultConfig> {
    reader: R,
    depth: usize,
    _config: PhantomData<fn() -> C>,
}

impl<R> TaggedDecoder<R> {
    /// Creates a new decoder with [`DefaultConfig`] wrapping the given
    /// reader.
    #[must_use]
    pub const fn new(reader: R) -> Self { Self::with_config(reader) }
}

impl<R, C> TaggedDecoder<R, C> {
    /// Creates a new decoder with the configuration `C`.
    #[must_use]
    pub const fn with_config(reader: R) -> Self {
        Self { reader, depth: 0, _config: PhantomData }
    }

    /// Returns a reference to the underlying reader.
    #[must_use]
    pub const fn get_ref(&self) -> &R { &self.reader }

    /// Consumes the decoder and returns the underlying reader.
    #[must_use]
    pub fn into_inner(self) -> R { self.reader }
}

impl<R, C> fmt::Debug for TaggedDecoder<R, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaggedDecoder").field("depth", &self.depth).finish()
    }
}

impl<C: Config> TaggedDecoder<&[u8], C> {
    /// Checks that the whole input was consumed.
    ///
    /// # Errors
    ///
    /// Returns [`Malformed::TrailingBytes`] when input remains and the
    /// configuration does not allow it.
    pub fn finish(self) -> Result<(), DecodeError> {
        if self.reader.is_empty() || C::allow_trailing_bytes() {
            Ok(())
        } else {
            Err(Malformed::TrailingBytes(self.reader.len()).into())
        }
    }
}

impl<R: Read, C: Config> TaggedDecoder<R, C> {
    /// Reads a single byte from the reader.
    fn read_byte(&mut self) -> Result<u8, DecodeError> {
        let mut buf = [0u8; 1];
        self.reader.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut buf = [0u8; N];
        self.reader.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Reads a tag and checks that it is `expected`.
    fn expect_tag(&mut self, expected: Tag) -> Result<(), DecodeError> {
        let found = self.read_tag()?;
        if found == expected {
            Ok(())
        } else {
            Err(Malformed::TagMismatch { expected, found }.into())
        }
    }

    fn read_tag(&mut self) -> Result<Tag, DecodeError> {
        let byte = self.read_byte()?;
        Tag::from_byte(byte).ok_or_else(|| Malformed::UnknownTag(byte).into())
    }

    /// Reads a varint that must fit in `bits` bits.
    fn read_varint(&mut self, bits: u32) -> Result<u128, DecodeError> {
        let mut result: u128 = 0;
        let mut shift = 0;

        loop {
            let byte = self.read_byte()?;
            let chunk = u128::from(byte & 0x7F);

            // a chunk at shift > 121 would lose bits off the top of a u128
            if shift >= bits || (shift > 121 && chunk >> (128 - shift) != 0) {
                return Err(Malformed::VarintOverflow.into());
            }

            result |= chunk << shift;

            if byte & 0x80 == 0 {
                break;
            }

            shift += 7;
        }

        if bits < 128 && result >> bits != 0 {
            return Err(Malformed::VarintOverflow.into());
        }
        Ok(result)
    }

    fn read_tagged_varint(
        &mut self,
        tag: Tag,
        bits: u32,
    ) -> Result<u128, DecodeError> {
        self.expect_tag(tag)?;
        self.read_varint(bits)
    }

    fn read_tagged_signed(
        &mut self,
        tag: Tag,
        bits: u32,
    ) -> Result<i128, DecodeError> {
        Ok(zigzag_decode(self.read_tagged_varint(tag, bits)?))
    }

    fn read_len(&mut self) -> Result<usize, DecodeError> {
        usize::try_from(self.read_varint(64)?)
            .map_err(|_| Malformed::OutOfRange.into())
    }

    fn read_raw_bytes(&mut self, len: usize) -> Result<Vec<u8>, DecodeError> {
        let mut buf = Vec::with_capacity(len.min(C::max_preallocation()));
        (&mut self.reader).take(len as u64).read_to_end(&mut buf)?;
        if buf.len() == len {
            Ok(buf)
        } else {
            Err(Malformed::Truncated.into())
        }
    }

    fn read_utf8(&mut self, len: usize) -> Result<String, DecodeError> {
        String::from_utf8(self.read_raw_bytes(len)?)
            .map_err(|_| Malformed::InvalidUtf8.into())
    }

    fn descend(&mut self) -> Result<(), DecodeError> {
        let limit = C::max_depth();
        if self.depth >= limit {
            return Err(Malformed::DepthExceeded { limit }.into());
        }
        self.depth += 1;
        Ok(())
    }
}

/// Narrows a decoded integer to its destination width.
fn narrow<T: TryFrom<U>, U>(value: U) -> Result<T, DecodeError> {
    T::try_from(value).map_err(|_| Malformed::VarintOverflow.into())
}

impl<R: Read, C: Config> Decoder for TaggedDecoder<R, C> {
    fn read_unit(&mut self) -> Result<(), DecodeError> {
        self.expect_tag(Tag::Unit)
    }

    fn read_bool(&mut self) -> Result<bool, DecodeError> {
        self.expect_tag(Tag::Bool)?;
        match self.read_byte()? {
            0 => Ok(false),
            1 => Ok(true),
            byte => Err(Malformed::InvalidBool(byte).into()),
        }
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        self.expect_tag(Tag::U8)?;
        self.read_byte()
    }

    fn read_u16(&mut self) -> Result<u16, DecodeError> {
        narrow(self.read_tagged_varint(Tag::U16, 16)?)
    }

    fn read_u32(&mut self) -> Result<u32, DecodeError> {
        narrow(self.read_tagged_varint(Tag::U32, 32)?)
    }

    fn read_u64(&mut self) -> Result<u64, DecodeError> {
        narrow(self.read_tagged_varint(Tag::U64, 64)?)
    }

    fn read_u128(&mut self) -> Result<u128, DecodeError> {
        self.read_tagged_varint(Tag::U128, 128)
    }

    fn read_i8(&mut self) -> Result<i8, DecodeError> {
        self.expect_tag(Tag::I8)?;
        Ok(i8::from_le_bytes(self.read_array()?))
    }

    fn read_i16(&mut self) -> Result<i16, DecodeError> {
        narrow(self.read_tagged_signed(Tag::I16, 16)?)
    }

    fn read_i32(&mut self) -> Result<i32, DecodeError> {
        narrow(self.read_tagged_signed(Tag::I32, 32)?)
    }

    fn read_i64(&mut self) -> Result<i64, DecodeError> {
        narrow(self.read_tagged_signed(Tag::I64, 64)?)
    }

    fn read_i128(&mut self) -> Result<i128, DecodeError> {
        self.read_tagged_signed(Tag::I128, 128)
    }

    fn read_f32(&mut self) -> Result<f32, DecodeError> {
        self.expect_tag(Tag::F32)?;
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    fn read_f64(&mut self) -> Result<f64, DecodeError> {
        self.expect_tag(Tag::F64)?;
        Ok(f64::from_le_bytes(self.read_array()?))
    }

    fn read_char(&mut self) -> Result<char, DecodeError> {
        let code: u32 = narrow(self.read_tagged_varint(Tag::Char, 32)?)?;
        char::from_u32(code).ok_or_else(|| Malformed::InvalidChar(code).into())
    }

    fn read_str(&mut self) -> Result<String, DecodeError> {
        self.expect_tag(Tag::Str)?;
        let len = self.read_len()?;
        self.read_utf8(len)
    }

    fn read_bytes(&mut self) -> Result<Vec<u8>, DecodeError> {
        self.expect_tag(Tag::Bytes)?;
        let len = self.read_len()?;
        self.read_raw_bytes(len)
    }

    fn read_option(&mut self) -> Result<bool, DecodeError> {
        match self.read_tag()? {
            Tag::Some => Ok(true),
            Tag::None => Ok(false),
            found => {
                Err(Malformed::TagMismatch { expected: Tag::Some, found }
                    .into())
            }
        }
    }

    fn read_seq(&mut self) -> Result<usize, DecodeError> {
        self.expect_tag(Tag::Seq)?;
        self.read_len()
    }

    fn read_map(&mut self) -> Result<usize, DecodeError> {
        self.expect_tag(Tag::Map)?;
        self.read_len()
    }

    fn begin_tuple(&mut self, arity: usize) -> Result<(), DecodeError> {
        self.expect_tag(Tag::Tuple)?;
        let found = self.read_len()?;
        if found != arity {
            return Err(Malformed::Arity { expected: arity, found }.into());
        }
        self.descend()
    }

    fn begin_struct(
        &mut self,
        name: &'static str,
        fields: usize,
    ) -> Result<(), DecodeError> {
        self.expect_tag(Tag::Struct)?;
        let found = self.read_len()?;
        if found != fields {
            return Err(Malformed::FieldCount {
                type_name: name,
                expected: fields,
                found,
            }
            .into());
        }
        self.descend()
    }

    fn expect_field(&mut self, name: &'static str) -> Result<(), DecodeError> {
        let len = self.read_len()?;
        // a name of another length cannot match; avoid reading a huge one
        let bytes = self.read_raw_bytes(len.min(name.len() + 64))?;
        if bytes == name.as_bytes() {
            return Ok(());
        }

        // the read may have cut a character in half
        let found = String::from_utf8_lossy(&bytes).into_owned();
        Err(Malformed::FieldName { expected: name, found }.into())
    }

    fn read_variant(
        &mut self,
        _enum_name: &'static str,
    ) -> Result<u32, DecodeError> {
        let index = narrow(self.read_tagged_varint(Tag::Variant, 32)?)?;
        self.descend()?;
        Ok(index)
    }

    fn end_aggregate(&mut self) { self.depth = self.depth.saturating_sub(1); }

    fn capacity_hint(&self, len: usize) -> usize {
        len.min(C::max_preallocation())
    }
}
