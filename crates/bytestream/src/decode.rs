//! Decoding traits and implementations.
//!
//! This module provides the [`Decoder`] trait for sources that read the
//! structured wire format, the [`Decode`] trait for types that can rebuild
//! themselves from a decoder, and [`Destination`], the mutable slot that
//! [`decode`](crate::decode) writes into.

use std::{
    borrow::Cow,
    cell::{Cell, RefCell},
    collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque},
    hash::{BuildHasher, Hash},
    marker::PhantomData,
    rc::Rc,
    sync::Arc,
    time::Duration,
};

use dashmap::{DashMap, DashSet};

use crate::{
    config::{Config, DefaultConfig},
    error::{DecodeError, Malformed},
};

/// A source for the structured wire format.
///
/// Each `read_*` method expects exactly one kind of item and fails with
/// [`Malformed::TagMismatch`] when the stream holds something else.
pub trait Decoder {
    // =========================================================================
    // Scalars
    // =========================================================================

    /// Reads the unit value.
    fn read_unit(&mut self) -> Result<(), DecodeError>;

    /// Reads a boolean.
    fn read_bool(&mut self) -> Result<bool, DecodeError>;

    /// Reads an unsigned byte.
    fn read_u8(&mut self) -> Result<u8, DecodeError>;

    /// Reads a 16-bit unsigned integer.
    fn read_u16(&mut self) -> Result<u16, DecodeError>;

    /// Reads a 32-bit unsigned integer.
    fn read_u32(&mut self) -> Result<u32, DecodeError>;

    /// Reads a 64-bit unsigned integer.
    fn read_u64(&mut self) -> Result<u64, DecodeError>;

    /// Reads a 128-bit unsigned integer.
    fn read_u128(&mut self) -> Result<u128, DecodeError>;

    /// Reads a signed byte.
    fn read_i8(&mut self) -> Result<i8, DecodeError>;

    /// Reads a 16-bit signed integer.
    fn read_i16(&mut self) -> Result<i16, DecodeError>;

    /// Reads a 32-bit signed integer.
    fn read_i32(&mut self) -> Result<i32, DecodeError>;

    /// Reads a 64-bit signed integer.
    fn read_i64(&mut self) -> Result<i64, DecodeError>;

    /// Reads a 128-bit signed integer.
    fn read_i128(&mut self) -> Result<i128, DecodeError>;

    /// Reads a 32-bit float.
    fn read_f32(&mut self) -> Result<f32, DecodeError>;

    /// Reads a 64-bit float.
    fn read_f64(&mut self) -> Result<f64, DecodeError>;

    /// Reads a Unicode scalar value.
    fn read_char(&mut self) -> Result<char, DecodeError>;

    /// Reads a length-prefixed string.
    fn read_str(&mut self) -> Result<String, DecodeError>;

    /// Reads a length-prefixed byte string.
    fn read_bytes(&mut self) -> Result<Vec<u8>, DecodeError>;

    /// Reads a platform-sized unsigned integer written as a `u64`.
    fn read_usize(&mut self) -> Result<usize, DecodeError> {
        usize::try_from(self.read_u64()?)
            .map_err(|_| Malformed::OutOfRange.into())
    }

    /// Reads a platform-sized signed integer written as an `i64`.
    fn read_isize(&mut self) -> Result<isize, DecodeError> {
        isize::try_from(self.read_i64()?)
            .map_err(|_| Malformed::OutOfRange.into())
    }

    // =========================================================================
    // Containers
    // =========================================================================

    /// Reads the presence marker of an optional value. When it returns
    /// `true` the inner value follows.
    fn read_option(&mut self) -> Result<bool, DecodeError>;

    /// Reads the header of a sequence and returns its length.
    fn read_seq(&mut self) -> Result<usize, DecodeError>;

    /// Reads the header of a map and returns its number of pairs.
    fn read_map(&mut self) -> Result<usize, DecodeError>;

    /// Opens a tuple, checking that it holds exactly `arity` values.
    fn begin_tuple(&mut self, arity: usize) -> Result<(), DecodeError>;

    /// Opens a struct, checking that it holds exactly `fields` fields.
    fn begin_struct(
        &mut self,
        name: &'static str,
        fields: usize,
    ) -> Result<(), DecodeError>;

    /// Reads the next field name and checks it against `name`.
    fn expect_field(&mut self, name: &'static str) -> Result<(), DecodeError>;

    /// Opens an enum variant and returns its index. The caller rejects
    /// indices the enum does not have.
    fn read_variant(
        &mut self,
        enum_name: &'static str,
    ) -> Result<u32, DecodeError>;

    /// Closes the innermost tuple, struct or variant.
    fn end_aggregate(&mut self) {}

    /// How many elements to reserve for a collection announcing `len`.
    fn capacity_hint(&self, len: usize) -> usize {
        len.min(DefaultConfig::max_preallocation())
    }
}

/// A trait for types that can be deserialized.
///
/// Only [`decode`](Self::decode) is required. [`decode_raw`](Self::decode_raw)
/// marks the byte and text types that [`decode`](crate::decode) fills
/// straight from the input, and the `*_vec` methods let an element type pick
/// the representation of `Vec<Self>`, mirroring
/// [`Encode::encode_slice`](crate::Encode::encode_slice).
pub trait Decode: Sized {
    /// Reads a value from the decoder.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream does not hold a value of this type.
    fn decode<D: Decoder + ?Sized>(decoder: &mut D) -> Result<Self, DecodeError>;

    /// Builds the value directly from raw input, or returns `None` for
    /// structured types.
    fn decode_raw(bytes: &[u8]) -> Option<Result<Self, DecodeError>> {
        let _ = bytes;
        None
    }

    /// Reads a `Vec` of this type from the decoder.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream does not hold a sequence of this type.
    fn decode_vec<D: Decoder + ?Sized>(
        decoder: &mut D,
    ) -> Result<Vec<Self>, DecodeError> {
        let len = decoder.read_seq()?;
        let mut vec = Vec::with_capacity(decoder.capacity_hint(len));
        for _ in 0..len {
            vec.push(Self::decode(decoder)?);
        }
        Ok(vec)
    }

    /// Builds a `Vec` of this type directly from raw input, or returns
    /// `None` when such a vector is structured.
    fn decode_raw_vec(bytes: &[u8]) -> Option<Vec<Self>> {
        let _ = bytes;
        None
    }
}

/// Runs `body` inside an aggregate the caller has just opened, then closes
/// it with [`Decoder::end_aggregate`] whether or not `body` succeeded.
///
/// # Errors
///
/// Returns whatever `body` returns.
pub fn in_aggregate<D: Decoder + ?Sized, T>(
    decoder: &mut D,
    body: impl FnOnce(&mut D) -> Result<T, DecodeError>,
) -> Result<T, DecodeError> {
    let result = body(decoder);
    decoder.end_aggregate();
    result
}

/// A mutable slot that [`decode`](crate::decode) writes into.
///
/// `&mut T` always provides a slot. `Option<&mut T>` models a destination
/// that may be missing; `None` makes decoding fail with
/// [`DecodeError::NilTarget`].
pub trait Destination {
    /// The type written into the slot.
    type Target: Decode;

    /// Returns the slot, or `None` when there is nowhere to write.
    fn slot(&mut self) -> Option<&mut Self::Target>;
}

impl<T: Decode> Destination for &mut T {
    type Target = T;

    fn slot(&mut self) -> Option<&mut T> { Some(&mut **self) }
}

impl<T: Decode> Destination for Option<&mut T> {
    type Target = T;

    fn slot(&mut self) -> Option<&mut T> { self.as_deref_mut() }
}

// =============================================================================
// Primitive types
// =============================================================================

macro_rules! impl_decode_scalar {
    ($($ty:ty => $read:ident),+ $(,)?) => {
        $(
            impl Decode for $ty {
                fn decode<D: Decoder + ?Sized>(
                    decoder: &mut D,
                ) -> Result<Self, DecodeError> {
                    decoder.$read()
                }
            }
        )+
    };
}

impl_decode_scalar!(
    u16 => read_u16,
    u32 => read_u32,
    u64 => read_u64,
    u128 => read_u128,
    usize => read_usize,
    i8 => read_i8,
    i16 => read_i16,
    i32 => read_i32,
    i64 => read_i64,
    i128 => read_i128,
    isize => read_isize,
    bool => read_bool,
    char => read_char,
    f32 => read_f32,
    f64 => read_f64,
);

impl Decode for u8 {
    fn decode<D: Decoder + ?Sized>(decoder: &mut D) -> Result<Self, DecodeError> {
        decoder.read_u8()
    }

    fn decode_vec<D: Decoder + ?Sized>(
        decoder: &mut D,
    ) -> Result<Vec<Self>, DecodeError> {
        decoder.read_bytes()
    }

    fn decode_raw_vec(bytes: &[u8]) -> Option<Vec<Self>> {
        Some(bytes.to_vec())
    }
}

impl Decode for String {
    fn decode<D: Decoder + ?Sized>(decoder: &mut D) -> Result<Self, DecodeError> {
        decoder.read_str()
    }

    fn decode_raw(bytes: &[u8]) -> Option<Result<Self, DecodeError>> {
        Some(
            Self::from_utf8(bytes.to_vec())
                .map_err(|_| Malformed::InvalidUtf8.into()),
        )
    }
}

impl Decode for Box<str> {
    fn decode<D: Decoder + ?Sized>(decoder: &mut D) -> Result<Self, DecodeError> {
        Ok(decoder.read_str()?.into_boxed_str())
    }

    fn decode_raw(bytes: &[u8]) -> Option<Result<Self, DecodeError>> {
        String::decode_raw(bytes).map(|r| r.map(String::into_boxed_str))
    }
}

impl Decode for Rc<str> {
    fn decode<D: Decoder + ?Sized>(decoder: &mut D) -> Result<Self, DecodeError> {
        Ok(Self::from(decoder.read_str()?))
    }

    fn decode_raw(bytes: &[u8]) -> Option<Result<Self, DecodeError>> {
        String::decode_raw(bytes).map(|r| r.map(Self::from))
    }
}

impl Decode for Arc<str> {
    fn decode<D: Decoder + ?Sized>(decoder: &mut D) -> Result<Self, DecodeError> {
        Ok(Self::from(decoder.read_str()?))
    }

    fn decode_raw(bytes: &[u8]) -> Option<Result<Self, DecodeError>> {
        String::decode_raw(bytes).map(|r| r.map(Self::from))
    }
}

// =============================================================================
// Smart pointers and cells
// =============================================================================

macro_rules! impl_decode_pointer {
    ($($ptr:ident),+ $(,)?) => {
        $(
            impl<T: Decode> Decode for $ptr<T> {
                fn decode<D: Decoder + ?Sized>(
                    decoder: &mut D,
                ) -> Result<Self, DecodeError> {
                    T::decode(decoder).map($ptr::new)
                }

                fn decode_raw(
                    bytes: &[u8],
                ) -> Option<Result<Self, DecodeError>> {
                    T::decode_raw(bytes).map(|r| r.map($ptr::new))
                }
            }

            impl<T: Decode> Decode for $ptr<[T]> {
                fn decode<D: Decoder + ?Sized>(
                    decoder: &mut D,
                ) -> Result<Self, DecodeError> {
                    T::decode_vec(decoder).map(Self::from)
                }

                fn decode_raw(
                    bytes: &[u8],
                ) -> Option<Result<Self, DecodeError>> {
                    T::decode_raw_vec(bytes).map(|v| Ok(Self::from(v)))
                }
            }
        )+
    };
}

impl_decode_pointer!(Box, Rc, Arc);

impl<T: ToOwned + ?Sized> Decode for Cow<'_, T>
where
    T::Owned: Decode,
{
    fn decode<D: Decoder + ?Sized>(decoder: &mut D) -> Result<Self, DecodeError> {
        <T::Owned as Decode>::decode(decoder).map(Cow::Owned)
    }

    fn decode_raw(bytes: &[u8]) -> Option<Result<Self, DecodeError>> {
        <T::Owned as Decode>::decode_raw(bytes).map(|r| r.map(Cow::Owned))
    }
}

impl<T: Decode + Copy> Decode for Cell<T> {
    fn decode<D: Decoder + ?Sized>(decoder: &mut D) -> Result<Self, DecodeError> {
        T::decode(decoder).map(Self::new)
    }
}

impl<T: Decode> Decode for RefCell<T> {
    fn decode<D: Decoder + ?Sized>(decoder: &mut D) -> Result<Self, DecodeError> {
        T::decode(decoder).map(Self::new)
    }
}

// =============================================================================
// Option and Result
// =============================================================================

impl<T: Decode> Decode for Option<T> {
    fn decode<D: Decoder + ?Sized>(decoder: &mut D) -> Result<Self, DecodeError> {
        if decoder.read_option()? {
            Ok(Some(T::decode(decoder)?))
        } else {
            Ok(None)
        }
    }
}

impl<T: Decode, E: Decode> Decode for Result<T, E> {
    fn decode<D: Decoder + ?Sized>(decoder: &mut D) -> Result<Self, DecodeError> {
        let index = decoder.read_variant("Result")?;
        in_aggregate(decoder, |decoder| match index {
            0 => Ok(Ok(T::decode(decoder)?)),
            1 => Ok(Err(E::decode(decoder)?)),
            index => Err(Malformed::UnknownVariant {
                enum_name: "Result",
                index,
            }
            .into()),
        })
    }
}

// =============================================================================
// Sequences
// =============================================================================

impl<T: Decode> Decode for Vec<T> {
    fn decode<D: Decoder + ?Sized>(decoder: &mut D) -> Result<Self, DecodeError> {
        T::decode_vec(decoder)
    }

    fn decode_raw(bytes: &[u8]) -> Option<Result<Self, DecodeError>> {
        T::decode_raw_vec(bytes).map(Ok)
    }
}

impl<T: Decode> Decode for VecDeque<T> {
    fn decode<D: Decoder + ?Sized>(decoder: &mut D) -> Result<Self, DecodeError> {
        let len = decoder.read_seq()?;
        let mut deque = Self::with_capacity(decoder.capacity_hint(len));
        for _ in 0..len {
            deque.push_back(T::decode(decoder)?);
        }
        Ok(deque)
    }
}

impl<T: Decode, const N: usize> Decode for [T; N] {
    fn decode<D: Decoder + ?Sized>(decoder: &mut D) -> Result<Self, DecodeError> {
        decoder.begin_tuple(N)?;
        let items = in_aggregate(decoder, |decoder| {
            (0..N).map(|_| T::decode(decoder)).collect::<Result<Vec<_>, _>>()
        })?;

        let found = items.len();
        items
            .try_into()
            .map_err(|_| Malformed::Arity { expected: N, found }.into())
    }
}

// =============================================================================
// Maps and sets
// =============================================================================

impl<K, V, S> Decode for HashMap<K, V, S>
where
    K: Decode + Eq + Hash,
    V: Decode,
    S: BuildHasher + Default,
{
    fn decode<D: Decoder + ?Sized>(decoder: &mut D) -> Result<Self, DecodeError> {
        let len = decoder.read_map()?;
        let mut map =
            Self::with_capacity_and_hasher(decoder.capacity_hint(len), S::default());
        for _ in 0..len {
            let key = K::decode(decoder)?;
            let value = V::decode(decoder)?;
            map.insert(key, value);
        }
        Ok(map)
    }
}

impl<T, S> Decode for HashSet<T, S>
where
    T: Decode + Eq + Hash,
    S: BuildHasher + Default,
{
    fn decode<D: Decoder + ?Sized>(decoder: &mut D) -> Result<Self, DecodeError> {
        let len = decoder.read_seq()?;
        let mut set =
            Self::with_capacity_and_hasher(decoder.capacity_hint(len), S::default());
        for _ in 0..len {
            set.insert(T::decode(decoder)?);
        }
        Ok(set)
    }
}

impl<K: Decode + Ord, V: Decode> Decode for BTreeMap<K, V> {
    fn decode<D: Decoder + ?Sized>(decoder: &mut D) -> Result<Self, DecodeError> {
        let len = decoder.read_map()?;
        let mut map = Self::new();
        for _ in 0..len {
            let key = K::decode(decoder)?;
            let value = V::decode(decoder)?;
            map.insert(key, value);
        }
        Ok(map)
    }
}

impl<T: Decode + Ord> Decode for BTreeSet<T> {
    fn decode<D: Decoder + ?Sized>(decoder: &mut D) -> Result<Self, DecodeError> {
        let len = decoder.read_seq()?;
        let mut set = Self::new();
        for _ in 0..len {
            set.insert(T::decode(decoder)?);
        }
        Ok(set)
    }
}

impl<K, V, S> Decode for DashMap<K, V, S>
where
    K: Decode + Eq + Hash,
    V: Decode,
    S: BuildHasher + Default + Clone,
{
    fn decode<D: Decoder + ?Sized>(decoder: &mut D) -> Result<Self, DecodeError> {
        let len = decoder.read_map()?;
        let map =
            Self::with_capacity_and_hasher(decoder.capacity_hint(len), S::default());
        for _ in 0..len {
            let key = K::decode(decoder)?;
            let value = V::decode(decoder)?;
            map.insert(key, value);
        }
        Ok(map)
    }
}

impl<T, S> Decode for DashSet<T, S>
where
    T: Decode + Eq + Hash,
    S: BuildHasher + Default + Clone,
{
    fn decode<D: Decoder + ?Sized>(decoder: &mut D) -> Result<Self, DecodeError> {
        let len = decoder.read_seq()?;
        let set =
            Self::with_capacity_and_hasher(decoder.capacity_hint(len), S::default());
        for _ in 0..len {
            set.insert(T::decode(decoder)?);
        }
        Ok(set)
    }
}

// =============================================================================
// Tuples
// =============================================================================

impl Decode for () {
    fn decode<D: Decoder + ?Sized>(decoder: &mut D) -> Result<Self, DecodeError> {
        decoder.read_unit()
    }
}

macro_rules! impl_decode_tuple {
    ($arity:literal => $($name:ident),+) => {
        impl<$($name: Decode),+> Decode for ($($name,)+) {
            fn decode<D_: Decoder + ?Sized>(
                decoder: &mut D_,
            ) -> Result<Self, DecodeError> {
                decoder.begin_tuple($arity)?;
                in_aggregate(decoder, |decoder| {
                    Ok(($($name::decode(decoder)?,)+))
                })
            }
        }
    };
}

impl_decode_tuple!(1 => A);
impl_decode_tuple!(2 => A, B);
impl_decode_tuple!(3 => A, B, C);
impl_decode_tuple!(4 => A, B, C, D);
impl_decode_tuple!(5 => A, B, C, D, E);
impl_decode_tuple!(6 => A, B, C, D, E, F);
impl_decode_tuple!(7 => A, B, C, D, E, F, G);
impl_decode_tuple!(8 => A, B, C, D, E, F, G, H);
impl_decode_tuple!(9 => A, B, C, D, E, F, G, H, I);
impl_decode_tuple!(10 => A, B, C, D, E, F, G, H, I, J);
impl_decode_tuple!(11 => A, B, C, D, E, F, G, H, I, J, K);
impl_decode_tuple!(12 => A, B, C, D, E, F, G, H, I, J, K, L);

// =============================================================================
// Other standard library types
// =============================================================================

impl<T: ?Sized> Decode for PhantomData<T> {
    fn decode<D: Decoder + ?Sized>(decoder: &mut D) -> Result<Self, DecodeError> {
        decoder.read_unit()?;
        Ok(Self)
    }
}

impl Decode for Duration {
    fn decode<D: Decoder + ?Sized>(decoder: &mut D) -> Result<Self, DecodeError> {
        decoder.begin_struct("Duration", 2)?;
        let (secs, nanos) = in_aggregate(decoder, |decoder| {
            decoder.expect_field("secs")?;
            let secs = decoder.read_u64()?;
            decoder.expect_field("nanos")?;
            Ok((secs, decoder.read_u32()?))
        })?;

        if nanos >= 1_000_000_000 {
            return Err(Malformed::InvalidValue(
                "duration nanoseconds out of range",
            )
            .into());
        }
        Ok(Self::new(secs, nanos))
    }
}

macro_rules! impl_decode_nonzero {
    ($($ty:ty => $inner:ty),+ $(,)?) => {
        $(
            impl Decode for $ty {
                fn decode<D: Decoder + ?Sized>(
                    decoder: &mut D,
                ) -> Result<Self, DecodeError> {
                    Self::new(<$inner>::decode(decoder)?).ok_or_else(|| {
                        Malformed::InvalidValue("zero in a non-zero integer")
                            .into()
                    })
                }
            }
        )+
    };
}

impl_decode_nonzero!(
    std::num::NonZeroU8 => u8,
    std::num::NonZeroU16 => u16,
    std::num::NonZeroU32 => u32,
    std::num::NonZeroU64 => u64,
    std::num::NonZeroU128 => u128,
    std::num::NonZeroUsize => usize,
    std::num::NonZeroI8 => i8,
    std::num::NonZeroI16 => i16,
    std::num::NonZeroI32 => i32,
    std::num::NonZeroI64 => i64,
    std::num::NonZeroI128 => i128,
    std::num::NonZeroIsize => isize,
);
