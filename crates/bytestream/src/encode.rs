//! Encoding traits and implementations.
//!
//! This module provides the [`Encoder`] trait for sinks that write the
//! structured wire format, the [`Encode`] trait for types that can describe
//! themselves to an encoder, and [`Form`], the raw-or-structured
//! classification resolved once at the top of [`encode`](crate::encode).

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

use crate::error::{EncodeError, Unsupported};

/// How a value is turned into bytes at the top level.
///
/// Byte sequences and text already have an unambiguous byte representation
/// and pass through unchanged. Everything else is written with the tagged
/// structured format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Form<'a> {
    /// A byte sequence, emitted as-is.
    Bytes(&'a [u8]),

    /// A text string, emitted as its UTF-8 bytes with no length prefix.
    Text(&'a str),

    /// Any other value, emitted through [`Encode::encode`].
    Structured,
}

impl Form<'_> {
    /// A short name for the form, used in log events.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Bytes(_) => "bytes",
            Self::Text(_) => "text",
            Self::Structured => "structured",
        }
    }
}

/// A sink for the structured wire format.
///
/// Every method writes one self-describing item. Aggregates are opened with
/// [`begin_tuple`](Self::begin_tuple), [`begin_struct`](Self::begin_struct)
/// or [`begin_variant`](Self::begin_variant) and closed with
/// [`end_aggregate`](Self::end_aggregate); the closing call writes nothing
/// but lets the encoder track nesting depth.
pub trait Encoder {
    // =========================================================================
    // Scalars
    // =========================================================================

    /// Emits the unit value.
    fn emit_unit(&mut self) -> Result<(), EncodeError>;

    /// Emits a boolean.
    fn emit_bool(&mut self, v: bool) -> Result<(), EncodeError>;

    /// Emits an unsigned byte.
    fn emit_u8(&mut self, v: u8) -> Result<(), EncodeError>;

    /// Emits a 16-bit unsigned integer.
    fn emit_u16(&mut self, v: u16) -> Result<(), EncodeError>;

    /// Emits a 32-bit unsigned integer.
    fn emit_u32(&mut self, v: u32) -> Result<(), EncodeError>;

    /// Emits a 64-bit unsigned integer.
    fn emit_u64(&mut self, v: u64) -> Result<(), EncodeError>;

    /// Emits a 128-bit unsigned integer.
    fn emit_u128(&mut self, v: u128) -> Result<(), EncodeError>;

    /// Emits a signed byte.
    fn emit_i8(&mut self, v: i8) -> Result<(), EncodeError>;

    /// Emits a 16-bit signed integer.
    fn emit_i16(&mut self, v: i16) -> Result<(), EncodeError>;

    /// Emits a 32-bit signed integer.
    fn emit_i32(&mut self, v: i32) -> Result<(), EncodeError>;

    /// Emits a 64-bit signed integer.
    fn emit_i64(&mut self, v: i64) -> Result<(), EncodeError>;

    /// Emits a 128-bit signed integer.
    fn emit_i128(&mut self, v: i128) -> Result<(), EncodeError>;

    /// Emits a 32-bit float.
    fn emit_f32(&mut self, v: f32) -> Result<(), EncodeError>;

    /// Emits a 64-bit float.
    fn emit_f64(&mut self, v: f64) -> Result<(), EncodeError>;

    /// Emits a Unicode scalar value.
    fn emit_char(&mut self, v: char) -> Result<(), EncodeError>;

    /// Emits a length-prefixed string.
    fn emit_str(&mut self, v: &str) -> Result<(), EncodeError>;

    /// Emits a length-prefixed byte string.
    fn emit_bytes(&mut self, v: &[u8]) -> Result<(), EncodeError>;

    /// Emits a platform-sized unsigned integer.
    ///
    /// Written as a `u64` so blobs move between 32- and 64-bit targets.
    #[allow(clippy::cast_possible_truncation)]
    fn emit_usize(&mut self, v: usize) -> Result<(), EncodeError> {
        self.emit_u64(v as u64)
    }

    /// Emits a platform-sized signed integer.
    ///
    /// Written as an `i64` so blobs move between 32- and 64-bit targets.
    #[allow(clippy::cast_possible_truncation)]
    fn emit_isize(&mut self, v: isize) -> Result<(), EncodeError> {
        self.emit_i64(v as i64)
    }

    // =========================================================================
    // Containers
    // =========================================================================

    /// Emits the presence marker of an optional value. When `present` is
    /// true the caller emits the inner value next.
    fn emit_option(&mut self, present: bool) -> Result<(), EncodeError>;

    /// Emits the header of a sequence of `len` values.
    fn emit_seq(&mut self, len: usize) -> Result<(), EncodeError>;

    /// Emits the header of a map of `len` key/value pairs.
    fn emit_map(&mut self, len: usize) -> Result<(), EncodeError>;

    /// Opens a tuple of `arity` values.
    fn begin_tuple(&mut self, arity: usize) -> Result<(), EncodeError>;

    /// Opens a struct with `fields` named fields. Each field is written as
    /// [`emit_field`](Self::emit_field) followed by its value.
    fn begin_struct(
        &mut self,
        name: &'static str,
        fields: usize,
    ) -> Result<(), EncodeError>;

    /// Emits the name of the next struct field.
    fn emit_field(&mut self, name: &'static str) -> Result<(), EncodeError>;

    /// Opens an enum variant. The variant's payload follows.
    fn begin_variant(
        &mut self,
        enum_name: &'static str,
        index: u32,
        variant: &'static str,
    ) -> Result<(), EncodeError>;

    /// Closes the innermost tuple, struct or variant.
    fn end_aggregate(&mut self) {}
}

/// A trait for types that can be serialized.
///
/// Only [`encode`](Self::encode) is required. The other methods steer the
/// top-level dispatch in [`encode`](crate::encode) and let element types
/// choose a compact representation for slices of themselves, the same way
/// [`Hash::hash_slice`] does for hashing.
///
/// Most types derive this trait:
///
/// ```
/// use bytestream::{Decode, Encode};
///
/// #[derive(Debug, PartialEq, Encode, Decode)]
/// struct Point {
///     x: i32,
///     y: i32,
/// }
///
/// let blob = bytestream::encode(&Point { x: 1, y: -1 }).unwrap();
/// let point: Point = bytestream::decode_owned(&blob).unwrap();
/// assert_eq!(point, Point { x: 1, y: -1 });
/// ```
pub trait Encode {
    /// Writes this value to the encoder.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be represented or the sink fails.
    fn encode<E: Encoder + ?Sized>(
        &self,
        encoder: &mut E,
    ) -> Result<(), EncodeError>;

    /// Classifies the value for the top-level raw passthrough.
    fn form(&self) -> Form<'_> { Form::Structured }

    /// Whether the value is absent, i.e. a `None` with nothing to encode.
    ///
    /// Only consulted at the top level; absent values nested inside a
    /// structured value are ordinary data.
    fn is_absent(&self) -> bool { false }

    /// Writes a slice of this type as a sequence.
    ///
    /// # Errors
    ///
    /// Returns an error if any element fails to encode.
    fn encode_slice<E: Encoder + ?Sized>(
        slice: &[Self],
        encoder: &mut E,
    ) -> Result<(), EncodeError>
    where
        Self: Sized,
    {
        encoder.emit_seq(slice.len())?;
        for item in slice {
            item.encode(encoder)?;
        }
        Ok(())
    }

    /// Classifies a slice of this type for the top-level raw passthrough.
    fn slice_form(slice: &[Self]) -> Form<'_>
    where
        Self: Sized,
    {
        let _ = slice;
        Form::Structured
    }
}

/// Runs `body` inside an aggregate the caller has just opened, then closes
/// it with [`Encoder::end_aggregate`] whether or not `body` succeeded.
///
/// Derived impls write every tuple, struct and variant payload through this,
/// so an encoder stays usable after a nested value fails.
///
/// # Errors
///
/// Returns whatever `body` returns.
pub fn in_aggregate<E: Encoder + ?Sized>(
    encoder: &mut E,
    body: impl FnOnce(&mut E) -> Result<(), EncodeError>,
) -> Result<(), EncodeError> {
    let result = body(encoder);
    encoder.end_aggregate();
    result
}

// =============================================================================
// Primitive types
// =============================================================================

macro_rules! impl_encode_scalar {
    ($($ty:ty => $emit:ident),+ $(,)?) => {
        $(
            impl Encode for $ty {
                fn encode<E: Encoder + ?Sized>(
                    &self,
                    encoder: &mut E,
                ) -> Result<(), EncodeError> {
                    encoder.$emit(*self)
                }
            }
        )+
    };
}

impl_encode_scalar!(
    u16 => emit_u16,
    u32 => emit_u32,
    u64 => emit_u64,
    u128 => emit_u128,
    usize => emit_usize,
    i8 => emit_i8,
    i16 => emit_i16,
    i32 => emit_i32,
    i64 => emit_i64,
    i128 => emit_i128,
    isize => emit_isize,
    bool => emit_bool,
    char => emit_char,
    f32 => emit_f32,
    f64 => emit_f64,
);

impl Encode for u8 {
    fn encode<E: Encoder + ?Sized>(
        &self,
        encoder: &mut E,
    ) -> Result<(), EncodeError> {
        encoder.emit_u8(*self)
    }

    fn encode_slice<E: Encoder + ?Sized>(
        slice: &[Self],
        encoder: &mut E,
    ) -> Result<(), EncodeError> {
        encoder.emit_bytes(slice)
    }

    fn slice_form(slice: &[Self]) -> Form<'_> { Form::Bytes(slice) }
}

impl Encode for str {
    fn encode<E: Encoder + ?Sized>(
        &self,
        encoder: &mut E,
    ) -> Result<(), EncodeError> {
        encoder.emit_str(self)
    }

    fn form(&self) -> Form<'_> { Form::Text(self) }
}

impl Encode for String {
    fn encode<E: Encoder + ?Sized>(
        &self,
        encoder: &mut E,
    ) -> Result<(), EncodeError> {
        encoder.emit_str(self)
    }

    fn form(&self) -> Form<'_> { Form::Text(self) }
}

// =============================================================================
// References and smart pointers
// =============================================================================

macro_rules! impl_encode_deref {
    ($($ptr:ty),+ $(,)?) => {
        $(
            impl<T: Encode + ?Sized> Encode for $ptr {
                fn encode<E: Encoder + ?Sized>(
                    &self,
                    encoder: &mut E,
                ) -> Result<(), EncodeError> {
                    (**self).encode(encoder)
                }

                fn form(&self) -> Form<'_> { (**self).form() }

                fn is_absent(&self) -> bool { (**self).is_absent() }
            }
        )+
    };
}

impl_encode_deref!(&T, &mut T, Box<T>, Rc<T>, Arc<T>);

impl<T: Encode + ToOwned + ?Sized> Encode for Cow<'_, T> {
    fn encode<E: Encoder + ?Sized>(
        &self,
        encoder: &mut E,
    ) -> Result<(), EncodeError> {
        (**self).encode(encoder)
    }

    fn form(&self) -> Form<'_> { (**self).form() }

    fn is_absent(&self) -> bool { (**self).is_absent() }
}

impl<T: Encode + Copy> Encode for Cell<T> {
    fn encode<E: Encoder + ?Sized>(
        &self,
        encoder: &mut E,
    ) -> Result<(), EncodeError> {
        self.get().encode(encoder)
    }
}

impl<T: Encode + ?Sized> Encode for RefCell<T> {
    fn encode<E: Encoder + ?Sized>(
        &self,
        encoder: &mut E,
    ) -> Result<(), EncodeError> {
        self.try_borrow()
            .map_err(|_| Unsupported::AlreadyBorrowed)?
            .encode(encoder)
    }
}

// =============================================================================
// Option and Result
// =============================================================================

impl<T: Encode> Encode for Option<T> {
    fn encode<E: Encoder + ?Sized>(
        &self,
        encoder: &mut E,
    ) -> Result<(), EncodeError> {
        match self {
            Some(v) => {
                encoder.emit_option(true)?;
                v.encode(encoder)
            }
            None => encoder.emit_option(false),
        }
    }

    fn is_absent(&self) -> bool { self.is_none() }
}

impl<T: Encode, U: Encode> Encode for Result<T, U> {
    fn encode<E: Encoder + ?Sized>(
        &self,
        encoder: &mut E,
    ) -> Result<(), EncodeError> {
        match self {
            Ok(v) => {
                encoder.begin_variant("Result", 0, "Ok")?;
                in_aggregate(encoder, |encoder| v.encode(encoder))
            }
            Err(e) => {
                encoder.begin_variant("Result", 1, "Err")?;
                in_aggregate(encoder, |encoder| e.encode(encoder))
            }
        }
    }
}

// =============================================================================
// Sequences
// =============================================================================

impl<T: Encode> Encode for [T] {
    fn encode<E: Encoder + ?Sized>(
        &self,
        encoder: &mut E,
    ) -> Result<(), EncodeError> {
        T::encode_slice(self, encoder)
    }

    fn form(&self) -> Form<'_> { T::slice_form(self) }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode<E: Encoder + ?Sized>(
        &self,
        encoder: &mut E,
    ) -> Result<(), EncodeError> {
        T::encode_slice(self, encoder)
    }

    fn form(&self) -> Form<'_> { T::slice_form(self) }
}

impl<T: Encode> Encode for VecDeque<T> {
    fn encode<E: Encoder + ?Sized>(
        &self,
        encoder: &mut E,
    ) -> Result<(), EncodeError> {
        encoder.emit_seq(self.len())?;
        for item in self {
            item.encode(encoder)?;
        }
        Ok(())
    }
}

impl<T: Encode, const N: usize> Encode for [T; N] {
    fn encode<E: Encoder + ?Sized>(
        &self,
        encoder: &mut E,
    ) -> Result<(), EncodeError> {
        encoder.begin_tuple(N)?;
        in_aggregate(encoder, |encoder| {
            self.iter().try_for_each(|item| item.encode(encoder))
        })
    }
}

// =============================================================================
// Maps and sets
// =============================================================================
//
// Hash-based collections iterate in an order that differs between instances,
// so their entries are sorted by key to keep the output deterministic.

fn encode_sorted_map<'a, K, V, E>(
    mut entries: Vec<(&'a K, &'a V)>,
    encoder: &mut E,
) -> Result<(), EncodeError>
where
    K: Encode + Ord + 'a,
    V: Encode + 'a,
    E: Encoder + ?Sized,
{
    entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
    encoder.emit_map(entries.len())?;
    for (key, value) in entries {
        key.encode(encoder)?;
        value.encode(encoder)?;
    }
    Ok(())
}

fn encode_sorted_set<'a, T, E>(
    mut items: Vec<&'a T>,
    encoder: &mut E,
) -> Result<(), EncodeError>
where
    T: Encode + Ord + 'a,
    E: Encoder + ?Sized,
{
    items.sort_unstable();
    encoder.emit_seq(items.len())?;
    for item in items {
        item.encode(encoder)?;
    }
    Ok(())
}

impl<K: Encode + Ord, V: Encode, S: BuildHasher> Encode for HashMap<K, V, S> {
    fn encode<E: Encoder + ?Sized>(
        &self,
        encoder: &mut E,
    ) -> Result<(), EncodeError> {
        encode_sorted_map(self.iter().collect(), encoder)
    }
}

impl<T: Encode + Ord, S: BuildHasher> Encode for HashSet<T, S> {
    fn encode<E: Encoder + ?Sized>(
        &self,
        encoder: &mut E,
    ) -> Result<(), EncodeError> {
        encode_sorted_set(self.iter().collect(), encoder)
    }
}

impl<K: Encode, V: Encode> Encode for BTreeMap<K, V> {
    fn encode<E: Encoder + ?Sized>(
        &self,
        encoder: &mut E,
    ) -> Result<(), EncodeError> {
        encoder.emit_map(self.len())?;
        for (key, value) in self {
            key.encode(encoder)?;
            value.encode(encoder)?;
        }
        Ok(())
    }
}

impl<T: Encode> Encode for BTreeSet<T> {
    fn encode<E: Encoder + ?Sized>(
        &self,
        encoder: &mut E,
    ) -> Result<(), EncodeError> {
        encoder.emit_seq(self.len())?;
        for item in self {
            item.encode(encoder)?;
        }
        Ok(())
    }
}

impl<K, V, S> Encode for DashMap<K, V, S>
where
    K: Encode + Ord + Hash,
    V: Encode,
    S: BuildHasher + Clone,
{
    fn encode<E: Encoder + ?Sized>(
        &self,
        encoder: &mut E,
    ) -> Result<(), EncodeError> {
        // the guards keep their shards read-locked until the walk finishes
        let guards: Vec<_> = self.iter().collect();
        encode_sorted_map(guards.iter().map(|g| g.pair()).collect(), encoder)
    }
}

impl<T, S> Encode for DashSet<T, S>
where
    T: Encode + Ord + Hash,
    S: BuildHasher + Clone,
{
    fn encode<E: Encoder + ?Sized>(
        &self,
        encoder: &mut E,
    ) -> Result<(), EncodeError> {
        let guards: Vec<_> = self.iter().collect();
        encode_sorted_set(guards.iter().map(|g| g.key()).collect(), encoder)
    }
}

// =============================================================================
// Tuples
// =============================================================================

impl Encode for () {
    fn encode<E: Encoder + ?Sized>(
        &self,
        encoder: &mut E,
    ) -> Result<(), EncodeError> {
        encoder.emit_unit()
    }
}

macro_rules! impl_encode_tuple {
    ($arity:literal => $($name:ident),+) => {
        impl<$($name: Encode),+> Encode for ($($name,)+) {
            #[allow(non_snake_case)]
            fn encode<E: Encoder + ?Sized>(
                &self,
                encoder: &mut E,
            ) -> Result<(), EncodeError> {
                let ($($name,)+) = self;
                encoder.begin_tuple($arity)?;
                in_aggregate(encoder, |encoder| {
                    $(
                        $name.encode(encoder)?;
                    )+
                    Ok(())
                })
            }
        }
    };
}

impl_encode_tuple!(1 => A);
impl_encode_tuple!(2 => A, B);
impl_encode_tuple!(3 => A, B, C);
impl_encode_tuple!(4 => A, B, C, D);
impl_encode_tuple!(5 => A, B, C, D, E_);
impl_encode_tuple!(6 => A, B, C, D, E_, F);
impl_encode_tuple!(7 => A, B, C, D, E_, F, G);
impl_encode_tuple!(8 => A, B, C, D, E_, F, G, H);
impl_encode_tuple!(9 => A, B, C, D, E_, F, G, H, I);
impl_encode_tuple!(10 => A, B, C, D, E_, F, G, H, I, J);
impl_encode_tuple!(11 => A, B, C, D, E_, F, G, H, I, J, K);
impl_encode_tuple!(12 => A, B, C, D, E_, F, G, H, I, J, K, L);

// =============================================================================
// Other standard library types
// =============================================================================

impl<T: ?Sized> Encode for PhantomData<T> {
    fn encode<E: Encoder + ?Sized>(
        &self,
        encoder: &mut E,
    ) -> Result<(), EncodeError> {
        encoder.emit_unit()
    }
}

impl Encode for Duration {
    fn encode<E: Encoder + ?Sized>(
        &self,
        encoder: &mut E,
    ) -> Result<(), EncodeError> {
        encoder.begin_struct("Duration", 2)?;
        in_aggregate(encoder, |encoder| {
            encoder.emit_field("secs")?;
            encoder.emit_u64(self.as_secs())?;
            encoder.emit_field("nanos")?;
            encoder.emit_u32(self.subsec_nanos())
        })
    }
}

macro_rules! impl_encode_nonzero {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Encode for $ty {
                fn encode<E: Encoder + ?Sized>(
                    &self,
                    encoder: &mut E,
                ) -> Result<(), EncodeError> {
                    self.get().encode(encoder)
                }
            }
        )+
    };
}

impl_encode_nonzero!(
    std::num::NonZeroU8,
    std::num::NonZeroU16,
    std::num::NonZeroU32,
    std::num::NonZeroU64,
    std::num::NonZeroU128,
    std::num::NonZeroUsize,
    std::num::NonZeroI8,
    std::num::NonZeroI16,
    std::num::NonZeroI32,
    std::num::NonZeroI64,
    std::num::NonZeroI128,
    std::num::NonZeroIsize,
);
