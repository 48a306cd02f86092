use super::*;
use crate::{
    Config, Decode, Decoder, DefaultConfig, Encode, EncodeError, Unsupported,
};

fn encode<T: Encode + ?Sized>(value: &T) -> Vec<u8> {
    let mut encoder = TaggedEncoder::new(Vec::new());
    value.encode(&mut encoder).unwrap();
    encoder.into_inner()
}

fn decode<T: Decode>(bytes: &[u8]) -> Result<T, DecodeError> {
    let mut decoder = TaggedDecoder::new(bytes);
    let value = T::decode(&mut decoder)?;
    decoder.finish()?;
    Ok(value)
}

fn malformed<T: Decode + std::fmt::Debug>(bytes: &[u8]) -> Malformed {
    match decode::<T>(bytes) {
        Err(DecodeError::Malformed(err)) => err,
        other => panic!("expected malformed input, got {other:?}"),
    }
}

struct Shallow;

impl Config for Shallow {
    fn max_depth() -> usize { 2 }
}

fn varint(value: u128) -> Vec<u8> {
    let mut buf = [0u8; MAX_VARINT_BYTES];
    let len = encode_varint(value, &mut buf);
    buf[..len].to_vec()
}

#[test]
fn tag_from_byte() {
    for tag in Tag::ALL {
        assert_eq!(Tag::from_byte(tag as u8), Some(tag));
    }
    assert_eq!(Tag::from_byte(0x18), None);
    assert_eq!(Tag::from_byte(0xFF), None);
}

#[test]
fn varint_u32_roundtrip() {
    let test_values: &[u32] =
        &[0, 1, 127, 128, 255, 256, 16383, 16384, u32::MAX / 2, u32::MAX];

    for &value in test_values {
        let bytes = encode(&value);
        let decoded: u32 = decode(&bytes).unwrap();
        assert_eq!(value, decoded, "roundtrip failed for {value}");
    }
}

#[test]
fn varint_wide_roundtrip() {
    for value in [0u128, 1, u128::from(u64::MAX), u128::MAX] {
        let bytes = encode(&value);
        assert_eq!(decode::<u128>(&bytes).unwrap(), value);
    }

    for value in [i128::MIN, -1, 0, 1, i128::MAX] {
        let bytes = encode(&value);
        assert_eq!(decode::<i128>(&bytes).unwrap(), value);
    }
}

#[test]
fn zigzag_i32_roundtrip() {
    let test_values: &[i32] =
        &[0, 1, -1, 63, -64, 64, -65, 127, -128, i32::MAX, i32::MIN];

    for &value in test_values {
        let bytes = encode(&value);
        let decoded: i32 = decode(&bytes).unwrap();
        assert_eq!(value, decoded, "roundtrip failed for {value}");
    }
}

#[test]
fn zigzag_mapping() {
    assert_eq!(zigzag_encode(0), 0);
    assert_eq!(zigzag_encode(-1), 1);
    assert_eq!(zigzag_encode(1), 2);
    assert_eq!(zigzag_encode(-64), 127);
    assert_eq!(zigzag_encode(i128::MIN), u128::MAX);

    for value in [0, -1, 1, -64, 64, i128::MIN, i128::MAX] {
        assert_eq!(zigzag_decode(zigzag_encode(value)), value);
    }
}

#[test]
fn varint_compactness() {
    // tag byte plus the varint
    assert_eq!(encode(&0u32), [0x04, 0x00]);
    assert_eq!(encode(&127u32), [0x04, 0x7F]);
    assert_eq!(encode(&128u32), [0x04, 0x80, 0x01]);
    assert_eq!(encode(&-1i64), [0x0A, 0x01]);

    assert_eq!(varint(u128::MAX).len(), MAX_VARINT_BYTES);
}

#[test]
fn string_roundtrip() {
    let value = "Hello, World!".to_string();

    let bytes = encode(&value);
    assert_eq!(bytes[..2], [0x0F, 13]);
    let decoded: String = decode(&bytes).unwrap();
    assert_eq!(value, decoded);
}

#[test]
fn byte_vec_is_length_prefixed() {
    let bytes = encode(&vec![1u8, 2, 3]);
    assert_eq!(bytes, [0x10, 0x03, 1, 2, 3]);
    assert_eq!(decode::<Vec<u8>>(&bytes).unwrap(), [1, 2, 3]);

    // any other element type is a sequence
    let bytes = encode(&vec![1u16, 2]);
    assert_eq!(bytes, [0x13, 0x02, 0x03, 0x01, 0x03, 0x02]);
}

#[test]
#[allow(clippy::float_cmp)]
fn float_roundtrip() {
    let f32_value: f32 = std::f32::consts::PI;
    let bytes = encode(&f32_value);
    assert_eq!(bytes.len(), 5); // tag + 4 bytes
    let decoded: f32 = decode(&bytes).unwrap();
    assert_eq!(f32_value, decoded);

    let f64_value: f64 = std::f64::consts::PI;
    let bytes = encode(&f64_value);
    assert_eq!(bytes.len(), 9); // tag + 8 bytes
    let decoded: f64 = decode(&bytes).unwrap();
    assert_eq!(f64_value, decoded);

    let nan: f64 = decode(&encode(&f64::NAN)).unwrap();
    assert!(nan.is_nan());
}

#[test]
fn option_tags() {
    assert_eq!(encode(&Some(5u32)), [0x12, 0x04, 0x05]);
    assert_eq!(encode(&None::<u32>), [0x11]);
    assert_eq!(decode::<Option<u32>>(&[0x11]).unwrap(), None);
    assert_eq!(decode::<Option<Option<u32>>>(&[0x12, 0x11]).unwrap(), Some(None));
}

#[test]
fn char_and_bool_roundtrip() {
    for value in ['a', 'é', '\u{1F600}', char::MAX] {
        assert_eq!(decode::<char>(&encode(&value)).unwrap(), value);
    }
    assert_eq!(encode(&true), [0x01, 0x01]);
    assert!(!decode::<bool>(&[0x01, 0x00]).unwrap());
}

// =============================================================================
// Malformed input
// =============================================================================

#[test]
fn tag_mismatch() {
    let bytes = encode(&7u32);
    assert_eq!(
        malformed::<i32>(&bytes),
        Malformed::TagMismatch { expected: Tag::I32, found: Tag::U32 }
    );
    assert_eq!(
        malformed::<Option<u32>>(&bytes),
        Malformed::TagMismatch { expected: Tag::Some, found: Tag::U32 }
    );
}

#[test]
fn truncated_input() {
    assert_eq!(malformed::<u32>(&[0x04]), Malformed::Truncated);
    assert_eq!(malformed::<u32>(&[0x04, 0x80]), Malformed::Truncated);
    assert_eq!(malformed::<f64>(&[0x0D, 0, 0, 0]), Malformed::Truncated);
    // length prefix claims more than is present
    assert_eq!(malformed::<String>(&[0x0F, 0x05, b'a']), Malformed::Truncated);
}

#[test]
fn huge_length_prefix_does_not_preallocate() {
    let mut bytes = vec![0x10];
    bytes.extend(varint(u128::from(u64::MAX >> 1)));
    assert_eq!(malformed::<Vec<u8>>(&bytes), Malformed::Truncated);

    let mut bytes = vec![0x13];
    bytes.extend(varint(u128::from(u32::MAX)));
    assert_eq!(malformed::<Vec<u64>>(&bytes), Malformed::Truncated);
}

#[test]
fn unknown_tag() {
    assert_eq!(malformed::<u32>(&[0xFF]), Malformed::UnknownTag(0xFF));
}

#[test]
fn invalid_bool() {
    assert_eq!(malformed::<bool>(&[0x01, 0x02]), Malformed::InvalidBool(2));
}

#[test]
fn invalid_char() {
    let mut bytes = vec![0x0E];
    bytes.extend(varint(0xD800));
    assert_eq!(malformed::<char>(&bytes), Malformed::InvalidChar(0xD800));
}

#[test]
fn varint_overflow() {
    // 70000 does not fit in a u16
    let mut bytes = vec![0x03];
    bytes.extend(varint(70_000));
    assert_eq!(malformed::<u16>(&bytes), Malformed::VarintOverflow);

    // too many continuation bytes for a u32
    assert_eq!(
        malformed::<u32>(&[0x04, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]),
        Malformed::VarintOverflow
    );

    // the final chunk of a u128 may only carry two bits
    let mut bytes = vec![0x06];
    bytes.extend([0xFF; 18]);
    bytes.push(0x04);
    assert_eq!(malformed::<u128>(&bytes), Malformed::VarintOverflow);
}

#[test]
fn invalid_utf8() {
    assert_eq!(
        malformed::<String>(&[0x0F, 0x02, 0xC3, 0x28]),
        Malformed::InvalidUtf8
    );
}

#[test]
fn field_name_is_reported_lossily() {
    // 64 ASCII bytes then a two-byte character; only 65 bytes of a name
    // expected to be "x" are read, splitting the character
    let mut bytes = vec![0x16, 0x03, 66];
    bytes.extend([b'a'; 64]);
    bytes.extend("é".as_bytes());

    assert_eq!(
        malformed::<NamedStruct>(&bytes),
        Malformed::FieldName {
            expected: "x",
            found: format!("{}\u{FFFD}", "a".repeat(64)),
        }
    );

    // a name of the right length that is not UTF-8
    assert_eq!(
        malformed::<NamedStruct>(&[0x16, 0x03, 0x01, 0xFF]),
        Malformed::FieldName { expected: "x", found: "\u{FFFD}".to_string() }
    );
}

#[test]
fn array_arity() {
    let bytes = encode(&[1u32, 2, 3]);
    assert_eq!(decode::<[u32; 3]>(&bytes).unwrap(), [1, 2, 3]);
    assert_eq!(
        malformed::<[u32; 2]>(&bytes),
        Malformed::Arity { expected: 2, found: 3 }
    );
}

#[test]
fn trailing_bytes() {
    let mut bytes = encode(&1u32);
    bytes.extend([0, 0]);
    assert_eq!(malformed::<u32>(&bytes), Malformed::TrailingBytes(2));
}

#[test]
fn duration_roundtrip() {
    let value = std::time::Duration::new(5, 250);
    assert_eq!(decode::<std::time::Duration>(&encode(&value)).unwrap(), value);

    let mut bytes = vec![0x16, 0x02, 0x04];
    bytes.extend(b"secs");
    bytes.extend([0x05, 0x00, 0x05]);
    bytes.extend(b"nanos");
    bytes.push(0x04);
    bytes.extend(varint(1_000_000_000));
    assert!(matches!(
        malformed::<std::time::Duration>(&bytes),
        Malformed::InvalidValue(_)
    ));
}

#[test]
fn nonzero_rejects_zero() {
    assert!(matches!(
        malformed::<std::num::NonZeroU32>(&encode(&0u32)),
        Malformed::InvalidValue(_)
    ));
}

// =============================================================================
// Derive macro tests
// =============================================================================

// Unit struct
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
struct UnitStruct;

// Tuple struct
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
struct TupleStruct(u64, String);

// Named fields struct
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
struct NamedStruct {
    x: i32,
    y: i32,
    name: String,
}

// Same shape as `NamedStruct` minus a field
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
struct PointStruct {
    x: i32,
    y: i32,
}

// One field renamed
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
struct RenamedStruct {
    x: i32,
    z: i32,
    name: String,
}

// Struct with skip
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
struct StructWithSkip {
    value: u32,
    #[bytestream(skip)]
    skipped: Vec<u8>,
}

// Generic struct
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
struct GenericStruct<T> {
    inner: T,
}

// Raw identifiers keep their plain name on the wire
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
struct RawIdent {
    r#type: u8,
}

// Enum with all variant types
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
enum TestEnum {
    Unit,
    Tuple(u32, String),
    Named { a: i32, b: bool },
}

// Enum with skip on field
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
enum EnumWithSkip {
    Variant {
        value: u32,
        #[bytestream(skip)]
        skipped: String,
    },
}

// Generic enum
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
enum GenericEnum<T> {
    None,
    Some(T),
}

#[test]
fn derive_unit_struct_roundtrip() {
    let value = UnitStruct;

    let bytes = encode(&value);
    assert_eq!(bytes, [0x00]);
    let decoded: UnitStruct = decode(&bytes).unwrap();
    assert_eq!(value, decoded);
}

#[test]
fn derive_tuple_struct_roundtrip() {
    let value = TupleStruct(42, "hello".to_string());

    let bytes = encode(&value);
    assert_eq!(bytes[..4], [0x15, 0x02, 0x05, 42]);
    let decoded: TupleStruct = decode(&bytes).unwrap();
    assert_eq!(value, decoded);
}

#[test]
fn derive_named_struct_roundtrip() {
    let value = NamedStruct { x: -10, y: 20, name: "test".to_string() };

    let bytes = encode(&value);
    assert_eq!(bytes[..5], [0x16, 0x03, 0x01, b'x', 0x09]);
    let decoded: NamedStruct = decode(&bytes).unwrap();
    assert_eq!(value, decoded);
}

#[test]
fn derive_field_count_mismatch() {
    let bytes = encode(&NamedStruct { x: 1, y: 2, name: String::new() });

    assert_eq!(
        malformed::<PointStruct>(&bytes),
        Malformed::FieldCount { type_name: "PointStruct", expected: 2, found: 3 }
    );
}

#[test]
fn derive_field_name_mismatch() {
    let bytes = encode(&NamedStruct { x: 1, y: 2, name: String::new() });

    assert_eq!(
        malformed::<RenamedStruct>(&bytes),
        Malformed::FieldName { expected: "z", found: "y".to_string() }
    );
}

#[test]
fn derive_struct_with_skip() {
    let value = StructWithSkip { value: 123, skipped: vec![1, 2, 3] };

    let bytes = encode(&value);
    assert_eq!(bytes[..2], [0x16, 0x01]); // only one field counted
    let decoded: StructWithSkip = decode(&bytes).unwrap();

    assert_eq!(decoded.value, 123);
    assert!(decoded.skipped.is_empty()); // Should be Default::default()
}

#[test]
fn derive_generic_struct_roundtrip() {
    let value = GenericStruct { inner: "generic".to_string() };

    let bytes = encode(&value);
    let decoded: GenericStruct<String> = decode(&bytes).unwrap();
    assert_eq!(value, decoded);
}

#[test]
fn derive_raw_identifier() {
    let bytes = encode(&RawIdent { r#type: 7 });
    assert_eq!(bytes, [0x16, 0x01, 0x04, b't', b'y', b'p', b'e', 0x02, 7]);
    assert_eq!(decode::<RawIdent>(&bytes).unwrap(), RawIdent { r#type: 7 });
}

#[test]
fn derive_enum_unit_variant() {
    let value = TestEnum::Unit;

    let bytes = encode(&value);
    assert_eq!(bytes, [0x17, 0x00, 0x00]);
    let decoded: TestEnum = decode(&bytes).unwrap();
    assert_eq!(value, decoded);
}

#[test]
fn derive_enum_tuple_variant() {
    let value = TestEnum::Tuple(42, "world".to_string());

    let bytes = encode(&value);
    let decoded: TestEnum = decode(&bytes).unwrap();
    assert_eq!(value, decoded);
}

#[test]
fn derive_enum_named_variant() {
    let value = TestEnum::Named { a: -5, b: true };

    let bytes = encode(&value);
    let decoded: TestEnum = decode(&bytes).unwrap();
    assert_eq!(value, decoded);
}

#[test]
fn derive_enum_with_skip() {
    let value = EnumWithSkip::Variant {
        value: 999,
        skipped: "should be skipped".to_string(),
    };

    let bytes = encode(&value);
    let decoded: EnumWithSkip = decode(&bytes).unwrap();

    match decoded {
        EnumWithSkip::Variant { value, skipped } => {
            assert_eq!(value, 999);
            assert!(skipped.is_empty()); // Should be Default::default()
        }
    }
}

#[test]
fn derive_generic_enum_roundtrip() {
    let none_value: GenericEnum<i32> = GenericEnum::None;
    let bytes = encode(&none_value);
    let decoded: GenericEnum<i32> = decode(&bytes).unwrap();
    assert_eq!(none_value, decoded);

    let some_value = GenericEnum::Some(42);
    let bytes = encode(&some_value);
    let decoded: GenericEnum<i32> = decode(&bytes).unwrap();
    assert_eq!(some_value, decoded);
}

#[test]
fn derive_invalid_variant_index() {
    // variant index 99 doesn't exist
    let invalid_bytes = [0x17, 99, 0x00];

    let err = malformed::<TestEnum>(&invalid_bytes);
    assert_eq!(
        err,
        Malformed::UnknownVariant { enum_name: "TestEnum", index: 99 }
    );
    assert!(err.to_string().contains("invalid variant index"));
}

#[test]
fn result_roundtrip() {
    let ok: Result<u32, String> = Ok(3);
    let err: Result<u32, String> = Err("no".to_string());

    assert_eq!(encode(&ok), [0x17, 0x00, 0x04, 0x03]);
    assert_eq!(decode::<Result<u32, String>>(&encode(&ok)).unwrap(), ok);
    assert_eq!(decode::<Result<u32, String>>(&encode(&err)).unwrap(), err);
}

// =============================================================================
// Reuse after failure
// =============================================================================

#[test]
fn encoder_is_reusable_after_nested_failure() {
    let mut encoder = TaggedEncoder::<_, Shallow>::with_config(Vec::<u8>::new());

    assert!(matches!(
        (((1u8,),),).encode(&mut encoder),
        Err(EncodeError::Unsupported(Unsupported::DepthExceeded { limit: 2 }))
    ));
    assert_eq!(format!("{encoder:?}"), "TaggedEncoder { depth: 0 }");

    let start = encoder.get_ref().len();
    ((1u8,),).encode(&mut encoder).unwrap();
    assert_eq!(
        encoder.get_ref()[start..],
        [0x15, 0x01, 0x15, 0x01, 0x02, 0x01]
    );
    assert_eq!(format!("{encoder:?}"), "TaggedEncoder { depth: 0 }");
}

#[test]
fn encoder_is_reusable_after_derived_failure() {
    let mut encoder = TaggedEncoder::<_, Shallow>::with_config(Vec::<u8>::new());

    // struct, variant, then the variant's tuple payload
    let deep = GenericStruct { inner: GenericEnum::Some(1u8) };
    assert!(matches!(
        deep.encode(&mut encoder),
        Err(EncodeError::Unsupported(Unsupported::DepthExceeded { limit: 2 }))
    ));
    assert_eq!(format!("{encoder:?}"), "TaggedEncoder { depth: 0 }");

    let start = encoder.get_ref().len();
    GenericEnum::Some(1u8).encode(&mut encoder).unwrap();
    assert_eq!(
        encoder.get_ref()[start..],
        [0x17, 0x01, 0x15, 0x01, 0x02, 0x01]
    );
    assert_eq!(format!("{encoder:?}"), "TaggedEncoder { depth: 0 }");
}

#[test]
fn decoder_is_reusable_after_nested_failure() {
    let bytes = encode(&(((1u8,),),));
    let mut decoder = TaggedDecoder::<_, Shallow>::with_config(&bytes[..]);

    assert!(matches!(
        <(((u8,),),)>::decode(&mut decoder),
        Err(DecodeError::Malformed(Malformed::DepthExceeded { limit: 2 }))
    ));
    assert_eq!(format!("{decoder:?}"), "TaggedDecoder { depth: 0 }");

    // the innermost tuple header was consumed; its element remains
    assert_eq!(u8::decode(&mut decoder).unwrap(), 1);
    decoder.finish().unwrap();
}

#[test]
fn decoder_is_reusable_after_derived_failure() {
    let mut bytes = vec![0x17, 99, 0x00];
    bytes.extend(encode(&TestEnum::Named { a: 1, b: false }));
    let mut decoder = TaggedDecoder::new(&bytes[..]);

    assert!(matches!(
        TestEnum::decode(&mut decoder),
        Err(DecodeError::Malformed(Malformed::UnknownVariant { index: 99, .. }))
    ));
    assert_eq!(format!("{decoder:?}"), "TaggedDecoder { depth: 0 }");

    // the unit payload of the unknown variant is still pending
    <()>::decode(&mut decoder).unwrap();
    assert_eq!(
        TestEnum::decode(&mut decoder).unwrap(),
        TestEnum::Named { a: 1, b: false }
    );
    assert_eq!(format!("{decoder:?}"), "TaggedDecoder { depth: 0 }");

    let bytes = encode(&NamedStruct { x: 1, y: 2, name: String::new() });
    let mut decoder = TaggedDecoder::new(&bytes[..]);
    assert!(RenamedStruct::decode(&mut decoder).is_err());
    assert_eq!(format!("{decoder:?}"), "TaggedDecoder { depth: 0 }");
}

// =============================================================================
// Decoder defaults
// =============================================================================

/// Forwards to a tagged decoder but keeps the trait's capacity hint.
struct Forwarding<'a>(TaggedDecoder<&'a [u8]>);

macro_rules! forward {
    ($($name:ident -> $ty:ty),* $(,)?) => {
        $(fn $name(&mut self) -> Result<$ty, DecodeError> { self.0.$name() })*
    };
}

impl Decoder for Forwarding<'_> {
    forward! {
        read_unit -> (),
        read_bool -> bool,
        read_u8 -> u8,
        read_u16 -> u16,
        read_u32 -> u32,
        read_u64 -> u64,
        read_u128 -> u128,
        read_i8 -> i8,
        read_i16 -> i16,
        read_i32 -> i32,
        read_i64 -> i64,
        read_i128 -> i128,
        read_f32 -> f32,
        read_f64 -> f64,
        read_char -> char,
        read_str -> String,
        read_bytes -> Vec<u8>,
        read_option -> bool,
        read_seq -> usize,
        read_map -> usize,
    }

    fn begin_tuple(&mut self, arity: usize) -> Result<(), DecodeError> {
        self.0.begin_tuple(arity)
    }

    fn begin_struct(
        &mut self,
        name: &'static str,
        fields: usize,
    ) -> Result<(), DecodeError> {
        self.0.begin_struct(name, fields)
    }

    fn expect_field(&mut self, name: &'static str) -> Result<(), DecodeError> {
        self.0.expect_field(name)
    }

    fn read_variant(
        &mut self,
        enum_name: &'static str,
    ) -> Result<u32, DecodeError> {
        self.0.read_variant(enum_name)
    }

    fn end_aggregate(&mut self) { self.0.end_aggregate(); }
}

#[test]
fn default_capacity_hint_follows_default_config() {
    let limit = DefaultConfig::max_preallocation();
    let bytes = encode(&vec![1u64, 2, 3]);
    let mut decoder = Forwarding(TaggedDecoder::new(&bytes[..]));

    assert_eq!(decoder.capacity_hint(3), 3);
    assert_eq!(decoder.capacity_hint(usize::MAX), limit);
    assert_eq!(
        decoder.capacity_hint(limit + 1),
        decoder.0.capacity_hint(limit + 1)
    );
    assert_eq!(Vec::<u64>::decode(&mut decoder).unwrap(), [1, 2, 3]);
}
