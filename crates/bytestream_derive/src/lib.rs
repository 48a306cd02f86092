//! Derive macros for the `Encode` and `Decode` traits.
//!
//! This crate provides derive macros for automatically implementing the
//! `Encode` and `Decode` traits from the `bytestream` crate.
//!
//! # Supported Types
//!
//! The derive macros support:
//! - Structs with named fields, encoded as a struct whose fields carry their
//!   names on the wire
//! - Tuple structs, encoded as a tuple
//! - Unit structs, encoded as the unit value
//! - Enums with any combination of unit, tuple, and struct variants, encoded
//!   as the variant index followed by the variant's payload
//!
//! # Field Attributes
//!
//! ## `#[bytestream(skip)]`
//!
//! Skip a field during serialization and use `Default::default()` during
//! deserialization. Skipped fields do not count towards the field count.
//!
//! ```ignore
//! use bytestream::{Decode, Encode};
//!
//! #[derive(Encode, Decode)]
//! struct Config {
//!     name: String,
//!     #[bytestream(skip)]
//!     cache: Vec<u8>, // Uses Default::default() when decoding
//! }
//! ```

use proc_macro::TokenStream;
use proc_macro2::{Literal, TokenStream as TokenStream2};
use quote::{format_ident, quote};
use syn::{
    Data, DataEnum, DataStruct, DeriveInput, Field, Fields, Generics, Ident,
    Index, Member, ext::IdentExt, parse_macro_input, parse_quote,
};

/// A field of a struct or enum variant, resolved once for both derives.
struct FieldInfo<'a> {
    field: &'a Field,
    /// How the field is reached on `self`.
    member: Member,
    /// The binding used when the field is matched out of an enum variant.
    binding: Ident,
    skip: bool,
}

impl FieldInfo<'_> {
    /// The name written on the wire for a named field.
    fn wire_name(&self) -> Option<String> {
        self.field.ident.as_ref().map(|ident| ident.unraw().to_string())
    }
}

/// Checks a field's `#[bytestream(...)]` attributes.
fn is_skipped(field: &Field) -> syn::Result<bool> {
    let mut skip = false;
    for attr in &field.attrs {
        if !attr.path().is_ident("bytestream") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                skip = true;
                Ok(())
            } else {
                Err(meta.error("unknown bytestream attribute"))
            }
        })?;
    }
    Ok(skip)
}

fn collect_fields(fields: &Fields) -> syn::Result<Vec<FieldInfo<'_>>> {
    fields
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let member = field.ident.clone().map_or_else(
                || Member::Unnamed(Index::from(i)),
                Member::Named,
            );
            Ok(FieldInfo {
                field,
                member,
                binding: format_ident!("__field_{}", i),
                skip: is_skipped(field)?,
            })
        })
        .collect()
}

/// Adds `T: #bound` for every type parameter.
fn bounded_generics(generics: &Generics, bound: &TokenStream2) -> Generics {
    let mut generics = generics.clone();
    let params: Vec<_> = generics.type_params().map(|p| p.ident.clone()).collect();
    let where_clause = generics.make_where_clause();
    for ident in params {
        where_clause.predicates.push(parse_quote!(#ident: #bound));
    }
    generics
}

fn variant_index(idx: usize, variant: &syn::Variant) -> syn::Result<Literal> {
    u32::try_from(idx).map(Literal::u32_suffixed).map_err(|_| {
        syn::Error::new_spanned(variant, "too many enum variants")
    })
}

// =============================================================================
// Encode
// =============================================================================

/// Derive macro for `Encode`.
///
/// This macro automatically implements the `Encode` trait for structs and
/// enums:
///
/// - For structs: all non-skipped fields are encoded in declaration order,
///   named fields preceded by their names
/// - For enums: the variant index is encoded first, followed by the variant
///   data
///
/// # Example
///
/// ```ignore
/// use bytestream::Encode;
///
/// #[derive(Encode)]
/// enum Color {
///     Red,
///     Rgb(u8, u8, u8),
///     Named { name: String },
/// }
/// ```
#[proc_macro_derive(Encode, attributes(bytestream))]
pub fn derive_encode(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    expand_encode(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_encode(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let type_name = name.unraw().to_string();

    let encode_impl = match &input.data {
        Data::Struct(data_struct) => encode_struct(&type_name, data_struct)?,
        Data::Enum(data_enum) => encode_enum(&type_name, data_enum)?,
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "Encode cannot be derived for unions",
            ));
        }
    };

    let generics =
        bounded_generics(&input.generics, &quote!(::bytestream::Encode));
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    Ok(quote! {
        #[automatically_derived]
        #[allow(clippy::trait_duplication_in_bounds)]
        impl #impl_generics ::bytestream::Encode for #name #ty_generics #where_clause {
            fn encode<__E: ::bytestream::Encoder + ?Sized>(
                &self,
                encoder: &mut __E,
            ) -> ::core::result::Result<(), ::bytestream::EncodeError> {
                #encode_impl
            }
        }
    })
}

/// Writes the payload of a struct or variant. `value_of` yields a reference
/// expression for each kept field.
fn encode_fields(
    fields: &Fields,
    infos: &[FieldInfo<'_>],
    name: &str,
    value_of: impl Fn(&FieldInfo<'_>) -> TokenStream2,
) -> TokenStream2 {
    let kept: Vec<_> = infos.iter().filter(|info| !info.skip).collect();
    let count = kept.len();

    match fields {
        Fields::Named(_) => {
            let writes = kept.iter().map(|info| {
                let wire_name = info.wire_name();
                let value = value_of(info);
                quote! {
                    encoder.emit_field(#wire_name)?;
                    ::bytestream::Encode::encode(#value, encoder)?;
                }
            });
            quote! {
                encoder.begin_struct(#name, #count)?;
                ::bytestream::encode::in_aggregate(encoder, |encoder| {
                    #(#writes)*
                    ::core::result::Result::Ok(())
                })?;
            }
        }
        Fields::Unnamed(_) => {
            let writes = kept.iter().map(|info| {
                let value = value_of(info);
                quote! {
                    ::bytestream::Encode::encode(#value, encoder)?;
                }
            });
            quote! {
                encoder.begin_tuple(#count)?;
                ::bytestream::encode::in_aggregate(encoder, |encoder| {
                    #(#writes)*
                    ::core::result::Result::Ok(())
                })?;
            }
        }
        Fields::Unit => quote! {
            encoder.emit_unit()?;
        },
    }
}

fn encode_struct(
    type_name: &str,
    data_struct: &DataStruct,
) -> syn::Result<TokenStream2> {
    let infos = collect_fields(&data_struct.fields)?;
    let body = encode_fields(&data_struct.fields, &infos, type_name, |info| {
        let member = &info.member;
        quote!(&self.#member)
    });

    Ok(quote! {
        #body
        ::core::result::Result::Ok(())
    })
}

fn encode_enum(
    enum_name: &str,
    data_enum: &DataEnum,
) -> syn::Result<TokenStream2> {
    if data_enum.variants.is_empty() {
        return Ok(quote! { match *self {} });
    }

    let mut arms = Vec::with_capacity(data_enum.variants.len());
    for (idx, variant) in data_enum.variants.iter().enumerate() {
        let index = variant_index(idx, variant)?;
        let ident = &variant.ident;
        let variant_name = ident.unraw().to_string();
        let infos = collect_fields(&variant.fields)?;

        let bindings = infos.iter().map(|info| {
            let binding = &info.binding;
            let pattern = if info.skip { quote!(_) } else { quote!(#binding) };
            match &info.field.ident {
                Some(field_ident) => quote!(#field_ident: #pattern),
                None => pattern,
            }
        });
        let pattern = match &variant.fields {
            Fields::Named(_) => quote!(Self::#ident { #(#bindings),* }),
            Fields::Unnamed(_) => quote!(Self::#ident(#(#bindings),*)),
            Fields::Unit => quote!(Self::#ident),
        };

        let body = encode_fields(&variant.fields, &infos, &variant_name, |info| {
            let binding = &info.binding;
            quote!(#binding)
        });

        arms.push(quote! {
            #pattern => {
                encoder.begin_variant(#enum_name, #index, #variant_name)?;
                ::bytestream::encode::in_aggregate(encoder, |encoder| {
                    #body
                    ::core::result::Result::Ok(())
                })?;
            }
        });
    }

    Ok(quote! {
        match self {
            #(#arms)*
        }
        ::core::result::Result::Ok(())
    })
}

// =============================================================================
// Decode
// =============================================================================

/// Derive macro for `Decode`.
///
/// This macro automatically implements the `Decode` trait for structs and
/// enums:
///
/// - For structs: all fields are decoded in declaration order, checking each
///   field name against the stream (skipped fields use
///   `Default::default()`)
/// - For enums: the variant index is decoded first, then the variant data;
///   an index the enum does not have is rejected as malformed
///
/// # Example
///
/// ```ignore
/// use bytestream::Decode;
///
/// #[derive(Decode)]
/// struct Person {
///     name: String,
///     age: u32,
/// }
/// ```
#[proc_macro_derive(Decode, attributes(bytestream))]
pub fn derive_decode(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    expand_decode(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_decode(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let type_name = name.unraw().to_string();

    let decode_impl = match &input.data {
        Data::Struct(data_struct) => {
            let infos = collect_fields(&data_struct.fields)?;
            let value = decode_fields(
                &data_struct.fields,
                &infos,
                &type_name,
                &quote!(Self),
            );
            quote! { ::core::result::Result::Ok(#value) }
        }
        Data::Enum(data_enum) => decode_enum(&type_name, data_enum)?,
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "Decode cannot be derived for unions",
            ));
        }
    };

    let generics =
        bounded_generics(&input.generics, &quote!(::bytestream::Decode));
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    Ok(quote! {
        #[automatically_derived]
        #[allow(clippy::trait_duplication_in_bounds)]
        impl #impl_generics ::bytestream::Decode for #name #ty_generics #where_clause {
            #[allow(unreachable_code)]
            fn decode<__D: ::bytestream::Decoder + ?Sized>(
                decoder: &mut __D,
            ) -> ::core::result::Result<Self, ::bytestream::DecodeError> {
                #decode_impl
            }
        }
    })
}

/// Builds an expression that reads the payload of a struct or variant and
/// constructs it through `path`.
fn decode_fields(
    fields: &Fields,
    infos: &[FieldInfo<'_>],
    name: &str,
    path: &TokenStream2,
) -> TokenStream2 {
    let count = infos.iter().filter(|info| !info.skip).count();

    let values = infos.iter().map(|info| {
        let ty = &info.field.ty;
        let value = if info.skip {
            quote!(<#ty as ::core::default::Default>::default())
        } else if let Some(wire_name) = info.wire_name() {
            quote!({
                decoder.expect_field(#wire_name)?;
                <#ty as ::bytestream::Decode>::decode(decoder)?
            })
        } else {
            quote!(<#ty as ::bytestream::Decode>::decode(decoder)?)
        };

        match &info.field.ident {
            Some(ident) => quote!(#ident: #value),
            None => value,
        }
    });

    match fields {
        Fields::Named(_) => quote!({
            decoder.begin_struct(#name, #count)?;
            ::bytestream::decode::in_aggregate(decoder, |decoder| {
                ::core::result::Result::Ok(#path { #(#values),* })
            })?
        }),
        Fields::Unnamed(_) => quote!({
            decoder.begin_tuple(#count)?;
            ::bytestream::decode::in_aggregate(decoder, |decoder| {
                ::core::result::Result::Ok(#path(#(#values),*))
            })?
        }),
        Fields::Unit => quote!({
            decoder.read_unit()?;
            #path
        }),
    }
}

fn decode_enum(
    enum_name: &str,
    data_enum: &DataEnum,
) -> syn::Result<TokenStream2> {
    let mut arms = Vec::with_capacity(data_enum.variants.len());
    for (idx, variant) in data_enum.variants.iter().enumerate() {
        let index = variant_index(idx, variant)?;
        let ident = &variant.ident;
        let infos = collect_fields(&variant.fields)?;
        let value = decode_fields(
            &variant.fields,
            &infos,
            &ident.unraw().to_string(),
            &quote!(Self::#ident),
        );

        arms.push(quote! { #index => #value, });
    }

    Ok(quote! {
        let index = decoder.read_variant(#enum_name)?;
        ::bytestream::decode::in_aggregate(decoder, |decoder| {
            ::core::result::Result::Ok(match index {
                #(#arms)*
                _ => {
                    return ::core::result::Result::Err(
                        ::bytestream::Malformed::UnknownVariant {
                            enum_name: #enum_name,
                            index,
                        }
                        .into(),
                    );
                }
            })
        })
    })
}
