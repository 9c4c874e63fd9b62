//! Proc-macro implementation for `#[popsicle_error(offset = N)]`.
//!
//! The macro rewrites the input enum to:
//! 1. Derive `thiserror::Error` (plus `Debug` when the enum has no derives of its own).
//! 2. Assign every variant a stable numeric code = `offset + index`. A variant can pin
//!    its code with `#[code(N)]`, or forward the code of the single error it wraps with
//!    `#[code(delegate)]`.
//! 3. Generate an inherent `code()`, an `ErrorCode` impl and `From<Enum> for ErrorPayload`
//!    so every failure can be shipped to a client as `{ message, code }`.
//!
//! Unlike a `#[repr(u32)]` discriminant scheme the variants are free to carry data
//! (captured stderr, offending amounts, ...).
extern crate proc_macro;

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{parse::Parse, parse_macro_input, Attribute, Fields, ItemEnum, LitInt, LitStr};

/// Parses the attribute input `offset = N`.
struct Offset(u32);

impl Parse for Offset {
    fn parse(input: syn::parse::ParseStream) -> syn::Result<Self> {
        let ident: syn::Ident = input.parse()?;
        if ident != "offset" {
            return Err(syn::Error::new_spanned(ident, "expected `offset = <int>`"));
        }
        let _: syn::Token![=] = input.parse()?;
        let lit: LitInt = input.parse()?;
        Ok(Offset(lit.base10_parse()?))
    }
}

/// What `#[code(...)]` said about a variant.
enum CodeSpec {
    Fixed(u32),
    Delegate,
}

fn take_code_attr(attrs: &mut Vec<Attribute>) -> syn::Result<Option<CodeSpec>> {
    let Some(pos) = attrs.iter().position(|a| a.path().is_ident("code")) else {
        return Ok(None);
    };
    let attr = attrs.remove(pos);

    if let Ok(lit) = attr.parse_args::<LitInt>() {
        return Ok(Some(CodeSpec::Fixed(lit.base10_parse()?)));
    }

    let ident: syn::Ident = attr.parse_args()?;
    if ident == "delegate" {
        Ok(Some(CodeSpec::Delegate))
    } else {
        Err(syn::Error::new_spanned(
            ident,
            "expected `#[code(<int>)]` or `#[code(delegate)]`",
        ))
    }
}

#[proc_macro_attribute]
pub fn popsicle_error(attr: TokenStream, item: TokenStream) -> TokenStream {
    const DEFAULT_OFFSET: u32 = 9000;

    let offset: u32 = if attr.is_empty() {
        DEFAULT_OFFSET
    } else {
        parse_macro_input!(attr as Offset).0
    };

    let mut enum_item = parse_macro_input!(item as ItemEnum);

    match expand(offset, &mut enum_item) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(offset: u32, enum_item: &mut ItemEnum) -> syn::Result<proc_macro2::TokenStream> {
    let has_derive = enum_item.attrs.iter().any(|a| a.path().is_ident("derive"));
    if !has_derive {
        enum_item.attrs.push(syn::parse_quote!(#[derive(Debug)]));
    }

    enum_item
        .attrs
        .push(syn::parse_quote!(#[derive(popsicle_error::__private::thiserror::Error)]));

    let enum_ident = enum_item.ident.clone();
    let mut arms = Vec::new();

    for (idx, variant) in enum_item.variants.iter_mut().enumerate() {
        let spec = take_code_attr(&mut variant.attrs)?;
        let ident = variant.ident.clone();

        let has_error_attr = variant.attrs.iter().any(|a| a.path().is_ident("error"));

        let arm = match spec {
            Some(CodeSpec::Delegate) => {
                if !has_error_attr {
                    variant.attrs.push(syn::parse_quote!(#[error(transparent)]));
                }
                match &variant.fields {
                    Fields::Unnamed(fields) if fields.unnamed.len() == 1 => quote! {
                        #enum_ident::#ident(inner) => popsicle_error::ErrorCode::code(inner)
                    },
                    Fields::Named(fields) if fields.named.len() == 1 => {
                        let field = fields.named[0].ident.clone();
                        quote! {
                            #enum_ident::#ident { #field: inner } => popsicle_error::ErrorCode::code(inner)
                        }
                    }
                    _ => {
                        return Err(syn::Error::new_spanned(
                            &variant.ident,
                            "`#[code(delegate)]` requires exactly one field",
                        ))
                    }
                }
            }
            spec => {
                let value = match spec {
                    Some(CodeSpec::Fixed(value)) => value,
                    _ => offset + idx as u32,
                };
                if !has_error_attr {
                    let msg = LitStr::new(&ident.to_string(), Span::call_site());
                    variant.attrs.push(syn::parse_quote!(#[error(#msg)]));
                }
                let pattern = match &variant.fields {
                    Fields::Unit => quote!(#enum_ident::#ident),
                    Fields::Unnamed(_) => quote!(#enum_ident::#ident(..)),
                    Fields::Named(_) => quote!(#enum_ident::#ident { .. }),
                };
                quote!(#pattern => #value)
            }
        };
        arms.push(arm);
    }

    let (impl_generics, ty_generics, where_clause) = enum_item.generics.split_for_impl();

    Ok(quote! {
        #enum_item

        impl #impl_generics #enum_ident #ty_generics #where_clause {
            /// Stable numeric code reported to clients next to the message.
            pub fn code(&self) -> u32 {
                match self {
                    #( #arms, )*
                }
            }
        }

        impl #impl_generics popsicle_error::ErrorCode for #enum_ident #ty_generics #where_clause {
            #[inline]
            fn code(&self) -> u32 {
                #enum_ident::code(self)
            }
        }

        impl #impl_generics From<#enum_ident #ty_generics> for popsicle_error::ErrorPayload #where_clause {
            #[inline]
            fn from(e: #enum_ident #ty_generics) -> Self {
                popsicle_error::ErrorPayload::new(e.to_string(), e.code())
            }
        }
    })
}
