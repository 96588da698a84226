//! Implementation of `#[derive(NativeType)]`.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{DeriveInput, parse_macro_input};

use crate::attrs::TypeAttrs;

pub fn derive_native_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match derive_native_inner(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn derive_native_inner(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let attrs = TypeAttrs::from_attrs(&input.attrs)?;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "NativeType cannot be derived for generic types; implement it per instantiation",
        ));
    }

    let tcl_name = attrs.name.unwrap_or_else(|| name.to_string());

    Ok(quote! {
        impl ::tclbind::NativeType for #name {
            const NAME: &'static str = #tcl_name;
        }
    })
}
