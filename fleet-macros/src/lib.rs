//! `EnumToString` derives a `Display` impl that prints the bare variant name.
//!
//! Carried over from the simulator's macro crate, trimmed to the one derive the
//! fleet actually uses: error kinds and message kinds both want a cheap,
//! allocation-free `Display` rather than a hand-written match in every enum.

extern crate proc_macro;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{quote, ToTokens};
use syn::Data;

#[proc_macro_derive(EnumToString)]
pub fn derive_enum_to_string(item: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(item as syn::DeriveInput);

    let struct_identifier = &input.ident;

    let mut match_impl = TokenStream2::new();
    match &input.data {
        Data::Enum(syn::DataEnum { variants, .. }) => {
            for f in variants {
                let id = f.ident.clone();
                let id_str = id.to_token_stream().to_string();
                if f.fields.is_empty() {
                    match_impl.extend(quote! {#struct_identifier::#id => #id_str,
                    });
                } else {
                    match_impl.extend(quote! {#struct_identifier::#id(..) => #id_str,
                    });
                }
            }
        }
        _ => unimplemented!("EnumToString only supports enums"),
    }

    quote! {
        #[automatically_derived]
        impl std::fmt::Display for #struct_identifier {
            #[allow(unreachable_patterns)]
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", match &self {
                        #match_impl
                        _ => unimplemented!()
                    })
            }
        }
    }
    .into()
}
