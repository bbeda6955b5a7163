//! `Message` impl for a struct.

use proc_macro2::TokenStream;
use quote::quote;

use crate::parse::MessageDefinition;

pub fn generate(def: &MessageDefinition) -> TokenStream {
    let ident = &def.ident;
    let krate = &def.krate;
    let name = &def.name;

    let format = match &def.format {
        Some(path) => quote!(#path),
        None => quote!(#krate::Json),
    };
    let id = match def.id {
        Some(id) => quote!(::core::option::Option::Some(#id)),
        None => quote!(::core::option::Option::None),
    };

    quote! {
        impl #krate::Message for #ident {
            const NAME: &'static str = #name;
            const ID: ::core::option::Option<u32> = #id;
            type Format = #format;
        }
    }
}
