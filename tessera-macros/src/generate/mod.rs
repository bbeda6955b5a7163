//! Code generation for the derive macros.

mod message;
mod reflect;

use proc_macro2::TokenStream;
use syn::{DeriveInput, Result};

use crate::parse::{MessageDefinition, StructDefinition};

/// Expand `#[derive(Reflect)]`: the descriptor plus `Save`/`Load` impls.
pub fn generate_reflect(input: DeriveInput) -> Result<TokenStream> {
    let def = StructDefinition::parse(input)?;
    Ok(reflect::generate(&def))
}

/// Expand `#[derive(Message)]`.
pub fn generate_message(input: DeriveInput) -> Result<TokenStream> {
    let def = MessageDefinition::parse(&input)?;
    Ok(message::generate(&def))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_reflect() {
        let input: DeriveInput = syn::parse_quote! {
            pub struct Sample {
                id: i64,
                msg: String,
            }
        };

        let tokens = generate_reflect(input).unwrap().to_string();
        assert!(tokens.contains("impl :: tessera :: Reflect for Sample"));
        assert!(tokens.contains("impl :: tessera :: Save for Sample"));
        assert!(tokens.contains("impl :: tessera :: Load for Sample"));
    }

    #[test]
    fn test_generate_message() {
        let input: DeriveInput = syn::parse_quote! {
            #[message(id = 7)]
            pub struct Hello {
                text: String,
            }
        };

        let tokens = generate_message(input).unwrap().to_string();
        assert!(tokens.contains("impl :: tessera :: Message for Hello"));
        assert!(tokens.contains(":: tessera :: Json"));
        assert!(tokens.contains("Some (7u32)"));
    }

    #[test]
    fn test_generate_reflect_enum_error() {
        let input: DeriveInput = syn::parse_quote! {
            enum Choice { A, B }
        };
        assert!(generate_reflect(input).is_err());
    }
}
