//! `Reflect`, `Save` and `Load` impls for a struct.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{parse_quote, WhereClause};

use crate::parse::StructDefinition;

pub fn generate(def: &StructDefinition) -> TokenStream {
    let ident = &def.ident;
    let krate = &def.krate;
    let type_name = &def.type_name;

    let descriptors = def.fields.iter().map(|field| {
        let member = &field.ident;
        let name = &field.name;
        let ordinal = field.ordinal;
        let ty = &field.ty;
        let ty_name = quote!(#ty).to_string().replace(' ', "");
        quote! {
            #krate::Field::new(#name, #ordinal, #ty_name, |v| &v.#member, |v| &mut v.#member)
        }
    });

    let keys: Vec<_> = def
        .fields
        .iter()
        .map(|field| {
            let name = &field.name;
            let ordinal = field.ordinal;
            quote!(#krate::FieldKey::new(#name, #ordinal))
        })
        .collect();
    let members: Vec<_> = def.fields.iter().map(|field| &field.ident).collect();

    let (impl_generics, ty_generics, where_clause) = def.generics.split_for_impl();
    let where_clause = bounded(def, where_clause);

    quote! {
        impl #impl_generics #krate::Reflect for #ident #ty_generics #where_clause {
            const TYPE_NAME: &'static str = #type_name;
            const FIELDS: &'static [#krate::Field<Self>] = &[#(#descriptors),*];

            fn visit<V: #krate::FieldVisitor>(&self, visitor: &mut V) {
                #(visitor.visit(#keys, &self.#members);)*
            }

            fn visit_mut<V: #krate::FieldVisitorMut>(&mut self, visitor: &mut V) {
                #(visitor.visit(#keys, &mut self.#members);)*
            }
        }

        impl #impl_generics #krate::Save for #ident #ty_generics #where_clause {
            fn save<S: #krate::Serializer>(&self, s: &mut S) -> ::core::result::Result<(), #krate::CodecError> {
                #krate::save_struct(self, s)
            }
        }

        impl #impl_generics #krate::Load for #ident #ty_generics #where_clause {
            fn load<D: #krate::Deserializer>(&mut self, d: &mut D) -> ::core::result::Result<(), #krate::CodecError> {
                #krate::load_struct(self, d)
            }
        }
    }
}

/// For generic structs, require every field type to be saveable, loadable and `'static`.
fn bounded(def: &StructDefinition, existing: Option<&WhereClause>) -> Option<WhereClause> {
    if def.generics.params.is_empty() {
        return existing.cloned();
    }

    let krate = &def.krate;
    let mut clause = existing.cloned().unwrap_or_else(|| parse_quote!(where));
    for field in &def.fields {
        let ty = &field.ty;
        clause
            .predicates
            .push(parse_quote!(#ty: #krate::Save + #krate::Load + 'static));
    }
    Some(clause)
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::DeriveInput;

    fn expand(input: DeriveInput) -> String {
        generate(&StructDefinition::parse(input).unwrap()).to_string()
    }

    #[test]
    fn test_descriptor_entries() {
        let tokens = expand(parse_quote! {
            struct Sample {
                #[reflect(rename = "identifier")]
                id: i64,
                numbers: Vec<i32>,
            }
        });

        assert!(tokens.contains("\"identifier\" , 0u32 , \"i64\""));
        assert!(tokens.contains("\"numbers\" , 1u32 , \"Vec<i32>\""));
        assert!(tokens.contains("const TYPE_NAME : & 'static str = \"Sample\""));
    }

    #[test]
    fn test_generic_bounds() {
        let tokens = expand(parse_quote! {
            struct Wrapper<T> {
                inner: T,
            }
        });

        assert!(tokens.contains("where T : :: tessera :: Save + :: tessera :: Load + 'static"));
    }

    #[test]
    fn test_custom_crate_path() {
        let tokens = expand(parse_quote! {
            #[reflect(crate = "tessera_core")]
            struct Point { x: f32 }
        });

        assert!(tokens.contains("impl tessera_core :: Reflect for Point"));
        assert!(!tokens.contains(":: tessera ::"));
    }
}
