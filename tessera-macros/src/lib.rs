//! # tessera-macros
//!
//! Derive macros for the Tessera serialization framework.
//!
//! ## Generated Items
//!
//! - `#[derive(Reflect)]` - the field descriptor table, field visitors, and
//!   `Save`/`Load` impls that walk the fields in declaration order
//! - `#[derive(Message)]` - the `Message` impl: wire name, optional pinned
//!   type id, and the format the type travels in
//!
//! Generated code refers to `::tessera` unless `crate = "..."` is given.

mod generate;
mod parse;

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

/// Derive a field descriptor for a struct with named fields.
///
/// ## Attributes
///
/// - `#[reflect(rename = "name")]` on the struct - override `TYPE_NAME`
/// - `#[reflect(crate = "path")]` on the struct - path to the runtime crate
/// - `#[reflect(rename = "name")]` on a field - name used on the wire
/// - `#[reflect(skip)]` on a field - leave it out of the descriptor
///
/// ## Example
///
/// ```rust,ignore
/// #[derive(Debug, Default, Reflect)]
/// struct Sample {
///     id: i64,
///     msg: String,
///     numbers: Vec<i32>,
/// }
/// ```
#[proc_macro_derive(Reflect, attributes(reflect))]
pub fn derive_reflect(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match generate::generate_reflect(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Derive `Message` so the type can be registered and sent in an envelope.
///
/// ## Attributes
///
/// - `name = "..."` - registered name; the type id is hashed from it
/// - `id = N` - pin the type id instead
/// - `format = Path` - `Json` (default), `Binary` or `Xml`
/// - `crate = "path"` - path to the runtime crate
#[proc_macro_derive(Message, attributes(message))]
pub fn derive_message(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match generate::generate_message(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
