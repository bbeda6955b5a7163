//! Parsing for the derive macros.

use syn::{
    Attribute, Data, DeriveInput, Error, Fields, Generics, Ident, LitInt, LitStr, Path, Result,
    Type,
};

/// Container-level `#[reflect(...)]` options plus the reflected fields.
#[derive(Debug)]
pub struct StructDefinition {
    pub ident: Ident,
    pub generics: Generics,
    /// Name reported as `Reflect::TYPE_NAME`.
    pub type_name: String,
    /// Path to the runtime crate.
    pub krate: Path,
    pub fields: Vec<FieldDefinition>,
}

/// One reflected field.
#[derive(Debug)]
pub struct FieldDefinition {
    pub ident: Ident,
    pub ty: Type,
    /// Name on the wire.
    pub name: String,
    pub ordinal: u32,
}

/// `#[message(...)]` options.
#[derive(Debug)]
pub struct MessageDefinition {
    pub ident: Ident,
    pub name: String,
    pub format: Option<Path>,
    pub id: Option<u32>,
    pub krate: Path,
}

fn default_crate() -> Path {
    syn::parse_quote!(::tessera)
}

fn parse_crate(lit: &LitStr) -> Result<Path> {
    lit.parse()
}

impl StructDefinition {
    /// Parse a struct with named fields.
    pub fn parse(input: DeriveInput) -> Result<Self> {
        let mut type_name = input.ident.to_string();
        let mut krate = default_crate();

        for attr in reflect_attrs(&input.attrs) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") {
                    type_name = meta.value()?.parse::<LitStr>()?.value();
                    Ok(())
                } else if meta.path.is_ident("crate") {
                    krate = parse_crate(&meta.value()?.parse()?)?;
                    Ok(())
                } else {
                    Err(meta.error("unsupported reflect attribute"))
                }
            })?;
        }

        let named = match &input.data {
            Data::Struct(data) => match &data.fields {
                Fields::Named(named) => named,
                Fields::Unit => {
                    return Ok(Self {
                        ident: input.ident,
                        generics: input.generics,
                        type_name,
                        krate,
                        fields: Vec::new(),
                    })
                }
                Fields::Unnamed(_) => {
                    return Err(Error::new_spanned(
                        &input.ident,
                        "Reflect requires named fields",
                    ))
                }
            },
            _ => {
                return Err(Error::new_spanned(
                    &input.ident,
                    "Reflect can only be derived for structs",
                ))
            }
        };

        let mut fields = Vec::new();
        for field in &named.named {
            let Some(ident) = field.ident.clone() else {
                continue;
            };
            let mut name = ident.to_string();
            let mut skip = false;

            for attr in reflect_attrs(&field.attrs) {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("rename") {
                        name = meta.value()?.parse::<LitStr>()?.value();
                        Ok(())
                    } else if meta.path.is_ident("skip") {
                        skip = true;
                        Ok(())
                    } else {
                        Err(meta.error("unsupported reflect field attribute"))
                    }
                })?;
            }

            if skip {
                continue;
            }
            if fields.iter().any(|f: &FieldDefinition| f.name == name) {
                return Err(Error::new_spanned(
                    field,
                    format!("duplicate field name `{name}`"),
                ));
            }

            let ordinal = u32::try_from(fields.len())
                .map_err(|_| Error::new_spanned(field, "too many fields"))?;
            fields.push(FieldDefinition {
                ident,
                ty: field.ty.clone(),
                name,
                ordinal,
            });
        }

        Ok(Self {
            ident: input.ident,
            generics: input.generics,
            type_name,
            krate,
            fields,
        })
    }
}

impl MessageDefinition {
    pub fn parse(input: &DeriveInput) -> Result<Self> {
        if !input.generics.params.is_empty() {
            return Err(Error::new_spanned(
                &input.generics,
                "Message types cannot be generic",
            ));
        }

        let mut def = Self {
            ident: input.ident.clone(),
            name: input.ident.to_string(),
            format: None,
            id: None,
            krate: default_crate(),
        };

        for attr in input.attrs.iter().filter(|a| a.path().is_ident("message")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    def.name = meta.value()?.parse::<LitStr>()?.value();
                } else if meta.path.is_ident("format") {
                    def.format = Some(meta.value()?.parse()?);
                } else if meta.path.is_ident("id") {
                    def.id = Some(meta.value()?.parse::<LitInt>()?.base10_parse()?);
                } else if meta.path.is_ident("crate") {
                    def.krate = parse_crate(&meta.value()?.parse()?)?;
                } else {
                    return Err(meta.error("unsupported message attribute"));
                }
                Ok(())
            })?;
        }

        Ok(def)
    }
}

fn reflect_attrs(attrs: &[Attribute]) -> impl Iterator<Item = &Attribute> {
    attrs.iter().filter(|a| a.path().is_ident("reflect"))
}
