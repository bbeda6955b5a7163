//! Field-reflection descriptors.
//!
//! A [`Reflect`] type exposes a static, declaration-ordered table of
//! [`Field`]s plus typed visitors over the same fields. The table gives
//! type-erased access by name; the visitors drive [`save_struct`] and
//! [`load_struct`], which every reflected structure uses as its
//! [`Save`]/[`Load`] implementation.
//!
//! `#[derive(Reflect)]` generates all of this. A hand-written impl looks like:
//!
//! ```rust
//! use tessera_core::{
//!     load_struct, save_struct, CodecError, Deserializer, Field, FieldKey, FieldVisitor,
//!     FieldVisitorMut, Load, Reflect, Save, Serializer,
//! };
//!
//! #[derive(Default)]
//! struct Point {
//!     x: i32,
//!     y: i32,
//! }
//!
//! impl Reflect for Point {
//!     const TYPE_NAME: &'static str = "Point";
//!     const FIELDS: &'static [Field<Self>] = &[
//!         Field::new("x", 0, "i32", |p| &p.x, |p| &mut p.x),
//!         Field::new("y", 1, "i32", |p| &p.y, |p| &mut p.y),
//!     ];
//!
//!     fn visit<V: FieldVisitor>(&self, v: &mut V) {
//!         v.visit(FieldKey::new("x", 0), &self.x);
//!         v.visit(FieldKey::new("y", 1), &self.y);
//!     }
//!
//!     fn visit_mut<V: FieldVisitorMut>(&mut self, v: &mut V) {
//!         v.visit(FieldKey::new("x", 0), &mut self.x);
//!         v.visit(FieldKey::new("y", 1), &mut self.y);
//!     }
//! }
//!
//! impl Save for Point {
//!     fn save<S: Serializer>(&self, s: &mut S) -> Result<(), CodecError> {
//!         save_struct(self, s)
//!     }
//! }
//!
//! impl Load for Point {
//!     fn load<D: Deserializer>(&mut self, d: &mut D) -> Result<(), CodecError> {
//!         load_struct(self, d)
//!     }
//! }
//!
//! let mut p = Point { x: 1, y: 2 };
//! assert_eq!(p.get_field::<i32>("y"), Some(&2));
//! assert!(p.set_field("x", 10i32).is_ok());
//! assert_eq!(p.x, 10);
//! ```

use std::any::Any;
use std::fmt;

use crate::error::CodecError;
use crate::traverse::{Deserializer, FieldKey, Load, Save, Serializer};

/// Shared accessor into one field of `T`.
pub type Getter<T> = for<'a> fn(&'a T) -> &'a (dyn Any + 'static);

/// Exclusive accessor into one field of `T`.
pub type GetterMut<T> = for<'a> fn(&'a mut T) -> &'a mut (dyn Any + 'static);

/// One entry of a reflection descriptor.
pub struct Field<T> {
    /// Declared (possibly renamed) field name.
    pub name: &'static str,
    /// Zero-based declaration position.
    pub ordinal: u32,
    /// Rust type of the field, as written in the declaration.
    pub type_name: &'static str,
    pub get: Getter<T>,
    pub get_mut: GetterMut<T>,
}

impl<T> Field<T> {
    #[must_use]
    pub const fn new(
        name: &'static str,
        ordinal: u32,
        type_name: &'static str,
        get: Getter<T>,
        get_mut: GetterMut<T>,
    ) -> Self {
        Self {
            name,
            ordinal,
            type_name,
            get,
            get_mut,
        }
    }

    /// The traversal key for this field.
    #[inline]
    #[must_use]
    pub const fn key(&self) -> FieldKey {
        FieldKey::new(self.name, self.ordinal)
    }
}

impl<T> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("ordinal", &self.ordinal)
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// Receives each field of a reflected value, in declaration order.
pub trait FieldVisitor {
    fn visit<F: Save + ?Sized>(&mut self, key: FieldKey, value: &F);
}

/// Receives each field of a reflected value mutably, in declaration order.
pub trait FieldVisitorMut {
    fn visit<F: Load + ?Sized>(&mut self, key: FieldKey, value: &mut F);
}

/// Why [`Reflect::set_field`] refused a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("no field named `{0}`")]
    NotFound(String),
    #[error("field `{name}` has type {expected}")]
    WrongType {
        name: &'static str,
        expected: &'static str,
    },
}

/// A structure with a static reflection descriptor.
pub trait Reflect: Sized + 'static {
    /// Declared type name.
    const TYPE_NAME: &'static str;

    /// Fields in declaration order.
    const FIELDS: &'static [Field<Self>];

    fn visit<V: FieldVisitor>(&self, visitor: &mut V);

    fn visit_mut<V: FieldVisitorMut>(&mut self, visitor: &mut V);

    /// Look up a field descriptor by name.
    #[must_use]
    fn field(name: &str) -> Option<&'static Field<Self>> {
        Self::FIELDS.iter().find(|field| field.name == name)
    }

    /// Borrow a field by name, if it exists and has type `F`.
    fn get_field<F: Any>(&self, name: &str) -> Option<&F> {
        let field = Self::field(name)?;
        (field.get)(self).downcast_ref()
    }

    /// Mutably borrow a field by name, if it exists and has type `F`.
    fn get_field_mut<F: Any>(&mut self, name: &str) -> Option<&mut F> {
        let field = Self::field(name)?;
        (field.get_mut)(self).downcast_mut()
    }

    /// Overwrite a field by name.
    fn set_field<F: Any>(&mut self, name: &str, value: F) -> Result<(), FieldError> {
        let field = Self::field(name).ok_or_else(|| FieldError::NotFound(name.to_owned()))?;
        let slot = (field.get_mut)(self)
            .downcast_mut::<F>()
            .ok_or(FieldError::WrongType {
                name: field.name,
                expected: field.type_name,
            })?;
        *slot = value;
        Ok(())
    }
}

struct SaveFields<'a, S> {
    s: &'a mut S,
    result: Result<(), CodecError>,
}

impl<S: Serializer> FieldVisitor for SaveFields<'_, S> {
    fn visit<F: Save + ?Sized>(&mut self, key: FieldKey, value: &F) {
        let result = self.s.save_field(key, value);
        if self.result.is_ok() {
            self.result = result;
        }
    }
}

struct LoadFields<'a, D> {
    d: &'a mut D,
    result: Result<(), CodecError>,
}

impl<D: Deserializer> FieldVisitorMut for LoadFields<'_, D> {
    fn visit<F: Load + ?Sized>(&mut self, key: FieldKey, value: &mut F) {
        let result = self.d.load_field(key, value);
        if self.result.is_ok() {
            self.result = result;
        }
    }
}

/// Save a reflected structure as one object, one named field per descriptor entry.
///
/// Every field is visited even after a failure; the first error is returned.
pub fn save_struct<T: Reflect, S: Serializer>(value: &T, s: &mut S) -> Result<(), CodecError> {
    s.start_object(T::FIELDS.len())?;
    let mut fields = SaveFields {
        s: &mut *s,
        result: Ok(()),
    };
    value.visit(&mut fields);
    let result = fields.result;
    result.and(s.end_object())
}

/// Load a reflected structure field by field.
///
/// Every field is visited even after a failure so the backend cursor stays
/// aligned; the first error is returned and the node is always finished.
pub fn load_struct<T: Reflect, D: Deserializer>(value: &mut T, d: &mut D) -> Result<(), CodecError> {
    d.start_node()?;
    let mut fields = LoadFields {
        d: &mut *d,
        result: Ok(()),
    };
    value.visit_mut(&mut fields);
    let result = fields.result;
    result.and(d.finish_node())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{roundtrip, Token, TokenDeserializer, TokenSerializer};

    #[derive(Debug, Default, PartialEq)]
    struct Sample {
        id: i64,
        msg: String,
        tags: Option<Vec<String>>,
    }

    impl Reflect for Sample {
        const TYPE_NAME: &'static str = "Sample";
        const FIELDS: &'static [Field<Self>] = &[
            Field::new("id", 0, "i64", |v| &v.id, |v| &mut v.id),
            Field::new("msg", 1, "String", |v| &v.msg, |v| &mut v.msg),
            Field::new("tags", 2, "Option<Vec<String>>", |v| &v.tags, |v| &mut v.tags),
        ];

        fn visit<V: FieldVisitor>(&self, v: &mut V) {
            v.visit(FieldKey::new("id", 0), &self.id);
            v.visit(FieldKey::new("msg", 1), &self.msg);
            v.visit(FieldKey::new("tags", 2), &self.tags);
        }

        fn visit_mut<V: FieldVisitorMut>(&mut self, v: &mut V) {
            v.visit(FieldKey::new("id", 0), &mut self.id);
            v.visit(FieldKey::new("msg", 1), &mut self.msg);
            v.visit(FieldKey::new("tags", 2), &mut self.tags);
        }
    }

    impl Save for Sample {
        fn save<S: Serializer>(&self, s: &mut S) -> Result<(), CodecError> {
            save_struct(self, s)
        }
    }

    impl Load for Sample {
        fn load<D: Deserializer>(&mut self, d: &mut D) -> Result<(), CodecError> {
            load_struct(self, d)
        }
    }

    #[test]
    fn test_struct_tokens() {
        let sample = Sample {
            id: 1,
            msg: "hi".into(),
            tags: None,
        };
        let mut s = TokenSerializer::new();
        sample.save(&mut s).unwrap();
        assert_eq!(
            s.into_tokens(),
            vec![
                Token::StartObject(3),
                Token::Name("id".into()),
                Token::I64(1),
                Token::Name("msg".into()),
                Token::Str("hi".into()),
                Token::Name("tags".into()),
                Token::Null,
                Token::EndObject,
            ]
        );
    }

    #[test]
    fn test_struct_roundtrip() {
        let sample = Sample {
            id: -3,
            msg: "hello".into(),
            tags: Some(vec!["a".into(), "b".into()]),
        };
        assert_eq!(roundtrip(&sample).unwrap(), sample);
    }

    #[test]
    fn test_struct_failure_visits_every_field() {
        // `id` carries a string; the node is still finished so its sibling is readable.
        let mut d = TokenDeserializer::new(vec![
            Token::StartObject(3),
            Token::Name("id".into()),
            Token::Str("bad".into()),
            Token::Name("msg".into()),
            Token::Str("kept".into()),
            Token::EndObject,
            Token::I64(99),
        ]);
        let mut sample = Sample::default();
        let err = sample.load(&mut d).unwrap_err();
        assert!(matches!(err, CodecError::FormatViolation(_)));
        assert_eq!(d.load_i64().unwrap(), 99);
    }

    #[test]
    fn test_dynamic_field_access() {
        let mut sample = Sample::default();
        assert_eq!(Sample::FIELDS.len(), 3);
        assert_eq!(Sample::field("msg").map(|f| f.ordinal), Some(1));

        sample.set_field("msg", "set".to_string()).unwrap();
        assert_eq!(sample.get_field::<String>("msg").unwrap(), "set");

        *sample.get_field_mut::<i64>("id").unwrap() = 8;
        assert_eq!(sample.id, 8);

        assert_eq!(
            sample.set_field("id", 1i32),
            Err(FieldError::WrongType {
                name: "id",
                expected: "i64"
            })
        );
        assert_eq!(
            sample.set_field("nope", 1i32),
            Err(FieldError::NotFound("nope".into()))
        );
        assert!(sample.get_field::<u8>("id").is_none());
    }
}
