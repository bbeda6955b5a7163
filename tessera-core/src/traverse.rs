//! The node-traversal contract.
//!
//! Every backend implements [`Serializer`] (save direction) and
//! [`Deserializer`] (load direction). Every value type implements [`Save`]
//! and [`Load`] purely in terms of those two traits, so a single adapter
//! works unmodified against any backend.
//!
//! ## Bracket discipline
//!
//! Each `start_*` call is matched by exactly one `end_*`/`finish_node`, on the
//! failure path too. Use [`object`], [`array`] and [`node`] rather than calling
//! the bracket methods by hand: they close the bracket before propagating the
//! first error, so a backend's cursor stays in step for sibling values.
//!
//! ## Example
//!
//! ```rust
//! use tessera_core::{array, CodecError, Save, Serializer};
//!
//! struct Samples(Vec<u16>);
//!
//! impl Save for Samples {
//!     fn save<S: Serializer>(&self, s: &mut S) -> Result<(), CodecError> {
//!         array(s, self.0.len(), |s| {
//!             for sample in &self.0 {
//!                 s.save_u16(*sample)?;
//!             }
//!             Ok(())
//!         })
//!     }
//! }
//! ```

use crate::error::CodecError;

/// A field name plus its declaration ordinal.
///
/// Backends that address fields by name use `name`; the ordinal is a small
/// stable hint (a tree backend may use it to skip a lookup), never a hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldKey {
    /// Declared field name.
    pub name: &'static str,
    /// Zero-based declaration position.
    pub ordinal: u32,
}

impl FieldKey {
    /// Entry key of a map or multimap.
    pub const KEY: Self = Self::new("key", 0);
    /// Entry value of a map or multimap.
    pub const VALUE: Self = Self::new("value", 1);
    /// First half of a pair.
    pub const FIRST: Self = Self::new("first", 0);
    /// Second half of a pair.
    pub const SECOND: Self = Self::new("second", 1);

    /// Create a field key.
    #[inline]
    #[must_use]
    pub const fn new(name: &'static str, ordinal: u32) -> Self {
        Self { name, ordinal }
    }
}

/// Save-direction half of the traversal contract.
pub trait Serializer: Sized {
    /// Open a region of `len` named fields.
    fn start_object(&mut self, len: usize) -> Result<(), CodecError>;

    /// Close the innermost named-field region.
    fn end_object(&mut self) -> Result<(), CodecError>;

    /// Open a counted region of `len` elements. Writes the size tag.
    fn start_array(&mut self, len: usize) -> Result<(), CodecError>;

    /// Close the innermost counted region.
    fn end_array(&mut self) -> Result<(), CodecError>;

    /// Associate the next value with a field name.
    fn save_name(&mut self, key: FieldKey) -> Result<(), CodecError>;

    /// Write the null sentinel.
    fn save_null(&mut self) -> Result<(), CodecError>;

    /// Mark a nullable value as present. The value itself follows.
    #[inline]
    fn save_present(&mut self) -> Result<(), CodecError> {
        Ok(())
    }

    fn save_bool(&mut self, v: bool) -> Result<(), CodecError>;
    fn save_i8(&mut self, v: i8) -> Result<(), CodecError>;
    fn save_i16(&mut self, v: i16) -> Result<(), CodecError>;
    fn save_i32(&mut self, v: i32) -> Result<(), CodecError>;
    fn save_i64(&mut self, v: i64) -> Result<(), CodecError>;
    fn save_u8(&mut self, v: u8) -> Result<(), CodecError>;
    fn save_u16(&mut self, v: u16) -> Result<(), CodecError>;
    fn save_u32(&mut self, v: u32) -> Result<(), CodecError>;
    fn save_u64(&mut self, v: u64) -> Result<(), CodecError>;
    fn save_f32(&mut self, v: f32) -> Result<(), CodecError>;
    fn save_f64(&mut self, v: f64) -> Result<(), CodecError>;
    fn save_str(&mut self, v: &str) -> Result<(), CodecError>;

    /// Write one named field.
    ///
    /// Name-addressed backends may override this, e.g. to omit null values.
    fn save_field<T: Save + ?Sized>(&mut self, key: FieldKey, value: &T) -> Result<(), CodecError> {
        self.save_name(key)?;
        value.save(self)
    }
}

/// Load-direction half of the traversal contract.
pub trait Deserializer: Sized {
    /// Enter the next object or array.
    fn start_node(&mut self) -> Result<(), CodecError>;

    /// Leave the innermost node entered with [`start_node`](Self::start_node).
    fn finish_node(&mut self) -> Result<(), CodecError>;

    /// Read the element count of the current node.
    fn load_size_tag(&mut self) -> Result<usize, CodecError>;

    /// Position on a named field. Returns `false` when the field is absent.
    fn load_name(&mut self, key: FieldKey) -> Result<bool, CodecError>;

    /// Consume the null sentinel if it is next. Returns `true` if it was.
    fn load_null(&mut self) -> Result<bool, CodecError>;

    fn load_bool(&mut self) -> Result<bool, CodecError>;
    fn load_i8(&mut self) -> Result<i8, CodecError>;
    fn load_i16(&mut self) -> Result<i16, CodecError>;
    fn load_i32(&mut self) -> Result<i32, CodecError>;
    fn load_i64(&mut self) -> Result<i64, CodecError>;
    fn load_u8(&mut self) -> Result<u8, CodecError>;
    fn load_u16(&mut self) -> Result<u16, CodecError>;
    fn load_u32(&mut self) -> Result<u32, CodecError>;
    fn load_u64(&mut self) -> Result<u64, CodecError>;
    fn load_f32(&mut self) -> Result<f32, CodecError>;
    fn load_f64(&mut self) -> Result<f64, CodecError>;
    fn load_string(&mut self) -> Result<String, CodecError>;

    /// Bound a declared element count before it is used to pre-size a container.
    #[inline]
    fn capacity_hint(&self, declared: usize) -> usize {
        declared.min(4096)
    }

    /// Read one named field, resetting it via [`Load::load_absent`] if missing.
    fn load_field<T: Load + ?Sized>(&mut self, key: FieldKey, value: &mut T) -> Result<(), CodecError> {
        if self.load_name(key)? {
            value.load(self)
        } else {
            value.load_absent()
        }
    }

    /// Read one named field that must be present.
    fn load_required<T: Load + ?Sized>(&mut self, key: FieldKey, value: &mut T) -> Result<(), CodecError> {
        if self.load_name(key)? {
            value.load(self)
        } else {
            Err(CodecError::structural(format!("missing field `{}`", key.name)))
        }
    }
}

/// A value that can be written through any [`Serializer`].
pub trait Save {
    /// Encodable as a single scalar rather than a bracketed region.
    ///
    /// Backends may use this for a more compact layout; it never changes
    /// what is decoded.
    const MINIMAL: bool = false;

    fn save<S: Serializer>(&self, s: &mut S) -> Result<(), CodecError>;

    /// Whether this value is the null state of a nullable wrapper.
    #[inline]
    fn is_null(&self) -> bool {
        false
    }
}

/// A value that can be read in place through any [`Deserializer`].
pub trait Load {
    fn load<D: Deserializer>(&mut self, d: &mut D) -> Result<(), CodecError>;

    /// Called instead of [`load`](Self::load) when a named field is missing.
    ///
    /// The default leaves the value untouched; nullable wrappers reset to null.
    #[inline]
    fn load_absent(&mut self) -> Result<(), CodecError> {
        Ok(())
    }
}

impl<T: Save + ?Sized> Save for &T {
    const MINIMAL: bool = T::MINIMAL;

    #[inline]
    fn save<S: Serializer>(&self, s: &mut S) -> Result<(), CodecError> {
        (**self).save(s)
    }

    #[inline]
    fn is_null(&self) -> bool {
        (**self).is_null()
    }
}

/// Write an object region, closing it even if `body` fails.
pub fn object<S, F>(s: &mut S, len: usize, body: F) -> Result<(), CodecError>
where
    S: Serializer,
    F: FnOnce(&mut S) -> Result<(), CodecError>,
{
    s.start_object(len)?;
    let result = body(s);
    result.and(s.end_object())
}

/// Write an array region, closing it even if `body` fails.
pub fn array<S, F>(s: &mut S, len: usize, body: F) -> Result<(), CodecError>
where
    S: Serializer,
    F: FnOnce(&mut S) -> Result<(), CodecError>,
{
    s.start_array(len)?;
    let result = body(s);
    result.and(s.end_array())
}

/// Enter a node, run `body`, and finish the node even if `body` fails.
///
/// The first error wins: a body failure is reported over a finish failure.
pub fn node<D, R, F>(d: &mut D, body: F) -> Result<R, CodecError>
where
    D: Deserializer,
    F: FnOnce(&mut D) -> Result<R, CodecError>,
{
    d.start_node()?;
    let result = body(d);
    let finished = d.finish_node();
    result.and_then(|value| finished.map(|()| value))
}

/// Enter a counted node and check its size tag against `expected`.
///
/// `body` only runs when the counts agree.
pub fn fixed_node<D, F>(d: &mut D, what: &str, expected: usize, body: F) -> Result<(), CodecError>
where
    D: Deserializer,
    F: FnOnce(&mut D) -> Result<(), CodecError>,
{
    node(d, |d| {
        let actual = d.load_size_tag()?;
        if actual != expected {
            return Err(CodecError::size_mismatch(what, expected, actual));
        }
        body(d)
    })
}
