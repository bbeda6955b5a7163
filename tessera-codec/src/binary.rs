//! Compact positional binary backend.
//!
//! ## Layout
//!
//! ```text
//! integers   fixed width, little-endian (usize/isize as 8 bytes)
//! floats     IEEE-754, little-endian
//! bool       1 byte, 0 or 1
//! string     u32 length + UTF-8 bytes
//! array      u32 element count + elements
//! object     fields in declaration order, no names, no count
//! nullable   1 byte tag: 0 = null, 1 = present + value
//! ```
//!
//! Field names are never written, so the encoding depends on declaration
//! order: reordering fields breaks compatibility.

use tessera_core::{CodecError, Deserializer, FieldKey, Format, Load, Save, Serializer};

const NULL_TAG: u8 = 0;
const PRESENT_TAG: u8 = 1;

/// Upper bound on node nesting while decoding.
pub const MAX_DEPTH: usize = 128;

/// Writes the binary layout into a byte vector.
#[derive(Debug, Default)]
pub struct BinarySerializer {
    buf: Vec<u8>,
}

impl BinarySerializer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    #[inline]
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    #[inline]
    fn put(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    fn put_len(&mut self, len: usize) -> Result<(), CodecError> {
        let len = u32::try_from(len)
            .map_err(|_| CodecError::format(format!("length {len} does not fit in u32")))?;
        self.put(&len.to_le_bytes())
    }
}

impl Serializer for BinarySerializer {
    #[inline]
    fn start_object(&mut self, _len: usize) -> Result<(), CodecError> {
        Ok(())
    }

    #[inline]
    fn end_object(&mut self) -> Result<(), CodecError> {
        Ok(())
    }

    #[inline]
    fn start_array(&mut self, len: usize) -> Result<(), CodecError> {
        self.put_len(len)
    }

    #[inline]
    fn end_array(&mut self) -> Result<(), CodecError> {
        Ok(())
    }

    #[inline]
    fn save_name(&mut self, _key: FieldKey) -> Result<(), CodecError> {
        Ok(())
    }

    #[inline]
    fn save_null(&mut self) -> Result<(), CodecError> {
        self.put(&[NULL_TAG])
    }

    #[inline]
    fn save_present(&mut self) -> Result<(), CodecError> {
        self.put(&[PRESENT_TAG])
    }

    #[inline]
    fn save_bool(&mut self, v: bool) -> Result<(), CodecError> {
        self.put(&[u8::from(v)])
    }

    fn save_i8(&mut self, v: i8) -> Result<(), CodecError> {
        self.put(&v.to_le_bytes())
    }

    fn save_i16(&mut self, v: i16) -> Result<(), CodecError> {
        self.put(&v.to_le_bytes())
    }

    fn save_i32(&mut self, v: i32) -> Result<(), CodecError> {
        self.put(&v.to_le_bytes())
    }

    fn save_i64(&mut self, v: i64) -> Result<(), CodecError> {
        self.put(&v.to_le_bytes())
    }

    fn save_u8(&mut self, v: u8) -> Result<(), CodecError> {
        self.put(&[v])
    }

    fn save_u16(&mut self, v: u16) -> Result<(), CodecError> {
        self.put(&v.to_le_bytes())
    }

    fn save_u32(&mut self, v: u32) -> Result<(), CodecError> {
        self.put(&v.to_le_bytes())
    }

    fn save_u64(&mut self, v: u64) -> Result<(), CodecError> {
        self.put(&v.to_le_bytes())
    }

    fn save_f32(&mut self, v: f32) -> Result<(), CodecError> {
        self.put(&v.to_le_bytes())
    }

    fn save_f64(&mut self, v: f64) -> Result<(), CodecError> {
        self.put(&v.to_le_bytes())
    }

    fn save_str(&mut self, v: &str) -> Result<(), CodecError> {
        self.put_len(v.len())?;
        self.put(v.as_bytes())
    }
}

/// Reads the binary layout from a byte slice.
#[derive(Debug)]
pub struct BinaryDeserializer<'a> {
    input: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> BinaryDeserializer<'a> {
    #[must_use]
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            depth: 0,
        }
    }

    /// Bytes not yet consumed.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.input.len() - self.pos
    }

    #[inline]
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Check that the whole input was consumed and every node finished.
    pub fn end(&self) -> Result<(), CodecError> {
        if self.depth != 0 {
            return Err(CodecError::structural(format!(
                "{} unfinished nodes",
                self.depth
            )));
        }
        if self.remaining() != 0 {
            return Err(CodecError::structural(format!(
                "{} trailing bytes",
                self.remaining()
            )));
        }
        Ok(())
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::UnexpectedEof {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let bytes = &self.input[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn take_len(&mut self) -> Result<usize, CodecError> {
        Ok(u32::from_le_bytes(self.take_array()?) as usize)
    }
}

macro_rules! load_le {
    ($($method:ident => $ty:ty),*) => {$(
        #[inline]
        fn $method(&mut self) -> Result<$ty, CodecError> {
            Ok(<$ty>::from_le_bytes(self.take_array()?))
        }
    )*};
}

impl Deserializer for BinaryDeserializer<'_> {
    fn start_node(&mut self) -> Result<(), CodecError> {
        if self.depth >= MAX_DEPTH {
            return Err(CodecError::structural(format!(
                "nesting exceeds {MAX_DEPTH} levels"
            )));
        }
        self.depth += 1;
        Ok(())
    }

    fn finish_node(&mut self) -> Result<(), CodecError> {
        self.depth = self
            .depth
            .checked_sub(1)
            .ok_or_else(|| CodecError::structural("finish_node without start_node"))?;
        Ok(())
    }

    #[inline]
    fn load_size_tag(&mut self) -> Result<usize, CodecError> {
        self.take_len()
    }

    #[inline]
    fn load_name(&mut self, _key: FieldKey) -> Result<bool, CodecError> {
        Ok(true)
    }

    fn load_null(&mut self) -> Result<bool, CodecError> {
        match self.take(1)?[0] {
            NULL_TAG => Ok(true),
            PRESENT_TAG => Ok(false),
            tag => Err(CodecError::format(format!("invalid null tag {tag:#04x}"))),
        }
    }

    fn load_bool(&mut self) -> Result<bool, CodecError> {
        match self.take(1)?[0] {
            0 => Ok(false),
            1 => Ok(true),
            b => Err(CodecError::format(format!("invalid bool byte {b:#04x}"))),
        }
    }

    load_le! {
        load_i8 => i8,
        load_i16 => i16,
        load_i32 => i32,
        load_i64 => i64,
        load_u8 => u8,
        load_u16 => u16,
        load_u32 => u32,
        load_u64 => u64,
        load_f32 => f32,
        load_f64 => f64
    }

    fn load_string(&mut self) -> Result<String, CodecError> {
        let len = self.take_len()?;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| CodecError::format(format!("invalid utf-8 in string: {e}")))
    }

    /// Each element takes at least one byte, so the remaining input bounds
    /// any honest element count.
    #[inline]
    fn capacity_hint(&self, declared: usize) -> usize {
        declared.min(self.remaining())
    }
}

/// The binary wire format.
///
/// ## Example
///
/// ```rust
/// use tessera_codec::Binary;
/// use tessera_core::Format;
///
/// let bytes = Binary::encode(&(7i64, "payload".to_string(), vec![1i32, 2, 3])).unwrap();
/// assert_eq!(bytes.len(), 4 + 8 + (4 + 7) + (4 + 3 * 4));
///
/// let mut back = (0i64, String::new(), Vec::<i32>::new());
/// Binary::decode(&bytes, &mut back).unwrap();
/// assert_eq!(back.1, "payload");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Binary;

impl Format for Binary {
    const NAME: &'static str = "binary";

    fn encode<T: Save + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
        let mut s = BinarySerializer::new();
        value.save(&mut s)?;
        tracing::trace!(len = s.as_bytes().len(), "binary encode");
        Ok(s.into_inner())
    }

    fn decode<T: Load + ?Sized>(bytes: &[u8], value: &mut T) -> Result<(), CodecError> {
        let mut d = BinaryDeserializer::new(bytes);
        value.load(&mut d)?;
        d.end()
    }
}
