//! JSON tree backend over `serde_json::Value`.
//!
//! Structures become objects keyed by their declared field names. Loading is
//! name-addressed: field order does not matter, unknown fields are ignored,
//! and missing fields keep their current value (nullable fields reset to
//! null). Null nullable fields are omitted on save.

use std::io::Read;

use serde_json::{Map, Value};
use tessera_core::{CodecError, Deserializer, FieldKey, Format, Load, Save, Serializer};

enum Frame {
    Array(Vec<Value>),
    Object {
        map: Map<String, Value>,
        pending: Option<&'static str>,
    },
}

/// Builds a `serde_json::Value` tree.
#[derive(Default)]
pub struct JsonSerializer {
    stack: Vec<Frame>,
    root: Option<Value>,
}

impl JsonSerializer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The finished tree.
    pub fn into_value(self) -> Result<Value, CodecError> {
        if !self.stack.is_empty() {
            return Err(CodecError::structural(format!(
                "{} unclosed regions",
                self.stack.len()
            )));
        }
        self.root
            .ok_or_else(|| CodecError::structural("nothing was serialized"))
    }

    fn emit(&mut self, value: Value) -> Result<(), CodecError> {
        match self.stack.last_mut() {
            Some(Frame::Array(items)) => {
                items.push(value);
                Ok(())
            }
            Some(Frame::Object { map, pending }) => {
                let key = pending
                    .take()
                    .ok_or_else(|| CodecError::structural("object value without a field name"))?;
                map.insert(key.to_owned(), value);
                Ok(())
            }
            None if self.root.is_some() => Err(CodecError::structural("more than one root value")),
            None => {
                self.root = Some(value);
                Ok(())
            }
        }
    }
}

/// JSON has no spelling for NaN or the infinities; `serde_json` would write `null`.
fn finite(is_finite: bool, v: impl std::fmt::Display) -> Result<(), CodecError> {
    if is_finite {
        Ok(())
    } else {
        Err(CodecError::format(format!("non-finite float {v} has no JSON form")))
    }
}

impl Serializer for JsonSerializer {
    fn start_object(&mut self, _len: usize) -> Result<(), CodecError> {
        self.stack.push(Frame::Object {
            map: Map::new(),
            pending: None,
        });
        Ok(())
    }

    fn end_object(&mut self) -> Result<(), CodecError> {
        match self.stack.pop() {
            Some(Frame::Object { map, .. }) => self.emit(Value::Object(map)),
            _ => Err(CodecError::structural("end_object without start_object")),
        }
    }

    fn start_array(&mut self, len: usize) -> Result<(), CodecError> {
        self.stack.push(Frame::Array(Vec::with_capacity(len.min(4096))));
        Ok(())
    }

    fn end_array(&mut self) -> Result<(), CodecError> {
        match self.stack.pop() {
            Some(Frame::Array(items)) => self.emit(Value::Array(items)),
            _ => Err(CodecError::structural("end_array without start_array")),
        }
    }

    fn save_name(&mut self, key: FieldKey) -> Result<(), CodecError> {
        match self.stack.last_mut() {
            Some(Frame::Object { pending, .. }) => {
                *pending = Some(key.name);
                Ok(())
            }
            _ => Err(CodecError::structural(format!(
                "field `{}` outside an object",
                key.name
            ))),
        }
    }

    fn save_null(&mut self) -> Result<(), CodecError> {
        self.emit(Value::Null)
    }

    fn save_bool(&mut self, v: bool) -> Result<(), CodecError> {
        self.emit(Value::Bool(v))
    }

    fn save_i8(&mut self, v: i8) -> Result<(), CodecError> {
        self.emit(v.into())
    }

    fn save_i16(&mut self, v: i16) -> Result<(), CodecError> {
        self.emit(v.into())
    }

    fn save_i32(&mut self, v: i32) -> Result<(), CodecError> {
        self.emit(v.into())
    }

    fn save_i64(&mut self, v: i64) -> Result<(), CodecError> {
        self.emit(v.into())
    }

    fn save_u8(&mut self, v: u8) -> Result<(), CodecError> {
        self.emit(v.into())
    }

    fn save_u16(&mut self, v: u16) -> Result<(), CodecError> {
        self.emit(v.into())
    }

    fn save_u32(&mut self, v: u32) -> Result<(), CodecError> {
        self.emit(v.into())
    }

    fn save_u64(&mut self, v: u64) -> Result<(), CodecError> {
        self.emit(v.into())
    }

    fn save_f32(&mut self, v: f32) -> Result<(), CodecError> {
        finite(v.is_finite(), v)?;
        self.emit(v.into())
    }

    fn save_f64(&mut self, v: f64) -> Result<(), CodecError> {
        finite(v.is_finite(), v)?;
        self.emit(v.into())
    }

    fn save_str(&mut self, v: &str) -> Result<(), CodecError> {
        self.emit(Value::String(v.to_owned()))
    }

    fn save_field<T: Save + ?Sized>(&mut self, key: FieldKey, value: &T) -> Result<(), CodecError> {
        if value.is_null() {
            return Ok(());
        }
        self.save_name(key)?;
        value.save(self)
    }
}

enum Cursor<'a> {
    Array { items: &'a [Value], next: usize },
    Object(&'a Map<String, Value>),
}

/// Walks a borrowed `serde_json::Value` tree.
pub struct JsonDeserializer<'a> {
    stack: Vec<Cursor<'a>>,
    pending: Option<&'a Value>,
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn unexpected(expected: &str, found: &Value) -> CodecError {
    CodecError::format(format!("expected {expected}, found {}", kind(found)))
}

fn narrow<T: TryFrom<i128>>(v: i128) -> Result<T, CodecError> {
    T::try_from(v).map_err(|_| CodecError::format(format!("integer {v} out of range")))
}

impl<'a> JsonDeserializer<'a> {
    #[must_use]
    pub fn new(root: &'a Value) -> Self {
        Self {
            stack: Vec::new(),
            pending: Some(root),
        }
    }

    fn peek(&self) -> Option<&'a Value> {
        if let Some(value) = self.pending {
            return Some(value);
        }
        match self.stack.last() {
            Some(Cursor::Array { items, next }) => items.get(*next),
            _ => None,
        }
    }

    fn next_value(&mut self) -> Result<&'a Value, CodecError> {
        if let Some(value) = self.pending.take() {
            return Ok(value);
        }
        match self.stack.last_mut() {
            Some(Cursor::Array { items, next }) => {
                let value = items
                    .get(*next)
                    .ok_or_else(|| CodecError::structural("read past the end of an array"))?;
                *next += 1;
                Ok(value)
            }
            Some(Cursor::Object(_)) => Err(CodecError::structural("object value read without a field name")),
            None => Err(CodecError::structural("no value left to read")),
        }
    }

    fn signed(&mut self) -> Result<i128, CodecError> {
        let value = self.next_value()?;
        value
            .as_i64()
            .map(i128::from)
            .or_else(|| value.as_u64().map(i128::from))
            .ok_or_else(|| unexpected("integer", value))
    }

    fn float(&mut self) -> Result<f64, CodecError> {
        let value = self.next_value()?;
        value.as_f64().ok_or_else(|| unexpected("number", value))
    }
}

impl Deserializer for JsonDeserializer<'_> {
    fn start_node(&mut self) -> Result<(), CodecError> {
        let cursor = match self.next_value()? {
            Value::Array(items) => Cursor::Array { items, next: 0 },
            Value::Object(map) => Cursor::Object(map),
            other => return Err(unexpected("array or object", other)),
        };
        self.stack.push(cursor);
        Ok(())
    }

    fn finish_node(&mut self) -> Result<(), CodecError> {
        self.pending = None;
        self.stack
            .pop()
            .map(|_| ())
            .ok_or_else(|| CodecError::structural("finish_node without start_node"))
    }

    fn load_size_tag(&mut self) -> Result<usize, CodecError> {
        match self.stack.last() {
            Some(Cursor::Array { items, .. }) => Ok(items.len()),
            Some(Cursor::Object(map)) => Ok(map.len()),
            None => Err(CodecError::structural("size tag outside a node")),
        }
    }

    fn load_name(&mut self, key: FieldKey) -> Result<bool, CodecError> {
        match self.stack.last() {
            Some(Cursor::Object(map)) => {
                self.pending = map.get(key.name);
                Ok(self.pending.is_some())
            }
            _ => Err(CodecError::structural(format!(
                "field `{}` outside an object",
                key.name
            ))),
        }
    }

    fn load_null(&mut self) -> Result<bool, CodecError> {
        if let Some(Value::Null) = self.peek() {
            self.next_value()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn load_bool(&mut self) -> Result<bool, CodecError> {
        let value = self.next_value()?;
        value.as_bool().ok_or_else(|| unexpected("bool", value))
    }

    fn load_i8(&mut self) -> Result<i8, CodecError> {
        let v = self.signed()?;
        narrow(v)
    }

    fn load_i16(&mut self) -> Result<i16, CodecError> {
        let v = self.signed()?;
        narrow(v)
    }

    fn load_i32(&mut self) -> Result<i32, CodecError> {
        let v = self.signed()?;
        narrow(v)
    }

    fn load_i64(&mut self) -> Result<i64, CodecError> {
        let v = self.signed()?;
        narrow(v)
    }

    fn load_u8(&mut self) -> Result<u8, CodecError> {
        let v = self.signed()?;
        narrow(v)
    }

    fn load_u16(&mut self) -> Result<u16, CodecError> {
        let v = self.signed()?;
        narrow(v)
    }

    fn load_u32(&mut self) -> Result<u32, CodecError> {
        let v = self.signed()?;
        narrow(v)
    }

    fn load_u64(&mut self) -> Result<u64, CodecError> {
        let v = self.signed()?;
        narrow(v)
    }

    fn load_f32(&mut self) -> Result<f32, CodecError> {
        self.float().map(|v| v as f32)
    }

    fn load_f64(&mut self) -> Result<f64, CodecError> {
        self.float()
    }

    fn load_string(&mut self) -> Result<String, CodecError> {
        let value = self.next_value()?;
        value
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| unexpected("string", value))
    }
}

/// The JSON wire format.
///
/// ## Example
///
/// ```rust
/// use tessera_codec::Json;
/// use tessera_core::Format;
///
/// let bytes = Json::encode(&vec![Some(1u8), None]).unwrap();
/// assert_eq!(bytes, b"[1,null]");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

impl Json {
    /// Serialize into a `serde_json::Value`.
    pub fn to_value<T: Save + ?Sized>(value: &T) -> Result<Value, CodecError> {
        let mut s = JsonSerializer::new();
        value.save(&mut s)?;
        s.into_value()
    }

    /// Load from a `serde_json::Value`.
    pub fn from_value<T: Load + ?Sized>(tree: &Value, value: &mut T) -> Result<(), CodecError> {
        let mut d = JsonDeserializer::new(tree);
        value.load(&mut d)
    }

    /// Serialize into indented JSON text.
    pub fn to_string_pretty<T: Save + ?Sized>(value: &T) -> Result<String, CodecError> {
        serde_json::to_string_pretty(&Self::to_value(value)?)
            .map_err(|e| CodecError::format(e.to_string()))
    }

    /// Load from any reader without buffering the text first.
    pub fn decode_reader<T: Load + ?Sized, R: Read>(reader: R, value: &mut T) -> Result<(), CodecError> {
        let tree: Value =
            serde_json::from_reader(reader).map_err(|e| CodecError::format(e.to_string()))?;
        Self::from_value(&tree, value)
    }
}

impl Format for Json {
    const NAME: &'static str = "json";

    fn encode<T: Save + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
        let bytes = serde_json::to_vec(&Self::to_value(value)?)
            .map_err(|e| CodecError::format(e.to_string()))?;
        tracing::trace!(len = bytes.len(), "json encode");
        Ok(bytes)
    }

    fn decode<T: Load + ?Sized>(bytes: &[u8], value: &mut T) -> Result<(), CodecError> {
        let tree: Value =
            serde_json::from_slice(bytes).map_err(|e| CodecError::format(e.to_string()))?;
        Self::from_value(&tree, value)
    }
}
