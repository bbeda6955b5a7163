//! Token-stream backend used by the unit tests.
//!
//! The serializer records every contract call as a [`Token`]; the
//! deserializer replays a token list. Names are positional: `load_name`
//! only succeeds when the next token is the expected name.

use crate::error::CodecError;
use crate::traverse::{Deserializer, FieldKey, Serializer};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    StartObject(usize),
    EndObject,
    StartArray(usize),
    EndArray,
    Name(String),
    Null,
    Present,
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    Str(String),
}

#[derive(Debug, Default)]
pub struct TokenSerializer {
    tokens: Vec<Token>,
}

impl TokenSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_tokens(self) -> Vec<Token> {
        self.tokens
    }

    fn push(&mut self, token: Token) -> Result<(), CodecError> {
        self.tokens.push(token);
        Ok(())
    }
}

impl Serializer for TokenSerializer {
    fn start_object(&mut self, len: usize) -> Result<(), CodecError> {
        self.push(Token::StartObject(len))
    }

    fn end_object(&mut self) -> Result<(), CodecError> {
        self.push(Token::EndObject)
    }

    fn start_array(&mut self, len: usize) -> Result<(), CodecError> {
        self.push(Token::StartArray(len))
    }

    fn end_array(&mut self) -> Result<(), CodecError> {
        self.push(Token::EndArray)
    }

    fn save_name(&mut self, key: FieldKey) -> Result<(), CodecError> {
        self.push(Token::Name(key.name.to_owned()))
    }

    fn save_null(&mut self) -> Result<(), CodecError> {
        self.push(Token::Null)
    }

    fn save_present(&mut self) -> Result<(), CodecError> {
        self.push(Token::Present)
    }

    fn save_bool(&mut self, v: bool) -> Result<(), CodecError> {
        self.push(Token::Bool(v))
    }

    fn save_i8(&mut self, v: i8) -> Result<(), CodecError> {
        self.push(Token::I64(v.into()))
    }

    fn save_i16(&mut self, v: i16) -> Result<(), CodecError> {
        self.push(Token::I64(v.into()))
    }

    fn save_i32(&mut self, v: i32) -> Result<(), CodecError> {
        self.push(Token::I64(v.into()))
    }

    fn save_i64(&mut self, v: i64) -> Result<(), CodecError> {
        self.push(Token::I64(v))
    }

    fn save_u8(&mut self, v: u8) -> Result<(), CodecError> {
        self.push(Token::U64(v.into()))
    }

    fn save_u16(&mut self, v: u16) -> Result<(), CodecError> {
        self.push(Token::U64(v.into()))
    }

    fn save_u32(&mut self, v: u32) -> Result<(), CodecError> {
        self.push(Token::U64(v.into()))
    }

    fn save_u64(&mut self, v: u64) -> Result<(), CodecError> {
        self.push(Token::U64(v))
    }

    fn save_f32(&mut self, v: f32) -> Result<(), CodecError> {
        self.push(Token::F64(v.into()))
    }

    fn save_f64(&mut self, v: f64) -> Result<(), CodecError> {
        self.push(Token::F64(v))
    }

    fn save_str(&mut self, v: &str) -> Result<(), CodecError> {
        self.push(Token::Str(v.to_owned()))
    }
}

#[derive(Debug)]
pub struct TokenDeserializer {
    tokens: Vec<Token>,
    pos: usize,
    sizes: Vec<usize>,
}

impl TokenDeserializer {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            sizes: Vec::new(),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos == self.tokens.len() && self.sizes.is_empty()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<Token, CodecError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(CodecError::UnexpectedEof {
                needed: 1,
                remaining: 0,
            })?;
        self.pos += 1;
        Ok(token)
    }

    fn signed(&mut self) -> Result<i64, CodecError> {
        match self.peek() {
            Some(Token::I64(v)) => {
                let v = *v;
                self.pos += 1;
                Ok(v)
            }
            Some(Token::U64(v)) => {
                let v = i64::try_from(*v).map_err(|_| CodecError::format("integer out of range"))?;
                self.pos += 1;
                Ok(v)
            }
            other => Err(CodecError::format(format!("expected integer, found {other:?}"))),
        }
    }

    fn unsigned(&mut self) -> Result<u64, CodecError> {
        match self.peek() {
            Some(Token::U64(v)) => {
                let v = *v;
                self.pos += 1;
                Ok(v)
            }
            Some(Token::I64(v)) => {
                let v = u64::try_from(*v).map_err(|_| CodecError::format("integer out of range"))?;
                self.pos += 1;
                Ok(v)
            }
            other => Err(CodecError::format(format!("expected integer, found {other:?}"))),
        }
    }
}

fn narrow<T: TryFrom<i128>>(v: i128) -> Result<T, CodecError> {
    T::try_from(v).map_err(|_| CodecError::format("integer out of range"))
}

impl Deserializer for TokenDeserializer {
    fn start_node(&mut self) -> Result<(), CodecError> {
        match self.peek() {
            Some(Token::StartObject(n) | Token::StartArray(n)) => {
                self.sizes.push(*n);
                self.pos += 1;
                Ok(())
            }
            other => Err(CodecError::format(format!("expected node, found {other:?}"))),
        }
    }

    fn finish_node(&mut self) -> Result<(), CodecError> {
        self.sizes
            .pop()
            .ok_or_else(|| CodecError::structural("finish without start"))?;

        let mut depth = 0usize;
        loop {
            match self.next()? {
                Token::StartObject(_) | Token::StartArray(_) => depth += 1,
                Token::EndObject | Token::EndArray if depth == 0 => return Ok(()),
                Token::EndObject | Token::EndArray => depth -= 1,
                _ => {}
            }
        }
    }

    fn load_size_tag(&mut self) -> Result<usize, CodecError> {
        self.sizes
            .last()
            .copied()
            .ok_or_else(|| CodecError::structural("size tag outside node"))
    }

    fn load_name(&mut self, key: FieldKey) -> Result<bool, CodecError> {
        match self.peek() {
            Some(Token::Name(name)) if name == key.name => {
                self.pos += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn load_null(&mut self) -> Result<bool, CodecError> {
        match self.peek() {
            Some(Token::Null) => {
                self.pos += 1;
                Ok(true)
            }
            Some(Token::Present) => {
                self.pos += 1;
                Ok(false)
            }
            _ => Ok(false),
        }
    }

    fn load_bool(&mut self) -> Result<bool, CodecError> {
        match self.next()? {
            Token::Bool(v) => Ok(v),
            other => Err(CodecError::format(format!("expected bool, found {other:?}"))),
        }
    }

    fn load_i8(&mut self) -> Result<i8, CodecError> {
        let v = self.signed()?;
        narrow(v.into())
    }

    fn load_i16(&mut self) -> Result<i16, CodecError> {
        let v = self.signed()?;
        narrow(v.into())
    }

    fn load_i32(&mut self) -> Result<i32, CodecError> {
        let v = self.signed()?;
        narrow(v.into())
    }

    fn load_i64(&mut self) -> Result<i64, CodecError> {
        self.signed()
    }

    fn load_u8(&mut self) -> Result<u8, CodecError> {
        let v = self.unsigned()?;
        narrow(v.into())
    }

    fn load_u16(&mut self) -> Result<u16, CodecError> {
        let v = self.unsigned()?;
        narrow(v.into())
    }

    fn load_u32(&mut self) -> Result<u32, CodecError> {
        let v = self.unsigned()?;
        narrow(v.into())
    }

    fn load_u64(&mut self) -> Result<u64, CodecError> {
        self.unsigned()
    }

    fn load_f32(&mut self) -> Result<f32, CodecError> {
        self.load_f64().map(|v| v as f32)
    }

    fn load_f64(&mut self) -> Result<f64, CodecError> {
        match self.next()? {
            Token::F64(v) => Ok(v),
            other => Err(CodecError::format(format!("expected float, found {other:?}"))),
        }
    }

    fn load_string(&mut self) -> Result<String, CodecError> {
        match self.peek() {
            Some(Token::Str(v)) => {
                let v = v.clone();
                self.pos += 1;
                Ok(v)
            }
            other => Err(CodecError::format(format!("expected string, found {other:?}"))),
        }
    }
}

/// Save `value` and replay the tokens into a fresh `T`.
pub fn roundtrip<T>(value: &T) -> Result<T, CodecError>
where
    T: crate::Save + crate::Load + Default,
{
    let mut s = TokenSerializer::new();
    value.save(&mut s)?;
    let mut d = TokenDeserializer::new(s.into_tokens());
    let mut out = T::default();
    out.load(&mut d)?;
    if !d.is_exhausted() {
        return Err(CodecError::structural("trailing tokens"));
    }
    Ok(out)
}
