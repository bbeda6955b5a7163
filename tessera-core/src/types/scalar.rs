use crate::error::CodecError;
use crate::traverse::{Deserializer, Load, Save, Serializer};

macro_rules! scalar {
    ($($ty:ty => $save:ident, $load:ident;)*) => {$(
        impl Save for $ty {
            const MINIMAL: bool = true;

            #[inline]
            fn save<S: Serializer>(&self, s: &mut S) -> Result<(), CodecError> {
                s.$save(*self)
            }
        }

        impl Load for $ty {
            #[inline]
            fn load<D: Deserializer>(&mut self, d: &mut D) -> Result<(), CodecError> {
                *self = d.$load()?;
                Ok(())
            }
        }
    )*};
}

scalar! {
    bool => save_bool, load_bool;
    i8 => save_i8, load_i8;
    i16 => save_i16, load_i16;
    i32 => save_i32, load_i32;
    i64 => save_i64, load_i64;
    u8 => save_u8, load_u8;
    u16 => save_u16, load_u16;
    u32 => save_u32, load_u32;
    u64 => save_u64, load_u64;
    f32 => save_f32, load_f32;
    f64 => save_f64, load_f64;
}

// Pointer-sized integers travel as 64-bit so the wire does not depend on the host.
impl Save for usize {
    const MINIMAL: bool = true;

    #[inline]
    fn save<S: Serializer>(&self, s: &mut S) -> Result<(), CodecError> {
        s.save_u64(*self as u64)
    }
}

impl Load for usize {
    fn load<D: Deserializer>(&mut self, d: &mut D) -> Result<(), CodecError> {
        let v = d.load_u64()?;
        *self = usize::try_from(v).map_err(|_| CodecError::format(format!("{v} overflows usize")))?;
        Ok(())
    }
}

impl Save for isize {
    const MINIMAL: bool = true;

    #[inline]
    fn save<S: Serializer>(&self, s: &mut S) -> Result<(), CodecError> {
        s.save_i64(*self as i64)
    }
}

impl Load for isize {
    fn load<D: Deserializer>(&mut self, d: &mut D) -> Result<(), CodecError> {
        let v = d.load_i64()?;
        *self = isize::try_from(v).map_err(|_| CodecError::format(format!("{v} overflows isize")))?;
        Ok(())
    }
}

impl Save for str {
    const MINIMAL: bool = true;

    #[inline]
    fn save<S: Serializer>(&self, s: &mut S) -> Result<(), CodecError> {
        s.save_str(self)
    }
}

impl Save for String {
    const MINIMAL: bool = true;

    #[inline]
    fn save<S: Serializer>(&self, s: &mut S) -> Result<(), CodecError> {
        s.save_str(self)
    }
}

impl Load for String {
    #[inline]
    fn load<D: Deserializer>(&mut self, d: &mut D) -> Result<(), CodecError> {
        *self = d.load_string()?;
        Ok(())
    }
}

impl Save for char {
    const MINIMAL: bool = true;

    fn save<S: Serializer>(&self, s: &mut S) -> Result<(), CodecError> {
        let mut buf = [0u8; 4];
        s.save_str(self.encode_utf8(&mut buf))
    }
}

impl Load for char {
    fn load<D: Deserializer>(&mut self, d: &mut D) -> Result<(), CodecError> {
        let text = d.load_string()?;
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => {
                *self = c;
                Ok(())
            }
            _ => Err(CodecError::format(format!(
                "expected a single character, found {text:?}"
            ))),
        }
    }
}

impl Save for () {
    const MINIMAL: bool = false;

    #[inline]
    fn save<S: Serializer>(&self, s: &mut S) -> Result<(), CodecError> {
        s.save_null()
    }
}

impl Load for () {
    fn load<D: Deserializer>(&mut self, d: &mut D) -> Result<(), CodecError> {
        if d.load_null()? {
            Ok(())
        } else {
            Err(CodecError::format("expected null for unit"))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{roundtrip, Token, TokenDeserializer};
    use crate::Load;

    #[test]
    fn test_scalar_roundtrip() {
        assert_eq!(roundtrip(&-5i8).unwrap(), -5);
        assert_eq!(roundtrip(&u64::MAX).unwrap(), u64::MAX);
        assert_eq!(roundtrip(&1.5f32).unwrap(), 1.5);
        assert_eq!(roundtrip(&usize::MAX).unwrap(), usize::MAX);
        assert_eq!(roundtrip(&'ß').unwrap(), 'ß');
        assert_eq!(roundtrip(&"héllo".to_string()).unwrap(), "héllo");
        roundtrip(&()).unwrap();
    }

    #[test]
    fn test_narrowing_fails() {
        let mut d = TokenDeserializer::new(vec![Token::I64(300)]);
        let mut v = 7u8;
        assert!(v.load(&mut d).is_err());
        assert_eq!(v, 7);
    }

    #[test]
    fn test_char_rejects_multiple() {
        let mut d = TokenDeserializer::new(vec![Token::Str("ab".into())]);
        let mut c = 'z';
        assert!(c.load(&mut d).is_err());
        assert_eq!(c, 'z');
    }
}
