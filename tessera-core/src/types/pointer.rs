use std::rc::Rc;
use std::sync::Arc;

use crate::error::CodecError;
use crate::traverse::{Deserializer, Load, Save, Serializer};

impl<T: Save> Save for Option<T> {
    const MINIMAL: bool = T::MINIMAL;

    fn save<S: Serializer>(&self, s: &mut S) -> Result<(), CodecError> {
        match self {
            Some(value) => {
                s.save_present()?;
                value.save(s)
            }
            None => s.save_null(),
        }
    }

    #[inline]
    fn is_null(&self) -> bool {
        self.is_none()
    }
}

impl<T: Load + Default> Load for Option<T> {
    fn load<D: Deserializer>(&mut self, d: &mut D) -> Result<(), CodecError> {
        if d.load_null()? {
            *self = None;
            return Ok(());
        }
        let mut value = T::default();
        value.load(d)?;
        *self = Some(value);
        Ok(())
    }

    #[inline]
    fn load_absent(&mut self) -> Result<(), CodecError> {
        *self = None;
        Ok(())
    }
}

impl<T: Save + ?Sized> Save for Box<T> {
    const MINIMAL: bool = T::MINIMAL;

    #[inline]
    fn save<S: Serializer>(&self, s: &mut S) -> Result<(), CodecError> {
        (**self).save(s)
    }
}

impl<T: Load + ?Sized> Load for Box<T> {
    #[inline]
    fn load<D: Deserializer>(&mut self, d: &mut D) -> Result<(), CodecError> {
        (**self).load(d)
    }
}

// Shared pointers cannot be loaded in place; decode into a fresh value and
// swap the pointer only on success.
macro_rules! shared {
    ($($ptr:ident),*) => {$(
        impl<T: Save + ?Sized> Save for $ptr<T> {
            const MINIMAL: bool = T::MINIMAL;

            #[inline]
            fn save<S: Serializer>(&self, s: &mut S) -> Result<(), CodecError> {
                (**self).save(s)
            }
        }

        impl<T: Load + Default> Load for $ptr<T> {
            fn load<D: Deserializer>(&mut self, d: &mut D) -> Result<(), CodecError> {
                let mut value = T::default();
                value.load(d)?;
                *self = $ptr::new(value);
                Ok(())
            }
        }
    )*};
}

shared!(Arc, Rc);

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::testing::{roundtrip, Token, TokenDeserializer, TokenSerializer};
    use crate::{Load, Save};

    #[test]
    fn test_option_tokens() {
        let mut s = TokenSerializer::new();
        Some(3u8).save(&mut s).unwrap();
        None::<u8>.save(&mut s).unwrap();
        assert_eq!(
            s.into_tokens(),
            vec![Token::Present, Token::U64(3), Token::Null]
        );
    }

    #[test]
    fn test_option_roundtrip() {
        assert_eq!(roundtrip(&Some(vec![1i32, 2])).unwrap(), Some(vec![1, 2]));
        assert_eq!(roundtrip(&None::<String>).unwrap(), None);
        assert_eq!(roundtrip(&Some(None::<i32>)).unwrap(), Some(None));
    }

    #[test]
    fn test_shared_pointer() {
        let shared: Option<Arc<String>> = Some(Arc::new("shared".into()));
        assert_eq!(roundtrip(&shared).unwrap(), shared);
        assert_eq!(roundtrip(&None::<Arc<String>>).unwrap(), None);
    }

    #[test]
    fn test_shared_pointer_failure_keeps_old() {
        let mut ptr = Arc::new(5i32);
        let mut d = TokenDeserializer::new(vec![Token::Str("x".into())]);
        assert!(ptr.load(&mut d).is_err());
        assert_eq!(*ptr, 5);
    }

    #[test]
    fn test_absent_resets_option() {
        let mut v = Some(1u8);
        v.load_absent().unwrap();
        assert!(v.is_none());
    }
}
