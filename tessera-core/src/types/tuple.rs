use crate::error::CodecError;
use crate::traverse::{array, fixed_node, node, object, Deserializer, FieldKey, Load, Save, Serializer};

// Tuples are fixed-length arrays. A size tag that differs from the arity
// fails before any element is read.
macro_rules! tuple {
    ($len:expr => $($name:ident $idx:tt),+) => {
        impl<$($name: Save),+> Save for ($($name,)+) {
            fn save<S: Serializer>(&self, s: &mut S) -> Result<(), CodecError> {
                array(s, $len, |s| {
                    $(self.$idx.save(s)?;)+
                    Ok(())
                })
            }
        }

        impl<$($name: Load),+> Load for ($($name,)+) {
            fn load<D: Deserializer>(&mut self, d: &mut D) -> Result<(), CodecError> {
                fixed_node(d, "tuple", $len, |d| {
                    $(self.$idx.load(d)?;)+
                    Ok(())
                })
            }
        }
    };
}

tuple!(1 => A 0);
tuple!(2 => A 0, B 1);
tuple!(3 => A 0, B 1, C 2);
tuple!(4 => A 0, B 1, C 2, E 3);
tuple!(5 => A 0, B 1, C 2, E 3, F 4);
tuple!(6 => A 0, B 1, C 2, E 3, F 4, G 5);
tuple!(7 => A 0, B 1, C 2, E 3, F 4, G 5, H 6);
tuple!(8 => A 0, B 1, C 2, E 3, F 4, G 5, H 6, I 7);

/// A two-field object `{"first": .., "second": ..}`.
///
/// Use this instead of a 2-tuple when the halves should be named on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pair<A, B> {
    pub first: A,
    pub second: B,
}

impl<A, B> Pair<A, B> {
    #[inline]
    #[must_use]
    pub const fn new(first: A, second: B) -> Self {
        Self { first, second }
    }

    #[inline]
    #[must_use]
    pub fn into_tuple(self) -> (A, B) {
        (self.first, self.second)
    }
}

impl<A, B> From<(A, B)> for Pair<A, B> {
    fn from((first, second): (A, B)) -> Self {
        Self { first, second }
    }
}

impl<A: Save, B: Save> Save for Pair<A, B> {
    fn save<S: Serializer>(&self, s: &mut S) -> Result<(), CodecError> {
        object(s, 2, |s| {
            s.save_field(FieldKey::FIRST, &self.first)?;
            s.save_field(FieldKey::SECOND, &self.second)
        })
    }
}

impl<A: Load + Default, B: Load + Default> Load for Pair<A, B> {
    fn load<D: Deserializer>(&mut self, d: &mut D) -> Result<(), CodecError> {
        let mut first = A::default();
        let mut second = B::default();
        node(d, |d| {
            d.load_required(FieldKey::FIRST, &mut first)?;
            d.load_required(FieldKey::SECOND, &mut second)
        })?;
        self.first = first;
        self.second = second;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Pair;
    use crate::error::CodecError;
    use crate::testing::{roundtrip, Token, TokenDeserializer};
    use crate::Load;

    #[test]
    fn test_tuple_roundtrip() {
        let t = (1u8, "two".to_string(), vec![3.0f64]);
        assert_eq!(roundtrip(&t).unwrap(), t);

        let wide = (1i8, 2i16, 3i32, 4i64, 5u8, 6u16, 7u32, 8u64);
        assert_eq!(roundtrip(&wide).unwrap(), wide);
    }

    #[test]
    fn test_tuple_arity_mismatch() {
        let mut d = TokenDeserializer::new(vec![
            Token::StartArray(3),
            Token::I64(10),
            Token::I64(20),
            Token::I64(30),
            Token::EndArray,
        ]);
        let mut t = (1i32, 2i32);
        let err = t.load(&mut d).unwrap_err();
        assert!(matches!(err, CodecError::StructuralMismatch(_)));
        assert_eq!(t, (1, 2));
        assert!(d.is_exhausted());
    }

    #[test]
    fn test_pair_roundtrip() {
        let p = Pair::new(7u32, "seven".to_string());
        assert_eq!(roundtrip(&p).unwrap(), p);
        assert_eq!(Pair::from((1, 2)).into_tuple(), (1, 2));
    }
}
