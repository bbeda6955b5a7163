use std::collections::{LinkedList, VecDeque};

use crate::error::CodecError;
use crate::traverse::{array, fixed_node, node, Deserializer, Load, Save, Serializer};

/// Write `len` elements as one counted region.
pub(crate) fn save_seq<'a, S, T, I>(s: &mut S, len: usize, items: I) -> Result<(), CodecError>
where
    S: Serializer,
    T: Save + 'a,
    I: IntoIterator<Item = &'a T>,
{
    array(s, len, |s| {
        for item in items {
            item.save(s)?;
        }
        Ok(())
    })
}

/// Read a counted region into a fresh container.
///
/// Stops at the first element failure; the node is still finished and the
/// partially filled container is dropped.
pub(crate) fn load_seq<D, T, C, M, P>(d: &mut D, make: M, mut push: P) -> Result<C, CodecError>
where
    D: Deserializer,
    T: Load + Default,
    M: FnOnce(usize) -> C,
    P: FnMut(&mut C, T),
{
    node(d, |d| {
        let len = d.load_size_tag()?;
        let mut out = make(d.capacity_hint(len));
        for _ in 0..len {
            let mut item = T::default();
            item.load(d)?;
            push(&mut out, item);
        }
        Ok(out)
    })
}

impl<T: Save> Save for [T] {
    fn save<S: Serializer>(&self, s: &mut S) -> Result<(), CodecError> {
        save_seq(s, self.len(), self)
    }
}

impl<T: Save> Save for Vec<T> {
    #[inline]
    fn save<S: Serializer>(&self, s: &mut S) -> Result<(), CodecError> {
        self.as_slice().save(s)
    }
}

impl<T: Load + Default> Load for Vec<T> {
    fn load<D: Deserializer>(&mut self, d: &mut D) -> Result<(), CodecError> {
        *self = load_seq(d, Vec::with_capacity, Vec::push)?;
        Ok(())
    }
}

impl<T: Save> Save for VecDeque<T> {
    fn save<S: Serializer>(&self, s: &mut S) -> Result<(), CodecError> {
        save_seq(s, self.len(), self)
    }
}

impl<T: Load + Default> Load for VecDeque<T> {
    fn load<D: Deserializer>(&mut self, d: &mut D) -> Result<(), CodecError> {
        *self = load_seq(d, VecDeque::with_capacity, VecDeque::push_back)?;
        Ok(())
    }
}

impl<T: Save> Save for LinkedList<T> {
    fn save<S: Serializer>(&self, s: &mut S) -> Result<(), CodecError> {
        save_seq(s, self.len(), self)
    }
}

impl<T: Load + Default> Load for LinkedList<T> {
    fn load<D: Deserializer>(&mut self, d: &mut D) -> Result<(), CodecError> {
        *self = load_seq(d, |_| LinkedList::new(), LinkedList::push_back)?;
        Ok(())
    }
}

impl<T: Save, const N: usize> Save for [T; N] {
    #[inline]
    fn save<S: Serializer>(&self, s: &mut S) -> Result<(), CodecError> {
        save_seq(s, N, self)
    }
}

impl<T: Load, const N: usize> Load for [T; N] {
    fn load<D: Deserializer>(&mut self, d: &mut D) -> Result<(), CodecError> {
        fixed_node(d, "array", N, |d| {
            for item in self.iter_mut() {
                item.load(d)?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{LinkedList, VecDeque};

    use crate::error::CodecError;
    use crate::testing::{roundtrip, Token, TokenDeserializer, TokenSerializer};
    use crate::{Load, Save};

    #[test]
    fn test_vec_roundtrip() {
        let v = vec![vec![1i32, 2], vec![], vec![3]];
        assert_eq!(roundtrip(&v).unwrap(), v);

        let q: VecDeque<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        assert_eq!(roundtrip(&q).unwrap(), q);

        let l: LinkedList<u8> = [1, 2, 3].into_iter().collect();
        assert_eq!(roundtrip(&l).unwrap(), l);
    }

    #[test]
    fn test_vec_tokens() {
        let mut s = TokenSerializer::new();
        vec![1u8, 2].save(&mut s).unwrap();
        assert_eq!(
            s.into_tokens(),
            vec![
                Token::StartArray(2),
                Token::U64(1),
                Token::U64(2),
                Token::EndArray
            ]
        );
    }

    #[test]
    fn test_vec_element_failure_keeps_target() {
        let mut d = TokenDeserializer::new(vec![
            Token::StartArray(2),
            Token::I64(1),
            Token::Str("x".into()),
            Token::EndArray,
        ]);
        let mut v = vec![9i32];
        assert!(v.load(&mut d).is_err());
        assert_eq!(v, vec![9]);
        assert!(d.is_exhausted());
    }

    #[test]
    fn test_fixed_array_size_mismatch() {
        let mut d = TokenDeserializer::new(vec![
            Token::StartArray(2),
            Token::I64(1),
            Token::I64(2),
            Token::EndArray,
        ]);
        let mut a = [7i32; 3];
        let err = a.load(&mut d).unwrap_err();
        assert!(matches!(err, CodecError::StructuralMismatch(_)));
        assert_eq!(a, [7, 7, 7]);

        assert_eq!(roundtrip(&[4u16, 5, 6]).unwrap(), [4, 5, 6]);
    }
}
