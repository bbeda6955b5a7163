use std::collections::{btree_map, BTreeMap, BTreeSet, HashSet};
use std::hash::{BuildHasher, Hash};

use crate::error::CodecError;
use crate::traverse::{Deserializer, Load, Save, Serializer};
use crate::types::seq::{load_seq, save_seq};

impl<T: Save> Save for BTreeSet<T> {
    fn save<S: Serializer>(&self, s: &mut S) -> Result<(), CodecError> {
        save_seq(s, self.len(), self)
    }
}

impl<T: Load + Default + Ord> Load for BTreeSet<T> {
    fn load<D: Deserializer>(&mut self, d: &mut D) -> Result<(), CodecError> {
        *self = load_seq(d, |_| BTreeSet::new(), |set: &mut BTreeSet<T>, item| {
            set.insert(item);
        })?;
        Ok(())
    }
}

impl<T: Save, H> Save for HashSet<T, H> {
    fn save<S: Serializer>(&self, s: &mut S) -> Result<(), CodecError> {
        save_seq(s, self.len(), self)
    }
}

impl<T, H> Load for HashSet<T, H>
where
    T: Load + Default + Eq + Hash,
    H: BuildHasher + Default,
{
    fn load<D: Deserializer>(&mut self, d: &mut D) -> Result<(), CodecError> {
        *self = load_seq(
            d,
            |n| HashSet::with_capacity_and_hasher(n, H::default()),
            |set: &mut HashSet<T, H>, item| {
                set.insert(item);
            },
        )?;
        Ok(())
    }
}

/// An ordered set that keeps duplicate elements.
///
/// Encoded like any other sequence, one element per occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiSet<T> {
    counts: BTreeMap<T, usize>,
    len: usize,
}

impl<T: Ord> MultiSet<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            counts: BTreeMap::new(),
            len: 0,
        }
    }

    /// Add one occurrence of `value`.
    pub fn insert(&mut self, value: T) {
        *self.counts.entry(value).or_insert(0) += 1;
        self.len += 1;
    }

    /// Remove one occurrence of `value`. Returns `false` if there was none.
    pub fn remove(&mut self, value: &T) -> bool {
        match self.counts.get_mut(value) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                self.counts.remove(value);
            }
            None => return false,
        }
        self.len -= 1;
        true
    }

    /// Number of occurrences of `value`.
    #[inline]
    #[must_use]
    pub fn count(&self, value: &T) -> usize {
        self.counts.get(value).copied().unwrap_or(0)
    }

    /// Total number of occurrences.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate in order, repeating each element by its count.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.counts
            .iter()
            .flat_map(|(value, count)| std::iter::repeat(value).take(*count))
    }

    /// Iterate distinct elements with their counts.
    pub fn counts(&self) -> btree_map::Iter<'_, T, usize> {
        self.counts.iter()
    }
}

impl<T: Ord> Default for MultiSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord> FromIterator<T> for MultiSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        for value in iter {
            set.insert(value);
        }
        set
    }
}

impl<T: Save + Ord> Save for MultiSet<T> {
    fn save<S: Serializer>(&self, s: &mut S) -> Result<(), CodecError> {
        save_seq(s, self.len, self.iter())
    }
}

impl<T: Load + Default + Ord> Load for MultiSet<T> {
    fn load<D: Deserializer>(&mut self, d: &mut D) -> Result<(), CodecError> {
        *self = load_seq(d, |_| MultiSet::new(), MultiSet::insert)?;
        Ok(())
    }
}
