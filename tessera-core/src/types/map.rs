use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

use crate::error::CodecError;
use crate::traverse::{array, node, object, Deserializer, FieldKey, Load, Save, Serializer};

// Each entry is an object `{"key": .., "value": ..}` inside the outer array.
fn save_entries<'a, S, K, V, I>(s: &mut S, len: usize, entries: I) -> Result<(), CodecError>
where
    S: Serializer,
    K: Save + 'a,
    V: Save + 'a,
    I: IntoIterator<Item = (&'a K, &'a V)>,
{
    array(s, len, |s| {
        for (key, value) in entries {
            object(s, 2, |s| {
                s.save_field(FieldKey::KEY, key)?;
                s.save_field(FieldKey::VALUE, value)
            })?;
        }
        Ok(())
    })
}

fn load_entries<D, K, V, C, M, P>(d: &mut D, make: M, mut insert: P) -> Result<C, CodecError>
where
    D: Deserializer,
    K: Load + Default,
    V: Load + Default,
    M: FnOnce(usize) -> C,
    P: FnMut(&mut C, K, V),
{
    node(d, |d| {
        let len = d.load_size_tag()?;
        let mut out = make(d.capacity_hint(len));
        for _ in 0..len {
            let (key, value) = node(d, |d| {
                let mut key = K::default();
                let mut value = V::default();
                d.load_required(FieldKey::KEY, &mut key)?;
                d.load_required(FieldKey::VALUE, &mut value)?;
                Ok((key, value))
            })?;
            insert(&mut out, key, value);
        }
        Ok(out)
    })
}

impl<K: Save, V: Save> Save for BTreeMap<K, V> {
    fn save<S: Serializer>(&self, s: &mut S) -> Result<(), CodecError> {
        save_entries(s, self.len(), self)
    }
}

impl<K, V> Load for BTreeMap<K, V>
where
    K: Load + Default + Ord,
    V: Load + Default,
{
    fn load<D: Deserializer>(&mut self, d: &mut D) -> Result<(), CodecError> {
        *self = load_entries(d, |_| BTreeMap::new(), |map: &mut BTreeMap<K, V>, k, v| {
            map.entry(k).or_insert(v);
        })?;
        Ok(())
    }
}

impl<K: Save, V: Save, H> Save for HashMap<K, V, H> {
    fn save<S: Serializer>(&self, s: &mut S) -> Result<(), CodecError> {
        save_entries(s, self.len(), self)
    }
}

impl<K, V, H> Load for HashMap<K, V, H>
where
    K: Load + Default + Eq + Hash,
    V: Load + Default,
    H: BuildHasher + Default,
{
    fn load<D: Deserializer>(&mut self, d: &mut D) -> Result<(), CodecError> {
        *self = load_entries(
            d,
            |n| HashMap::with_capacity_and_hasher(n, H::default()),
            |map: &mut HashMap<K, V, H>, k, v| {
                map.entry(k).or_insert(v);
            },
        )?;
        Ok(())
    }
}

/// An ordered map that keeps every value inserted under a key.
///
/// Values under one key keep their insertion order.
///
/// ## Example
///
/// ```rust
/// use tessera_core::MultiMap;
///
/// let mut map = MultiMap::new();
/// map.insert(1, "hello");
/// map.insert(2, "world");
/// map.insert(1, "world");
///
/// assert_eq!(map.get(&1), ["hello", "world"]);
/// assert_eq!(map.len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiMap<K, V> {
    entries: BTreeMap<K, Vec<V>>,
    len: usize,
}

impl<K: Ord, V> MultiMap<K, V> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            len: 0,
        }
    }

    /// Add `value` under `key`, keeping any existing values.
    pub fn insert(&mut self, key: K, value: V) {
        self.entries.entry(key).or_default().push(value);
        self.len += 1;
    }

    /// All values under `key`, in insertion order.
    #[must_use]
    pub fn get(&self, key: &K) -> &[V] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of values under `key`.
    #[inline]
    #[must_use]
    pub fn count(&self, key: &K) -> usize {
        self.get(key).len()
    }

    /// Remove every value under `key`.
    pub fn remove(&mut self, key: &K) -> Vec<V> {
        let removed = self.entries.remove(key).unwrap_or_default();
        self.len -= removed.len();
        removed
    }

    /// Total number of entries.
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

    /// Number of distinct keys.
    #[inline]
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.entries.len()
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries
            .iter()
            .flat_map(|(key, values)| values.iter().map(move |value| (key, value)))
    }
}

impl<K: Ord, V> Default for MultiMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord, V> FromIterator<(K, V)> for MultiMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl<K: Save + Ord, V: Save> Save for MultiMap<K, V> {
    fn save<S: Serializer>(&self, s: &mut S) -> Result<(), CodecError> {
        save_entries(s, self.len, self.iter())
    }
}

impl<K, V> Load for MultiMap<K, V>
where
    K: Load + Default + Ord,
    V: Load + Default,
{
    fn load<D: Deserializer>(&mut self, d: &mut D) -> Result<(), CodecError> {
        *self = load_entries(d, |_| MultiMap::new(), MultiMap::insert)?;
        Ok(())
    }
}
