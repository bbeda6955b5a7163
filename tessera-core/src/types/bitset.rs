use std::fmt;
use std::str::FromStr;

use crate::error::CodecError;
use crate::traverse::{Deserializer, Load, Save, Serializer};

/// A fixed-width bit vector.
///
/// Encoded as an `N`-character string of `'0'`/`'1'`, most significant bit
/// (index `N - 1`) first.
///
/// ## Example
///
/// ```rust
/// use tessera_core::BitSet;
///
/// let mut flags = BitSet::<4>::new();
/// flags.set(0, true);
/// flags.set(3, true);
/// assert_eq!(flags.to_string(), "1001");
/// assert_eq!("1001".parse::<BitSet<4>>().unwrap(), flags);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitSet<const N: usize> {
    bits: [bool; N],
}

impl<const N: usize> BitSet<N> {
    /// All bits cleared.
    #[must_use]
    pub const fn new() -> Self {
        Self { bits: [false; N] }
    }

    /// Number of bits.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> usize {
        N
    }

    /// Read bit `index`. Out-of-range indexes read as `false`.
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> bool {
        self.bits.get(index).copied().unwrap_or(false)
    }

    /// Set bit `index`. Out-of-range indexes are ignored.
    #[inline]
    pub fn set(&mut self, index: usize, value: bool) {
        if let Some(bit) = self.bits.get_mut(index) {
            *bit = value;
        }
    }

    /// Number of set bits.
    #[must_use]
    pub fn count_ones(&self) -> usize {
        self.bits.iter().filter(|bit| **bit).count()
    }
}

impl<const N: usize> Default for BitSet<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Display for BitSet<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bit in self.bits.iter().rev() {
            f.write_str(if *bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl<const N: usize> fmt::Debug for BitSet<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitSet<{N}>({self})")
    }
}

impl<const N: usize> FromStr for BitSet<N> {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != N {
            return Err(CodecError::format(format!(
                "bitset expects {N} characters, found {}",
                s.len()
            )));
        }

        let mut out = Self::new();
        for (i, c) in s.bytes().rev().enumerate() {
            out.bits[i] = match c {
                b'0' => false,
                b'1' => true,
                other => {
                    return Err(CodecError::format(format!(
                        "bitset character {:?} is not '0' or '1'",
                        char::from(other)
                    )))
                }
            };
        }
        Ok(out)
    }
}

impl<const N: usize> Save for BitSet<N> {
    const MINIMAL: bool = true;

    fn save<S: Serializer>(&self, s: &mut S) -> Result<(), CodecError> {
        s.save_str(&self.to_string())
    }
}

impl<const N: usize> Load for BitSet<N> {
    fn load<D: Deserializer>(&mut self, d: &mut D) -> Result<(), CodecError> {
        *self = d.load_string()?.parse()?;
        Ok(())
    }
}
