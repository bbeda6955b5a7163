//! Save/load adapters for std types and the extra container shapes
//! ([`MultiMap`], [`MultiSet`], [`Pair`], [`BitSet`]).
//!
//! Every adapter is written against the traversal contract only.

mod atomic;
mod bitset;
mod map;
mod pointer;
mod scalar;
mod seq;
mod set;
mod tuple;

pub use bitset::BitSet;
pub use map::MultiMap;
pub use set::MultiSet;
pub use tuple::Pair;
