//! A fixed-universe, word-packed bit set generic over any
//! `cranelift_entity::EntityRef` key.
//!
//! The recursive predecessor/successor sets and
//! the tracker's per-type live-register sets are both
//! dense over a universe fixed at prepare time, so a plain `Vec<u64>`
//! word vector (the same layout the original scheduler's `BitVector`
//! uses, just in Rust) is a better fit than a sparse/hierarchical set
//! like `hibitset` — there is no sparsity to exploit once the universe
//! size is fixed up front, and one bitset type serving both roles beats
//! pulling in a second bitset crate for the second role.

use cranelift_entity::EntityRef;
use std::marker::PhantomData;

const BITS_PER_WORD: usize = 64;

/// A bit set over `0..capacity` keys of type `K`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IndexBitSet<K: EntityRef> {
    words: Vec<u64>,
    capacity: usize,
    _marker: PhantomData<K>,
}

impl<K: EntityRef> IndexBitSet<K> {
    pub fn new(capacity: usize) -> Self {
        IndexBitSet {
            words: vec![0u64; (capacity + BITS_PER_WORD - 1) / BITS_PER_WORD],
            capacity,
            _marker: PhantomData,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    fn word_bit(key: K) -> (usize, u64) {
        let idx = key.index();
        (idx / BITS_PER_WORD, 1u64 << (idx % BITS_PER_WORD))
    }

    pub fn contains(&self, key: K) -> bool {
        let (w, bit) = Self::word_bit(key);
        self.words.get(w).map_or(false, |word| word & bit != 0)
    }

    /// Returns `true` if the bit transitioned from unset to set.
    pub fn insert(&mut self, key: K) -> bool {
        let (w, bit) = Self::word_bit(key);
        let word = &mut self.words[w];
        let was_set = *word & bit != 0;
        *word |= bit;
        !was_set
    }

    /// Returns `true` if the bit transitioned from set to unset.
    pub fn remove(&mut self, key: K) -> bool {
        let (w, bit) = Self::word_bit(key);
        let word = &mut self.words[w];
        let was_set = *word & bit != 0;
        *word &= !bit;
        was_set
    }

    pub fn clear(&mut self) {
        for w in &mut self.words {
            *w = 0;
        }
    }

    pub fn count(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// In-place union: `self |= other`.
    pub fn union_with(&mut self, other: &IndexBitSet<K>) {
        debug_assert_eq!(self.words.len(), other.words.len());
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            *a |= b;
        }
    }

    /// `self` is a subset of `other`: every bit set in `self` is set in
    /// `other` (used by the node-superiority relation).
    pub fn is_subset_of(&self, other: &IndexBitSet<K>) -> bool {
        debug_assert_eq!(self.words.len(), other.words.len());
        self.words.iter().zip(other.words.iter()).all(|(a, b)| a & !b == 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = K> + '_ {
        (0..self.capacity).filter_map(move |i| {
            let key = K::new(i);
            if self.contains(key) {
                Some(key)
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::NodeIndex;
    use cranelift_entity::EntityRef;

    #[test]
    fn insert_contains_remove() {
        let mut s: IndexBitSet<NodeIndex> = IndexBitSet::new(130);
        let n = NodeIndex::new(65);
        assert!(!s.contains(n));
        assert!(s.insert(n));
        assert!(s.contains(n));
        assert!(!s.insert(n));
        assert!(s.remove(n));
        assert!(!s.contains(n));
    }

    #[test]
    fn union_and_subset() {
        let mut a: IndexBitSet<NodeIndex> = IndexBitSet::new(10);
        let mut b: IndexBitSet<NodeIndex> = IndexBitSet::new(10);
        a.insert(NodeIndex::new(1));
        b.insert(NodeIndex::new(1));
        b.insert(NodeIndex::new(2));
        assert!(a.is_subset_of(&b));
        assert!(!b.is_subset_of(&a));
        a.union_with(&b);
        assert!(b.is_subset_of(&a));
        assert_eq!(a.count(), 2);
    }
}
