//! Ordered iteration and bound queries over a [`SparseMap`].
//!
//! An iterator is a position: a leaf pointer plus a slot index, always
//! resting on a present slot (or at the end). Advancing scans the remaining
//! slots of the current leaf and then follows the leaf chain, so a single
//! position covers the rest of the map.

use std::{
    fmt,
    marker::PhantomData,
    sync::atomic::Ordering,
};

use crate::value::Value;

use super::{
    node::{self, Inner, Leaf},
    SparseMap,
};

/// An ordered iterator over the present entries of a [`SparseMap`].
///
/// [`peek`](Iter::peek) exposes the current entry without advancing, which
/// is what the nested-structure iterators are built from. Two iterators over
/// the same map compare equal when they rest on the same position.
pub struct Iter<'a, V: Value, const FANOUT: usize> {
    leaf: *const Leaf<V, FANOUT>,
    index: usize,
    _map: PhantomData<&'a SparseMap<V, FANOUT>>,
}

impl<V: Value, const FANOUT: usize> Clone for Iter<'_, V, FANOUT> {
    fn clone(&self) -> Self {
        Iter {
            leaf: self.leaf,
            index: self.index,
            _map: PhantomData,
        }
    }
}

impl<V: Value, const FANOUT: usize> PartialEq for Iter<'_, V, FANOUT> {
    fn eq(&self, other: &Self) -> bool {
        self.leaf == other.leaf && (self.leaf.is_null() || self.index == other.index)
    }
}

impl<V: Value, const FANOUT: usize> Eq for Iter<'_, V, FANOUT> {}

impl<V: Value + fmt::Debug, const FANOUT: usize> fmt::Debug for Iter<'_, V, FANOUT> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Iter").field("entry", &self.peek()).finish()
    }
}

impl<'a, V: Value, const FANOUT: usize> Iter<'a, V, FANOUT> {
    /// The exhausted iterator.
    pub(crate) fn end() -> Self {
        Iter {
            leaf: std::ptr::null(),
            index: 0,
            _map: PhantomData,
        }
    }

    /// Start at `(leaf, index)` and settle on the first present slot at or
    /// after it.
    pub(crate) fn from_position(leaf: *const Leaf<V, FANOUT>, index: usize) -> Self {
        let mut iter = Iter {
            leaf,
            index,
            _map: PhantomData,
        };
        iter.settle();
        iter
    }

    /// Position exactly at `(leaf, index)`, which the caller knows is
    /// present.
    pub(crate) fn at(leaf: *const Leaf<V, FANOUT>, index: usize) -> Self {
        Iter {
            leaf,
            index,
            _map: PhantomData,
        }
    }

    /// The entry this iterator rests on, if any.
    pub fn peek(&self) -> Option<(u32, V)> {
        if self.leaf.is_null() {
            return None;
        }
        // SAFETY: a non-null position refers to a leaf of the borrowed map,
        // which lives at least as long as `'a`.
        let leaf = unsafe { &*self.leaf };
        Some((leaf.base | self.index as u32, V::load(&leaf.slots[self.index])))
    }

    /// Step past the current slot and settle on the next present one.
    pub(crate) fn advance_one(&mut self) {
        if !self.leaf.is_null() {
            self.index += 1;
            self.settle();
        }
    }

    /// Move forward to the first present slot at or after the current
    /// position, following the leaf chain across leaves.
    fn settle(&mut self) {
        while !self.leaf.is_null() {
            // SAFETY: as in `peek`.
            let leaf = unsafe { &*self.leaf };
            while self.index < FANOUT {
                if V::load(&leaf.slots[self.index]) != V::EMPTY {
                    return;
                }
                self.index += 1;
            }
            let mut next = leaf.next.load(Ordering::Acquire);
            while next == node::sentinel() {
                // A concurrent insert is mid-splice; it completes in a few
                // instructions.
                std::hint::spin_loop();
                next = leaf.next.load(Ordering::Acquire);
            }
            self.leaf = next;
            self.index = 0;
        }
    }
}

impl<V: Value, const FANOUT: usize> Iterator for Iter<'_, V, FANOUT> {
    type Item = (u32, V);

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.peek()?;
        self.advance_one();
        Some(entry)
    }
}

impl<V: Value, const FANOUT: usize> std::iter::FusedIterator for Iter<'_, V, FANOUT> {}

impl<V: Value, const FANOUT: usize> SparseMap<V, FANOUT> {
    /// Iterate over all present entries in ascending key order.
    pub fn iter(&self) -> Iter<'_, V, FANOUT> {
        Iter::from_position(self.first_leaf(), 0)
    }

    /// An iterator resting on `key` if it is present, otherwise the end
    /// iterator.
    pub fn find(&self, key: u32) -> Iter<'_, V, FANOUT> {
        let Some(leaf) = self.probe_leaf(key) else {
            return Iter::end();
        };
        let index = Self::digit(key, 0);
        // SAFETY: `probe_leaf` returned a live leaf.
        if V::load(unsafe { &(*leaf).slots[index] }) == V::EMPTY {
            return Iter::end();
        }
        Iter::at(leaf, index)
    }

    /// An iterator resting on the smallest present entry with key `>= key`.
    pub fn lower_bound(&self, key: u32) -> Iter<'_, V, FANOUT> {
        let (root, levels) = self.load_root();
        if root.is_null() || !Self::fits(key, levels) {
            // Everything stored is below `key`.
            return Iter::end();
        }
        Self::seek(root, levels, key).map_or_else(Iter::end, |(leaf, index)| {
            Iter::from_position(leaf, index)
        })
    }

    /// An iterator resting on the smallest present entry with key `> key`.
    pub fn upper_bound(&self, key: u32) -> Iter<'_, V, FANOUT> {
        match key.checked_add(1) {
            Some(next) => self.lower_bound(next),
            None => Iter::end(),
        }
    }

    /// Descend along `key`'s digits to the leaf that would hold it, falling
    /// back to the leftmost leaf of the nearest greater sibling subtree when
    /// the exact path is absent. The returned position may rest on an empty
    /// slot; the iterator settles from there via the leaf chain.
    fn seek(
        node: *mut u8,
        level: usize,
        key: u32,
    ) -> Option<(*const Leaf<V, FANOUT>, usize)> {
        if level == 0 {
            return Some((node.cast_const().cast(), Self::digit(key, 0)));
        }
        // SAFETY: nodes above level 0 are inner nodes (uniform tree depth).
        let inner = unsafe { &*node.cast::<Inner<FANOUT>>() };
        let digit = Self::digit(key, level);
        let child = inner.children[digit].load(Ordering::Acquire);
        if !child.is_null() {
            if let Some(hit) = Self::seek(child, level - 1, key) {
                return Some(hit);
            }
        }
        for idx in digit + 1..FANOUT {
            let child = inner.children[idx].load(Ordering::Acquire);
            if !child.is_null() {
                if let Some(leaf) = Self::min_leaf(child, level - 1) {
                    return Some((leaf, 0));
                }
            }
        }
        None
    }

    /// The leftmost leaf below `node`, or `None` if the subtree has no
    /// published leaf yet.
    fn min_leaf(node: *mut u8, level: usize) -> Option<*const Leaf<V, FANOUT>> {
        if level == 0 {
            return Some(node.cast_const().cast());
        }
        // SAFETY: nodes above level 0 are inner nodes (uniform tree depth).
        let inner = unsafe { &*node.cast::<Inner<FANOUT>>() };
        for child in &inner.children {
            let c = child.load(Ordering::Acquire);
            if !c.is_null() {
                if let Some(leaf) = Self::min_leaf(c, level - 1) {
                    return Some(leaf);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use crate::SparseMap;

    #[test]
    fn iterates_in_key_order() {
        let mut map = SparseMap::<i32>::new();
        for (key, value) in [(14, 4), (0, 1), (4, 2), (38, 5), (12, 3), (120, 6)] {
            map.update(key, value);
        }
        let entries: Vec<_> = map.iter().collect();
        assert_eq!(
            entries,
            vec![(0, 1), (4, 2), (12, 3), (14, 4), (38, 5), (120, 6)]
        );
    }

    #[test]
    fn peek_does_not_advance() {
        let mut map = SparseMap::<i32>::new();
        map.update(5, 50);
        let mut iter = map.iter();
        assert_eq!(iter.peek(), Some((5, 50)));
        assert_eq!(iter.peek(), Some((5, 50)));
        assert_eq!(iter.next(), Some((5, 50)));
        assert_eq!(iter.peek(), None);
    }

    #[test]
    fn find_rests_on_the_key_and_continues() {
        let mut map = SparseMap::<i32>::new();
        map.update(1400, 1);
        map.update(12, 2);
        assert_eq!(map.find(1).peek(), None);
        let mut iter = map.find(12);
        assert_eq!(iter.next(), Some((12, 2)));
        assert_eq!(iter.next(), Some((1400, 1)));
        assert_eq!(iter.next(), None);
    }

    #[test]
    fn bounds_cross_leaf_gaps() {
        let mut map = SparseMap::<i32>::new();
        for (key, value) in [(11, 120), (12, 140), (300, 150), (450, 160)] {
            map.update(key, value);
        }
        assert_eq!(map.lower_bound(14).peek(), Some((300, 150)));
        assert_eq!(map.upper_bound(12).peek(), Some((300, 150)));
        assert_eq!(map.lower_bound(500).peek(), None);
        assert_eq!(map.upper_bound(u32::MAX).peek(), None);
    }
}
