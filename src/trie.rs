//! A set of fixed-arity integer tuples, layered as a trie of sparse maps
//! over a bit-set innermost column.
//!
//! Column values are `i32` but order and nest by their unsigned 32-bit
//! image, so iteration is lexicographic in that order. An arity-1 trie is
//! just a [`SparseBitSet`]; higher arities map the first column to a nested
//! trie one column shorter. Insertion publishes nested levels by
//! compare-and-swap, so any number of threads may insert concurrently.

use std::{
    cell::UnsafeCell,
    fmt, mem, ptr,
    sync::atomic::{AtomicPtr, AtomicU64, AtomicUsize, Ordering},
};

use crate::{bitset::SparseBitSet, map::SparseMap, value::Value};

mod iterators;
pub use iterators::{Boundaries, Iter};

/// A set of `[i32; A]` tuples ordered lexicographically by the unsigned
/// image of each column.
///
/// Sizes are cached per nesting level and recomputed lazily after
/// insertions (and are therefore cheap to query repeatedly between them).
pub struct Trie<const A: usize> {
    root: Level,
}

// SAFETY: a trie exclusively owns its nested levels. Mutation through a
// shared reference publishes child levels by compare-and-swap and presence
// bits by fetch-or, and readers follow the `Value` atomic-access contract.
unsafe impl<const A: usize> Send for Trie<A> {}
// SAFETY: see `Send`.
unsafe impl<const A: usize> Sync for Trie<A> {}

impl<const A: usize> Trie<A> {
    const ARITY_OK: () = assert!(A >= 1, "a trie needs at least one column");

    /// Create an empty trie.
    pub fn new() -> Self {
        let () = Self::ARITY_OK;
        Trie {
            root: Level::with_depth(A),
        }
    }

    /// Returns `true` if no tuple has ever been inserted.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// The number of distinct tuples in the set.
    pub fn size(&self) -> usize {
        self.root.len()
    }

    /// Returns whether `tuple` is in the set.
    pub fn contains(&self, tuple: [i32; A]) -> bool {
        self.root.contains(&tuple)
    }

    /// Insert `tuple`, returning whether it was newly inserted.
    ///
    /// Safe to call concurrently; when several threads insert the same
    /// tuple, exactly one of them observes the `true` result.
    pub fn insert(&self, tuple: [i32; A]) -> bool {
        self.root.insert(&tuple)
    }

    /// Insert every tuple of `other` into `self`.
    ///
    /// Matching sub-tries are fused level by level; sub-tries absent from
    /// `self` are deep-copied.
    pub fn insert_all(&mut self, other: &Self) {
        self.root.merge(&other.root);
    }

    /// Bytes owned by this trie, including the trie object itself.
    pub fn memory_usage(&self) -> usize {
        mem::size_of::<Self>() + self.root.heap_bytes()
    }

    /// Render every tuple in lexicographic order, for debugging.
    pub fn dump(&self) -> String {
        use fmt::Write;

        let mut out = String::new();
        let _ = writeln!(out, "trie ({} columns, {} tuples)", A, self.size());
        for tuple in self.iter() {
            let _ = writeln!(out, "  {tuple:?}");
        }
        out
    }
}

impl<const A: usize> Default for Trie<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const A: usize> Clone for Trie<A> {
    fn clone(&self) -> Self {
        Trie {
            root: self.root.clone(),
        }
    }
}

impl<const A: usize> fmt::Debug for Trie<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<'a, const A: usize> IntoIterator for &'a Trie<A> {
    type Item = [i32; A];
    type IntoIter = Iter<'a, A>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// One nesting level of a trie: the bit-set innermost column, or a map from
/// the leading column to the level below.
pub(crate) enum Level {
    Bits(SparseBitSet),
    Nested(Nested),
}

/// The map layer of an outer column, with its cached tuple count.
///
/// Insertions below this level bump `version` on the way back up, so the
/// child versions are always bumped first and a recount through the child
/// caches sees every tuple the acquired version covers.
pub(crate) struct Nested {
    pub(crate) children: SparseMap<*mut Level>,
    version: AtomicU64,
    len: AtomicUsize,
    computed: AtomicU64,
}

impl Level {
    /// The level for a sub-trie of `depth` remaining columns.
    fn with_depth(depth: usize) -> Level {
        if depth == 1 {
            Level::Bits(SparseBitSet::new())
        } else {
            Level::Nested(Nested {
                children: SparseMap::new(),
                version: AtomicU64::new(0),
                len: AtomicUsize::new(0),
                computed: AtomicU64::new(0),
            })
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Level::Bits(bits) => bits.is_empty(),
            Level::Nested(nested) => nested.children.is_empty(),
        }
    }

    fn contains(&self, tuple: &[i32]) -> bool {
        match self {
            Level::Bits(bits) => bits.test(tuple[0] as u32),
            Level::Nested(nested) => match nested.child(tuple[0] as u32) {
                // SAFETY: child levels are live for the trie's lifetime.
                Some(child) => unsafe { &*child }.contains(&tuple[1..]),
                None => false,
            },
        }
    }

    fn insert(&self, tuple: &[i32]) -> bool {
        match self {
            Level::Bits(bits) => bits.set(tuple[0] as u32),
            Level::Nested(nested) => {
                let child = nested.child_or_insert(tuple[0] as u32, tuple.len() - 1);
                // SAFETY: child levels are live for the trie's lifetime.
                let added = unsafe { &*child }.insert(&tuple[1..]);
                if added {
                    nested.version.fetch_add(1, Ordering::Release);
                }
                added
            }
        }
    }

    fn len(&self) -> usize {
        match self {
            Level::Bits(bits) => bits.size(),
            Level::Nested(nested) => {
                // The version bumps form a release sequence, and every
                // insertion bumps the child level before this one, so a
                // recount after acquiring `version` covers all of them.
                let version = nested.version.load(Ordering::Acquire);
                if nested.computed.load(Ordering::Acquire) >= version {
                    return nested.len.load(Ordering::Acquire);
                }
                let mut total = 0;
                for (_, child) in nested.children.iter() {
                    // SAFETY: child levels are live for the trie's
                    // lifetime.
                    total += unsafe { &*child }.len();
                }
                // Counts and covered versions only grow; keep the largest
                // of any racing recomputes.
                nested.len.fetch_max(total, Ordering::AcqRel);
                nested.computed.fetch_max(version, Ordering::AcqRel);
                nested.len.load(Ordering::Acquire)
            }
        }
    }

    fn merge(&mut self, other: &Level) {
        match (self, other) {
            (Level::Bits(mine), Level::Bits(theirs)) => {
                mine.merge(theirs);
            }
            (Level::Nested(mine), Level::Nested(theirs)) => {
                for (column, their_child) in theirs.children.iter() {
                    // SAFETY: child levels of `other` are live while it is
                    // borrowed.
                    let their_child = unsafe { &*their_child };
                    match mine.child(column) {
                        // SAFETY: exclusive access through `&mut self`.
                        Some(my_child) => unsafe { &mut *my_child }.merge(their_child),
                        None => {
                            let copy = Box::into_raw(Box::new(their_child.clone()));
                            mine.children.update(column, copy);
                        }
                    }
                }
                mine.version.fetch_add(1, Ordering::Release);
            }
            _ => unreachable!("tries of equal arity have equal depth"),
        }
    }

    fn heap_bytes(&self) -> usize {
        match self {
            Level::Bits(bits) => bits.heap_bytes(),
            Level::Nested(nested) => {
                let mut total = nested.children.heap_bytes();
                for (_, child) in nested.children.iter() {
                    // SAFETY: child levels are live for the trie's lifetime.
                    total += mem::size_of::<Level>() + unsafe { &*child }.heap_bytes();
                }
                total
            }
        }
    }
}

impl Clone for Level {
    fn clone(&self) -> Self {
        match self {
            Level::Bits(bits) => Level::Bits(bits.clone()),
            Level::Nested(nested) => {
                let mut children = SparseMap::new();
                for (column, child) in nested.children.iter() {
                    // SAFETY: child levels are live while `self` is
                    // borrowed.
                    let copy = Box::into_raw(Box::new(unsafe { &*child }.clone()));
                    children.update(column, copy);
                }
                Level::Nested(Nested {
                    children,
                    version: AtomicU64::new(nested.version.load(Ordering::Acquire)),
                    len: AtomicUsize::new(nested.len.load(Ordering::Acquire)),
                    computed: AtomicU64::new(nested.computed.load(Ordering::Acquire)),
                })
            }
        }
    }
}

impl Drop for Nested {
    fn drop(&mut self) {
        for (_, child) in self.children.iter() {
            // SAFETY: each child is an exclusively owned box, dropped once.
            drop(unsafe { Box::from_raw(child) });
        }
    }
}

impl Nested {
    /// The nested level for `column`, if one has been published.
    fn child(&self, column: u32) -> Option<*mut Level> {
        let slot = self.children.locate(column)?;
        let child = <*mut Level as Value>::load(slot);
        (!child.is_null()).then_some(child)
    }

    /// Get-or-publish the nested level for `column`; the loser of a racing
    /// publication deallocates its candidate and follows the winner.
    fn child_or_insert(&self, column: u32, depth: usize) -> *mut Level {
        let slot = self.children.reserve(column);
        let atomic = Self::atomic(slot);
        let mut child = atomic.load(Ordering::Acquire);
        if child.is_null() {
            let fresh = Box::into_raw(Box::new(Level::with_depth(depth)));
            match atomic.compare_exchange(
                ptr::null_mut(),
                fresh,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => child = fresh,
                Err(winner) => {
                    // SAFETY: `fresh` never escaped this thread.
                    drop(unsafe { Box::from_raw(fresh) });
                    child = winner;
                }
            }
        }
        child
    }

    /// View a child slot through its atomic type.
    #[inline]
    fn atomic(slot: &UnsafeCell<*mut Level>) -> &AtomicPtr<Level> {
        // SAFETY: `AtomicPtr<Level>` has the same size and bit validity as
        // `*mut Level`, and the shared reference keeps the slot alive.
        unsafe { &*(slot as *const UnsafeCell<*mut Level>).cast::<AtomicPtr<Level>>() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_contains() {
        let set = Trie::<1>::new();
        assert!(set.is_empty());
        assert!(!set.contains([1]));
        assert!(set.insert([1]));
        assert!(set.contains([1]));
        assert!(!set.contains([2]));
        assert!(set.insert([2]));
        assert!(set.contains([2]));
        assert!(!set.insert([2]));
    }

    #[test]
    fn size_ignores_duplicates() {
        let set = Trie::<2>::new();
        assert_eq!(set.size(), 0);
        set.insert([1, 2]);
        assert_eq!(set.size(), 1);
        set.insert([1, 2]);
        assert_eq!(set.size(), 1);
        set.insert([2, 1]);
        assert_eq!(set.size(), 2);
    }

    #[test]
    fn negative_columns_nest_by_unsigned_image() {
        let set = Trie::<2>::new();
        set.insert([10, 15]);
        set.insert([-1_073_741_824, 18]);
        assert_eq!(set.size(), 2);
        assert!(set.contains([-1_073_741_824, 18]));
        let tuples: Vec<_> = set.iter().collect();
        assert_eq!(tuples, vec![[10, 15], [-1_073_741_824, 18]]);
    }

    #[test]
    fn clone_is_independent() {
        let original = Trie::<2>::new();
        original.insert([3, 4]);
        let copy = original.clone();
        copy.insert([5, 6]);
        assert!(!original.contains([5, 6]));
        assert!(copy.contains([3, 4]));
        assert_eq!(original.size(), 1);
        assert_eq!(copy.size(), 2);
    }
}
