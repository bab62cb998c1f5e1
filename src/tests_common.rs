//! Test-only helpers: a structural checker for the radix-tree invariants.
//!
//! Not part of the public API.

use std::sync::atomic::Ordering;

use crate::{
    map::{
        node::{self, Inner, Leaf},
        SparseMap,
    },
    value::Value,
};

/// Assert the structural invariants of a quiescent map: uniform tree depth,
/// leaf bases aligned to their path digits, a strictly ascending doubly
/// linked leaf chain, and the chain head resting on the minimum leaf.
///
/// # Panics
///
/// Panics when any invariant is violated. Only meaningful while no other
/// thread is mutating the map.
pub fn assert_well_formed<V: Value, const FANOUT: usize>(map: &SparseMap<V, FANOUT>) {
    let (root, levels) = map.load_root();
    let first = map.first_leaf();
    if root.is_null() {
        assert!(first.is_null(), "empty map with a non-null chain head");
        return;
    }

    let mut leaves: Vec<*const Leaf<V, FANOUT>> = Vec::new();
    // SAFETY: a non-null root is a live tree of depth `levels`.
    unsafe { collect_leaves::<V, FANOUT>(root, levels, 0, &mut leaves) };
    assert!(!leaves.is_empty(), "non-empty map without leaves");

    let mut current = first.cast_const();
    let mut previous: *const Leaf<V, FANOUT> = std::ptr::null();
    let mut seen = 0usize;
    while !current.is_null() {
        assert_ne!(
            current,
            node::sentinel::<V, FANOUT>().cast_const(),
            "chain contains an unspliced link"
        );
        assert!(seen < leaves.len(), "chain is longer than the tree");
        assert_eq!(
            current, leaves[seen],
            "chain order diverges from tree order at position {seen}"
        );
        // SAFETY: chain members are live leaves of the map.
        let leaf = unsafe { &*current };
        assert_eq!(
            leaf.prev.load(Ordering::Acquire).cast_const(),
            previous,
            "stale back link on leaf with base {}",
            leaf.base
        );
        if !previous.is_null() {
            // SAFETY: as above.
            let prev_leaf = unsafe { &*previous };
            assert!(
                prev_leaf.base < leaf.base,
                "chain bases out of order: {} before {}",
                prev_leaf.base,
                leaf.base
            );
        }
        previous = current;
        current = leaf.next.load(Ordering::Acquire).cast_const();
        seen += 1;
    }
    assert_eq!(seen, leaves.len(), "chain misses {} leaves", leaves.len() - seen);
}

/// Walk the tree in order, checking each leaf base against the digit path
/// that reaches it.
///
/// # Safety
///
/// `node` must be a live node of the given level.
unsafe fn collect_leaves<V: Value, const FANOUT: usize>(
    node: *const u8,
    level: usize,
    path: u64,
    out: &mut Vec<*const Leaf<V, FANOUT>>,
) {
    if level == 0 {
        let base = path * FANOUT as u64;
        assert!(base <= u32::MAX as u64, "leaf base beyond the key space");
        // SAFETY: level 0 nodes are leaves.
        let leaf = unsafe { &*node.cast::<Leaf<V, FANOUT>>() };
        assert_eq!(
            leaf.base as u64, base,
            "leaf base does not match its tree position"
        );
        out.push(node.cast());
        return;
    }
    // SAFETY: nodes above level 0 are inner nodes.
    let inner = unsafe { &*node.cast::<Inner<FANOUT>>() };
    for (idx, child) in inner.children.iter().enumerate() {
        let child = child.load(Ordering::Acquire);
        if !child.is_null() {
            // SAFETY: non-null children are live nodes one level down.
            unsafe {
                collect_leaves::<V, FANOUT>(
                    child,
                    level - 1,
                    path * FANOUT as u64 + idx as u64,
                    out,
                )
            };
        }
    }
}
