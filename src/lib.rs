#![deny(missing_docs, clippy::missing_safety_doc, unsafe_op_in_unsafe_fn)]

//! Concurrent, index-addressable storage for large sets of small integer
//! tuples, such as the fact tables of an in-memory deductive database.
//!
//! Three structures build on each other:
//!
//!  - [`SparseMap`]: an ordered map from `u32` keys to fixed-size values,
//!    laid out as a radix tree over the populated key regions only.
//!  - [`SparseBitSet`]: the same tree storing one presence bit per key,
//!    packed into pointer-width words.
//!  - [`Trie`]: a set of fixed-arity `i32` tuples, nesting one `SparseMap`
//!    per outer column over a `SparseBitSet` for the innermost one.
//!
//! All three support ordered iteration, lower/upper bound queries from any
//! key, and (for the trie) prefix range scans via
//! [`boundaries`](Trie::boundaries). Insertion is designed for parallel
//! load: tuples can be inserted from any number of threads concurrently,
//! with structural changes published by compare-and-swap and a short
//! per-map mutex taken only when the tree grows a level. The structures are
//! monotone: there is no removal, and a tuple observed once stays visible.
//!
//! ```rust
//! use relix::Trie;
//!
//! let edges = Trie::<2>::new();
//! edges.insert([1, 2]);
//! edges.insert([1, 3]);
//! edges.insert([2, 3]);
//!
//! // All successors of node 1, in order.
//! let succ: Vec<_> = edges.boundaries::<1>([1, 0]).map(|t| t[1]).collect();
//! assert_eq!(succ, vec![2, 3]);
//! ```

pub mod bitset;
pub mod map;
pub mod trie;

mod value;

#[doc(hidden)]
pub mod tests_common;

pub use bitset::SparseBitSet;
pub use map::{SparseMap, DEFAULT_FANOUT};
pub use trie::Trie;
pub use value::Value;
