//! Selects the hash map and set implementations used throughout the crate.
//!
//! The node and cache tables are hit on every recursion step, so a fast
//! non-cryptographic hasher pays off. Swap the re-exports here to change
//! the implementation in one place.

pub use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
