//! Collection aliases shared across the crate.
//!
//! Everything that is iterated to produce output (scopes, reports, the
//! callback registry) uses the insertion-ordered `IndexMap`/`IndexSet` so
//! results are reproducible for the same input document.

use core::hash::BuildHasherDefault;

pub use rustc_hash::{FxHashMap, FxHashSet, FxHasher};
pub use std::collections::{BTreeMap, BTreeSet};
pub use std::rc::Rc;

pub type IndexMap<K, V> = indexmap::IndexMap<K, V, BuildHasherDefault<FxHasher>>;

pub type IndexSet<T> = indexmap::IndexSet<T, BuildHasherDefault<FxHasher>>;

/// Create an empty IndexMap
#[inline]
pub fn index_map_new<K, V>() -> IndexMap<K, V>
where
    K: core::hash::Hash + Eq,
{
    indexmap::IndexMap::with_hasher(Default::default())
}

/// Create an empty IndexSet
#[inline]
pub fn index_set_new<T>() -> IndexSet<T>
where
    T: core::hash::Hash + Eq,
{
    indexmap::IndexSet::with_hasher(Default::default())
}
