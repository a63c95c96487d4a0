//! Hash containers keyed with stable hashers, re-exports *hashbrown* and *foldhash*.

// -----------------------------------------------------------------------------
// Modules

mod hasher;

// -----------------------------------------------------------------------------
// Exports

pub use hasher::{FixedHashState, FixedHasher};
pub use hasher::{NoOpHashState, NoOpHasher};

/// A [`hashbrown::HashMap`] using [`FixedHashState`] by default.
///
/// Iteration order only depends on the inserted keys, so two runs that
/// insert the same keys observe the same order.
pub type HashMap<K, V, S = FixedHashState> = hashbrown::HashMap<K, V, S>;

/// A [`hashbrown::HashSet`] using [`FixedHashState`] by default.
pub type HashSet<T, S = FixedHashState> = hashbrown::HashSet<T, S>;

/// A map keyed by pre-computed `u64` identities, such as pointer addresses.
pub type NoOpHashMap<V> = hashbrown::HashMap<u64, V, NoOpHashState>;

// -----------------------------------------------------------------------------
// Re-export crates

pub use foldhash;
pub use hashbrown;

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::{FixedHashState, HashMap, NoOpHashMap};
    use core::hash::BuildHasher;

    #[test]
    fn fixed_state_is_stable() {
        let a = FixedHashState.hash_one("contract");
        let b = FixedHashState.hash_one("contract");
        assert_eq!(a, b);
    }

    #[test]
    fn aliases_behave_like_maps() {
        let mut map: HashMap<&str, i32> = HashMap::default();
        map.insert("a", 1);
        assert_eq!(map.get("a"), Some(&1));

        let mut ids: NoOpHashMap<&str> = NoOpHashMap::default();
        ids.insert(0x1000, "first");
        assert_eq!(ids.get(&0x1000), Some(&"first"));
    }
}
