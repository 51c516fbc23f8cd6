//! Exact-match index backed by a hash map.

use crate::{arena::Locator, set::Index};
use std::{
    collections::{hash_map::RandomState, HashMap},
    hash::{BuildHasher, Hash},
};

/// O(1)-average lookup by exact key.
///
/// A unique index rejects a second record under an existing key; a
/// non-unique one keeps every locator for a key in insertion order.
pub struct HashedIndex<T, K, S = RandomState> {
    key_of: fn(&T) -> K,
    unique: bool,
    entries: HashMap<K, Vec<Locator>, S>,
    len: usize,
}

impl<T, K: Hash + Eq> HashedIndex<T, K> {
    /// Index keyed by `key_of`, rejecting duplicate keys.
    pub fn unique(key_of: fn(&T) -> K) -> Self {
        Self::with_hasher(key_of, true, RandomState::new())
    }

    /// Index keyed by `key_of`, accepting duplicate keys.
    pub fn non_unique(key_of: fn(&T) -> K) -> Self {
        Self::with_hasher(key_of, false, RandomState::new())
    }
}

impl<T, K: Hash + Eq, S: BuildHasher> HashedIndex<T, K, S> {
    /// Index with a caller-supplied hash function.
    pub fn with_hasher(key_of: fn(&T) -> K, unique: bool, hasher: S) -> Self {
        Self {
            key_of,
            unique,
            entries: HashMap::with_hasher(hasher),
            len: 0,
        }
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// First record stored under `key`.
    pub fn find(&self, key: &K) -> Option<Locator> {
        self.entries
            .get(key)
            .and_then(|locators| locators.first())
            .copied()
    }

    /// Every record stored under `key`, oldest first.
    pub fn find_all(&self, key: &K) -> &[Locator] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }
}

impl<T, K: Hash + Eq + Clone, S: BuildHasher> Index<T> for HashedIndex<T, K, S> {
    type Key = K;

    fn key_of(&self, record: &T) -> K {
        (self.key_of)(record)
    }

    fn insert(&mut self, key: K, locator: Locator) -> bool {
        let locators = self.entries.entry(key).or_default();
        if self.unique && !locators.is_empty() {
            return false;
        }

        // Keep buckets sorted by insertion sequence so a restored entry lands where it was.
        let position = locators.partition_point(|existing| *existing < locator);
        locators.insert(position, locator);
        self.len += 1;
        true
    }

    fn remove(&mut self, key: &K, locator: Locator) {
        let Some(locators) = self.entries.get_mut(key) else {
            debug_assert!(false, "removing a key the index does not hold");
            return;
        };
        let before = locators.len();
        locators.retain(|existing| *existing != locator);
        self.len -= before - locators.len();
        if locators.is_empty() {
            self.entries.remove(key);
        }
    }

    fn len(&self) -> usize {
        self.len
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;

    #[derive(Clone)]
    struct Account {
        name: &'static str,
        shard: u8,
    }

    fn account_name(account: &Account) -> &'static str {
        account.name
    }

    fn account_shard(account: &Account) -> u8 {
        account.shard
    }

    #[test]
    fn test_unique_rejects_duplicate() {
        let mut arena = Arena::new();
        let mut index = HashedIndex::unique(account_name);

        let alice = Account { name: "alice", shard: 0 };
        let a = arena.insert(alice.clone());
        let b = arena.insert(alice.clone());

        assert!(index.insert(index.key_of(&alice), a));
        assert!(!index.insert(index.key_of(&alice), b));
        assert_eq!(index.len(), 1);
        assert_eq!(index.find(&"alice"), Some(a));
        assert_eq!(index.find(&"bob"), None);
    }

    #[test]
    fn test_non_unique_keeps_insertion_order() {
        let mut arena = Arena::new();
        let mut index = HashedIndex::non_unique(account_shard);

        let locators: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .map(|name| arena.insert(Account { name, shard: 1 }))
            .collect();
        for locator in &locators {
            assert!(index.insert(1, *locator));
        }

        assert_eq!(index.len(), 3);
        assert_eq!(index.find_all(&1), locators.as_slice());
        assert!(index.find_all(&2).is_empty());
        assert!(!index.is_unique());
    }

    #[test]
    fn test_remove_and_restore_keeps_position() {
        let mut arena = Arena::new();
        let mut index = HashedIndex::non_unique(account_shard);
        let locators: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .map(|name| arena.insert(Account { name, shard: 3 }))
            .collect();
        for locator in &locators {
            index.insert(3, *locator);
        }

        index.remove(&3, locators[1]);
        assert_eq!(index.find_all(&3), &[locators[0], locators[2]]);
        index.insert(3, locators[1]);
        assert_eq!(index.find_all(&3), locators.as_slice());
    }

    #[test]
    fn test_remove_last_drops_key() {
        let mut arena = Arena::new();
        let mut index = HashedIndex::unique(account_name);
        let a = arena.insert(Account { name: "a", shard: 0 });
        index.insert("a", a);

        index.remove(&"a", a);
        assert!(!index.contains(&"a"));
        assert_eq!(index.len(), 0);

        index.insert("a", a);
        index.clear();
        assert_eq!(index.len(), 0);
        assert_eq!(index.find(&"a"), None);
    }
}
