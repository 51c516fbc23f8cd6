//! The composition root: one arena, a tuple of indices, one mutation surface.

use crate::{
    arena::{Arena, Locator},
    error::Error,
    hashed::HashedIndex,
    key::Prefix,
    ordered::{Cursor, OrderedIndex},
    set::{Index, IndexSet},
};
use std::hash::{BuildHasher, Hash};
use tracing::debug;

/// Records exposed through several simultaneous indices.
///
/// `I` is a tuple of [HashedIndex] / [OrderedIndex] values, fixed at
/// construction. All mutation goes through the container so every index
/// always holds exactly the records in the arena:
///
/// - [MultiIndex::insert] threads a record into every index or none,
/// - [MultiIndex::modify] re-threads only indices whose key changed and
///   undoes everything on a collision,
/// - [MultiIndex::erase] and [MultiIndex::erase_range] unthread from every index.
///
/// The container does no locking; one writer at a time.
pub struct MultiIndex<T, I> {
    arena: Arena<T>,
    indices: I,
}

impl<T, I: IndexSet<T>> MultiIndex<T, I> {
    pub fn new(indices: I) -> Self {
        Self {
            arena: Arena::new(),
            indices,
        }
    }

    pub fn with_capacity(capacity: usize, indices: I) -> Self {
        Self {
            arena: Arena::with_capacity(capacity),
            indices,
        }
    }

    /// Store `record` and thread it into every index.
    ///
    /// Fails with [Error::DuplicateKey] if a unique index already holds one of
    /// the record's keys; the record is dropped and nothing changes.
    pub fn insert(&mut self, record: T) -> Result<Locator, Error> {
        let keys = self.indices.keys_of(&record);
        let locator = self.arena.insert(record);
        if let Err(err) = self.indices.insert(&keys, locator) {
            self.arena.remove(locator);
            debug!(?err, "insert rolled back");
            return Err(err);
        }
        Ok(locator)
    }

    /// Remove a record from every index and the arena.
    ///
    /// Returns `None` for a stale locator. Passing one is a caller bug; it is
    /// reported rather than acted on.
    pub fn erase(&mut self, locator: Locator) -> Option<T> {
        let record = self.arena.remove(locator)?;
        let keys = self.indices.keys_of(&record);
        self.indices.remove(&keys, locator);
        Some(record)
    }

    /// Remove every record in `[begin, end)` of the ordered index chosen by `pick`.
    ///
    /// Returns the number of records erased.
    pub fn erase_range<K, P>(&mut self, pick: P, begin: &Cursor<K>, end: &Cursor<K>) -> usize
    where
        K: Ord + Clone,
        P: FnOnce(&I) -> &OrderedIndex<T, K>,
    {
        let doomed: Vec<Locator> = pick(&self.indices)
            .range(begin, end)
            .map(|(_, locator)| locator)
            .collect();
        for locator in &doomed {
            self.erase(*locator);
        }
        if !doomed.is_empty() {
            debug!(erased = doomed.len(), remaining = self.len(), "erased range");
        }
        doomed.len()
    }

    /// Remove the record under an ordered-index cursor. The end cursor erases nothing.
    pub fn erase_at<K>(&mut self, cursor: &Cursor<K>) -> Option<T> {
        self.erase(cursor.locator()?)
    }

    /// Run `mutator` on the record in place, then re-thread every index whose key changed.
    ///
    /// If a re-threaded key collides in a unique index, the record and every
    /// index are restored to their pre-mutation state and
    /// [Error::DuplicateKey] is returned.
    pub fn modify<F>(&mut self, locator: Locator, mutator: F) -> Result<(), Error>
    where
        T: Clone,
        F: FnOnce(&mut T),
    {
        let Some(record) = self.arena.get_mut(locator) else {
            return Err(Error::InvalidLocator);
        };
        let backup = record.clone();
        let before = self.indices.keys_of(record);
        mutator(record);
        let after = self.indices.keys_of(record);
        if let Err(err) = self.indices.rethread(locator, &before, &after) {
            *record = backup;
            debug!(?err, ?locator, "modify rolled back");
            return Err(err);
        }
        Ok(())
    }

    pub fn get(&self, locator: Locator) -> Option<&T> {
        self.arena.get(locator)
    }

    pub fn contains(&self, locator: Locator) -> bool {
        self.arena.contains(locator)
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Every record, in arena slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Locator, &T)> + '_ {
        self.arena.iter()
    }

    /// Size of every index, in declaration order. Always equal to [MultiIndex::len].
    pub fn index_lens(&self) -> Vec<usize> {
        self.indices.lens()
    }

    pub fn indices(&self) -> &I {
        &self.indices
    }

    /// Query one index, resolving its locators against this container's records.
    pub fn view<X, P>(&self, pick: P) -> IndexView<'_, T, X>
    where
        P: FnOnce(&I) -> &X,
    {
        IndexView {
            arena: &self.arena,
            index: pick(&self.indices),
        }
    }

    pub fn clear(&mut self) {
        self.arena.clear();
        self.indices.clear();
    }
}

/// Read-only access to one index of a [MultiIndex], yielding records.
pub struct IndexView<'a, T, X> {
    arena: &'a Arena<T>,
    index: &'a X,
}

impl<'a, T, X> IndexView<'a, T, X> {
    /// The underlying index, for locator-level queries.
    pub fn index(&self) -> &'a X {
        self.index
    }

    fn resolve(&self, locator: Locator) -> Option<(Locator, &'a T)> {
        self.arena.get(locator).map(|record| (locator, record))
    }
}

impl<'a, T, K: Hash + Eq, S: BuildHasher> IndexView<'a, T, HashedIndex<T, K, S>> {
    pub fn find(&self, key: &K) -> Option<Locator> {
        self.index.find(key)
    }

    pub fn get(&self, key: &K) -> Option<&'a T> {
        self.index.find(key).and_then(|locator| self.arena.get(locator))
    }

    pub fn get_all(&self, key: &K) -> Vec<&'a T> {
        self.index
            .find_all(key)
            .iter()
            .filter_map(|locator| self.arena.get(*locator))
            .collect()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.index.contains(key)
    }
}

impl<'a, T, K: Ord + Clone> IndexView<'a, T, OrderedIndex<T, K>> {
    pub fn lower_bound<Q: Prefix<K>>(&self, query: Q) -> Cursor<K> {
        self.index.lower_bound(query)
    }

    pub fn upper_bound<Q: Prefix<K>>(&self, query: Q) -> Cursor<K> {
        self.index.upper_bound(query)
    }

    pub fn begin(&self) -> Cursor<K> {
        self.index.begin()
    }

    pub fn end(&self) -> Cursor<K> {
        self.index.end()
    }

    /// Record under `cursor`.
    pub fn at(&self, cursor: &Cursor<K>) -> Option<&'a T> {
        cursor.locator().and_then(|locator| self.arena.get(locator))
    }

    /// First record in index order.
    pub fn first(&self) -> Option<&'a T> {
        self.index
            .iter()
            .next()
            .and_then(|(_, locator)| self.arena.get(locator))
    }

    /// Records in `[begin, end)`.
    pub fn range(&self, begin: &Cursor<K>, end: &Cursor<K>) -> Vec<(Locator, &'a T)> {
        self.index
            .range(begin, end)
            .filter_map(|(_, locator)| self.resolve(locator))
            .collect()
    }

    /// Records whose key matches `query` (a full key or a leading prefix).
    pub fn equal(&self, query: impl Prefix<K> + Clone) -> Vec<(Locator, &'a T)> {
        let (begin, end) = self.index.equal_range(query);
        self.range(&begin, &end)
    }

    /// Records from `cursor` to the end.
    pub fn iter_from(&self, cursor: &Cursor<K>) -> impl Iterator<Item = (Locator, &'a T)> + 'a {
        let arena = self.arena;
        self.index
            .iter_from(cursor)
            .filter_map(move |(_, locator)| arena.get(locator).map(|record| (locator, record)))
    }

    /// Every record in index order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (Locator, &'a T)> + 'a {
        let arena = self.arena;
        self.index
            .iter()
            .filter_map(move |(_, locator)| arena.get(locator).map(|record| (locator, record)))
    }

    /// Snapshot of every record in index order.
    pub fn values(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.iter().map(|(_, record)| record.clone()).collect()
    }

    pub fn count(&self, query: impl Prefix<K> + Clone) -> usize {
        self.index.count(query)
    }

    pub fn len(&self) -> usize {
        Index::<T>::len(self.index)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Account {
        id: u32,
        name: &'static str,
        balance: u64,
    }

    type Accounts = MultiIndex<
        Account,
        (
            HashedIndex<Account, u32>,
            OrderedIndex<Account, &'static str>,
            OrderedIndex<Account, u64>,
        ),
    >;

    fn accounts() -> Accounts {
        MultiIndex::new((
            HashedIndex::unique(|a: &Account| a.id),
            OrderedIndex::unique(|a: &Account| a.name),
            OrderedIndex::non_unique(|a: &Account| a.balance),
        ))
    }

    fn account(id: u32, name: &'static str, balance: u64) -> Account {
        Account { id, name, balance }
    }

    fn assert_consistent(accounts: &Accounts) {
        for len in accounts.index_lens() {
            assert_eq!(len, accounts.len());
        }
    }

    #[test]
    fn test_insert_rolls_back_earlier_indices() {
        let mut accounts = accounts();
        accounts.insert(account(1, "alice", 10)).unwrap();

        // Passes the id index, fails on the name index.
        let err = accounts.insert(account(2, "alice", 20)).unwrap_err();
        assert_eq!(err, Error::DuplicateKey { index: 1 });
        assert_eq!(accounts.len(), 1);
        assert_consistent(&accounts);
        assert!(!accounts.view(|i| &i.0).contains(&2));
        assert_eq!(accounts.view(|i| &i.2).count(20u64), 0);
    }

    #[test]
    fn test_modify_rethreads_changed_keys_only() {
        let mut accounts = accounts();
        let alice = accounts.insert(account(1, "alice", 10)).unwrap();
        let bob = accounts.insert(account(2, "bob", 10)).unwrap();

        accounts.modify(alice, |a| a.balance = 30).unwrap();
        assert_consistent(&accounts);

        let by_balance: Vec<_> = accounts
            .view(|i| &i.2)
            .iter()
            .map(|(locator, _)| locator)
            .collect();
        assert_eq!(by_balance, vec![bob, alice]);
        assert_eq!(accounts.get(alice).map(|a| a.balance), Some(30));
        assert_eq!(accounts.view(|i| &i.0).find(&1), Some(alice));
    }

    #[test]
    fn test_modify_collision_restores_record_and_order() {
        let mut accounts = accounts();
        let alice = accounts.insert(account(1, "alice", 10)).unwrap();
        let bob = accounts.insert(account(2, "bob", 10)).unwrap();
        let carol = accounts.insert(account(3, "carol", 10)).unwrap();

        // The id index re-threads first, then the name collides.
        let err = accounts
            .modify(bob, |a| {
                a.id = 7;
                a.name = "alice";
                a.balance = 99;
            })
            .unwrap_err();
        assert_eq!(err, Error::DuplicateKey { index: 1 });
        assert_eq!(accounts.get(bob), Some(&account(2, "bob", 10)));
        assert_eq!(accounts.view(|i| &i.0).find(&2), Some(bob));
        assert_eq!(accounts.view(|i| &i.0).find(&7), None);
        assert_consistent(&accounts);

        let by_balance: Vec<_> = accounts
            .view(|i| &i.2)
            .iter()
            .map(|(locator, _)| locator)
            .collect();
        assert_eq!(by_balance, vec![alice, bob, carol]);
        assert_eq!(accounts.view(|i| &i.1).equal("bob").len(), 1);
    }

    #[test]
    fn test_modify_collision_on_first_index() {
        let mut accounts = accounts();
        accounts.insert(account(1, "alice", 10)).unwrap();
        let bob = accounts.insert(account(2, "bob", 20)).unwrap();

        let err = accounts
            .modify(bob, |a| {
                a.id = 1;
                a.balance = 5;
            })
            .unwrap_err();
        assert_eq!(err, Error::DuplicateKey { index: 0 });
        assert_eq!(accounts.view(|i| &i.0).find(&2), Some(bob));
        assert_eq!(accounts.view(|i| &i.2).count(20u64), 1);
        assert_consistent(&accounts);
    }

    #[test]
    fn test_stale_locator() {
        let mut accounts = accounts();
        let alice = accounts.insert(account(1, "alice", 10)).unwrap();
        assert_eq!(accounts.erase(alice), Some(account(1, "alice", 10)));

        assert_eq!(accounts.erase(alice), None);
        assert_eq!(accounts.get(alice), None);
        assert!(!accounts.contains(alice));
        assert_eq!(
            accounts.modify(alice, |a| a.balance += 1),
            Err(Error::InvalidLocator)
        );
        assert!(accounts.is_empty());
        assert_consistent(&accounts);
    }

    #[test]
    fn test_erase_at_cursor() {
        let mut accounts = accounts();
        accounts.insert(account(1, "alice", 10)).unwrap();
        accounts.insert(account(2, "bob", 5)).unwrap();

        let cheapest = accounts.view(|i| &i.2).begin();
        assert_eq!(accounts.erase_at(&cheapest).map(|a| a.id), Some(2));
        assert_eq!(accounts.erase_at(&Cursor::<u64>::end()), None);
        assert_eq!(accounts.len(), 1);
        assert_consistent(&accounts);
    }

    #[test]
    fn test_views() {
        let mut accounts = accounts();
        accounts.insert(account(1, "carol", 30)).unwrap();
        accounts.insert(account(2, "alice", 10)).unwrap();
        accounts.insert(account(3, "bob", 20)).unwrap();

        let by_name = accounts.view(|i| &i.1);
        let names: Vec<_> = by_name.values().into_iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["alice", "bob", "carol"]);
        assert_eq!(by_name.first().map(|a| a.id), Some(2));
        assert_eq!(by_name.len(), 3);
        assert!(!by_name.is_empty());

        let by_balance = accounts.view(|i| &i.2);
        let cursor = by_balance.lower_bound(15u64);
        assert_eq!(by_balance.at(&cursor).map(|a| a.id), Some(3));
        let tail: Vec<_> = by_balance.iter_from(&cursor).map(|(_, a)| a.id).collect();
        assert_eq!(tail, vec![3, 1]);
        let reversed: Vec<_> = by_balance.iter().rev().map(|(_, a)| a.id).collect();
        assert_eq!(reversed, vec![1, 3, 2]);

        let by_id = accounts.view(|i| &i.0);
        assert_eq!(by_id.get(&3).map(|a| a.name), Some("bob"));
        assert_eq!(by_id.get_all(&3).len(), 1);
        assert!(by_id.get(&4).is_none());
    }

    #[test]
    fn test_clear() {
        let mut accounts = accounts();
        let alice = accounts.insert(account(1, "alice", 10)).unwrap();
        accounts.clear();

        assert!(accounts.is_empty());
        assert!(!accounts.contains(alice));
        assert_consistent(&accounts);
        accounts.insert(account(1, "alice", 10)).unwrap();
        assert_eq!(accounts.len(), 1);
    }
}
