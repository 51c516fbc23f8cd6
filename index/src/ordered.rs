//! Sorted index with range queries.
//!
//! Entries are `(key, locator)` pairs in a `BTreeSet`. Because locators order
//! by insertion sequence, records with equal keys iterate oldest first, and a
//! record re-threaded by a modify keeps its place among its new equals.
//!
//! Bound queries search the set with a probe that compares only the fields a
//! [Prefix] covers and never equals a stored entry: it sits just before (or
//! just after) every entry the prefix matches. No key value has to be
//! invented for the fields the caller left out.

use crate::{
    arena::Locator,
    key::Prefix,
    set::Index,
};
use std::{
    borrow::Borrow,
    cmp::Ordering,
    collections::BTreeSet,
    marker::PhantomData,
    ops::Bound::{Included, Unbounded},
};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Entry<K> {
    key: K,
    locator: Locator,
}

/// A point to search an [OrderedIndex] from: a stored entry, or a probe.
trait Seek<K> {
    fn entry(&self) -> Option<(&K, Locator)>;

    /// Order of `self` relative to the stored entry `(key, locator)`.
    fn seek(&self, key: &K, locator: Locator) -> Ordering;
}

impl<K: Ord> Seek<K> for Entry<K> {
    fn entry(&self) -> Option<(&K, Locator)> {
        Some((&self.key, self.locator))
    }

    fn seek(&self, key: &K, locator: Locator) -> Ordering {
        (&self.key, self.locator).cmp(&(key, locator))
    }
}

/// Sits just before every entry matching `prefix`, or just after when `after` is set.
struct Probe<'q, Q, K> {
    prefix: &'q Q,
    after: bool,
    _key: PhantomData<fn(&K)>,
}

impl<'q, Q: Prefix<K>, K> Probe<'q, Q, K> {
    fn before(prefix: &'q Q) -> Self {
        Self {
            prefix,
            after: false,
            _key: PhantomData,
        }
    }

    fn after(prefix: &'q Q) -> Self {
        Self {
            prefix,
            after: true,
            _key: PhantomData,
        }
    }
}

impl<Q: Prefix<K>, K> Seek<K> for Probe<'_, Q, K> {
    fn entry(&self) -> Option<(&K, Locator)> {
        None
    }

    fn seek(&self, key: &K, _: Locator) -> Ordering {
        match self.prefix.cmp_prefix(key) {
            Ordering::Equal if self.after => Ordering::Greater,
            Ordering::Equal => Ordering::Less,
            other => other,
        }
    }
}

impl<K: Ord> PartialEq for dyn Seek<K> + '_ {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<K: Ord> Eq for dyn Seek<K> + '_ {}

impl<K: Ord> PartialOrd for dyn Seek<K> + '_ {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: Ord> Ord for dyn Seek<K> + '_ {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.entry(), other.entry()) {
            (_, Some((key, locator))) => self.seek(key, locator),
            (Some((key, locator)), None) => other.seek(key, locator).reverse(),
            // Probes are only ever compared against stored entries.
            (None, None) => Ordering::Equal,
        }
    }
}

impl<'a, K: Ord + 'a> Borrow<dyn Seek<K> + 'a> for Entry<K> {
    fn borrow(&self) -> &(dyn Seek<K> + 'a) {
        self
    }
}

/// A position in an [OrderedIndex].
///
/// Cursors name a point in key space rather than borrowing the index, so they
/// can be held across mutations and passed back to
/// [crate::MultiIndex::erase_range]. A cursor past the last entry is the end
/// cursor; reaching it is the normal "no more entries" signal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cursor<K> {
    at: Option<(K, Locator)>,
}

impl<K> Cursor<K> {
    pub const fn end() -> Self {
        Self { at: None }
    }

    pub fn is_end(&self) -> bool {
        self.at.is_none()
    }

    /// Key of the entry under the cursor.
    pub fn key(&self) -> Option<&K> {
        self.at.as_ref().map(|(key, _)| key)
    }

    /// Record under the cursor.
    pub fn locator(&self) -> Option<Locator> {
        self.at.as_ref().map(|(_, locator)| *locator)
    }
}

/// Index sorted by a key extracted from each record.
pub struct OrderedIndex<T, K> {
    key_of: fn(&T) -> K,
    unique: bool,
    entries: BTreeSet<Entry<K>>,
}

impl<T, K: Ord + Clone> OrderedIndex<T, K> {
    /// Index sorted by `key_of`, rejecting duplicate keys.
    pub fn unique(key_of: fn(&T) -> K) -> Self {
        Self {
            key_of,
            unique: true,
            entries: BTreeSet::new(),
        }
    }

    /// Index sorted by `key_of`, accepting duplicate keys.
    pub fn non_unique(key_of: fn(&T) -> K) -> Self {
        Self {
            key_of,
            unique: false,
            entries: BTreeSet::new(),
        }
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    fn cursor(entry: Option<&Entry<K>>) -> Cursor<K> {
        Cursor {
            at: entry.map(|entry| (entry.key.clone(), entry.locator)),
        }
    }

    /// First entry at or after `from`.
    fn seek_from<S: Seek<K>>(&self, from: &S) -> Option<&Entry<K>> {
        let from: &dyn Seek<K> = from;
        self.entries
            .range::<dyn Seek<K>, _>((Included(from), Unbounded))
            .next()
    }

    /// First entry.
    pub fn begin(&self) -> Cursor<K> {
        Self::cursor(self.entries.first())
    }

    pub fn end(&self) -> Cursor<K> {
        Cursor::end()
    }

    /// First entry whose key is not less than `query`.
    pub fn lower_bound<Q: Prefix<K>>(&self, query: Q) -> Cursor<K> {
        Self::cursor(self.seek_from(&Probe::before(&query)))
    }

    /// First entry whose key is greater than `query`.
    pub fn upper_bound<Q: Prefix<K>>(&self, query: Q) -> Cursor<K> {
        Self::cursor(self.seek_from(&Probe::after(&query)))
    }

    /// `(lower_bound(query), upper_bound(query))`.
    pub fn equal_range<Q: Prefix<K> + Clone>(&self, query: Q) -> (Cursor<K>, Cursor<K>) {
        (self.lower_bound(query.clone()), self.upper_bound(query))
    }

    /// Entries in `[begin, end)`. An inverted range is empty.
    pub fn range<'a>(
        &'a self,
        begin: &Cursor<K>,
        end: &'a Cursor<K>,
    ) -> impl Iterator<Item = (&'a K, Locator)> + 'a {
        self.iter_from(begin)
            .take_while(move |(key, locator)| match &end.at {
                Some((end_key, end_locator)) => (*key, locator) < (end_key, end_locator),
                None => true,
            })
    }

    /// Entries from `cursor` to the end.
    pub fn iter_from<'a>(
        &'a self,
        cursor: &Cursor<K>,
    ) -> impl Iterator<Item = (&'a K, Locator)> + 'a {
        cursor
            .at
            .clone()
            .into_iter()
            .flat_map(move |(key, locator)| {
                self.entries
                    .range::<Entry<K>, _>((Included(Entry { key, locator }), Unbounded))
                    .map(|entry| (&entry.key, entry.locator))
            })
    }

    /// Every entry in key order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&K, Locator)> + '_ {
        self.entries.iter().map(|entry| (&entry.key, entry.locator))
    }

    /// Number of entries matching `query`.
    pub fn count<Q: Prefix<K> + Clone>(&self, query: Q) -> usize {
        let (begin, end) = self.equal_range(query);
        self.range(&begin, &end).count()
    }

    /// Whether any entry is stored under exactly `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        self.seek_from(&Probe::before(key))
            .is_some_and(|entry| entry.key == *key)
    }
}

impl<T, K: Ord + Clone> Index<T> for OrderedIndex<T, K> {
    type Key = K;

    fn key_of(&self, record: &T) -> K {
        (self.key_of)(record)
    }

    fn insert(&mut self, key: K, locator: Locator) -> bool {
        if self.unique && self.contains_key(&key) {
            return false;
        }
        self.entries.insert(Entry { key, locator })
    }

    fn remove(&mut self, key: &K, locator: Locator) {
        let removed = self.entries.remove(&Entry {
            key: key.clone(),
            locator,
        });
        debug_assert!(removed, "removing an entry the index does not hold");
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}
