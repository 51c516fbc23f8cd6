//! Record storage with stable locators.
//!
//! The arena is the only owner of records. Indices hold [Locator]s, never
//! references, so a record can be threaded into any number of indices without
//! shared ownership.

use slab::Slab;

/// Opaque handle to a record stored in a [crate::MultiIndex].
///
/// A locator stays valid from the insert that produced it until the record is
/// erased. Modifying the record (even moving it within an ordered index) does
/// not invalidate it.
///
/// Locators order by insertion sequence. Ordered indices use this to keep
/// records with equal keys in insertion order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Locator {
    seq: u64,
    slot: usize,
}

impl Locator {
    /// Insertion sequence of the record. Unique for the life of the container.
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

struct Slot<T> {
    seq: u64,
    value: T,
}

/// Slab-backed record store.
///
/// Slots freed by [Arena::remove] are reused by later inserts. The insertion
/// sequence stored next to each record distinguishes a live locator from a
/// stale one that happens to name a reused slot.
pub struct Arena<T> {
    slots: Slab<Slot<T>>,
    next_seq: u64,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self {
            slots: Slab::new(),
            next_seq: 0,
        }
    }

    /// Create an arena with room for `capacity` records before reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Slab::with_capacity(capacity),
            next_seq: 0,
        }
    }

    /// Store a record and return its locator. O(1).
    pub fn insert(&mut self, value: T) -> Locator {
        let seq = self.next_seq;
        self.next_seq += 1;
        let slot = self.slots.insert(Slot { seq, value });
        Locator { seq, slot }
    }

    /// Remove the record behind `locator`. O(1).
    ///
    /// Returns `None` if the locator is stale.
    pub fn remove(&mut self, locator: Locator) -> Option<T> {
        if !self.contains(locator) {
            return None;
        }
        self.slots.try_remove(locator.slot).map(|slot| slot.value)
    }

    pub fn contains(&self, locator: Locator) -> bool {
        self.slots
            .get(locator.slot)
            .is_some_and(|slot| slot.seq == locator.seq)
    }

    pub fn get(&self, locator: Locator) -> Option<&T> {
        self.slots
            .get(locator.slot)
            .filter(|slot| slot.seq == locator.seq)
            .map(|slot| &slot.value)
    }

    pub fn get_mut(&mut self, locator: Locator) -> Option<&mut T> {
        self.slots
            .get_mut(locator.slot)
            .filter(|slot| slot.seq == locator.seq)
            .map(|slot| &mut slot.value)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Iterate over every record in slot order (not insertion order once slots are reused).
    pub fn iter(&self) -> impl Iterator<Item = (Locator, &T)> + '_ {
        self.slots
            .iter()
            .map(|(slot, entry)| (Locator { seq: entry.seq, slot }, &entry.value))
    }

    /// Drop every record. Previously issued locators become stale; sequences keep counting up.
    pub fn clear(&mut self) {
        self.slots.clear();
    }
}
