//! The per-index contract and its composition into index tuples.

use crate::{arena::Locator, error::Error};
use tracing::trace;

/// One index over records of type `T`.
///
/// Indices only map keys to [Locator]s. They never see the records
/// themselves except through `key_of`, and they never decide anything about
/// other indices: cross-index consistency is the job of [IndexSet].
pub trait Index<T> {
    type Key: Clone + Eq;

    /// Extract this index's key from a record.
    fn key_of(&self, record: &T) -> Self::Key;

    /// Thread `locator` under `key`. Returns `false` (and changes nothing)
    /// when the index is unique and `key` is taken.
    fn insert(&mut self, key: Self::Key, locator: Locator) -> bool;

    /// Unthread `locator` from under `key`.
    fn remove(&mut self, key: &Self::Key, locator: Locator);

    fn len(&self) -> usize;

    fn clear(&mut self);
}

/// A fixed tuple of indices kept consistent with one another.
///
/// Implemented for tuples of one to six [Index] types. Every mutation either
/// applies to all members or, on failure, leaves all members as they were.
pub trait IndexSet<T> {
    /// One key per member index, in declaration order.
    type Keys;

    /// Number of member indices.
    const COUNT: usize;

    fn keys_of(&self, record: &T) -> Self::Keys;

    /// Thread `locator` into every member in declaration order.
    ///
    /// If member `n` rejects the key, members `0..n` are unthreaded again
    /// and `DuplicateKey { index: n }` is returned.
    fn insert(&mut self, keys: &Self::Keys, locator: Locator) -> Result<(), Error>;

    /// Unthread `locator` from every member.
    fn remove(&mut self, keys: &Self::Keys, locator: Locator);

    /// Move `locator` from `before` to `after` in every member whose key changed.
    ///
    /// On a collision every member is put back under its `before` key.
    fn rethread(
        &mut self,
        locator: Locator,
        before: &Self::Keys,
        after: &Self::Keys,
    ) -> Result<(), Error>;

    /// Size of every member, in declaration order.
    fn lens(&self) -> Vec<usize>;

    fn clear(&mut self);
}

macro_rules! impl_index_set {
    ($count:expr; $($idx:tt => $name:ident),+) => {
        impl<T, $($name: Index<T>),+> IndexSet<T> for ($($name,)+) {
            type Keys = ($(<$name as Index<T>>::Key,)+);

            const COUNT: usize = $count;

            fn keys_of(&self, record: &T) -> Self::Keys {
                ($(self.$idx.key_of(record),)+)
            }

            fn insert(&mut self, keys: &Self::Keys, locator: Locator) -> Result<(), Error> {
                $(
                    if !self.$idx.insert(keys.$idx.clone(), locator) {
                        trace!(index = $idx, "unique index rejected key, unthreading");
                        <Self as Rollback<T>>::unthread(self, keys, locator, $idx);
                        return Err(Error::DuplicateKey { index: $idx });
                    }
                )+
                Ok(())
            }

            fn remove(&mut self, keys: &Self::Keys, locator: Locator) {
                $(self.$idx.remove(&keys.$idx, locator);)+
            }

            fn rethread(
                &mut self,
                locator: Locator,
                before: &Self::Keys,
                after: &Self::Keys,
            ) -> Result<(), Error> {
                let mut moved: u64 = 0;
                $(
                    if before.$idx != after.$idx {
                        self.$idx.remove(&before.$idx, locator);
                        if !self.$idx.insert(after.$idx.clone(), locator) {
                            let restored = self.$idx.insert(before.$idx.clone(), locator);
                            debug_assert!(restored, "vacated key must be free");
                            trace!(index = $idx, moved, "unique index rejected new key, restoring");
                            <Self as Rollback<T>>::restore(self, before, after, locator, moved);
                            return Err(Error::DuplicateKey { index: $idx });
                        }
                        moved |= 1 << $idx;
                    }
                )+
                Ok(())
            }

            fn lens(&self) -> Vec<usize> {
                vec![$(self.$idx.len()),+]
            }

            fn clear(&mut self) {
                $(self.$idx.clear();)+
            }
        }
    };
}

// Undo paths, kept off `IndexSet` so they stay private.
macro_rules! impl_rollback {
    ($($idx:tt => $name:ident),+) => {
        impl<T, $($name: Index<T>),+> Rollback<T> for ($($name,)+) {
            fn unthread(&mut self, keys: &Self::Keys, locator: Locator, threaded: usize) {
                $(
                    if $idx < threaded {
                        self.$idx.remove(&keys.$idx, locator);
                    }
                )+
            }

            fn restore(
                &mut self,
                before: &Self::Keys,
                after: &Self::Keys,
                locator: Locator,
                moved: u64,
            ) {
                $(
                    if moved & (1 << $idx) != 0 {
                        self.$idx.remove(&after.$idx, locator);
                        let restored = self.$idx.insert(before.$idx.clone(), locator);
                        debug_assert!(restored, "vacated key must be free");
                    }
                )+
            }
        }
    };
}

trait Rollback<T>: IndexSet<T> {
    /// Unthread `locator` from members `0..threaded`.
    fn unthread(&mut self, keys: &Self::Keys, locator: Locator, threaded: usize);

    /// Move members flagged in `moved` back from `after` to `before`.
    fn restore(&mut self, before: &Self::Keys, after: &Self::Keys, locator: Locator, moved: u64);
}

impl_index_set!(1; 0 => A);
impl_index_set!(2; 0 => A, 1 => B);
impl_index_set!(3; 0 => A, 1 => B, 2 => C);
impl_index_set!(4; 0 => A, 1 => B, 2 => C, 3 => D);
impl_index_set!(5; 0 => A, 1 => B, 2 => C, 3 => D, 4 => E);
impl_index_set!(6; 0 => A, 1 => B, 2 => C, 3 => D, 4 => E, 5 => F);

impl_rollback!(0 => A);
impl_rollback!(0 => A, 1 => B);
impl_rollback!(0 => A, 1 => B, 2 => C);
impl_rollback!(0 => A, 1 => B, 2 => C, 3 => D);
impl_rollback!(0 => A, 1 => B, 2 => C, 3 => D, 4 => E);
impl_rollback!(0 => A, 1 => B, 2 => C, 3 => D, 4 => E, 5 => F);
