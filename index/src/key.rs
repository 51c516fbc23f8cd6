//! Key building blocks for ordered indices.
//!
//! Composite keys are plain tuples, compared lexicographically left to right.
//! A field sorts descending when wrapped in [std::cmp::Reverse], and can carry
//! its own comparator when wrapped in [By]. Because every wrapper is itself
//! `Ord`, one tuple can mix directions and comparators per field:
//!
//! ```
//! use ardent_index::{By, Comparator};
//! use std::cmp::{Ordering, Reverse};
//!
//! struct ByMagnitude;
//!
//! impl Comparator<i64> for ByMagnitude {
//!     fn compare(a: &i64, b: &i64) -> Ordering {
//!         a.unsigned_abs().cmp(&b.unsigned_abs())
//!     }
//! }
//!
//! // Height ascending, flag descending, delta by magnitude.
//! type Key = (u32, Reverse<bool>, By<i64, ByMagnitude>);
//!
//! let a: Key = (1, Reverse(true), By::new(-2));
//! let b: Key = (1, Reverse(false), By::new(1));
//! let c: Key = (1, Reverse(false), By::new(-3));
//! assert!(a < b && b < c);
//! ```

use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    marker::PhantomData,
};

/// A total order over `K`, used by [By] to override a field's natural ordering.
pub trait Comparator<K: ?Sized> {
    fn compare(a: &K, b: &K) -> Ordering;
}

/// A key field ordered by comparator `C` instead of `K`'s own `Ord`.
pub struct By<K, C> {
    pub key: K,
    _comparator: PhantomData<fn() -> C>,
}

impl<K, C> By<K, C> {
    pub const fn new(key: K) -> Self {
        Self {
            key,
            _comparator: PhantomData,
        }
    }

    pub fn into_inner(self) -> K {
        self.key
    }
}

impl<K: Clone, C> Clone for By<K, C> {
    fn clone(&self) -> Self {
        Self::new(self.key.clone())
    }
}

impl<K: Copy, C> Copy for By<K, C> {}

impl<K: fmt::Debug, C> fmt::Debug for By<K, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("By").field(&self.key).finish()
    }
}

impl<K, C: Comparator<K>> PartialEq for By<K, C> {
    fn eq(&self, other: &Self) -> bool {
        C::compare(&self.key, &other.key) == Ordering::Equal
    }
}

impl<K, C: Comparator<K>> Eq for By<K, C> {}

impl<K, C: Comparator<K>> PartialOrd for By<K, C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K, C: Comparator<K>> Ord for By<K, C> {
    fn cmp(&self, other: &Self) -> Ordering {
        C::compare(&self.key, &other.key)
    }
}

// Only sound when `C` agrees with `K: Eq`; custom comparators belong in ordered indices.
impl<K: Hash, C> Hash for By<K, C> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

/// A query against an ordered index keyed by `K`.
///
/// Every `K` is a prefix of itself. For tuple keys, any leading sub-tuple is
/// also accepted: `(num,)` against a `(u32, Reverse<bool>)` index matches
/// every record at height `num` regardless of the flag. Fields left out of a
/// prefix are unconstrained, so they need no bounds of their own.
pub trait Prefix<K> {
    /// Compares this query with the leading fields of `key` it covers.
    fn cmp_prefix(&self, key: &K) -> Ordering;
}

impl<K: Ord> Prefix<K> for K {
    #[inline]
    fn cmp_prefix(&self, key: &K) -> Ordering {
        self.cmp(key)
    }
}

macro_rules! impl_prefix {
    ($(($($lead:ident . $idx:tt),+ ; $($rest:ident),+))*) => {
        $(
            impl<$($lead: Ord,)+ $($rest,)+> Prefix<($($lead,)+ $($rest,)+)> for ($($lead,)+) {
                #[inline]
                fn cmp_prefix(&self, key: &($($lead,)+ $($rest,)+)) -> Ordering {
                    Ordering::Equal $(.then_with(|| self.$idx.cmp(&key.$idx)))+
                }
            }
        )*
    };
}

impl_prefix! {
    (A.0; B)
    (A.0; B, C)
    (A.0, B.1; C)
    (A.0; B, C, D)
    (A.0, B.1; C, D)
    (A.0, B.1, C.2; D)
    (A.0; B, C, D, E)
    (A.0, B.1; C, D, E)
    (A.0, B.1, C.2; D, E)
    (A.0, B.1, C.2, D.3; E)
    (A.0; B, C, D, E, F)
    (A.0, B.1; C, D, E, F)
    (A.0, B.1, C.2; D, E, F)
    (A.0, B.1, C.2, D.3; E, F)
    (A.0, B.1, C.2, D.3, E.4; F)
}
