//! In-memory record containers with several simultaneous indices.
//!
//! A [MultiIndex] owns one collection of records in an [Arena] and keeps a
//! fixed tuple of indices over it: [HashedIndex] for exact-key lookup and
//! [OrderedIndex] for sorted iteration and range queries (including composite
//! tuple keys, see [key]). Indices store [Locator]s, never records, and every
//! mutation goes through the container, so all indices always agree on which
//! records exist.
//!
//! # Example
//!
//! ```
//! use ardent_index::{HashedIndex, MultiIndex, OrderedIndex};
//!
//! #[derive(Clone)]
//! struct Pending {
//!     id: u64,
//!     expiration: u64,
//! }
//!
//! let mut pending = MultiIndex::new((
//!     HashedIndex::unique(|p: &Pending| p.id),
//!     OrderedIndex::non_unique(|p: &Pending| p.expiration),
//! ));
//!
//! pending.insert(Pending { id: 1, expiration: 30 }).unwrap();
//! pending.insert(Pending { id: 2, expiration: 10 }).unwrap();
//! assert!(pending.insert(Pending { id: 1, expiration: 99 }).is_err());
//!
//! // Expire everything due before t=20.
//! let begin = pending.view(|i| &i.1).begin();
//! let end = pending.view(|i| &i.1).lower_bound(20u64);
//! assert_eq!(pending.erase_range(|i| &i.1, &begin, &end), 1);
//!
//! assert_eq!(pending.len(), 1);
//! assert!(pending.view(|i| &i.0).contains(&1));
//! ```
//!
//! # Concurrency
//!
//! Nothing here locks. Callers sharing a container across threads must
//! provide their own exclusion.

mod arena;
mod container;
mod error;
mod hashed;
pub mod key;
mod ordered;
mod set;

pub use arena::{Arena, Locator};
pub use container::{IndexView, MultiIndex};
pub use error::Error;
pub use hashed::HashedIndex;
pub use key::{By, Comparator, Prefix};
pub use ordered::{Cursor, OrderedIndex};
pub use set::{Index, IndexSet};
