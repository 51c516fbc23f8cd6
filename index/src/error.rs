use thiserror::Error;

/// Errors surfaced by [crate::MultiIndex] mutations.
///
/// A failed mutation is always rolled back before the error is returned, so
/// the container is never observed half-updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// An insert or modify would place two records under one key of a unique index.
    /// `index` is the position of the rejecting index in the container's index tuple.
    #[error("duplicate key in unique index {index}")]
    DuplicateKey { index: usize },
    /// The locator does not reference a live record (erased, or never issued by this container).
    #[error("locator does not reference a live record")]
    InvalidLocator,
}
