//! Error taxonomy shared by every layer of the map.

use core::fmt;
use hashbrown::TryReserveError;
use thiserror::Error;

/// Kind of structural change a cursor observed between two steps.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Modification {
    /// Order changed but the number of entries did not. Reported once per
    /// detection; the cursor may keep stepping afterwards.
    Mutated,
    /// The number of entries changed. Poisons the cursor.
    SizeChanged,
}

impl fmt::Display for Modification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modification::Mutated => f.write_str("mutated during iteration"),
            Modification::SizeChanged => f.write_str("changed size during iteration"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    /// Lookup of a key that is not in the map, or a cursor whose next key
    /// was removed behind its back.
    #[error("key not found: {reason}")]
    KeyNotFound { reason: &'static str },

    #[error("pop from an empty map")]
    EmptyCollection,

    #[error("map {0}")]
    ConcurrentModification(Modification),

    /// Propagated from the table when it cannot grow.
    #[error("allocation failure: {0:?}")]
    AllocationFailure(TryReserveError),

    /// Internal bookkeeping disagrees with the table. Always a bug.
    #[error("invariant violated: {0}")]
    InvariantViolation(&'static str),
}

impl OrderError {
    pub(crate) const fn absent() -> Self {
        OrderError::KeyNotFound {
            reason: "absent from map",
        }
    }

    pub(crate) const fn disappeared() -> Self {
        OrderError::KeyNotFound {
            reason: "key disappeared during iteration",
        }
    }

    pub fn is_key_not_found(&self) -> bool {
        matches!(self, OrderError::KeyNotFound { .. })
    }

    pub fn is_concurrent_modification(&self) -> bool {
        matches!(self, OrderError::ConcurrentModification(_))
    }

    /// True for errors that indicate a bug rather than misuse.
    pub fn is_fatal(&self) -> bool {
        matches!(self, OrderError::InvariantViolation(_))
    }
}

impl From<TryReserveError> for OrderError {
    fn from(err: TryReserveError) -> Self {
        OrderError::AllocationFailure(err)
    }
}
