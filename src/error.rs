//! Error taxonomy for map construction, growth and cursor traversal.

use std::collections::TryReserveError;

use thiserror::Error;

/// Errors surfaced by [`DualKeyedMap`](crate::DualKeyedMap) and its cursors.
///
/// Every variant is a contract violation or resource failure reported to the
/// immediate caller. None leave the map in a partially updated state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A construction parameter was rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The map was structurally modified after the cursor last synchronized.
    #[error(
        "map was structurally modified during iteration \
         (expected modification count {expected}, found {actual})"
    )]
    ConcurrentModification { expected: u64, actual: u64 },

    /// Cursor protocol misuse, e.g. `remove` without a preceding `next`.
    #[error("invalid iterator state: {0}")]
    InvalidState(&'static str),

    /// `next` was called on an exhausted cursor.
    #[error("no more elements")]
    NoSuchElement,

    /// The operation is deliberately not offered by this view.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// The requested bucket count or entry count does not fit.
    #[error("capacity overflow")]
    CapacityOverflow,

    /// Fresh bucket tables could not be allocated.
    #[error("allocation failed: {0}")]
    Alloc(#[from] TryReserveError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
