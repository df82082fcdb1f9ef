use core::alloc::Layout;

use thiserror::Error;

/// Errors reported by the table and its sizing helpers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// The key is not present, or the table has no storage yet.
    #[error("key is not present in the table")]
    OutOfRange,

    /// A slot count could not be rounded to a representable power of two, or
    /// the slot array would not fit in the address space.
    #[error("{requested} slots is larger than the greatest representable table size")]
    CapacityOverflow {
        /// The slot count that was asked for.
        requested: usize,
    },

    /// A load factor outside `(0, 1]` was supplied.
    #[error("load factor {load_factor} is outside of (0, 1]")]
    InvalidLoadFactor {
        /// The rejected load factor.
        load_factor: f32,
    },

    /// The allocator could not provide memory for the slot array.
    #[error("allocation of {} bytes (align {}) failed", .layout.size(), .layout.align())]
    AllocError {
        /// The layout that failed to allocate.
        layout: Layout,
    },
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A lookup that requires a present key did not find it.
    OutOfRange,
    /// A sizing or configuration input was outside the supported domain.
    InvalidArgument,
    /// The allocator failed.
    AllocationFailure,
}

impl Error {
    /// Returns the kind of failure this error represents.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use open_hash::Error;
    /// use open_hash::ErrorKind;
    ///
    /// assert_eq!(Error::OutOfRange.kind(), ErrorKind::OutOfRange);
    /// ```
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::OutOfRange => ErrorKind::OutOfRange,
            Error::CapacityOverflow { .. } | Error::InvalidLoadFactor { .. } => {
                ErrorKind::InvalidArgument
            }
            Error::AllocError { .. } => ErrorKind::AllocationFailure,
        }
    }
}

/// Turns a failure on an infallible path into the matching abort or panic.
#[cold]
#[inline(never)]
pub(crate) fn raise(err: Error) -> ! {
    match err {
        Error::AllocError { layout } => alloc::alloc::handle_alloc_error(layout),
        err => panic!("{err}"),
    }
}
