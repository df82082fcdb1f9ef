#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

/// Power-of-two sizing arithmetic shared by every table.
///
/// These are free functions so that capacities can be computed without
/// building a table.
pub mod capacity;

mod error;

/// A HashMap implementation using linear probing.
///
/// This module provides a `HashMap` that wraps the `HashTable` and binds a
/// hasher builder to it.
pub mod hash_map;

/// The raw linear-probing table underneath [`HashMap`].
pub mod hash_table;

mod key_eq;

pub use error::Error;
pub use error::ErrorKind;
pub use hash_map::HashMap;
pub use hash_table::Config;
#[cfg(any(test, feature = "stats"))]
pub use hash_table::DebugStats;
pub use hash_table::HashTable;
#[cfg(any(test, feature = "stats"))]
pub use hash_table::ProbeHistogram;
pub use key_eq::DefaultKeyEq;
pub use key_eq::KeyEq;

cfg_if::cfg_if! {
    if #[cfg(feature = "foldhash")] {
        /// Hasher builder used by [`HashMap`] when none is given.
        pub type DefaultHashBuilder = foldhash::fast::RandomState;
    } else if #[cfg(feature = "std")] {
        /// Hasher builder used by [`HashMap`] when none is given.
        pub type DefaultHashBuilder = std::hash::RandomState;
    } else {
        /// Placeholder hasher builder for builds without `std` or `foldhash`.
        ///
        /// It has no values, so a [`HashMap`] in such a build must be given
        /// its hasher explicitly.
        #[derive(Clone, Copy, Debug)]
        pub enum DefaultHashBuilder {}
    }
}
