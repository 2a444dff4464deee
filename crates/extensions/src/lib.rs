//! Stock extensions built on the bramble framework contracts.
//!
//! Everything here consumes the public framework surface only: behaviors,
//! the host handle, and the canonical bus. None of it is framework logic.

pub mod augment;
pub mod avatar;
pub mod error;
pub mod lookup;

pub use {
    augment::{AUGMENTED_EVENT, Augment},
    avatar::Avatar,
    error::{Error, Result},
    lookup::{
        ENGINE_ADDED_EVENT, ENGINE_REMOVED_EVENT, Lookup, LookupClient, ResponseKind,
        SearchEngine, SearchOutcome,
    },
};
