//! Shared types, error definitions, and utilities used across all bramble crates.

pub mod error;
pub mod merge;
pub mod types;

pub use {
    error::{BrambleError, Context, Error, FromMessage, Result},
    merge::deep_merge,
};
