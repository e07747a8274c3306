//! Public facade crate for `phrasepipe`.
//!
//! This crate contains no IO or site-specific logic.
//! It re-exports the backend-agnostic types/traits from `phrasepipe-core`.

pub use phrasepipe_core::*;
