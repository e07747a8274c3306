//! `phrasepipe-cli` crate (library surface).
//!
//! The entrypoint for end users is the `phrasepipe` binary. This module lets
//! embedders reach the core types and local pipeline without depending on the
//! internal crate layout.

pub use phrasepipe as core;
pub use phrasepipe_local as local;
