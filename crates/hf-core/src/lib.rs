//! hf-core: shared error type, media value types, and application
//! configuration.
//!
//! This crate is the foundational dependency for all other hf-* crates.

pub mod config;
pub mod error;
pub mod media;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use media::{PlaylistKind, Resolution};
