//! HLS playlist model and rendering.
//!
//! Rendering is pure: the same playlist value always renders to the same
//! bytes, which is what makes playlist rewrites idempotent.

mod render;
mod types;

pub use types::{MasterPlaylist, MediaPlaylist, Segment, Variant};
