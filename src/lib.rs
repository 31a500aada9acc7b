//! Facade over the groundcloud workspace crates.
//!
//! Each concern lives in its own crate; this package re-exports them so the
//! integration tests and benches can reach the whole stack through one name.

#![forbid(unsafe_code)]

pub use groundcloud_core as core;
pub use groundcloud_filters as filters;
pub use groundcloud_io as io;
pub use groundcloud_normals as normals;
pub use groundcloud_segmentation as segmentation;
pub use groundcloud_spatial as spatial;
pub use groundcloud_terrain as terrain;
