#![forbid(unsafe_code)]

pub mod kdtree;

pub use kdtree::KdTree;
