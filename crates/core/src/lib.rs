#![forbid(unsafe_code)]

pub mod bbox;
pub mod cloud;
pub mod records;
pub mod summary;

pub use bbox::Aabb;
pub use cloud::{Colors, Normals, PointCloud};
pub use records::PointRecords;
pub use summary::{CloudSummary, Extreme, ExtremePoints};
