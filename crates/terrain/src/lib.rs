#![forbid(unsafe_code)]

pub mod error;
pub mod filter;
pub mod generate;
pub mod output;
pub mod ransac;
pub mod smrf;

pub use error::TerrainError;
pub use filter::GroundFilter;
pub use generate::{generate_terrain, save_terrain, FileOutcome, FileReport, TerrainReport};
pub use output::timestamped_output_path;
pub use ransac::{RansacGroundFilter, RansacParams};
pub use smrf::{match_rounded_xyz, smrf_pipeline, SmrfGroundFilter, SmrfParams};
