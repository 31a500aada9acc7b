#![forbid(unsafe_code)]

pub mod analyze;
pub mod config;
pub mod preprocess;
pub mod terrain;

pub use config::{Config, ConfigError};
pub use terrain::Method;
