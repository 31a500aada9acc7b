use crate::config::Config;
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::ValueEnum;
use groundcloud_io::list_txt_files;
use groundcloud_terrain::{
    generate_terrain, save_terrain, GroundFilter, RansacGroundFilter, SmrfGroundFilter,
};
use log::info;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Method {
    /// Lowest well-supported RANSAC plane per file.
    Ransac,
    /// PDAL's Simple Morphological Filter.
    Smrf,
}

pub fn build_filter(method: Method, config: &Config) -> Box<dyn GroundFilter> {
    match method {
        Method::Ransac => Box::new(RansacGroundFilter::new(config.ransac.params())),
        Method::Smrf => Box::new(
            SmrfGroundFilter::new(config.smrf.params())
                .with_command(config.smrf.pdal.clone(), Vec::<String>::new()),
        ),
    }
}

/// Extracts ground from every `*.txt` file in `input_dir` and saves the
/// merged result under the configured output folder.
///
/// Returns the written file, or `None` when no file yielded ground.
pub fn run(
    input_dir: &Path,
    method: Method,
    config: &Config,
    now: NaiveDateTime,
) -> Result<Option<PathBuf>> {
    let files = list_txt_files(input_dir)
        .with_context(|| format!("listing {}", input_dir.display()))?;
    let mut filter = build_filter(method, config);
    info!(
        "{} ground extraction over {} file(s) in {}",
        filter.method(),
        files.len(),
        input_dir.display()
    );

    let report = generate_terrain(&files, &mut filter)?;
    let saved = save_terrain(&report, &config.output.dir, filter.method(), now)
        .context("saving ground points")?;
    Ok(saved)
}
