use chrono::NaiveDateTime;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// `base/YYYY-MM-DD/total_ground_<METHOD>_HHMMSS.txt`, creating the dated
/// directory if needed.
pub fn timestamped_output_path(
    base: impl AsRef<Path>,
    method: &str,
    now: NaiveDateTime,
) -> io::Result<PathBuf> {
    let dir = base.as_ref().join(now.format("%Y-%m-%d").to_string());
    fs::create_dir_all(&dir)?;
    Ok(dir.join(format!(
        "total_ground_{}_{}.txt",
        method,
        now.format("%H%M%S")
    )))
}
