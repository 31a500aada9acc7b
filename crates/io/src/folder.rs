use crate::txt::read_records;
use groundcloud_core::{PointCloud, PointRecords};
use log::{error, info, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Columns a file needs to be merged: x, y, z, r, g, b.
pub const MERGE_COLUMNS: usize = 6;

/// The `*.txt` files directly inside `dir`, sorted by file name.
pub fn list_txt_files(dir: impl AsRef<Path>) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_txt = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));
        if is_txt && path.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Loads every `*.txt` file in `dir` and concatenates the points.
///
/// Files with fewer than [`MERGE_COLUMNS`] columns are skipped with a
/// warning, files that fail to parse are logged and skipped. With `use_rgb`
/// the result carries colors from columns 3..6 (0–255). An error is returned
/// only when the directory cannot be listed or no file was usable.
pub fn load_and_merge_txt_folder(dir: impl AsRef<Path>, use_rgb: bool) -> io::Result<PointCloud> {
    let dir = dir.as_ref();
    let files = list_txt_files(dir)?;
    info!("found {} txt file(s) in {}", files.len(), dir.display());

    let mut merged: Option<PointRecords> = None;
    let mut used = 0usize;

    for path in &files {
        let records = match read_records(path) {
            Ok(r) => r,
            Err(e) => {
                error!("failed to load {}: {}", path.display(), e);
                continue;
            }
        };
        if records.columns() < MERGE_COLUMNS {
            warn!(
                "skipping {}: {} column(s), need at least {}",
                path.display(),
                records.columns(),
                MERGE_COLUMNS
            );
            continue;
        }

        let xyzrgb = PointRecords::from_rows(
            MERGE_COLUMNS,
            &records.rows().map(|r| &r[..MERGE_COLUMNS]).collect::<Vec<_>>(),
        );
        info!("loaded {} point(s) from {}", xyzrgb.len(), path.display());
        match merged.as_mut() {
            Some(m) => m.extend(&xyzrgb),
            None => merged = Some(xyzrgb),
        }
        used += 1;
    }

    let merged = merged.ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("no valid point files in {}", dir.display()),
        )
    })?;
    info!(
        "merged {} point(s) from {} of {} file(s)",
        merged.len(),
        used,
        files.len()
    );

    let mut cloud = merged.to_cloud();
    if !use_rgb {
        cloud.colors = None;
    }
    Ok(cloud)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lists_only_txt_files_in_name_order() {
        let dir = TempDir::new().unwrap();
        for name in ["b.txt", "a.txt", "c.ply", "d.TXT"] {
            fs::write(dir.path().join(name), "1 2 3\n").unwrap();
        }
        fs::create_dir(dir.path().join("sub.txt")).unwrap();

        let names: Vec<_> = list_txt_files(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "d.TXT"]);
    }

    #[test]
    fn merges_valid_files_and_skips_the_rest() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("1.txt"), "0 0 0 255 0 0 7\n1 0 0 0 255 0 7\n").unwrap();
        fs::write(dir.path().join("2.txt"), "5 5 5\n").unwrap();
        fs::write(dir.path().join("3.txt"), "oops\n").unwrap();
        fs::write(dir.path().join("4.txt"), "2 0 0 0 0 255\n").unwrap();

        let cloud = load_and_merge_txt_folder(dir.path(), true).unwrap();
        assert_eq!(cloud.len(), 3);
        assert_eq!(cloud.point(2), [2.0, 0.0, 0.0]);
        let colors = cloud.colors.as_ref().unwrap();
        assert_eq!(colors.color(0), [255, 0, 0]);
        assert_eq!(colors.color(2), [0, 0, 255]);

        let plain = load_and_merge_txt_folder(dir.path(), false).unwrap();
        assert_eq!(plain.len(), 3);
        assert!(plain.colors.is_none());
    }

    #[test]
    fn no_usable_files_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(load_and_merge_txt_folder(dir.path(), true).is_err());

        fs::write(dir.path().join("narrow.txt"), "1 2 3\n").unwrap();
        let err = load_and_merge_txt_folder(dir.path(), true).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
