use crate::error::TerrainError;
use crate::filter::GroundFilter;
use crate::output::timestamped_output_path;
use chrono::NaiveDateTime;
use groundcloud_core::PointRecords;
use groundcloud_io::{read_records, write_records, DEFAULT_PRECISION};
use log::{error, info, warn};
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    /// The filter ran; `ground` of `points` records were kept.
    Ground { points: usize, ground: usize },
    /// The file contributed nothing.
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileReport {
    pub path: PathBuf,
    pub outcome: FileOutcome,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TerrainReport {
    /// Selected records of every file, in file order. `None` until some file
    /// has been filtered successfully.
    pub ground: Option<PointRecords>,
    pub files: Vec<FileReport>,
}

impl TerrainReport {
    pub fn ground_len(&self) -> usize {
        self.ground.as_ref().map_or(0, PointRecords::len)
    }

    pub fn skipped(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.outcome, FileOutcome::Skipped { .. }))
            .count()
    }
}

/// Runs `filter` over every file in order and concatenates the ground rows.
///
/// A file that cannot be read, has no x/y/z, has a different width than the
/// files merged before it, or where the filter finds no ground is logged and
/// skipped. Any other filter error ends the run.
pub fn generate_terrain<P, G>(files: &[P], filter: &mut G) -> Result<TerrainReport, TerrainError>
where
    P: AsRef<Path>,
    G: GroundFilter + ?Sized,
{
    let mut report = TerrainReport::default();

    for path in files {
        let path = path.as_ref();
        let outcome = process_file(path, filter, &mut report.ground)?;
        match &outcome {
            FileOutcome::Ground { points, ground } => info!(
                "{}: {} ground point(s) of {} [{}]",
                path.display(),
                ground,
                points,
                filter.method()
            ),
            FileOutcome::Skipped { reason } => warn!("skipping {}: {}", path.display(), reason),
        }
        report.files.push(FileReport {
            path: path.to_path_buf(),
            outcome,
        });
    }

    info!(
        "{} ground point(s) from {} file(s), {} skipped",
        report.ground_len(),
        report.files.len() - report.skipped(),
        report.skipped()
    );
    Ok(report)
}

fn process_file<G: GroundFilter + ?Sized>(
    path: &Path,
    filter: &mut G,
    merged: &mut Option<PointRecords>,
) -> Result<FileOutcome, TerrainError> {
    let skip = |reason: String| Ok(FileOutcome::Skipped { reason });

    let records = match read_records(path) {
        Ok(r) => r,
        Err(e) => {
            error!("failed to load {}: {}", path.display(), e);
            return skip(format!("unreadable: {}", e));
        }
    };
    if !records.has_xyz() {
        return skip(format!("{} column(s), need x, y, z", records.columns()));
    }
    if let Some(m) = merged.as_ref() {
        if m.columns() != records.columns() {
            return skip(format!(
                "{} column(s), earlier files have {}",
                records.columns(),
                m.columns()
            ));
        }
    }

    let indices = match filter.ground_indices(&records) {
        Ok(indices) => indices,
        Err(e) if e.is_per_file() => return skip(e.to_string()),
        Err(e) => return Err(e),
    };

    let ground = records.select(&indices);
    let outcome = FileOutcome::Ground {
        points: records.len(),
        ground: ground.len(),
    };
    match merged {
        Some(m) => m.extend(&ground),
        None => *merged = Some(ground),
    }
    Ok(outcome)
}

/// Writes the merged ground of `report` to a timestamped file under `base`.
///
/// Returns the written path, or `None` (with a warning) when there is no
/// ground to save.
pub fn save_terrain(
    report: &TerrainReport,
    base: impl AsRef<Path>,
    method: &str,
    now: NaiveDateTime,
) -> io::Result<Option<PathBuf>> {
    let ground = match &report.ground {
        Some(g) if !g.is_empty() => g,
        _ => {
            warn!("no ground points found, nothing written");
            return Ok(None);
        }
    };

    let path = timestamped_output_path(base, method, now)?;
    write_records(&path, ground, DEFAULT_PRECISION)?;
    info!("saved {} ground point(s) to {}", ground.len(), path.display());
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use groundcloud_segmentation::GroundError;
    use std::fs;
    use tempfile::TempDir;

    /// Keeps rows with z < 1; no such rows means no ground.
    struct BelowOne;

    impl GroundFilter for BelowOne {
        fn method(&self) -> &str {
            "TEST"
        }

        fn ground_indices(&mut self, records: &PointRecords) -> Result<Vec<usize>, TerrainError> {
            let idx: Vec<usize> = (0..records.len())
                .filter(|&i| records.xyz(i)[2] < 1.0)
                .collect();
            if idx.is_empty() {
                return Err(GroundError::NoGroundFound {
                    rounds: 1,
                    min_support_ratio: 0.1,
                }
                .into());
            }
            Ok(idx)
        }
    }

    struct Broken;

    impl GroundFilter for Broken {
        fn method(&self) -> &str {
            "BROKEN"
        }

        fn ground_indices(&mut self, _: &PointRecords) -> Result<Vec<usize>, TerrainError> {
            Err(io::Error::new(io::ErrorKind::Other, "disk on fire").into())
        }
    }

    fn write(dir: &TempDir, name: &str, text: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn merges_ground_and_skips_bad_files() {
        let dir = TempDir::new().unwrap();
        let files = vec![
            write(&dir, "a.txt", "0 0 0.5 1 2 3\n1 0 5 4 5 6\n"),
            write(&dir, "b.txt", "0 0 9 1 1 1\n"),
            write(&dir, "c.txt", "0 0 0 1 1\n"),
            write(&dir, "d.txt", "garbage\n"),
            write(&dir, "e.txt", "2 2 0.25 7 8 9\n"),
            dir.path().join("missing.txt"),
        ];

        let report = generate_terrain(&files, &mut BelowOne).unwrap();
        let ground = report.ground.as_ref().unwrap();
        assert_eq!(ground.columns(), 6);
        assert_eq!(ground.row(0), &[0.0, 0.0, 0.5, 1.0, 2.0, 3.0]);
        assert_eq!(ground.row(1), &[2.0, 2.0, 0.25, 7.0, 8.0, 9.0]);

        assert_eq!(
            report.files[0].outcome,
            FileOutcome::Ground {
                points: 2,
                ground: 1
            }
        );
        assert_eq!(report.skipped(), 4);
        assert_eq!(report.files.len(), 6);
    }

    #[test]
    fn other_filter_errors_abort() {
        let dir = TempDir::new().unwrap();
        let files = [write(&dir, "a.txt", "0 0 0\n")];
        assert!(matches!(
            generate_terrain(&files, &mut Broken),
            Err(TerrainError::Io(_))
        ));
    }

    #[test]
    fn boxed_filters_work() {
        let dir = TempDir::new().unwrap();
        let files = [write(&dir, "a.txt", "0 0 0\n")];
        let mut filter: Box<dyn GroundFilter> = Box::new(BelowOne);
        let report = generate_terrain(&files, &mut filter).unwrap();
        assert_eq!(report.ground_len(), 1);
    }

    #[test]
    fn saves_only_when_ground_exists() {
        let base = TempDir::new().unwrap();
        let now = NaiveDate::from_ymd_opt(2025, 1, 2)
            .unwrap()
            .and_hms_opt(13, 14, 15)
            .unwrap();

        let empty = TerrainReport::default();
        assert_eq!(save_terrain(&empty, base.path(), "TEST", now).unwrap(), None);

        let report = TerrainReport {
            ground: Some(PointRecords::from_rows(3, &[[1.0, 2.0, 3.0]])),
            files: Vec::new(),
        };
        let path = save_terrain(&report, base.path(), "TEST", now)
            .unwrap()
            .unwrap();
        assert!(path.ends_with("2025-01-02/total_ground_TEST_131415.txt"));
        assert_eq!(
            fs::read_to_string(path).unwrap(),
            "1.000000 2.000000 3.000000\n"
        );
    }
}
