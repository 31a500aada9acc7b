use anyhow::{Context, Result};
use groundcloud_core::{CloudSummary, ExtremePoints, PointCloud};
use groundcloud_io::{read_ply, read_records};
use std::fmt::Write as _;
use std::path::Path;

const AXES: [char; 3] = ['X', 'Y', 'Z'];

/// Loads a `.ply` file, or any other file as whitespace-separated records.
pub fn load_cloud(path: &Path) -> Result<PointCloud> {
    let is_ply = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("ply"));
    let cloud = if is_ply {
        read_ply(path)?
    } else {
        let records = read_records(path)?;
        anyhow::ensure!(
            records.has_xyz(),
            "{} has {} column(s), need x, y, z",
            path.display(),
            records.columns()
        );
        records.to_cloud()
    };
    Ok(cloud)
}

fn fmt_point(p: [f64; 3]) -> String {
    format!("[{:.6} {:.6} {:.6}]", p[0], p[1], p[2])
}

pub fn format_summary(summary: &CloudSummary) -> String {
    let mut out = String::from("[SUMMARY] Point cloud statistics:\n");
    let _ = writeln!(out, "  - Total points: {}", summary.num_points);
    if !summary.bounds.is_empty() {
        for (axis, name) in AXES.iter().enumerate() {
            let _ = writeln!(
                out,
                "  - {} range: {:.6} to {:.6}",
                name, summary.bounds.min[axis], summary.bounds.max[axis]
            );
        }
    }
    let _ = writeln!(
        out,
        "  - Colors: {}",
        if summary.has_colors { "Present" } else { "Not present" }
    );
    out
}

pub fn format_extremes(extremes: &ExtremePoints) -> String {
    let mut out = String::from("[INFO] Extreme points (actual points in point cloud):\n");
    for (axis, name) in AXES.iter().enumerate() {
        let _ = writeln!(out, "  - {} min: {}", name, fmt_point(extremes.min[axis].point));
        let _ = writeln!(out, "  - {} max: {}", name, fmt_point(extremes.max[axis].point));
    }
    out
}

/// Loads `path` and renders the summary and extreme-point report.
pub fn run(path: &Path) -> Result<String> {
    let cloud = load_cloud(path).with_context(|| format!("loading {}", path.display()))?;
    let mut report = format_summary(&CloudSummary::of(&cloud));
    match ExtremePoints::of(&cloud) {
        Some(extremes) => report.push_str(&format_extremes(&extremes)),
        None => report.push_str("[INFO] No finite points.\n"),
    }
    Ok(report)
}
