use crate::config::PreprocessConfig;
use anyhow::{Context, Result};
use groundcloud_core::PointCloud;
use groundcloud_filters::{statistical_outlier_removal, voxel_downsample};
use groundcloud_io::{load_and_merge_txt_folder, write_ply, write_ply_binary};
use groundcloud_normals::{estimate_normals_with, NeighborSearch};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// `pointcloud_voxel_<size>.ply`, size with one decimal.
pub fn output_file_name(voxel_size: f64) -> String {
    format!("pointcloud_voxel_{:.1}.ply", voxel_size)
}

/// A point well above the cloud, so estimated normals face up.
fn viewpoint_above(cloud: &PointCloud) -> [f64; 3] {
    let bounds = cloud.aabb();
    if bounds.is_empty() {
        return [0.0, 0.0, 1.0];
    }
    let extent = bounds.extent();
    let lift = extent.iter().cloned().fold(0.0, f64::max) + 1.0;
    [
        0.5 * (bounds.min[0] + bounds.max[0]),
        0.5 * (bounds.min[1] + bounds.max[1]),
        bounds.max[2] + lift,
    ]
}

/// Downsample, estimate normals, then strip outliers `outlier_passes` times.
pub fn preprocess_cloud(cloud: &PointCloud, cfg: &PreprocessConfig) -> PointCloud {
    let start = Instant::now();
    let mut cloud = voxel_downsample(cloud, cfg.voxel_size);
    info!(
        "downsampled to {} point(s) with voxel size {} in {:.2}s",
        cloud.len(),
        cfg.voxel_size,
        start.elapsed().as_secs_f64()
    );

    let start = Instant::now();
    let search = NeighborSearch::Hybrid {
        radius: cfg.normal_radius,
        max_nn: cfg.normal_max_nn,
    };
    cloud.normals = Some(estimate_normals_with(&cloud, search, viewpoint_above(&cloud)));
    info!(
        "normals estimated with radius={} and max_nn={} in {:.2}s",
        cfg.normal_radius,
        cfg.normal_max_nn,
        start.elapsed().as_secs_f64()
    );

    for pass in 1..=cfg.outlier_passes {
        let start = Instant::now();
        let before = cloud.len();
        cloud = statistical_outlier_removal(&cloud, cfg.outlier_neighbors, cfg.outlier_std_ratio);
        info!(
            "outlier pass {}: {} -> {} point(s) in {:.2}s",
            pass,
            before,
            cloud.len(),
            start.elapsed().as_secs_f64()
        );
    }

    cloud
}

/// Full preprocessing run: merge the input folder, clean it and write the
/// PLY into `output_dir`. Returns the written path.
pub fn run(cfg: &PreprocessConfig, output_dir: &Path) -> Result<PathBuf> {
    let start = Instant::now();
    let merged = load_and_merge_txt_folder(&cfg.input_dir, cfg.use_rgb)
        .with_context(|| format!("loading {}", cfg.input_dir.display()))?;
    info!(
        "merged {} point(s) in {:.2}s",
        merged.len(),
        start.elapsed().as_secs_f64()
    );

    let cloud = preprocess_cloud(&merged, cfg);

    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;
    let path = output_dir.join(output_file_name(cfg.voxel_size));
    if cfg.binary {
        write_ply_binary(&path, &cloud)
    } else {
        write_ply(&path, &cloud)
    }
    .with_context(|| format!("writing {}", path.display()))?;
    info!("saved {} point(s) to {}", cloud.len(), path.display());

    Ok(path)
}
