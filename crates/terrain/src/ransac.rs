use crate::error::TerrainError;
use crate::filter::{require_xyz, GroundFilter};
use groundcloud_core::PointRecords;
use groundcloud_segmentation::{PlaneSweepExtractor, PlaneSweepParams, RansacPlaneFitter};
use log::info;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RansacParams {
    pub sweep: PlaneSweepParams,
    /// RANSAC iterations per round.
    pub iterations: usize,
    /// Fixed seed for reproducible runs; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            sweep: PlaneSweepParams::default(),
            iterations: RansacPlaneFitter::DEFAULT_ITERATIONS,
            seed: None,
        }
    }
}

/// Keeps the lowest well-supported plane of each input.
pub struct RansacGroundFilter {
    extractor: PlaneSweepExtractor<RansacPlaneFitter>,
}

impl RansacGroundFilter {
    pub fn new(params: RansacParams) -> Self {
        let fitter = match params.seed {
            Some(seed) => RansacPlaneFitter::seeded(params.iterations, seed),
            None => RansacPlaneFitter::new(params.iterations),
        };
        Self {
            extractor: PlaneSweepExtractor::new(fitter, params.sweep),
        }
    }
}

impl GroundFilter for RansacGroundFilter {
    fn method(&self) -> &str {
        "RANSAC"
    }

    fn ground_indices(&mut self, records: &PointRecords) -> Result<Vec<usize>, TerrainError> {
        require_xyz(records)?;
        let ground = self.extractor.extract(&records.positions())?;
        info!(
            "ground plane from round {}: {} point(s), support {:.3}, mean z {:.3}",
            ground.round + 1,
            ground.indices.len(),
            ground.support_ratio,
            ground.mean_height
        );
        Ok(ground.indices)
    }
}
