use crate::error::FitError;
use crate::ransac_plane::{segment_plane, PlaneModel, SAMPLE_SIZE};
use rand::prelude::*;
use rand::rngs::StdRng;

/// Result of fitting a plane to a point subset.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneFit {
    pub plane: PlaneModel,
    /// Indices into the subset passed to [`PlaneFitter::fit_plane`].
    pub inliers: Vec<usize>,
}

/// A single-shot plane fitting primitive.
///
/// Implementations take `&mut self` so randomized fitters can advance their
/// generator between calls. Any `FnMut(&[[f64; 3]], f64) -> Result<PlaneFit, FitError>`
/// closure is a fitter, which keeps scripted fitters in tests short.
pub trait PlaneFitter {
    fn fit_plane(&mut self, points: &[[f64; 3]], distance_threshold: f64) -> Result<PlaneFit, FitError>;
}

impl<F> PlaneFitter for F
where
    F: FnMut(&[[f64; 3]], f64) -> Result<PlaneFit, FitError>,
{
    fn fit_plane(&mut self, points: &[[f64; 3]], distance_threshold: f64) -> Result<PlaneFit, FitError> {
        self(points, distance_threshold)
    }
}

/// [`PlaneFitter`] backed by [`segment_plane`].
///
/// Each call draws a fresh seed from the fitter's own generator, so a fitter
/// built with [`RansacPlaneFitter::seeded`] replays the same sequence of fits.
#[derive(Debug, Clone)]
pub struct RansacPlaneFitter {
    iterations: usize,
    rng: StdRng,
}

impl RansacPlaneFitter {
    pub const DEFAULT_ITERATIONS: usize = 1000;

    pub fn new(iterations: usize) -> Self {
        Self {
            iterations,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(iterations: usize, seed: u64) -> Self {
        Self {
            iterations,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }
}

impl Default for RansacPlaneFitter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ITERATIONS)
    }
}

impl PlaneFitter for RansacPlaneFitter {
    fn fit_plane(&mut self, points: &[[f64; 3]], distance_threshold: f64) -> Result<PlaneFit, FitError> {
        if points.len() < SAMPLE_SIZE {
            return Err(FitError::TooFewPoints {
                found: points.len(),
                required: SAMPLE_SIZE,
            });
        }

        let seed = self.rng.next_u64();
        let (plane, inliers) =
            segment_plane(points, distance_threshold, self.iterations, seed).ok_or(FitError::Degenerate)?;

        Ok(PlaneFit { plane, inliers })
    }
}
