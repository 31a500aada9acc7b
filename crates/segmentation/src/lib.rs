#![forbid(unsafe_code)]

pub mod error;
pub mod fitter;
pub mod plane_sweep;
pub mod ransac_plane;

pub use error::{FitError, GroundError};
pub use fitter::{PlaneFit, PlaneFitter, RansacPlaneFitter};
pub use plane_sweep::{
    extract_ground_plane, CandidateResult, GroundPlane, PlaneSweepExtractor, PlaneSweepParams,
    RoundReport, MIN_PLANE_POINTS,
};
pub use ransac_plane::{segment_plane, PlaneModel};
