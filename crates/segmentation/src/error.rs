use thiserror::Error;

/// Failure of a single plane fit.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("need at least {required} points to fit a plane, got {found}")]
    TooFewPoints { found: usize, required: usize },
    #[error("every sampled point triple was degenerate (collinear or coincident)")]
    Degenerate,
}

/// Failure of a ground-plane extraction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GroundError {
    #[error("need at least {required} points to extract a ground plane, got {found}")]
    InsufficientPoints { found: usize, required: usize },
    #[error("no plane exceeded a support ratio of {min_support_ratio} in {rounds} round(s)")]
    NoGroundFound { rounds: usize, min_support_ratio: f64 },
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("plane fitter returned inlier {index} for a subset of {len} points")]
    InlierOutOfRange { index: usize, len: usize },
}
