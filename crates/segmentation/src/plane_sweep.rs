//! Iterative dominant-ground-plane extraction.
//!
//! Each round fits a plane to the points not yet claimed by an earlier
//! round, scores it by support ratio and mean height, and strips its inliers
//! from the working set whether or not it became the champion. Stripping
//! unconditionally is what lets a lower plane surface in a later round after
//! a higher, larger one has been taken out of the way.

use crate::error::GroundError;
use crate::fitter::{PlaneFitter, RansacPlaneFitter};
use crate::ransac_plane::PlaneModel;
use log::debug;

/// Smallest point set a round will try to fit.
pub const MIN_PLANE_POINTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneSweepParams {
    /// Maximum point-to-plane distance for an inlier.
    pub distance_threshold: f64,
    /// A candidate must claim strictly more than this fraction of the input.
    pub min_support_ratio: f64,
    /// Upper bound on fit-and-remove rounds.
    pub max_rounds: usize,
}

impl Default for PlaneSweepParams {
    fn default() -> Self {
        Self {
            distance_threshold: 0.3,
            min_support_ratio: 0.1,
            max_rounds: 5,
        }
    }
}

impl PlaneSweepParams {
    pub fn validate(&self) -> Result<(), GroundError> {
        if !(self.distance_threshold.is_finite() && self.distance_threshold > 0.0) {
            return Err(GroundError::InvalidParameter {
                name: "distance_threshold",
                reason: format!("must be finite and > 0, got {}", self.distance_threshold),
            });
        }
        if !(self.min_support_ratio > 0.0 && self.min_support_ratio < 1.0) {
            return Err(GroundError::InvalidParameter {
                name: "min_support_ratio",
                reason: format!("must lie in (0, 1), got {}", self.min_support_ratio),
            });
        }
        if self.max_rounds == 0 {
            return Err(GroundError::InvalidParameter {
                name: "max_rounds",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// A plane proposed in one round.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateResult {
    pub plane: PlaneModel,
    /// Ascending indices into the original input.
    pub inliers: Vec<usize>,
    /// `inliers.len()` over the size of the original input.
    pub support_ratio: f64,
    /// Mean z of the inliers.
    pub mean_height: f64,
}

/// What happened in one round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundReport {
    /// Zero-based round number.
    pub round: usize,
    /// Size of the working set the round fitted against.
    pub remaining: usize,
    /// `None` when the fit failed or returned no inliers.
    pub candidate: Option<CandidateResult>,
    /// The candidate became the champion.
    pub accepted: bool,
}

/// The champion of a successful extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundPlane {
    pub plane: PlaneModel,
    /// Ascending indices into the original input.
    pub indices: Vec<usize>,
    pub support_ratio: f64,
    pub mean_height: f64,
    /// Round that produced the champion.
    pub round: usize,
    /// Every round that ran, in order.
    pub rounds: Vec<RoundReport>,
}

/// Finds the lowest plane with enough support by repeated fit-and-remove.
#[derive(Debug, Clone)]
pub struct PlaneSweepExtractor<F> {
    fitter: F,
    params: PlaneSweepParams,
}

impl<F: PlaneFitter> PlaneSweepExtractor<F> {
    pub fn new(fitter: F, params: PlaneSweepParams) -> Self {
        Self { fitter, params }
    }

    pub fn params(&self) -> &PlaneSweepParams {
        &self.params
    }

    pub fn into_fitter(self) -> F {
        self.fitter
    }

    /// Runs up to `max_rounds` rounds over `points` and returns the
    /// champion, or [`GroundError::NoGroundFound`] when no candidate ever
    /// cleared the support ratio.
    ///
    /// The loop ends early once fewer than [`MIN_PLANE_POINTS`] points remain.
    /// A round whose fit fails contributes no candidate and removes nothing.
    pub fn extract(&mut self, points: &[[f64; 3]]) -> Result<GroundPlane, GroundError> {
        let n = points.len();
        if n < MIN_PLANE_POINTS {
            return Err(GroundError::InsufficientPoints {
                found: n,
                required: MIN_PLANE_POINTS,
            });
        }
        self.params.validate()?;

        let PlaneSweepParams {
            distance_threshold,
            min_support_ratio,
            max_rounds,
        } = self.params;

        // remaining[local] = index into `points`; strictly ascending
        let mut remaining: Vec<usize> = (0..n).collect();
        let mut champion: Option<usize> = None;
        let mut rounds: Vec<RoundReport> = Vec::with_capacity(max_rounds);

        for round in 0..max_rounds {
            if remaining.len() < MIN_PLANE_POINTS {
                debug!(
                    "round {}: only {} point(s) left, stopping",
                    round + 1,
                    remaining.len()
                );
                break;
            }

            let subset: Vec<[f64; 3]> = remaining.iter().map(|&i| points[i]).collect();

            let fit = match self.fitter.fit_plane(&subset, distance_threshold) {
                Ok(fit) => fit,
                Err(err) => {
                    debug!("round {}: plane fit failed: {}", round + 1, err);
                    rounds.push(RoundReport {
                        round,
                        remaining: remaining.len(),
                        candidate: None,
                        accepted: false,
                    });
                    continue;
                }
            };

            let mut taken = vec![false; subset.len()];
            let mut inliers = Vec::with_capacity(fit.inliers.len());
            for &local in &fit.inliers {
                if local >= subset.len() {
                    return Err(GroundError::InlierOutOfRange {
                        index: local,
                        len: subset.len(),
                    });
                }
                if !taken[local] {
                    taken[local] = true;
                    inliers.push(remaining[local]);
                }
            }
            inliers.sort_unstable();

            let candidate = (!inliers.is_empty()).then(|| {
                let mean_height =
                    inliers.iter().map(|&i| points[i][2]).sum::<f64>() / inliers.len() as f64;
                CandidateResult {
                    plane: fit.plane,
                    support_ratio: inliers.len() as f64 / n as f64,
                    mean_height,
                    inliers,
                }
            });

            let accepted = candidate.as_ref().is_some_and(|c| {
                let lower = match champion {
                    None => true,
                    Some(best) => rounds[best]
                        .candidate
                        .as_ref()
                        .is_some_and(|b| c.mean_height < b.mean_height),
                };
                c.support_ratio > min_support_ratio && c.mean_height.is_finite() && lower
            });

            if let Some(c) = &candidate {
                debug!(
                    "round {}: {} inlier(s), support {:.4}, mean z {:.4}{}",
                    round + 1,
                    c.inliers.len(),
                    c.support_ratio,
                    c.mean_height,
                    if accepted { ", new champion" } else { "" }
                );
            }

            rounds.push(RoundReport {
                round,
                remaining: remaining.len(),
                candidate,
                accepted,
            });
            if accepted {
                champion = Some(rounds.len() - 1);
            }

            remaining = remaining
                .into_iter()
                .zip(taken)
                .filter_map(|(idx, t)| (!t).then_some(idx))
                .collect();
        }

        let Some(best) = champion else {
            return Err(GroundError::NoGroundFound {
                rounds: rounds.len(),
                min_support_ratio,
            });
        };

        let report = &rounds[best];
        let Some(c) = report.candidate.clone() else {
            unreachable!("champion round always carries a candidate");
        };

        Ok(GroundPlane {
            plane: c.plane,
            indices: c.inliers,
            support_ratio: c.support_ratio,
            mean_height: c.mean_height,
            round: report.round,
            rounds,
        })
    }
}

/// One-call form with a freshly seeded RANSAC fitter of
/// [`RansacPlaneFitter::DEFAULT_ITERATIONS`] iterations.
///
/// Returns the ascending indices of the ground plane's inliers.
pub fn extract_ground_plane(
    points: &[[f64; 3]],
    distance_threshold: f64,
    min_support_ratio: f64,
    max_rounds: usize,
) -> Result<Vec<usize>, GroundError> {
    let params = PlaneSweepParams {
        distance_threshold,
        min_support_ratio,
        max_rounds,
    };
    PlaneSweepExtractor::new(RansacPlaneFitter::default(), params)
        .extract(points)
        .map(|ground| ground.indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FitError;
    use crate::fitter::PlaneFit;
    use rand::prelude::*;
    use rand::rngs::StdRng;
    use std::collections::VecDeque;

    fn horizontal(z: f64) -> PlaneModel {
        PlaneModel {
            normal: [0.0, 0.0, 1.0],
            d: -z,
        }
    }

    /// Flat 40x25 grid at z = 0 followed by a 10x5 grid at z = 10.
    fn plane_with_raised_patch() -> Vec<[f64; 3]> {
        let mut pts = Vec::with_capacity(1050);
        for i in 0..40 {
            for j in 0..25 {
                pts.push([i as f64 * 0.1, j as f64 * 0.1, 0.0]);
            }
        }
        for i in 0..10 {
            for j in 0..5 {
                pts.push([i as f64 * 0.3, j as f64 * 0.3, 10.0]);
            }
        }
        pts
    }

    fn noisy_sphere(n: usize, seed: u64) -> Vec<[f64; 3]> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| {
                let theta = rng.gen_range(0.0..std::f64::consts::TAU);
                let u: f64 = rng.gen_range(-1.0..1.0);
                let r = 1.0 + rng.gen_range(-0.05..0.05);
                let s = (1.0 - u * u).sqrt();
                [r * s * theta.cos(), r * s * theta.sin(), r * u]
            })
            .collect()
    }

    /// Replays canned fits and records the subsets it was shown.
    fn scripted(
        fits: Vec<Result<PlaneFit, FitError>>,
        seen: &mut Vec<Vec<[f64; 3]>>,
    ) -> impl FnMut(&[[f64; 3]], f64) -> Result<PlaneFit, FitError> + '_ {
        let mut fits: VecDeque<_> = fits.into();
        move |points: &[[f64; 3]], _: f64| {
            seen.push(points.to_vec());
            fits.pop_front().unwrap_or(Err(FitError::Degenerate))
        }
    }

    fn fit(z: f64, inliers: Vec<usize>) -> Result<PlaneFit, FitError> {
        Ok(PlaneFit {
            plane: horizontal(z),
            inliers,
        })
    }

    fn params(min_support_ratio: f64, max_rounds: usize) -> PlaneSweepParams {
        PlaneSweepParams {
            distance_threshold: 0.01,
            min_support_ratio,
            max_rounds,
        }
    }

    #[test]
    fn fewer_than_four_points_is_insufficient() {
        for n in 0..MIN_PLANE_POINTS {
            let pts = vec![[0.0, 0.0, 0.0]; n];
            let mut extractor =
                PlaneSweepExtractor::new(RansacPlaneFitter::seeded(10, 1), params(0.1, 3));
            assert_eq!(
                extractor.extract(&pts),
                Err(GroundError::InsufficientPoints {
                    found: n,
                    required: MIN_PLANE_POINTS
                })
            );
        }
    }

    #[test]
    fn flat_ground_with_raised_outliers() {
        let pts = plane_with_raised_patch();
        let mut extractor =
            PlaneSweepExtractor::new(RansacPlaneFitter::seeded(1000, 7), params(0.1, 3));

        let ground = extractor.extract(&pts).unwrap();

        assert_eq!(ground.indices, (0..1000).collect::<Vec<_>>());
        assert_eq!(ground.round, 0);
        assert!(ground.mean_height.abs() < 1e-12);
        assert!(ground.plane.normal[2].abs() > 0.999);
        // round 2 takes the raised patch (too small), round 3 has nothing left
        assert_eq!(ground.rounds.len(), 2);
        assert!(!ground.rounds[1].accepted);
    }

    #[test]
    fn one_call_form_returns_ground_indices() {
        let pts = plane_with_raised_patch();
        let indices = extract_ground_plane(&pts, 0.01, 0.1, 3).unwrap();
        assert_eq!(indices, (0..1000).collect::<Vec<_>>());
    }

    #[test]
    fn noisy_sphere_exhausts_without_ground() {
        let pts = noisy_sphere(600, 3);
        let mut extractor =
            PlaneSweepExtractor::new(RansacPlaneFitter::seeded(200, 11), params(0.99, 4));

        assert_eq!(
            extractor.extract(&pts),
            Err(GroundError::NoGroundFound {
                rounds: 4,
                min_support_ratio: 0.99
            })
        );
    }

    #[test]
    fn equal_height_does_not_replace_champion() {
        // two disjoint patches at the same height
        let pts: Vec<[f64; 3]> = (0..8).map(|i| [i as f64, 0.0, 1.0]).collect();
        let mut seen = Vec::new();
        let fitter = scripted(vec![fit(1.0, vec![0, 1, 2, 3]), fit(1.0, vec![0, 1, 2, 3])], &mut seen);
        let mut extractor = PlaneSweepExtractor::new(fitter, params(0.1, 2));

        let ground = extractor.extract(&pts).unwrap();
        assert_eq!(ground.round, 0);
        assert_eq!(ground.indices, vec![0, 1, 2, 3]);
        assert!(!ground.rounds[1].accepted);
        // the second round's local 0..4 are original 4..8
        assert_eq!(ground.rounds[1].candidate.as_ref().unwrap().inliers, vec![4, 5, 6, 7]);
    }

    #[test]
    fn lower_plane_in_later_round_wins() {
        let mut pts: Vec<[f64; 3]> = (0..6).map(|i| [i as f64, 0.0, 5.0]).collect();
        pts.extend((0..4).map(|i| [i as f64, 1.0, -2.0]));
        let mut seen = Vec::new();
        let fitter = scripted(vec![fit(5.0, (0..6).collect()), fit(-2.0, (0..4).collect())], &mut seen);
        let mut extractor = PlaneSweepExtractor::new(fitter, params(0.2, 2));

        let ground = extractor.extract(&pts).unwrap();
        assert_eq!(ground.round, 1);
        assert_eq!(ground.indices, vec![6, 7, 8, 9]);
        assert_eq!(ground.mean_height, -2.0);
        assert!(ground.rounds[0].accepted && ground.rounds[1].accepted);
    }

    #[test]
    fn rejected_candidates_are_still_removed() {
        let mut pts: Vec<[f64; 3]> = (0..2).map(|i| [i as f64, 0.0, -9.0]).collect();
        pts.extend((0..18).map(|i| [i as f64, 1.0, 0.0]));
        let mut seen = Vec::new();
        {
            // round 1: tiny low patch, below the support ratio
            let fitter = scripted(vec![fit(-9.0, vec![0, 1]), fit(0.0, (0..18).collect())], &mut seen);
            let mut extractor = PlaneSweepExtractor::new(fitter, params(0.5, 3));
            let ground = extractor.extract(&pts).unwrap();
            assert!(!ground.rounds[0].accepted);
            assert_eq!(ground.round, 1);
            assert_eq!(ground.indices, (2..20).collect::<Vec<_>>());
        }
        assert_eq!(seen[0].len(), 20);
        assert_eq!(seen[1].len(), 18);
        assert!(seen[1].iter().all(|p| p[2] == 0.0));
    }

    #[test]
    fn failed_fit_removes_nothing_and_loop_continues() {
        let pts: Vec<[f64; 3]> = (0..10).map(|i| [i as f64, (i % 3) as f64, 0.0]).collect();
        let mut seen = Vec::new();
        {
            let fitter = scripted(vec![Err(FitError::Degenerate), fit(0.0, (0..10).collect())], &mut seen);
            let mut extractor = PlaneSweepExtractor::new(fitter, params(0.5, 2));
            let ground = extractor.extract(&pts).unwrap();
            assert!(ground.rounds[0].candidate.is_none());
            assert_eq!(ground.round, 1);
            assert_eq!(ground.indices.len(), 10);
        }
        assert_eq!(seen[0].len(), 10);
        assert_eq!(seen[1].len(), 10);
    }

    #[test]
    fn short_circuits_when_too_few_points_remain() {
        let pts: Vec<[f64; 3]> = (0..10).map(|i| [i as f64, 0.0, 0.0]).collect();
        let mut seen = Vec::new();
        {
            let fitter = scripted(vec![fit(0.0, (0..8).collect())], &mut seen);
            let mut extractor = PlaneSweepExtractor::new(fitter, params(0.5, 5));
            let ground = extractor.extract(&pts).unwrap();
            assert_eq!(ground.rounds.len(), 1);
        }
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn out_of_range_inlier_is_an_error() {
        let pts = vec![[0.0, 0.0, 0.0]; 5];
        let mut seen = Vec::new();
        let fitter = scripted(vec![fit(0.0, vec![0, 5])], &mut seen);
        let mut extractor = PlaneSweepExtractor::new(fitter, params(0.1, 1));
        assert_eq!(
            extractor.extract(&pts),
            Err(GroundError::InlierOutOfRange { index: 5, len: 5 })
        );
    }

    #[test]
    fn duplicate_local_inliers_count_once() {
        let pts: Vec<[f64; 3]> = (0..6).map(|i| [i as f64, 0.0, 0.0]).collect();
        let mut seen = Vec::new();
        let fitter = scripted(vec![fit(0.0, vec![2, 2, 1, 1])], &mut seen);
        let mut extractor = PlaneSweepExtractor::new(fitter, params(0.1, 1));
        let ground = extractor.extract(&pts).unwrap();
        assert_eq!(ground.indices, vec![1, 2]);
        assert!((ground.support_ratio - 2.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let pts = plane_with_raised_patch();
        let bad = [
            PlaneSweepParams {
                distance_threshold: 0.0,
                ..PlaneSweepParams::default()
            },
            PlaneSweepParams {
                min_support_ratio: 1.0,
                ..PlaneSweepParams::default()
            },
            PlaneSweepParams {
                max_rounds: 0,
                ..PlaneSweepParams::default()
            },
        ];
        for p in bad {
            let mut extractor = PlaneSweepExtractor::new(RansacPlaneFitter::seeded(10, 1), p);
            assert!(matches!(
                extractor.extract(&pts),
                Err(GroundError::InvalidParameter { .. })
            ));
        }
    }

    /// Three stacked horizontal layers; checks the bookkeeping invariants on
    /// the real RANSAC fitter.
    #[test]
    fn stacked_layers_invariants() {
        let mut pts = Vec::new();
        for (layer, (z, count)) in [(4.0, 300usize), (0.5, 200), (2.0, 250)].into_iter().enumerate() {
            for k in 0..count {
                let x = (k % 20) as f64 * 0.2 + layer as f64 * 0.01;
                let y = (k / 20) as f64 * 0.2;
                pts.push([x, y, z]);
            }
        }
        let n = pts.len();

        let mut extractor =
            PlaneSweepExtractor::new(RansacPlaneFitter::seeded(500, 5), params(0.15, 4));
        let ground = extractor.extract(&pts).unwrap();

        assert!((ground.mean_height - 0.5).abs() < 1e-9);
        assert!(ground.indices.iter().all(|&i| i < n));

        let mut claimed = vec![false; n];
        let mut prev_remaining = usize::MAX;
        for report in &ground.rounds {
            assert!(report.remaining < prev_remaining);
            prev_remaining = report.remaining;

            let Some(c) = &report.candidate else { continue };
            for &i in &c.inliers {
                assert!(!claimed[i], "index {} removed twice", i);
                claimed[i] = true;
            }
            if c.support_ratio > 0.15 {
                assert!(ground.mean_height <= c.mean_height);
            }
        }
    }
}
