use crate::errors::{
    Result,
    RidgePeaksError,
};
use crate::peak::{
    Peak,
    RunId,
};
use crate::quadtree::QuadTree;
use crate::ridges::{
    Ridge,
    grid_bounds,
    grid_point,
};
use crate::trace::IntensityTrace;
use serde::{
    Deserialize,
    Serialize,
};
use std::cmp::Ordering;
use tracing::debug;

/// A single ranking key. Every key is oriented so that lower is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankCriterion {
    RidgeCost,
    Response,
    HorizontalNeighborhood,
    RidgeNeighborhood,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RidgeScores {
    pub ridge_cost: f64,
    /// Negated scale 1 response.
    pub response: f64,
    pub horizontal_neighborhood: usize,
    pub ridge_neighborhood: usize,
}

impl RidgeScores {
    fn key(&self, criterion: RankCriterion) -> f64 {
        match criterion {
            RankCriterion::RidgeCost => self.ridge_cost,
            RankCriterion::Response => self.response,
            RankCriterion::HorizontalNeighborhood => self.horizontal_neighborhood as f64,
            RankCriterion::RidgeNeighborhood => self.ridge_neighborhood as f64,
        }
    }

    fn compare(&self, other: &Self, criteria: &[RankCriterion]) -> Ordering {
        criteria
            .iter()
            .map(|&c| self.key(c).total_cmp(&other.key(c)))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RidgeRankerConfig {
    /// Lexicographic ranking order.
    pub criteria: Vec<RankCriterion>,
    pub horizontal_radius: f64,
    pub neighborhood_radius: f64,
    pub top_k: usize,
    pub node_capacity: usize,
    pub fingerprint_half_width: usize,
}

impl Default for RidgeRankerConfig {
    fn default() -> Self {
        Self {
            criteria: vec![
                RankCriterion::Response,
                RankCriterion::HorizontalNeighborhood,
                RankCriterion::RidgeNeighborhood,
            ],
            horizontal_radius: 1.0,
            neighborhood_radius: 3.0,
            top_k: 200,
            node_capacity: 8,
            fingerprint_half_width: 5,
        }
    }
}

/// Scores ridges and promotes the best ones to peaks.
///
/// # Example
///
/// ```
/// use ridgepeaks::{IntensityTrace, RidgeRanker, RidgeRankerConfig, RidgeTracker, RidgeTrackerConfig};
///
/// let intensities: Vec<f64> = (0..64)
///     .map(|i| 50.0 * (-((i as f64 - 30.0).powi(2)) / 8.0).exp())
///     .collect();
/// let trace = IntensityTrace::with_uniform_sampling(intensities, 64, 0.5).unwrap();
/// let tracker = RidgeTracker::new(RidgeTrackerConfig {
///     max_scale: 4,
///     significance_threshold: 1.0,
///     ..Default::default()
/// })
/// .unwrap();
/// let ridges = tracker.track(&trace).unwrap();
/// let peaks = RidgeRanker::new(RidgeRankerConfig::default())
///     .unwrap()
///     .rank(7, &ridges, &trace)
///     .unwrap();
/// assert_eq!(peaks.len(), 1);
/// assert_eq!(peaks[0].apex_position, 30);
/// assert_eq!(peaks[0].apex_retention_time, 15.0);
/// assert_eq!(peaks[0].run_id, 7);
/// ```
#[derive(Debug, Clone)]
pub struct RidgeRanker {
    config: RidgeRankerConfig,
}

impl RidgeRanker {
    pub fn new(config: RidgeRankerConfig) -> Result<Self> {
        if config.top_k == 0 {
            return Err(RidgePeaksError::invalid(
                "top_k",
                0.0,
                "at least one peak must be promoted",
            ));
        }
        if config.node_capacity == 0 {
            return Err(RidgePeaksError::invalid(
                "node_capacity",
                0.0,
                "quad-tree nodes need room for one point",
            ));
        }
        for (name, radius) in [
            ("horizontal_radius", config.horizontal_radius),
            ("neighborhood_radius", config.neighborhood_radius),
        ] {
            if !(radius.is_finite() && radius >= 0.0) {
                return Err(RidgePeaksError::invalid(
                    name,
                    radius,
                    "radius must be non-negative",
                ));
            }
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &RidgeRankerConfig {
        &self.config
    }

    /// Scores every ridge, in the order given.
    pub fn score(&self, ridges: &[Ridge], trace: &IntensityTrace) -> Result<Vec<RidgeScores>> {
        if ridges.is_empty() {
            return Ok(Vec::new());
        }
        let mut index = QuadTree::new(grid_bounds(trace)?, self.config.node_capacity)?;
        for (i, ridge) in ridges.iter().enumerate() {
            index.insert(grid_point(trace, ridge.position()), i)?;
        }

        ridges
            .iter()
            .enumerate()
            .map(|(i, ridge)| -> Result<RidgeScores> {
                let center = grid_point(trace, ridge.position());
                let horizontal = index
                    .horizontal_radius_query(&center, self.config.horizontal_radius)?
                    .into_iter()
                    .filter(|(_, j)| **j != i)
                    .count();
                let neighborhood = index
                    .radius_query(&center, self.config.neighborhood_radius)?
                    .into_iter()
                    .filter(|(_, j)| **j != i)
                    .count();
                Ok(RidgeScores {
                    ridge_cost: ridge.ridge_cost(),
                    response: -ridge.root_response(),
                    horizontal_neighborhood: horizontal,
                    ridge_neighborhood: neighborhood,
                })
            })
            .collect()
    }

    /// Promotes the `top_k` best ridges to peaks, ids `0..k` in rank order.
    #[tracing::instrument(level = "debug", skip_all, fields(run_id = run_id))]
    pub fn rank(&self, run_id: RunId, ridges: &[Ridge], trace: &IntensityTrace) -> Result<Vec<Peak>> {
        let scores = self.score(ridges, trace)?;
        let mut order: Vec<usize> = (0..ridges.len()).collect();
        // sort_by is stable, ties keep discovery order.
        order.sort_by(|&a, &b| scores[a].compare(&scores[b], &self.config.criteria));
        order.truncate(self.config.top_k);

        let mut peaks = Vec::with_capacity(order.len());
        for (rank, idx) in order.into_iter().enumerate() {
            let position = ridges[idx].position();
            let (Some(&intensity), Some(&rt)) = (
                trace.intensities().get(position),
                trace.retention_times().get(position),
            ) else {
                return Err(RidgePeaksError::ExpectedSlicesSameLength {
                    expected: trace.len(),
                    other: position + 1,
                    context: "ridge root outside of the trace".to_string(),
                });
            };
            let (cycle, time) = trace.grid_coordinates(position);
            let peak = Peak::new(run_id, rank as u32, position, rt, intensity)
                .with_grid_coordinates(cycle, time)
                .with_fingerprint(self.fingerprint(trace, position));
            peaks.push(Peak {
                scores: scores[idx].clone(),
                ..peak
            });
        }
        debug!("Scored {} ridges, promoted {} peaks", ridges.len(), peaks.len());
        Ok(peaks)
    }

    fn fingerprint(&self, trace: &IntensityTrace, apex: usize) -> Vec<f64> {
        if let Some(fp) = trace.fingerprint(apex) {
            return fp.to_vec();
        }
        let half = self.config.fingerprint_half_width as isize;
        let apex = apex as isize;
        (apex - half..=apex + half)
            .map(|i| {
                usize::try_from(i)
                    .ok()
                    .and_then(|i| trace.intensities().get(i))
                    .copied()
                    .unwrap_or(0.0)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ridges::{
        RidgeTracker,
        RidgeTrackerConfig,
    };

    fn spikes(len: usize, spikes: &[(usize, f64)]) -> Vec<f64> {
        let mut out = vec![0.0; len];
        for &(pos, h) in spikes {
            out[pos] = h;
        }
        out
    }

    fn single_scale_ridges(trace: &IntensityTrace) -> Vec<Ridge> {
        RidgeTracker::new(RidgeTrackerConfig {
            min_scale: 1,
            max_scale: 1,
            significance_threshold: 0.5,
            adjacency_radius: 0.0,
            extension_radius: None,
        })
        .unwrap()
        .track(trace)
        .unwrap()
    }

    #[test]
    fn test_rank_by_response() {
        let trace = IntensityTrace::with_uniform_sampling(
            spikes(100, &[(20, 3.0), (50, 9.0), (80, 5.0)]),
            100,
            1.0,
        )
        .unwrap();
        let ridges = single_scale_ridges(&trace);
        assert_eq!(ridges.len(), 3);

        let ranker = RidgeRanker::new(RidgeRankerConfig {
            top_k: 2,
            ..Default::default()
        })
        .unwrap();
        let peaks = ranker.rank(0, &ridges, &trace).unwrap();
        let apexes: Vec<usize> = peaks.iter().map(|p| p.apex_position).collect();
        assert_eq!(apexes, vec![50, 80]);
        assert_eq!(peaks[0].id, 0);
        assert_eq!(peaks[1].id, 1);
        assert_eq!(peaks[0].apex_intensity, 9.0);
        assert!(peaks[0].scores.response < peaks[1].scores.response);
    }

    #[test]
    fn test_neighborhood_counts() {
        // Row length 10: positions 12 and 14 share cycle 1, position 22 is
        // directly below 12 in cycle 2.
        let trace = IntensityTrace::with_uniform_sampling(
            spikes(40, &[(12, 4.0), (14, 4.0), (22, 4.0)]),
            10,
            1.0,
        )
        .unwrap();
        let ridges = single_scale_ridges(&trace);
        let positions: Vec<usize> = ridges.iter().map(|r| r.position()).collect();
        assert_eq!(positions, vec![12, 14, 22]);

        let ranker = RidgeRanker::new(RidgeRankerConfig {
            horizontal_radius: 2.0,
            neighborhood_radius: 1.5,
            ..Default::default()
        })
        .unwrap();
        let scores = ranker.score(&ridges, &trace).unwrap();
        // 12 <-> 14 are two apart within the same cycle.
        assert_eq!(scores[0].horizontal_neighborhood, 1);
        assert_eq!(scores[1].horizontal_neighborhood, 1);
        assert_eq!(scores[2].horizontal_neighborhood, 0);
        // 12 <-> 22 are one cycle apart.
        assert_eq!(scores[0].ridge_neighborhood, 1);
        assert_eq!(scores[1].ridge_neighborhood, 0);
        assert_eq!(scores[2].ridge_neighborhood, 1);
    }

    #[test]
    fn test_ties_keep_discovery_order() {
        let trace = IntensityTrace::with_uniform_sampling(
            spikes(60, &[(10, 2.0), (30, 2.0), (50, 2.0)]),
            60,
            1.0,
        )
        .unwrap();
        let ridges = single_scale_ridges(&trace);
        let peaks = RidgeRanker::new(RidgeRankerConfig::default())
            .unwrap()
            .rank(3, &ridges, &trace)
            .unwrap();
        let apexes: Vec<usize> = peaks.iter().map(|p| p.apex_position).collect();
        assert_eq!(apexes, vec![10, 30, 50]);
        assert!(peaks.iter().all(|p| p.run_id == 3));
    }

    #[test]
    fn test_intensity_window_fingerprint() {
        let trace =
            IntensityTrace::with_uniform_sampling(spikes(30, &[(1, 7.0)]), 30, 1.0).unwrap();
        let ridges = single_scale_ridges(&trace);
        let ranker = RidgeRanker::new(RidgeRankerConfig {
            fingerprint_half_width: 2,
            ..Default::default()
        })
        .unwrap();
        let peaks = ranker.rank(0, &ridges, &trace).unwrap();
        assert_eq!(peaks[0].apex_position, 1);
        // Window 1 +- 2 starts before the trace and is zero padded.
        assert_eq!(peaks[0].fingerprint, vec![0.0, 0.0, 7.0, 0.0, 0.0]);
    }

    #[test]
    fn test_trace_fingerprint_is_preferred() {
        let fps: Vec<Vec<f64>> = (0..30).map(|i| vec![i as f64, 1.0]).collect();
        let trace = IntensityTrace::with_uniform_sampling(spikes(30, &[(15, 7.0)]), 30, 1.0)
            .unwrap()
            .with_fingerprints(fps)
            .unwrap();
        let ridges = single_scale_ridges(&trace);
        let peaks = RidgeRanker::new(RidgeRankerConfig::default())
            .unwrap()
            .rank(0, &ridges, &trace)
            .unwrap();
        assert_eq!(peaks[0].fingerprint, vec![15.0, 1.0]);
    }

    #[test]
    fn test_invalid_config() {
        assert!(
            RidgeRanker::new(RidgeRankerConfig {
                top_k: 0,
                ..Default::default()
            })
            .is_err()
        );
        assert!(
            RidgeRanker::new(RidgeRankerConfig {
                neighborhood_radius: f64::INFINITY,
                ..Default::default()
            })
            .is_err()
        );
    }
}
