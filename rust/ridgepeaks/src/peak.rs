use crate::ranking::RidgeScores;
use nohash_hasher::BuildNoHashHasher;
use serde::Serialize;
use std::collections::HashMap;

pub type RunId = u32;
pub type PeakId = u32;

/// Scores against the peaks of one peer run, keyed by peer peak id.
pub type PeerScores = HashMap<PeakId, f64, BuildNoHashHasher<PeakId>>;

/// Per peer run similarity scores, keyed by run id.
pub type SimilarityMap = HashMap<RunId, PeerScores, BuildNoHashHasher<RunId>>;

/// A detected chromatographic peak, owned by exactly one run.
#[derive(Debug, Clone, Serialize)]
pub struct Peak {
    pub id: PeakId,
    pub run_id: RunId,
    pub cycle_index: usize,
    pub time_within_cycle: usize,
    /// Position of the apex in the 1-D trace (scan index).
    pub apex_position: usize,
    pub apex_intensity: f64,
    pub apex_retention_time: f64,
    pub fingerprint: Vec<f64>,
    pub scores: RidgeScores,
    #[serde(skip)]
    pub similarity_to_other_runs: SimilarityMap,
}

impl Peak {
    /// Builds a peak that did not come out of ridge ranking,
    /// e.g. from an external peak list.
    pub fn new(
        run_id: RunId,
        id: PeakId,
        apex_position: usize,
        apex_retention_time: f64,
        apex_intensity: f64,
    ) -> Self {
        Self {
            id,
            run_id,
            cycle_index: 0,
            time_within_cycle: apex_position,
            apex_position,
            apex_intensity,
            apex_retention_time,
            fingerprint: Vec::new(),
            scores: RidgeScores::default(),
            similarity_to_other_runs: SimilarityMap::default(),
        }
    }

    pub fn with_grid_coordinates(mut self, cycle_index: usize, time_within_cycle: usize) -> Self {
        self.cycle_index = cycle_index;
        self.time_within_cycle = time_within_cycle;
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: Vec<f64>) -> Self {
        self.fingerprint = fingerprint;
        self
    }

    pub fn scores_for_run(&self, run_id: RunId) -> Option<&PeerScores> {
        self.similarity_to_other_runs.get(&run_id)
    }

    pub fn record_similarity(&mut self, run_id: RunId, peer: PeakId, score: f64) {
        self.similarity_to_other_runs
            .entry(run_id)
            .or_default()
            .insert(peer, score);
    }

    pub fn clear_similarities(&mut self) {
        self.similarity_to_other_runs = SimilarityMap::default();
    }
}
