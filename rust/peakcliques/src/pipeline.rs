use crate::cliques::{
    AssignmentStats,
    Clique,
};
use crate::correspondence::{
    PeakCorrespondenceEngine,
    RunPeaks,
};
use crate::errors::{
    CorrespondenceError,
    Result,
};
use crate::reference::{
    AnchorPoint,
    ReferenceSelection,
    anchors,
    select_reference,
};
use crate::similarity::PeakSimilarity;
use ridgepeaks::{
    Peak,
    RunId,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::time::Instant;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CorrespondenceConfig {
    /// Peak pairs at least this far apart in retention time are never scored.
    pub max_rt_difference: f64,
    /// `-1` requires one member per run with peaks.
    pub min_clique_size: i64,
}

impl Default for CorrespondenceConfig {
    fn default() -> Self {
        Self {
            max_rt_difference: 60.0,
            min_clique_size: -1,
        }
    }
}

impl CorrespondenceConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.max_rt_difference.is_finite() && self.max_rt_difference > 0.0) {
            return Err(CorrespondenceError::invalid(
                "max_rt_difference",
                self.max_rt_difference,
                "retention time window must be positive",
            ));
        }
        if self.min_clique_size == 0 || self.min_clique_size < -1 {
            return Err(CorrespondenceError::invalid(
                "min_clique_size",
                self.min_clique_size as f64,
                "expected a positive size or -1 for all runs",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunAccounting {
    pub run_id: RunId,
    pub total: usize,
    /// Peaks that ended up in a reported clique.
    pub matched: usize,
    pub unmatched: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CorrespondenceResult {
    pub cliques: Vec<Clique>,
    /// Peaks without a bidirectional best hit in any other run.
    pub unmatched: Vec<Peak>,
    pub accounting: Vec<RunAccounting>,
    pub stats: AssignmentStats,
    pub reference: ReferenceSelection,
    pub anchors: Vec<AnchorPoint>,
}

/// Runs the whole correspondence: scoring, pruning, clique assignment,
/// reference selection and anchor extraction.
pub fn match_runs<S: PeakSimilarity>(
    runs: Vec<RunPeaks>,
    similarity: S,
    config: &CorrespondenceConfig,
) -> Result<CorrespondenceResult> {
    config.validate()?;
    let totals: Vec<(RunId, usize)> = runs.iter().map(|r| (r.run_id, r.peaks.len())).collect();

    let mut engine = PeakCorrespondenceEngine::new(runs, similarity)?;
    let start = Instant::now();
    engine.compute_similarities(config.max_rt_difference)?;
    info!("Similarity scoring took {:?}", start.elapsed());

    let unmatched = engine.prune_unmatched();
    let (cliques, stats) = engine.assign_cliques(config.min_clique_size)?;
    let reference = select_reference(&engine.run_ids(), &cliques, engine.similarity())?;
    let anchors = anchors(&cliques);

    let accounting = totals
        .into_iter()
        .map(|(run_id, total)| {
            let matched = cliques
                .iter()
                .filter(|c| c.member(run_id).is_some())
                .count();
            RunAccounting {
                run_id,
                total,
                matched,
                unmatched: total - matched,
            }
        })
        .collect();

    Ok(CorrespondenceResult {
        cliques,
        unmatched,
        accounting,
        stats,
        reference,
        anchors,
    })
}
