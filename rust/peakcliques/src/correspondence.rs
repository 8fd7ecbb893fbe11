use crate::cliques::{
    AssignmentStats,
    Clique,
    CliqueArena,
    PeakKey,
    PeakKeyMap,
};
use crate::errors::{
    CorrespondenceError,
    Result,
};
use crate::similarity::PeakSimilarity;
use nohash_hasher::{
    BuildNoHashHasher,
    IntSet,
};
use rayon::prelude::*;
use ridgepeaks::{
    Peak,
    PeakId,
    RunId,
};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{
    debug,
    info,
    warn,
};

/// Peaks detected in one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunPeaks {
    pub run_id: RunId,
    pub peaks: Vec<Peak>,
}

impl RunPeaks {
    pub fn new(run_id: RunId, peaks: Vec<Peak>) -> Self {
        Self { run_id, peaks }
    }
}

/// A similarity computed for one peak pair, before it is recorded.
#[derive(Debug, Clone, Copy)]
struct PairScore {
    run_a: usize,
    peak_a: usize,
    run_b: usize,
    peak_b: usize,
    score: f64,
}

/// Matches peaks across runs.
///
/// Runs keep the order they were given in, which is also the order in which
/// clique assignment visits them.
///
/// # Example
///
/// ```
/// use peakcliques::{PeakCorrespondenceEngine, RetentionTimeDifference, RunPeaks};
/// use ridgepeaks::Peak;
///
/// let run_a = RunPeaks::new(0, vec![Peak::new(0, 0, 10, 10.0, 1.0), Peak::new(0, 1, 50, 50.0, 1.0)]);
/// let run_b = RunPeaks::new(1, vec![Peak::new(1, 0, 12, 12.0, 1.0), Peak::new(1, 1, 52, 52.0, 1.0)]);
/// let mut engine = PeakCorrespondenceEngine::new(vec![run_a, run_b], RetentionTimeDifference).unwrap();
/// engine.compute_similarities(5.0).unwrap();
/// let (cliques, _stats) = engine.assign_cliques(-1).unwrap();
/// assert_eq!(cliques.len(), 2);
/// ```
pub struct PeakCorrespondenceEngine<S: PeakSimilarity> {
    runs: Vec<RunPeaks>,
    similarity: S,
    lookup: PeakKeyMap<(usize, usize)>,
    non_empty_runs: usize,
}

impl<S: PeakSimilarity> PeakCorrespondenceEngine<S> {
    /// Peaks are re-tagged with the run id of the list holding them.
    pub fn new(runs: Vec<RunPeaks>, similarity: S) -> Result<Self> {
        let mut runs = runs;
        let mut seen_runs = IntSet::<RunId>::default();
        for run in runs.iter_mut() {
            if !seen_runs.insert(run.run_id) {
                return Err(CorrespondenceError::DuplicateRun { run_id: run.run_id });
            }
            let mut seen_peaks = IntSet::<PeakId>::default();
            for peak in run.peaks.iter_mut() {
                if !seen_peaks.insert(peak.id) {
                    return Err(CorrespondenceError::DuplicatePeak {
                        run_id: run.run_id,
                        peak_id: peak.id,
                    });
                }
                peak.run_id = run.run_id;
            }
            if run.peaks.is_empty() {
                warn!("Run {} has no peaks, it will not contribute to any clique", run.run_id);
            }
        }

        let non_empty_runs = runs.iter().filter(|r| !r.peaks.is_empty()).count();
        let mut out = Self {
            runs,
            similarity,
            lookup: PeakKeyMap::default(),
            non_empty_runs,
        };
        out.rebuild_lookup();
        Ok(out)
    }

    fn rebuild_lookup(&mut self) {
        self.lookup.clear();
        for (ri, run) in self.runs.iter().enumerate() {
            for (pi, peak) in run.peaks.iter().enumerate() {
                self.lookup.insert(PeakKey::of(peak), (ri, pi));
            }
        }
    }

    pub fn runs(&self) -> &[RunPeaks] {
        &self.runs
    }

    pub fn similarity(&self) -> &S {
        &self.similarity
    }

    pub fn run_ids(&self) -> Vec<RunId> {
        self.runs.iter().map(|r| r.run_id).collect()
    }

    /// Runs that had at least one peak when the engine was built.
    pub fn non_empty_runs(&self) -> usize {
        self.non_empty_runs
    }

    pub fn peak(&self, key: &PeakKey) -> Result<&Peak> {
        self.lookup
            .get(key)
            .map(|&(ri, pi)| &self.runs[ri].peaks[pi])
            .ok_or(CorrespondenceError::UnknownPeak {
                run_id: key.run_id,
                peak_id: key.peak_id,
            })
    }

    /// Scores every cross-run peak pair closer than `max_rt_difference` in
    /// retention time and records the score on both peaks.
    ///
    /// Previously recorded scores are replaced. Nothing is recorded when any
    /// score is not finite. Returns the number of scored pairs.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn compute_similarities(&mut self, max_rt_difference: f64) -> Result<usize> {
        if !(max_rt_difference.is_finite() && max_rt_difference > 0.0) {
            return Err(CorrespondenceError::invalid(
                "max_rt_difference",
                max_rt_difference,
                "retention time window must be positive",
            ));
        }

        let run_pairs: Vec<(usize, usize)> = (0..self.runs.len())
            .flat_map(|i| ((i + 1)..self.runs.len()).map(move |j| (i, j)))
            .collect();

        let per_pair: Vec<Vec<PairScore>> = run_pairs
            .par_iter()
            .map(|&(i, j)| self.score_run_pair(i, j, max_rt_difference))
            .collect::<Result<Vec<_>>>()?;

        for run in self.runs.iter_mut() {
            for peak in run.peaks.iter_mut() {
                peak.clear_similarities();
            }
        }

        let mut num_scored = 0;
        for pair in per_pair.iter().flatten() {
            let run_a_id = self.runs[pair.run_a].run_id;
            let run_b_id = self.runs[pair.run_b].run_id;
            let peak_a_id = self.runs[pair.run_a].peaks[pair.peak_a].id;
            let peak_b_id = self.runs[pair.run_b].peaks[pair.peak_b].id;
            self.runs[pair.run_a].peaks[pair.peak_a].record_similarity(run_b_id, peak_b_id, pair.score);
            self.runs[pair.run_b].peaks[pair.peak_b].record_similarity(run_a_id, peak_a_id, pair.score);
            num_scored += 1;
        }
        info!(
            "Scored {} peak pairs over {} run pairs",
            num_scored,
            run_pairs.len()
        );
        Ok(num_scored)
    }

    fn score_run_pair(&self, i: usize, j: usize, max_rt_difference: f64) -> Result<Vec<PairScore>> {
        let run_a = &self.runs[i];
        let run_b = &self.runs[j];

        let mut by_rt: Vec<usize> = (0..run_b.peaks.len()).collect();
        by_rt.sort_by(|&x, &y| {
            run_b.peaks[x]
                .apex_retention_time
                .total_cmp(&run_b.peaks[y].apex_retention_time)
        });

        let mut out = Vec::new();
        for (pa, p) in run_a.peaks.iter().enumerate() {
            let lo = p.apex_retention_time - max_rt_difference;
            let start = by_rt.partition_point(|&q| run_b.peaks[q].apex_retention_time <= lo);
            for &pb in by_rt[start..].iter() {
                let q = &run_b.peaks[pb];
                if q.apex_retention_time - p.apex_retention_time >= max_rt_difference {
                    break;
                }
                let score = self.similarity.score(p, q);
                if !score.is_finite() {
                    return Err(CorrespondenceError::NonFiniteScore {
                        run_a: run_a.run_id,
                        peak_a: p.id,
                        run_b: run_b.run_id,
                        peak_b: q.id,
                        value: score,
                    });
                }
                out.push(PairScore {
                    run_a: i,
                    peak_a: pa,
                    run_b: j,
                    peak_b: pb,
                    score,
                });
            }
        }
        Ok(out)
    }

    /// Peer in `run_id` with the best recorded score, lower peer id on ties.
    pub fn find_best_hit(&self, peak: &Peak, run_id: RunId) -> Option<PeakId> {
        best_hit(&self.similarity, peak, run_id)
    }

    /// Whether `a` and `b` are each other's best hit. Always false for
    /// peaks of the same run.
    pub fn is_bidirectional_best_hit(&self, a: &Peak, b: &Peak) -> bool {
        a.run_id != b.run_id
            && self.find_best_hit(a, b.run_id) == Some(b.id)
            && self.find_best_hit(b, a.run_id) == Some(a.id)
    }

    fn is_bbh_key(&self, a: &PeakKey, b: &PeakKey) -> bool {
        match (self.peak(a), self.peak(b)) {
            (Ok(a), Ok(b)) => self.is_bidirectional_best_hit(a, b),
            _ => false,
        }
    }

    /// The bidirectional best hit of `peak` in run `run_id`, if any.
    fn bbh_partner(&self, peak: &Peak, run_id: RunId) -> Option<&Peak> {
        let hit = self.find_best_hit(peak, run_id)?;
        let partner = self.peak(&PeakKey::new(run_id, hit)).ok()?;
        (self.find_best_hit(partner, peak.run_id) == Some(peak.id)).then_some(partner)
    }

    /// Removes and returns the peaks without a bidirectional best hit in
    /// any other run. Their similarity maps are cleared.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn prune_unmatched(&mut self) -> Vec<Peak> {
        let unmatched_keys: HashSet<PeakKey, BuildNoHashHasher<PeakKey>> = self
            .runs
            .iter()
            .flat_map(|run| run.peaks.iter())
            .filter(|p| {
                !self
                    .runs
                    .iter()
                    .filter(|other| other.run_id != p.run_id)
                    .any(|other| self.bbh_partner(p, other.run_id).is_some())
            })
            .map(PeakKey::of)
            .collect();

        let mut pruned = Vec::with_capacity(unmatched_keys.len());
        for run in self.runs.iter_mut() {
            let (keep, drop): (Vec<Peak>, Vec<Peak>) = std::mem::take(&mut run.peaks)
                .into_iter()
                .partition(|p| !unmatched_keys.contains(&PeakKey::of(p)));
            run.peaks = keep;
            pruned.extend(drop.into_iter().map(|mut p| {
                p.clear_similarities();
                p
            }));
        }
        self.rebuild_lookup();
        info!("Pruned {} peaks without a bidirectional best hit", pruned.len());
        pruned
    }

    fn resolve_min_clique_size(&self, min_clique_size: i64) -> Result<usize> {
        match min_clique_size {
            -1 => Ok(self.non_empty_runs),
            n if n > 0 => Ok(n as usize),
            n => Err(CorrespondenceError::invalid(
                "min_clique_size",
                n as f64,
                "expected a positive size or -1 for all runs",
            )),
        }
    }

    /// Groups bidirectional best hits into cliques.
    ///
    /// Run pairs are visited in caller order and peaks in list order. Members
    /// left without a bidirectional best hit to another member are removed,
    /// then cliques smaller than `min_clique_size` are dropped. Survivors are
    /// numbered from 0 in creation order.
    ///
    /// `-1` resolves to the number of runs that had a non-empty peak list
    /// when the engine was built, not the total number of runs, so a single
    /// empty run does not rule out every clique.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn assign_cliques(&self, min_clique_size: i64) -> Result<(Vec<Clique>, AssignmentStats)> {
        let min_size = self.resolve_min_clique_size(min_clique_size)?;

        let mut arena = CliqueArena::new();
        let mut num_edges = 0;
        for (i, run_i) in self.runs.iter().enumerate() {
            for run_j in self.runs[(i + 1)..].iter() {
                for p in run_i.peaks.iter() {
                    if let Some(q) = self.bbh_partner(p, run_j.run_id) {
                        num_edges += 1;
                        arena.link(PeakKey::of(p), PeakKey::of(q));
                    }
                }
            }
        }
        debug!("Found {} bidirectional best hit edges", num_edges);

        arena.retain_connected(|a, b| self.is_bbh_key(a, b));
        let stats = arena.stats();
        let num_before_filter = arena.len();

        let mut cliques = Vec::new();
        for (_, keys) in arena.iter() {
            if keys.len() < min_size.max(2) {
                continue;
            }
            let id = cliques.len();
            cliques.push(self.build_clique(id, keys)?);
        }

        info!(
            "BBH edges: {}, merges: {}, rejected additions: {}, dropped in merges: {}",
            num_edges, stats.merges, stats.rejected_additions, stats.dropped_in_merges
        );
        info!(
            "Cliques before size filter: {}, after (min size {}): {}",
            num_before_filter,
            min_size,
            cliques.len()
        );
        Ok((cliques, stats))
    }

    fn build_clique(&self, id: usize, keys: &[PeakKey]) -> Result<Clique> {
        let mut sorted = keys.to_vec();
        sorted.sort();
        let mut members = Vec::with_capacity(sorted.len());
        for key in sorted.iter() {
            let mut peak = self.peak(key)?.clone();
            peak.clear_similarities();
            members.push(peak);
        }

        let mut bbh_edges = 0;
        for (n, a) in sorted.iter().enumerate() {
            for b in sorted[(n + 1)..].iter() {
                if self.is_bbh_key(a, b) {
                    bbh_edges += 1;
                }
            }
        }
        Ok(Clique {
            id,
            members,
            bbh_edges,
        })
    }
}

/// Peer with the optimal score among those recorded for `run_id`.
/// Ties resolve to the lower peer id.
pub fn best_hit<S: PeakSimilarity + ?Sized>(
    similarity: &S,
    peak: &Peak,
    run_id: RunId,
) -> Option<PeakId> {
    let scores = peak.scores_for_run(run_id)?;
    let mut best: Option<(PeakId, f64)> = None;
    for (&peer, &score) in scores.iter() {
        best = match best {
            None => Some((peer, score)),
            Some((best_peer, best_score)) => {
                if similarity.is_better(score, best_score)
                    || (score == best_score && peer < best_peer)
                {
                    Some((peer, score))
                } else {
                    Some((best_peer, best_score))
                }
            }
        };
    }
    best.map(|(peer, _)| peer)
}
