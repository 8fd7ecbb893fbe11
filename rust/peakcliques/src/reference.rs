//! Center-star reference run selection and the anchor payload.

use crate::cliques::{
    Clique,
    CliqueId,
};
use crate::errors::{
    CorrespondenceError,
    Result,
};
use crate::similarity::PeakSimilarity;
use ridgepeaks::RunId;
use serde::Serialize;
use tracing::{
    info,
    warn,
};

/// Symmetric run x run matrix of average clique similarities.
///
/// Rows and columns follow ascending run id. `None` marks run pairs that
/// share no clique. The diagonal holds a sentinel that is never compared.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairwiseScores {
    run_ids: Vec<RunId>,
    values: Vec<Option<f64>>,
}

impl PairwiseScores {
    /// Empty matrix over `run_ids`, duplicates are collapsed.
    pub fn new(run_ids: &[RunId], diagonal: f64) -> Self {
        let mut run_ids = run_ids.to_vec();
        run_ids.sort_unstable();
        run_ids.dedup();
        let n = run_ids.len();
        let mut values = vec![None; n * n];
        for i in 0..n {
            values[i * n + i] = Some(diagonal);
        }
        Self { run_ids, values }
    }

    pub fn run_ids(&self) -> &[RunId] {
        &self.run_ids
    }

    fn index_of(&self, run_id: RunId) -> Result<usize> {
        self.run_ids
            .binary_search(&run_id)
            .map_err(|_| CorrespondenceError::UnknownRun { run_id })
    }

    pub fn set(&mut self, a: RunId, b: RunId, value: f64) -> Result<()> {
        let (i, j) = (self.index_of(a)?, self.index_of(b)?);
        if i == j {
            return Ok(());
        }
        let n = self.run_ids.len();
        self.values[i * n + j] = Some(value);
        self.values[j * n + i] = Some(value);
        Ok(())
    }

    /// Score between two distinct runs, `None` on the diagonal.
    pub fn get(&self, a: RunId, b: RunId) -> Option<f64> {
        let (i, j) = (self.index_of(a).ok()?, self.index_of(b).ok()?);
        if i == j {
            return None;
        }
        self.values[i * self.run_ids.len() + j]
    }

    /// Sum of each row's off-diagonal entries, `None` for rows without any.
    pub fn aggregates(&self) -> Vec<Option<f64>> {
        let n = self.run_ids.len();
        (0..n)
            .map(|i| {
                (0..n)
                    .filter(|&j| j != i)
                    .filter_map(|j| self.values[i * n + j])
                    .fold(None, |acc: Option<f64>, v| Some(acc.unwrap_or(0.0) + v))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReferenceSelection {
    pub reference_run: RunId,
    /// Per run aggregate, aligned with `scores.run_ids()`.
    pub aggregates: Vec<Option<f64>>,
    pub scores: PairwiseScores,
}

/// Run with the optimal aggregate. Ties and the all-empty case resolve to
/// the lowest run id. `None` only for a matrix without runs.
///
/// # Example
///
/// ```
/// use peakcliques::{PairwiseScores, select_reference_from_matrix};
///
/// let mut scores = PairwiseScores::new(&[4, 2, 9], f64::INFINITY);
/// scores.set(2, 4, 1.0).unwrap();
/// scores.set(4, 9, 2.0).unwrap();
/// // Aggregates: run 2 -> 1.0, run 4 -> 3.0, run 9 -> 2.0
/// assert_eq!(select_reference_from_matrix(&scores, true), Some(2));
/// assert_eq!(select_reference_from_matrix(&scores, false), Some(4));
/// ```
pub fn select_reference_from_matrix(scores: &PairwiseScores, minimizes: bool) -> Option<RunId> {
    let first = *scores.run_ids().first()?;
    let mut best: Option<(RunId, f64)> = None;
    for (&run_id, aggregate) in scores.run_ids().iter().zip(scores.aggregates()) {
        let Some(value) = aggregate else {
            continue;
        };
        let better = match best {
            None => true,
            Some((_, incumbent)) if minimizes => value < incumbent,
            Some((_, incumbent)) => value > incumbent,
        };
        if better {
            best = Some((run_id, value));
        }
    }
    match best {
        Some((run_id, _)) => Some(run_id),
        None => {
            warn!(
                "No pair of runs shares a clique, falling back to run {} as reference",
                first
            );
            Some(first)
        }
    }
}

/// Picks the run most similar to all others over the shared cliques.
#[tracing::instrument(level = "debug", skip_all)]
pub fn select_reference<S: PeakSimilarity + ?Sized>(
    run_ids: &[RunId],
    cliques: &[Clique],
    similarity: &S,
) -> Result<ReferenceSelection> {
    let mut scores = PairwiseScores::new(run_ids, similarity.worst_value());
    let ids = scores.run_ids().to_vec();

    for (n, &a) in ids.iter().enumerate() {
        for &b in ids[(n + 1)..].iter() {
            let mut values = Vec::new();
            for clique in cliques.iter() {
                let (Some(pa), Some(pb)) = (clique.member(a), clique.member(b)) else {
                    continue;
                };
                let value = similarity.score(pa, pb);
                if !value.is_finite() {
                    return Err(CorrespondenceError::NonFiniteScore {
                        run_a: a,
                        peak_a: pa.id,
                        run_b: b,
                        peak_b: pb.id,
                        value,
                    });
                }
                values.push(value);
            }
            if values.is_empty() {
                continue;
            }
            values.sort_by(|x, y| x.total_cmp(y));
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            scores.set(a, b, mean)?;
        }
    }

    let reference_run =
        select_reference_from_matrix(&scores, similarity.minimizes()).ok_or_else(|| {
            CorrespondenceError::invalid("run_ids", 0.0, "cannot select a reference without runs")
        })?;
    info!("Selected run {} as reference", reference_run);
    Ok(ReferenceSelection {
        reference_run,
        aggregates: scores.aggregates(),
        scores,
    })
}

/// One clique member, as handed to an aligner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnchorPoint {
    pub run_id: RunId,
    pub apex_position: usize,
    pub apex_retention_time: f64,
    pub clique_id: CliqueId,
}

/// Flattens cliques into anchor points, clique by clique.
pub fn anchors(cliques: &[Clique]) -> Vec<AnchorPoint> {
    cliques
        .iter()
        .flat_map(|c| {
            c.members.iter().map(move |p| AnchorPoint {
                run_id: p.run_id,
                apex_position: p.apex_position,
                apex_retention_time: p.apex_retention_time,
                clique_id: c.id,
            })
        })
        .collect()
}
