//! Pairwise peak similarity functions.
//!
//! The correspondence engine is agnostic to the direction of a score: each
//! function declares whether lower or higher values mean "more similar".

use ridgepeaks::Peak;
use serde::{
    Deserialize,
    Serialize,
};

/// A symmetric score between two peaks of different runs.
///
/// Implementations must be deterministic and satisfy
/// `score(p, q) == score(q, p)`.
pub trait PeakSimilarity: Send + Sync {
    fn score(&self, a: &Peak, b: &Peak) -> f64;

    /// `true` when lower scores mean more similar peaks.
    fn minimizes(&self) -> bool;

    /// Whether `candidate` is strictly better than `incumbent`.
    fn is_better(&self, candidate: f64, incumbent: f64) -> bool {
        if self.minimizes() {
            candidate < incumbent
        } else {
            candidate > incumbent
        }
    }

    /// A value no finite score is better than, used as a placeholder.
    fn worst_value(&self) -> f64 {
        if self.minimizes() {
            f64::INFINITY
        } else {
            f64::NEG_INFINITY
        }
    }
}

impl<S: PeakSimilarity + ?Sized> PeakSimilarity for Box<S> {
    fn score(&self, a: &Peak, b: &Peak) -> f64 {
        (**self).score(a, b)
    }

    fn minimizes(&self) -> bool {
        (**self).minimizes()
    }
}

impl<S: PeakSimilarity + ?Sized> PeakSimilarity for &S {
    fn score(&self, a: &Peak, b: &Peak) -> f64 {
        (**self).score(a, b)
    }

    fn minimizes(&self) -> bool {
        (**self).minimizes()
    }
}

/// Absolute apex retention time difference.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetentionTimeDifference;

impl PeakSimilarity for RetentionTimeDifference {
    fn score(&self, a: &Peak, b: &Peak) -> f64 {
        (a.apex_retention_time - b.apex_retention_time).abs()
    }

    fn minimizes(&self) -> bool {
        true
    }
}

/// Cosine similarity of the peak fingerprints.
///
/// A zero norm fingerprint scores 0. Fingerprints of different lengths are
/// not comparable and score NaN, which the engine reports as an error.
///
/// # Example
///
/// ```
/// use peakcliques::{CosineFingerprint, PeakSimilarity};
/// use ridgepeaks::Peak;
///
/// let a = Peak::new(0, 0, 10, 1.0, 5.0).with_fingerprint(vec![1.0, 2.0, 3.0]);
/// let b = Peak::new(1, 0, 12, 1.1, 4.0).with_fingerprint(vec![2.0, 4.0, 6.0]);
/// assert!((CosineFingerprint.score(&a, &b) - 1.0).abs() < 1e-12);
/// assert!(!CosineFingerprint.minimizes());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct CosineFingerprint;

impl PeakSimilarity for CosineFingerprint {
    fn score(&self, a: &Peak, b: &Peak) -> f64 {
        cosine(&a.fingerprint, &b.fingerprint)
    }

    fn minimizes(&self) -> bool {
        false
    }
}

/// Fingerprint cosine weighted by a Gaussian penalty on the retention
/// time difference, `cos * exp(-drt^2 / (2 * rt_sigma^2))`.
#[derive(Debug, Clone, Copy)]
pub struct GaussianRtCosine {
    pub rt_sigma: f64,
}

impl PeakSimilarity for GaussianRtCosine {
    fn score(&self, a: &Peak, b: &Peak) -> f64 {
        let drt = a.apex_retention_time - b.apex_retention_time;
        let penalty = (-(drt * drt) / (2.0 * self.rt_sigma * self.rt_sigma)).exp();
        cosine(&a.fingerprint, &b.fingerprint) * penalty
    }

    fn minimizes(&self) -> bool {
        false
    }
}

fn cosine(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() {
        return f64::NAN;
    }
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Serializable choice of similarity function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimilarityKind {
    #[default]
    RtDifference,
    Cosine,
    GaussianRtCosine { rt_sigma: f64 },
}

impl SimilarityKind {
    pub fn build(&self) -> Box<dyn PeakSimilarity> {
        match *self {
            SimilarityKind::RtDifference => Box::new(RetentionTimeDifference),
            SimilarityKind::Cosine => Box::new(CosineFingerprint),
            SimilarityKind::GaussianRtCosine { rt_sigma } => Box::new(GaussianRtCosine { rt_sigma }),
        }
    }
}
