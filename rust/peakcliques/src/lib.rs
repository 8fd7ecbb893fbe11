//! Cross-run peak correspondence.
//!
//! Peaks of different runs are scored against each other, linked when they
//! are each other's best hit, and grouped into cliques holding at most one
//! peak per run. A reference run is then selected among the runs and the
//! cliques are flattened into alignment anchors.

pub mod cliques;
pub mod correspondence;
pub mod errors;
pub mod pipeline;
pub mod reference;
pub mod similarity;

pub use cliques::{
    AssignmentStats,
    Clique,
    CliqueArena,
    CliqueId,
    LinkOutcome,
    PeakKey,
};
pub use correspondence::{
    PeakCorrespondenceEngine,
    RunPeaks,
    best_hit,
};
pub use errors::{
    CorrespondenceError,
    Result,
};
pub use pipeline::{
    CorrespondenceConfig,
    CorrespondenceResult,
    RunAccounting,
    match_runs,
};
pub use reference::{
    AnchorPoint,
    PairwiseScores,
    ReferenceSelection,
    anchors,
    select_reference,
    select_reference_from_matrix,
};
pub use similarity::{
    CosineFingerprint,
    GaussianRtCosine,
    PeakSimilarity,
    RetentionTimeDifference,
    SimilarityKind,
};
