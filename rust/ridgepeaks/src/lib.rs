//! Peak detection in single intensity traces by scale-space ridge tracking.
//!
//! A trace is filtered with Mexican-hat kernels over a range of integer
//! scales. Local maxima of the responses are chained into ridges across
//! scales, weak and short ridges are discarded, and the remaining ones are
//! ranked and promoted to [`Peak`]s.
//!
//! The usual flow is
//! [`IntensityTrace`] -> [`RidgeTracker::track`] -> [`RidgeRanker::rank`].

pub mod errors;
pub mod filter;
pub mod peak;
pub mod quadtree;
pub mod ranking;
pub mod ridges;
pub mod trace;

pub use errors::{
    Result,
    RidgePeaksError,
};
pub use filter::{
    MexicanHatFilter,
    Scaleogram,
};
pub use peak::{
    Peak,
    PeakId,
    PeerScores,
    RunId,
    SimilarityMap,
};
pub use quadtree::{
    BoundingBox,
    Point2D,
    QuadTree,
};
pub use ranking::{
    RankCriterion,
    RidgeRanker,
    RidgeRankerConfig,
    RidgeScores,
};
pub use ridges::{
    Ridge,
    RidgeTracker,
    RidgeTrackerConfig,
    ScalePoint,
};
pub use trace::IntensityTrace;
