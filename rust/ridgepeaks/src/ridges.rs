//! Ridge tracking over a Mexican-hat scaleogram.
//!
//! Local maxima of the scale 1 response seed ridges, which are then followed
//! through increasing scales. A ridge that cannot be extended is sealed.
//! Only long and significant ridges survive, and of several surviving ridges
//! rooted next to each other only the strongest is kept.

use crate::errors::{
    Result,
    RidgePeaksError,
};
use crate::filter::{
    MexicanHatFilter,
    Scaleogram,
};
use crate::quadtree::{
    BoundingBox,
    Point2D,
    QuadTree,
};
use crate::trace::IntensityTrace;
use serde::{
    Deserialize,
    Serialize,
};
use tracing::debug;

/// Node capacity of the index used for adjacency resolution.
const ADJACENCY_NODE_CAPACITY: usize = 8;

/// A filter response at a position and an integer scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScalePoint {
    pub position: usize,
    pub scale: u32,
    pub response: f64,
}

/// Local maxima of a response followed across scales.
///
/// Points are only ever appended; the first one is the scale 1 root.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ridge {
    points: Vec<ScalePoint>,
    cost: f64,
    sealed: bool,
}

impl Ridge {
    fn seed(root: ScalePoint) -> Self {
        Self {
            points: vec![root],
            cost: 0.0,
            sealed: false,
        }
    }

    /// Appends the next scale's point; the cost grows with the squared
    /// position displacement.
    fn extend(&mut self, point: ScalePoint) {
        debug_assert!(!self.sealed, "Sealed ridges cannot be extended");
        let last = self.last().position as f64;
        let displacement = point.position as f64 - last;
        self.cost += displacement * displacement;
        self.points.push(point);
    }

    fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn root(&self) -> &ScalePoint {
        &self.points[0]
    }

    pub fn last(&self) -> &ScalePoint {
        &self.points[self.points.len() - 1]
    }

    pub fn points(&self) -> &[ScalePoint] {
        &self.points
    }

    pub fn position(&self) -> usize {
        self.root().position
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn root_response(&self) -> f64 {
        self.root().response
    }

    /// Path consistency penalty, larger is worse.
    pub fn ridge_cost(&self) -> f64 {
        self.cost
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RidgeTrackerConfig {
    pub min_scale: u32,
    pub max_scale: u32,
    /// Minimum scale 1 response of a surviving ridge. Usually a percentile
    /// of the trace intensities.
    pub significance_threshold: f64,
    #[serde(default = "default_adjacency_radius")]
    pub adjacency_radius: f64,
    /// Position tolerance when extending a ridge to the next scale.
    /// Derived from the scale step when unset.
    #[serde(default)]
    pub extension_radius: Option<usize>,
}

fn default_adjacency_radius() -> f64 {
    3.0
}

impl Default for RidgeTrackerConfig {
    fn default() -> Self {
        Self {
            min_scale: 1,
            max_scale: 10,
            significance_threshold: 0.0,
            adjacency_radius: default_adjacency_radius(),
            extension_radius: None,
        }
    }
}

impl RidgeTrackerConfig {
    fn validate(&self) -> Result<()> {
        if self.min_scale == 0 {
            return Err(RidgePeaksError::invalid(
                "min_scale",
                0.0,
                "scales start at 1",
            ));
        }
        if self.max_scale == 0 {
            return Err(RidgePeaksError::invalid(
                "max_scale",
                0.0,
                "scales start at 1",
            ));
        }
        if self.min_scale > self.max_scale {
            return Err(RidgePeaksError::invalid(
                "min_scale",
                self.min_scale as f64,
                &format!("min_scale must be <= max_scale ({})", self.max_scale),
            ));
        }
        if !self.significance_threshold.is_finite() {
            return Err(RidgePeaksError::invalid(
                "significance_threshold",
                self.significance_threshold,
                "threshold must be finite",
            ));
        }
        if !(self.adjacency_radius.is_finite() && self.adjacency_radius >= 0.0) {
            return Err(RidgePeaksError::invalid(
                "adjacency_radius",
                self.adjacency_radius,
                "radius must be non-negative",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RidgeTracker {
    filter: MexicanHatFilter,
    config: RidgeTrackerConfig,
}

impl RidgeTracker {
    pub fn new(config: RidgeTrackerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            filter: MexicanHatFilter,
            config,
        })
    }

    pub fn config(&self) -> &RidgeTrackerConfig {
        &self.config
    }

    pub fn scaleogram(&self, trace: &IntensityTrace) -> Result<Scaleogram> {
        Scaleogram::compute(&self.filter, trace.intensities(), self.config.max_scale)
    }

    fn extension_radius(&self, prev_scale: u32, scale: u32) -> usize {
        self.config
            .extension_radius
            .unwrap_or((scale - prev_scale) as usize)
            .max(1)
    }

    /// Detects ridges in a trace, sorted by ascending root position.
    #[tracing::instrument(level = "debug", skip_all, fields(len = trace.len()))]
    pub fn track(&self, trace: &IntensityTrace) -> Result<Vec<Ridge>> {
        if trace.is_empty() {
            return Ok(Vec::new());
        }
        let sgram = self.scaleogram(trace)?;
        let ridges = self.follow_ridges(&sgram);
        let num_followed = ridges.len();

        let threshold = self.config.significance_threshold;
        let min_len = self.config.min_scale as usize;
        let retained: Vec<Ridge> = ridges
            .into_iter()
            .filter(|r| r.len() >= min_len && r.root_response() >= threshold)
            .collect();
        let num_retained = retained.len();

        let mut resolved = resolve_adjacent(retained, trace, self.config.adjacency_radius)?;
        resolved.sort_by_key(|r| r.position());
        debug!(
            "Ridges followed: {}, significant: {}, after adjacency resolution: {}",
            num_followed,
            num_retained,
            resolved.len()
        );
        Ok(resolved)
    }

    /// Seeds ridges at scale 1 and walks them up to the max scale.
    /// Ridges sealed before reaching `min_scale` points are dropped here.
    fn follow_ridges(&self, sgram: &Scaleogram) -> Vec<Ridge> {
        let min_len = self.config.min_scale as usize;
        let Some(root_response) = sgram.response(1) else {
            return Vec::new();
        };

        let mut live: Vec<Ridge> = local_maxima(root_response)
            .into_iter()
            .map(|position| {
                Ridge::seed(ScalePoint {
                    position,
                    scale: 1,
                    response: root_response[position],
                })
            })
            .collect();
        debug!("Seeded {} ridges at scale 1", live.len());

        let mut finished: Vec<Ridge> = Vec::new();
        let mut prev_scale = 1;
        for scale in 2..=sgram.max_scale() {
            let Some(response) = sgram.response(scale) else {
                break;
            };
            let maxima = local_maxima(response);
            let radius = self.extension_radius(prev_scale, scale);

            let mut still_live = Vec::with_capacity(live.len());
            for mut ridge in live.into_iter() {
                match closest_maximum(&maxima, ridge.last().position, radius) {
                    Some(position) => {
                        ridge.extend(ScalePoint {
                            position,
                            scale,
                            response: response[position],
                        });
                        still_live.push(ridge);
                    }
                    None => {
                        ridge.seal();
                        if ridge.len() >= min_len {
                            finished.push(ridge);
                        }
                    }
                }
            }
            live = still_live;
            prev_scale = scale;
        }

        for mut ridge in live.into_iter() {
            ridge.seal();
            finished.push(ridge);
        }
        finished
    }
}

/// Interior positions where the first difference is non-negative before
/// and non-positive after.
pub fn local_maxima(response: &[f64]) -> Vec<usize> {
    if response.len() < 3 {
        return Vec::new();
    }
    (1..response.len() - 1)
        .filter(|&i| response[i] - response[i - 1] >= 0.0 && response[i + 1] - response[i] <= 0.0)
        .collect()
}

/// Closest entry of the sorted `maxima` within `radius` of `position`.
/// Equidistant candidates resolve to the lower position.
fn closest_maximum(maxima: &[usize], position: usize, radius: usize) -> Option<usize> {
    let lo = position.saturating_sub(radius);
    let hi = position + radius;
    let start = maxima.partition_point(|&m| m < lo);
    maxima[start..]
        .iter()
        .take_while(|&&m| m <= hi)
        .min_by_key(|&&m| (m.abs_diff(position), m))
        .copied()
}

/// Keeps a ridge only when no other ridge rooted within `radius` (on the
/// trace grid) has a stronger root response. Equal responses keep the
/// lower position.
fn resolve_adjacent(
    ridges: Vec<Ridge>,
    trace: &IntensityTrace,
    radius: f64,
) -> Result<Vec<Ridge>> {
    if ridges.len() < 2 {
        return Ok(ridges);
    }
    let bounds = grid_bounds(trace)?;
    let mut index = QuadTree::new(bounds, ADJACENCY_NODE_CAPACITY)?;
    for (i, ridge) in ridges.iter().enumerate() {
        index.insert(grid_point(trace, ridge.position()), i)?;
    }

    let mut keep = vec![true; ridges.len()];
    for (i, ridge) in ridges.iter().enumerate() {
        let center = grid_point(trace, ridge.position());
        let dominated = index
            .radius_query(&center, radius)?
            .into_iter()
            .map(|(_, &j)| j)
            .filter(|&j| j != i)
            .any(|j| {
                let other = &ridges[j];
                other.root_response() > ridge.root_response()
                    || (other.root_response() == ridge.root_response()
                        && other.position() < ridge.position())
            });
        keep[i] = !dominated;
    }

    Ok(ridges
        .into_iter()
        .zip(keep)
        .filter_map(|(r, k)| k.then_some(r))
        .collect())
}

/// Rectangle covering every grid coordinate of the trace.
pub(crate) fn grid_bounds(trace: &IntensityTrace) -> Result<BoundingBox> {
    BoundingBox::new(
        0.0,
        0.0,
        trace.row_count().max(1) as f64,
        trace.row_length() as f64,
    )
}

pub(crate) fn grid_point(trace: &IntensityTrace, position: usize) -> Point2D {
    let (cycle, time) = trace.grid_coordinates(position);
    Point2D::new(cycle as f64, time as f64)
}
