//! Point quad-tree with directional radius queries.
//!
//! Coordinates follow the trace grid convention: `x` is the cycle index and
//! `y` the time within the cycle. A "horizontal" query only returns points
//! of the same cycle, a "vertical" one only points at the same time within
//! the cycle.

use crate::errors::{
    Result,
    RidgePeaksError,
};
use serde::{
    Deserialize,
    Serialize,
};

/// Past this depth nodes stop splitting, so coincident points cannot
/// subdivide forever.
const MAX_DEPTH: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_sq(&self, other: &Point2D) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// Axis aligned rectangle, inclusive on all edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    min: Point2D,
    max: Point2D,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self> {
        let finite = [min_x, min_y, max_x, max_y].iter().all(|v| v.is_finite());
        if !finite || max_x <= min_x || max_y <= min_y {
            return Err(RidgePeaksError::DegenerateBounds {
                min_x,
                min_y,
                max_x,
                max_y,
            });
        }
        Ok(Self {
            min: Point2D::new(min_x, min_y),
            max: Point2D::new(max_x, max_y),
        })
    }

    pub fn contains(&self, p: &Point2D) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// True if any point of the rectangle is within `radius` of `center`.
    fn intersects_circle(&self, center: &Point2D, radius: f64) -> bool {
        let dx = (self.min.x - center.x).max(center.x - self.max.x).max(0.0);
        let dy = (self.min.y - center.y).max(center.y - self.max.y).max(0.0);
        dx * dx + dy * dy <= radius * radius
    }

    fn midpoint(&self) -> Point2D {
        Point2D::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }

    /// Splits into `[low-x low-y, high-x low-y, low-x high-y, high-x high-y]`.
    fn quadrants(&self) -> [BoundingBox; 4] {
        let mid = self.midpoint();
        [
            BoundingBox {
                min: self.min,
                max: mid,
            },
            BoundingBox {
                min: Point2D::new(mid.x, self.min.y),
                max: Point2D::new(self.max.x, mid.y),
            },
            BoundingBox {
                min: Point2D::new(self.min.x, mid.y),
                max: Point2D::new(mid.x, self.max.y),
            },
            BoundingBox {
                min: mid,
                max: self.max,
            },
        ]
    }
}

#[derive(Debug)]
struct Node<T> {
    bounds: BoundingBox,
    depth: usize,
    entries: Vec<(Point2D, T)>,
    children: Option<Box<[Node<T>; 4]>>,
}

impl<T> Node<T> {
    fn new(bounds: BoundingBox, depth: usize) -> Self {
        Self {
            bounds,
            depth,
            entries: Vec::new(),
            children: None,
        }
    }

    fn child_index(&self, p: &Point2D) -> usize {
        let mid = self.bounds.midpoint();
        (p.x >= mid.x) as usize + 2 * (p.y >= mid.y) as usize
    }

    fn insert(&mut self, point: Point2D, payload: T, capacity: usize) {
        if self.children.is_some() {
            let idx = self.child_index(&point);
            if let Some(children) = self.children.as_mut() {
                children[idx].insert(point, payload, capacity);
            }
            return;
        }

        self.entries.push((point, payload));
        if self.entries.len() > capacity && self.depth < MAX_DEPTH {
            self.subdivide(capacity);
        }
    }

    fn subdivide(&mut self, capacity: usize) {
        let [a, b, c, d] = self.bounds.quadrants();
        let depth = self.depth + 1;
        self.children = Some(Box::new([
            Node::new(a, depth),
            Node::new(b, depth),
            Node::new(c, depth),
            Node::new(d, depth),
        ]));
        for (point, payload) in std::mem::take(&mut self.entries) {
            self.insert(point, payload, capacity);
        }
    }

    fn collect_within<'a>(
        &'a self,
        center: &Point2D,
        radius: f64,
        accept: &impl Fn(&Point2D) -> bool,
        out: &mut Vec<(Point2D, &'a T)>,
    ) {
        if !self.bounds.intersects_circle(center, radius) {
            return;
        }
        let radius_sq = radius * radius;
        for (point, payload) in self.entries.iter() {
            if point.distance_sq(center) <= radius_sq && accept(point) {
                out.push((*point, payload));
            }
        }
        if let Some(children) = self.children.as_ref() {
            for child in children.iter() {
                child.collect_within(center, radius, accept, out);
            }
        }
    }
}

/// Quad-tree holding point-tagged payloads.
///
/// # Example
///
/// ```
/// use ridgepeaks::quadtree::{BoundingBox, Point2D, QuadTree};
///
/// let bounds = BoundingBox::new(0.0, 0.0, 10.0, 10.0).unwrap();
/// let mut tree = QuadTree::new(bounds, 4).unwrap();
/// tree.insert(Point2D::new(1.0, 1.0), "a").unwrap();
/// tree.insert(Point2D::new(1.0, 3.0), "b").unwrap();
/// tree.insert(Point2D::new(3.0, 1.0), "c").unwrap();
///
/// let center = Point2D::new(1.0, 1.0);
/// assert_eq!(tree.radius_query(&center, 2.0).unwrap().len(), 3);
/// assert_eq!(tree.horizontal_radius_query(&center, 2.0).unwrap().len(), 2);
/// assert_eq!(tree.vertical_radius_query(&center, 2.0).unwrap().len(), 2);
/// ```
#[derive(Debug)]
pub struct QuadTree<T> {
    root: Node<T>,
    capacity: usize,
    len: usize,
}

impl<T> QuadTree<T> {
    pub fn new(bounds: BoundingBox, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(RidgePeaksError::invalid(
                "capacity",
                0.0,
                "quad-tree nodes must hold at least one point",
            ));
        }
        Ok(Self {
            root: Node::new(bounds, 0),
            capacity,
            len: 0,
        })
    }

    pub fn insert(&mut self, point: Point2D, payload: T) -> Result<()> {
        if !self.root.bounds.contains(&point) {
            return Err(RidgePeaksError::PointOutOfBounds {
                x: point.x,
                y: point.y,
            });
        }
        self.root.insert(point, payload, self.capacity);
        self.len += 1;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bounds(&self) -> BoundingBox {
        self.root.bounds
    }

    /// All points with euclidean distance `<= radius` to `center`.
    pub fn radius_query(&self, center: &Point2D, radius: f64) -> Result<Vec<(Point2D, &T)>> {
        self.query(center, radius, |_| true)
    }

    /// Same as [`QuadTree::radius_query`] restricted to points with `x == center.x`.
    pub fn horizontal_radius_query(
        &self,
        center: &Point2D,
        radius: f64,
    ) -> Result<Vec<(Point2D, &T)>> {
        let cx = center.x;
        self.query(center, radius, move |p| p.x == cx)
    }

    /// Same as [`QuadTree::radius_query`] restricted to points with `y == center.y`.
    pub fn vertical_radius_query(
        &self,
        center: &Point2D,
        radius: f64,
    ) -> Result<Vec<(Point2D, &T)>> {
        let cy = center.y;
        self.query(center, radius, move |p| p.y == cy)
    }

    fn query(
        &self,
        center: &Point2D,
        radius: f64,
        accept: impl Fn(&Point2D) -> bool,
    ) -> Result<Vec<(Point2D, &T)>> {
        if !(radius.is_finite() && radius >= 0.0) {
            return Err(RidgePeaksError::invalid(
                "radius",
                radius,
                "query radius must be non-negative",
            ));
        }
        let mut out = Vec::new();
        if self.len > 0 {
            self.root.collect_within(center, radius, &accept, &mut out);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_tree(n: usize, capacity: usize) -> QuadTree<usize> {
        let bounds = BoundingBox::new(0.0, 0.0, n as f64, n as f64).unwrap();
        let mut tree = QuadTree::new(bounds, capacity).unwrap();
        for i in 0..n {
            for j in 0..n {
                tree.insert(Point2D::new(i as f64, j as f64), i * n + j)
                    .unwrap();
            }
        }
        tree
    }

    #[test]
    fn test_degenerate_bounds_rejected() {
        assert!(BoundingBox::new(0.0, 0.0, 0.0, 10.0).is_err());
        assert!(BoundingBox::new(0.0, 5.0, 10.0, 1.0).is_err());
        assert!(BoundingBox::new(0.0, 0.0, f64::INFINITY, 1.0).is_err());
        let bounds = BoundingBox::new(0.0, 0.0, 1.0, 1.0).unwrap();
        assert!(QuadTree::<u8>::new(bounds, 0).is_err());
    }

    #[test]
    fn test_empty_query() {
        let bounds = BoundingBox::new(0.0, 0.0, 1.0, 1.0).unwrap();
        let tree: QuadTree<u8> = QuadTree::new(bounds, 4).unwrap();
        assert!(tree.is_empty());
        let res = tree.radius_query(&Point2D::new(0.5, 0.5), 10.0).unwrap();
        assert!(res.is_empty());
    }

    #[test]
    fn test_out_of_bounds_insert() {
        let bounds = BoundingBox::new(0.0, 0.0, 1.0, 1.0).unwrap();
        let mut tree = QuadTree::new(bounds, 4).unwrap();
        assert!(matches!(
            tree.insert(Point2D::new(2.0, 0.5), ()),
            Err(RidgePeaksError::PointOutOfBounds { .. })
        ));
        // Edges are inclusive.
        assert!(tree.insert(Point2D::new(1.0, 1.0), ()).is_ok());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_negative_radius_rejected() {
        let tree = grid_tree(4, 2);
        assert!(tree.radius_query(&Point2D::new(1.0, 1.0), -1.0).is_err());
        assert!(tree.radius_query(&Point2D::new(1.0, 1.0), f64::NAN).is_err());
    }

    #[test]
    fn test_radius_query_matches_brute_force() {
        let n = 17;
        let tree = grid_tree(n, 3);
        assert_eq!(tree.len(), n * n);
        let center = Point2D::new(7.0, 9.0);
        for radius in [0.0, 1.0, 1.5, 2.0, 4.2, 30.0] {
            let mut got: Vec<usize> = tree
                .radius_query(&center, radius)
                .unwrap()
                .into_iter()
                .map(|(_, v)| *v)
                .collect();
            got.sort_unstable();

            let mut expected = Vec::new();
            for i in 0..n {
                for j in 0..n {
                    let p = Point2D::new(i as f64, j as f64);
                    if p.distance_sq(&center) <= radius * radius {
                        expected.push(i * n + j);
                    }
                }
            }
            assert_eq!(got, expected, "radius {}", radius);
        }
    }

    #[test]
    fn test_directional_queries() {
        let tree = grid_tree(9, 2);
        let center = Point2D::new(4.0, 4.0);

        let horizontal = tree.horizontal_radius_query(&center, 2.0).unwrap();
        assert_eq!(horizontal.len(), 5);
        assert!(horizontal.iter().all(|(p, _)| p.x == 4.0));

        let vertical = tree.vertical_radius_query(&center, 2.0).unwrap();
        assert_eq!(vertical.len(), 5);
        assert!(vertical.iter().all(|(p, _)| p.y == 4.0));

        let all = tree.radius_query(&center, 2.0).unwrap();
        assert_eq!(all.len(), 13);
    }

    #[test]
    fn test_coincident_points_do_not_recurse_forever() {
        let bounds = BoundingBox::new(0.0, 0.0, 1.0, 1.0).unwrap();
        let mut tree = QuadTree::new(bounds, 1).unwrap();
        for i in 0..100 {
            tree.insert(Point2D::new(0.25, 0.25), i).unwrap();
        }
        let res = tree.radius_query(&Point2D::new(0.25, 0.25), 0.0).unwrap();
        assert_eq!(res.len(), 100);
    }
}
