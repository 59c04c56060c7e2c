//! Planar geometry for slot regions and detection boxes.
//!
//! Coordinates are pixel-space `f64` with the origin at the top-left of the
//! frame. Everything here is pure; validation of region polygons is built on
//! `polygon_is_simple` and `signed_area`.

use serde::{Deserialize, Serialize};

/// Tolerance for collinearity and boundary tests.
pub const EPSILON: f64 = 1e-9;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Point> for [f64; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned box in corner form (x1, y1, x2, y2).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub const fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn center(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    pub fn width(&self) -> f64 {
        (self.x2 - self.x1).abs()
    }

    pub fn height(&self) -> f64 {
        (self.y2 - self.y1).abs()
    }

    /// Smallest box containing every point. `None` for an empty slice.
    pub fn enclosing(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let init = Self::new(first.x, first.y, first.x, first.y);
        Some(points.iter().skip(1).fold(init, |b, p| Self {
            x1: b.x1.min(p.x),
            y1: b.y1.min(p.y),
            x2: b.x2.max(p.x),
            y2: b.y2.max(p.y),
        }))
    }

    /// Inclusive containment.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x1 - EPSILON
            && p.x <= self.x2 + EPSILON
            && p.y >= self.y1 - EPSILON
            && p.y <= self.y2 + EPSILON
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from([x1, y1, x2, y2]: [f64; 4]) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// Cross product of (b - a) x (c - a). Positive when a→b→c turns counter-clockwise.
fn cross(a: Point, b: Point, c: Point) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

fn orientation(a: Point, b: Point, c: Point) -> i8 {
    let v = cross(a, b, c);
    if v.abs() <= EPSILON {
        0
    } else if v > 0.0 {
        1
    } else {
        -1
    }
}

/// `p` lies on segment a-b, endpoints included. Assumes the three are collinear.
fn within_segment_bounds(a: Point, b: Point, p: Point) -> bool {
    p.x >= a.x.min(b.x) - EPSILON
        && p.x <= a.x.max(b.x) + EPSILON
        && p.y >= a.y.min(b.y) - EPSILON
        && p.y <= a.y.max(b.y) + EPSILON
}

pub fn point_on_segment(p: Point, a: Point, b: Point) -> bool {
    orientation(a, b, p) == 0 && within_segment_bounds(a, b, p)
}

/// Closed-segment intersection test, touching and collinear overlap included.
pub fn segments_intersect(p1: Point, p2: Point, q1: Point, q2: Point) -> bool {
    let o1 = orientation(p1, p2, q1);
    let o2 = orientation(p1, p2, q2);
    let o3 = orientation(q1, q2, p1);
    let o4 = orientation(q1, q2, p2);

    if o1 != o2 && o3 != o4 {
        return true;
    }

    (o1 == 0 && within_segment_bounds(p1, p2, q1))
        || (o2 == 0 && within_segment_bounds(p1, p2, q2))
        || (o3 == 0 && within_segment_bounds(q1, q2, p1))
        || (o4 == 0 && within_segment_bounds(q1, q2, p2))
}

/// Point-in-polygon by ray casting. Points on an edge or vertex count as inside.
pub fn point_in_polygon(p: Point, vertices: &[Point]) -> bool {
    let n = vertices.len();
    if n < 3 {
        return false;
    }

    let mut j = n - 1;
    for i in 0..n {
        if point_on_segment(p, vertices[j], vertices[i]) {
            return true;
        }
        j = i;
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let vi = vertices[i];
        let vj = vertices[j];
        if ((vi.y > p.y) != (vj.y > p.y)) && (p.x < (vj.x - vi.x) * (p.y - vi.y) / (vj.y - vi.y) + vi.x)
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Shoelace area; positive for counter-clockwise winding in a y-up frame.
pub fn signed_area(vertices: &[Point]) -> f64 {
    let n = vertices.len();
    if n < 3 {
        return 0.0;
    }
    let mut acc = 0.0;
    for i in 0..n {
        let a = vertices[i];
        let b = vertices[(i + 1) % n];
        acc += a.x * b.y - b.x * a.y;
    }
    acc / 2.0
}

/// Vertex average. Used as the label anchor for a region.
pub fn centroid(vertices: &[Point]) -> Option<Point> {
    if vertices.is_empty() {
        return None;
    }
    let n = vertices.len() as f64;
    let (sx, sy) = vertices
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Some(Point::new(sx / n, sy / n))
}

/// True when the closed polygon has no self-intersections.
///
/// Adjacent edges may only share their common vertex; a fold-back along the
/// same line counts as an intersection. Non-adjacent edges must not touch.
pub fn polygon_is_simple(vertices: &[Point]) -> bool {
    let n = vertices.len();
    if n < 3 {
        return false;
    }

    let edge = |i: usize| (vertices[i], vertices[(i + 1) % n]);

    for i in 0..n {
        let (a, b) = edge(i);
        let c = vertices[(i + 2) % n];
        // Adjacent edge (a,b)-(b,c) doubling back over itself.
        if orientation(a, b, c) == 0 {
            let dot = (a.x - b.x) * (c.x - b.x) + (a.y - b.y) * (c.y - b.y);
            if dot > 0.0 {
                return false;
            }
        }
    }

    for i in 0..n {
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            if adjacent {
                continue;
            }
            let (p1, p2) = edge(i);
            let (q1, q2) = edge(j);
            if segments_intersect(p1, p2, q1, q2) {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Point> {
        vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ]
    }

    #[test]
    fn contains_interior_and_rejects_exterior() {
        let sq = square(0.0, 0.0, 10.0, 10.0);
        assert!(point_in_polygon(Point::new(5.0, 5.0), &sq));
        assert!(!point_in_polygon(Point::new(15.0, 5.0), &sq));
        assert!(!point_in_polygon(Point::new(-1.0, 5.0), &sq));
    }

    #[test]
    fn boundary_points_count_as_inside() {
        let sq = square(0.0, 0.0, 10.0, 10.0);
        assert!(point_in_polygon(Point::new(0.0, 5.0), &sq));
        assert!(point_in_polygon(Point::new(10.0, 10.0), &sq));
        assert!(point_in_polygon(Point::new(5.0, 0.0), &sq));
    }

    #[test]
    fn concave_notch_is_outside() {
        // U shape open at the top between x=3..7.
        let u = vec![
            Point::new(0.0, 0.0),
            Point::new(3.0, 0.0),
            Point::new(3.0, 6.0),
            Point::new(7.0, 6.0),
            Point::new(7.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ];
        assert!(polygon_is_simple(&u));
        assert!(!point_in_polygon(Point::new(5.0, 3.0), &u));
        assert!(point_in_polygon(Point::new(5.0, 8.0), &u));
        assert!(point_in_polygon(Point::new(1.0, 1.0), &u));
    }

    #[test]
    fn bowtie_is_not_simple() {
        let bowtie = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(10.0, 0.0),
            Point::new(0.0, 10.0),
        ];
        assert!(!polygon_is_simple(&bowtie));
        assert!(polygon_is_simple(&square(0.0, 0.0, 10.0, 10.0)));
    }

    #[test]
    fn fold_back_spike_is_not_simple() {
        let spike = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(5.0, 0.0),
            Point::new(5.0, 5.0),
        ];
        assert!(!polygon_is_simple(&spike));
    }

    #[test]
    fn area_and_centroid() {
        let sq = square(0.0, 0.0, 4.0, 2.0);
        assert_eq!(signed_area(&sq).abs(), 8.0);
        assert_eq!(centroid(&sq), Some(Point::new(2.0, 1.0)));
        let line = vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0), Point::new(2.0, 2.0)];
        assert_eq!(signed_area(&line), 0.0);
    }

    #[test]
    fn box_center_and_enclosing() {
        let b = BoundingBox::new(2.0, 2.0, 6.0, 6.0);
        assert_eq!(b.center(), Point::new(4.0, 4.0));
        let e = BoundingBox::enclosing(&square(1.0, 2.0, 3.0, 5.0)).unwrap();
        assert_eq!(e, BoundingBox::new(1.0, 2.0, 3.0, 5.0));
        assert!(BoundingBox::enclosing(&[]).is_none());
    }
}
