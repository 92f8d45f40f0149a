//! Planar geometric primitives.

use nalgebra::{Point2, Vector2};

use super::predicates::{orient2d, Tolerance};

/// A triangle given by its three corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    /// First corner.
    pub a: Point2<f64>,
    /// Second corner.
    pub b: Point2<f64>,
    /// Third corner.
    pub c: Point2<f64>,
}

impl Triangle {
    /// Create a triangle from three corners.
    pub fn new(a: Point2<f64>, b: Point2<f64>, c: Point2<f64>) -> Self {
        Self { a, b, c }
    }

    /// The corners as an array.
    pub fn points(&self) -> [Point2<f64>; 3] {
        [self.a, self.b, self.c]
    }

    /// Signed area (positive for counter-clockwise corners).
    pub fn signed_area(&self) -> f64 {
        0.5 * orient2d(&self.a, &self.b, &self.c)
    }

    /// Unsigned area.
    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    /// Centroid.
    pub fn centroid(&self) -> Point2<f64> {
        Point2::from((self.a.coords + self.b.coords + self.c.coords) / 3.0)
    }

    /// Side lengths `[|bc|, |ca|, |ab|]`, each opposite the corner of the same index.
    pub fn side_lengths(&self) -> [f64; 3] {
        [
            (self.c - self.b).norm(),
            (self.a - self.c).norm(),
            (self.b - self.a).norm(),
        ]
    }

    /// Circumcenter, or `None` for a degenerate triangle.
    pub fn circumcenter(&self) -> Option<Point2<f64>> {
        let b = self.b - self.a;
        let c = self.c - self.a;
        let d = 2.0 * (b.x * c.y - b.y * c.x);
        if d == 0.0 {
            return None;
        }
        let bb = b.norm_squared();
        let cc = c.norm_squared();
        let ux = (c.y * bb - b.y * cc) / d;
        let uy = (b.x * cc - c.x * bb) / d;
        Some(self.a + Vector2::new(ux, uy))
    }

    /// Circumradius, or `None` for a degenerate triangle.
    pub fn circumradius(&self) -> Option<f64> {
        self.circumcenter().map(|center| (center - self.a).norm())
    }

    /// Shape quality in `[0, 1]`.
    ///
    /// `((b + c - a)(c + a - b)(a + b - c)) / (a b c)` over the side lengths.
    /// Equal to 1 for an equilateral triangle and 0 for a degenerate one.
    ///
    /// ```
    /// use eikmesh::geometry::Triangle;
    /// use nalgebra::Point2;
    ///
    /// let t = Triangle::new(
    ///     Point2::new(0.0, 0.0),
    ///     Point2::new(1.0, 0.0),
    ///     Point2::new(0.5, 3f64.sqrt() / 2.0),
    /// );
    /// assert!((t.quality() - 1.0).abs() < 1e-12);
    /// ```
    pub fn quality(&self) -> f64 {
        let [a, b, c] = self.side_lengths();
        let denom = a * b * c;
        if denom <= 0.0 {
            return 0.0;
        }
        let q = (b + c - a) * (c + a - b) * (a + b - c) / denom;
        q.clamp(0.0, 1.0)
    }

    /// Smallest interior angle in degrees.
    pub fn min_angle_degrees(&self) -> f64 {
        let pts = self.points();
        let mut min_angle = f64::INFINITY;
        for i in 0..3 {
            let p = pts[i];
            let u = pts[(i + 1) % 3] - p;
            let v = pts[(i + 2) % 3] - p;
            let nu = u.norm();
            let nv = v.norm();
            if nu == 0.0 || nv == 0.0 {
                return 0.0;
            }
            let cos = (u.dot(&v) / (nu * nv)).clamp(-1.0, 1.0);
            min_angle = min_angle.min(cos.acos().to_degrees());
        }
        min_angle
    }

    /// Whether `p` lies in the closed triangle, up to tolerance.
    ///
    /// The corners may be given in either orientation.
    pub fn contains(&self, p: &Point2<f64>, tol: &Tolerance) -> bool {
        let sign = if self.signed_area() >= 0.0 { 1.0 } else { -1.0 };
        let edges = [(self.a, self.b), (self.b, self.c), (self.c, self.a)];
        edges.iter().all(|(u, v)| {
            sign * super::predicates::signed_distance(u, v, p) >= -tol.distance
        })
    }
}

/// A line segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    /// Start point.
    pub a: Point2<f64>,
    /// End point.
    pub b: Point2<f64>,
}

impl Segment {
    /// Create a segment.
    pub fn new(a: Point2<f64>, b: Point2<f64>) -> Self {
        Self { a, b }
    }

    /// Length.
    pub fn length(&self) -> f64 {
        (self.b - self.a).norm()
    }

    /// Midpoint.
    pub fn midpoint(&self) -> Point2<f64> {
        nalgebra::center(&self.a, &self.b)
    }

    /// Parameter of the projection of `p` onto the segment, clamped to `[0, 1]`.
    pub fn project(&self, p: &Point2<f64>) -> f64 {
        let d = self.b - self.a;
        let len2 = d.norm_squared();
        if len2 == 0.0 {
            return 0.0;
        }
        ((p - self.a).dot(&d) / len2).clamp(0.0, 1.0)
    }

    /// Closest point on the segment to `p`.
    pub fn closest_point(&self, p: &Point2<f64>) -> Point2<f64> {
        self.a + (self.b - self.a) * self.project(p)
    }

    /// Distance from `p` to the segment.
    pub fn distance(&self, p: &Point2<f64>) -> f64 {
        (p - self.closest_point(p)).norm()
    }

    /// Whether a horizontal ray from `p` towards +x crosses this segment.
    ///
    /// Half-open in y so shared endpoints are counted once.
    pub(crate) fn crosses_ray(&self, p: &Point2<f64>) -> bool {
        let (a, b) = (self.a, self.b);
        if (a.y > p.y) == (b.y > p.y) {
            return false;
        }
        let t = (p.y - a.y) / (b.y - a.y);
        a.x + t * (b.x - a.x) > p.x
    }
}

/// A simple polygon given by its corners in order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polygon {
    /// Corners; the closing edge from the last to the first is implicit.
    pub points: Vec<Point2<f64>>,
}

impl Polygon {
    /// Create a polygon from its corners.
    pub fn new(points: Vec<Point2<f64>>) -> Self {
        Self { points }
    }

    /// Number of corners.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the polygon has no corners.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Iterate over the edges, including the closing edge.
    pub fn edges(&self) -> impl Iterator<Item = Segment> + '_ {
        let n = self.points.len();
        (0..n).map(move |i| Segment::new(self.points[i], self.points[(i + 1) % n]))
    }

    /// Signed area (shoelace formula), positive for counter-clockwise corners.
    pub fn signed_area(&self) -> f64 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let mut sum = 0.0;
        for i in 0..n {
            let p = self.points[i];
            let q = self.points[(i + 1) % n];
            sum += p.x * q.y - q.x * p.y;
        }
        0.5 * sum
    }

    /// Unsigned area.
    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    /// Whether the corners are in counter-clockwise order.
    pub fn is_ccw(&self) -> bool {
        self.signed_area() > 0.0
    }

    /// Reverse the corner order if needed so the polygon is counter-clockwise.
    pub fn make_ccw(&mut self) {
        if self.signed_area() < 0.0 {
            self.points.reverse();
        }
    }

    /// Area centroid; falls back to the vertex average for degenerate polygons.
    pub fn centroid(&self) -> Point2<f64> {
        let n = self.points.len();
        if n == 0 {
            return Point2::origin();
        }
        let area = self.signed_area();
        if area.abs() < f64::EPSILON {
            let sum = self
                .points
                .iter()
                .fold(Vector2::zeros(), |acc, p| acc + p.coords);
            return Point2::from(sum / n as f64);
        }
        let mut cx = 0.0;
        let mut cy = 0.0;
        for i in 0..n {
            let p = self.points[i];
            let q = self.points[(i + 1) % n];
            let cross = p.x * q.y - q.x * p.y;
            cx += (p.x + q.x) * cross;
            cy += (p.y + q.y) * cross;
        }
        Point2::new(cx / (6.0 * area), cy / (6.0 * area))
    }

    /// Even-odd containment test.
    pub fn contains(&self, p: &Point2<f64>) -> bool {
        self.edges().filter(|e| e.crosses_ray(p)).count() % 2 == 1
    }

    /// Distance from `p` to the polygon boundary.
    pub fn boundary_distance(&self, p: &Point2<f64>) -> f64 {
        self.edges()
            .map(|e| e.distance(p))
            .fold(f64::INFINITY, f64::min)
    }

    /// Signed distance: negative inside, positive outside.
    pub fn signed_distance(&self, p: &Point2<f64>) -> f64 {
        let d = self.boundary_distance(p);
        if self.contains(p) {
            -d
        } else {
            d
        }
    }
}

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Lower-left corner.
    pub min: Point2<f64>,
    /// Upper-right corner.
    pub max: Point2<f64>,
}

impl BoundingBox {
    /// Create a box from two opposite corners in any order.
    pub fn new(a: Point2<f64>, b: Point2<f64>) -> Self {
        Self {
            min: Point2::new(a.x.min(b.x), a.y.min(b.y)),
            max: Point2::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    /// Create a box from its lower-left corner and size.
    pub fn from_origin_size(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(Point2::new(x, y), Point2::new(x + width, y + height))
    }

    /// Smallest box containing all points, or `None` for an empty input.
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Point2<f64>>,
    {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        let mut bbox = Self {
            min: first,
            max: first,
        };
        for p in iter {
            bbox.include(p);
        }
        Some(bbox)
    }

    /// Grow the box to include `p`.
    pub fn include(&mut self, p: &Point2<f64>) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
    }

    /// A copy grown by `margin` on every side.
    pub fn expanded(&self, margin: f64) -> Self {
        Self {
            min: Point2::new(self.min.x - margin, self.min.y - margin),
            max: Point2::new(self.max.x + margin, self.max.y + margin),
        }
    }

    /// Width.
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    /// Height.
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// The larger of width and height.
    pub fn extent(&self) -> f64 {
        self.width().max(self.height())
    }

    /// Center point.
    pub fn center(&self) -> Point2<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    /// Whether `p` lies in the closed box grown by `tolerance`.
    pub fn contains(&self, p: &Point2<f64>, tolerance: f64) -> bool {
        p.x >= self.min.x - tolerance
            && p.x <= self.max.x + tolerance
            && p.y >= self.min.y - tolerance
            && p.y <= self.max.y + tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_of_degenerate_and_equilateral() {
        let flat = Triangle::new(
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(2.0, 0.0),
        );
        assert!(flat.quality() < 1e-12);

        let right = Triangle::new(
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.0, 1.0),
        );
        let q = right.quality();
        assert!(q > 0.8 && q < 0.9, "right isosceles quality {}", q);
    }

    #[test]
    fn test_circumcenter() {
        let t = Triangle::new(
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(0.0, 2.0),
        );
        let c = t.circumcenter().unwrap();
        assert!((c - Point2::new(1.0, 1.0)).norm() < 1e-12);
        assert!((t.circumradius().unwrap() - 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_triangle_contains_either_orientation() {
        let tol = Tolerance::default();
        let ccw = Triangle::new(
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.0, 1.0),
        );
        let cw = Triangle::new(ccw.a, ccw.c, ccw.b);
        for t in [ccw, cw] {
            assert!(t.contains(&Point2::new(0.2, 0.2), &tol));
            assert!(t.contains(&Point2::new(0.5, 0.0), &tol));
            assert!(!t.contains(&Point2::new(0.8, 0.8), &tol));
        }
    }

    #[test]
    fn test_polygon_signed_distance() {
        let square = Polygon::new(vec![
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 2.0),
            Point2::new(0.0, 2.0),
        ]);
        assert!(square.is_ccw());
        assert!((square.area() - 4.0).abs() < 1e-12);
        assert!((square.signed_distance(&Point2::new(1.0, 1.0)) + 1.0).abs() < 1e-12);
        assert!((square.signed_distance(&Point2::new(3.0, 1.0)) - 1.0).abs() < 1e-12);
        assert!((square.centroid() - Point2::new(1.0, 1.0)).norm() < 1e-12);
    }

    #[test]
    fn test_bounding_box() {
        let pts = [Point2::new(1.0, 5.0), Point2::new(-2.0, 3.0), Point2::new(4.0, -1.0)];
        let bbox = BoundingBox::from_points(&pts).unwrap();
        assert_eq!(bbox.min, Point2::new(-2.0, -1.0));
        assert_eq!(bbox.max, Point2::new(4.0, 5.0));
        assert_eq!(bbox.extent(), 6.0);
        assert!(bbox.contains(&Point2::new(4.0, 5.0), 0.0));
        assert!(!bbox.contains(&Point2::new(4.1, 5.0), 0.0));
        assert!(BoundingBox::from_points(&[]).is_none());
    }

    #[test]
    fn test_segment_distance() {
        let s = Segment::new(Point2::new(0.0, 0.0), Point2::new(4.0, 0.0));
        assert!((s.distance(&Point2::new(2.0, 3.0)) - 3.0).abs() < 1e-12);
        assert!((s.distance(&Point2::new(-3.0, 4.0)) - 5.0).abs() < 1e-12);
        assert_eq!(s.midpoint(), Point2::new(2.0, 0.0));
    }
}
