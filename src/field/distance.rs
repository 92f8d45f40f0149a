//! Signed distance functions.

use nalgebra::{Point2, Vector2};

use crate::geometry::{BoundingBox, Polygon, Segment};

/// Relative step of the central-difference gradient.
const GRADIENT_STEP: f64 = 1e-6;

/// A signed distance function describing the meshable domain.
///
/// Negative inside the domain, zero on its boundary and positive outside it
/// or inside obstacles. Implementations must be pure, since the improver
/// evaluates them from several threads at once.
pub trait DistanceFunction: Send + Sync {
    /// Signed distance of `p` to the domain boundary.
    fn distance(&self, p: &Point2<f64>) -> f64;

    /// Gradient by central differences with step `h`.
    fn gradient_with_step(&self, p: &Point2<f64>, h: f64) -> Vector2<f64> {
        let dx = Vector2::new(h, 0.0);
        let dy = Vector2::new(0.0, h);
        Vector2::new(
            (self.distance(&(p + dx)) - self.distance(&(p - dx))) / (2.0 * h),
            (self.distance(&(p + dy)) - self.distance(&(p - dy))) / (2.0 * h),
        )
    }

    /// Gradient by central differences with a step relative to `|p|`.
    fn gradient(&self, p: &Point2<f64>) -> Vector2<f64> {
        let h = GRADIENT_STEP * p.coords.amax().max(1.0);
        self.gradient_with_step(p, h)
    }
}

impl<F> DistanceFunction for F
where
    F: Fn(&Point2<f64>) -> f64 + Send + Sync,
{
    #[inline]
    fn distance(&self, p: &Point2<f64>) -> f64 {
        self(p)
    }
}

/// Disc.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    /// Center.
    pub center: Point2<f64>,
    /// Radius.
    pub radius: f64,
}

impl Circle {
    /// Create a disc.
    pub fn new(center: Point2<f64>, radius: f64) -> Self {
        Self { center, radius }
    }
}

impl DistanceFunction for Circle {
    fn distance(&self, p: &Point2<f64>) -> f64 {
        (p - self.center).norm() - self.radius
    }

    fn gradient(&self, p: &Point2<f64>) -> Vector2<f64> {
        let d = p - self.center;
        let n = d.norm();
        if n > 0.0 {
            d / n
        } else {
            Vector2::zeros()
        }
    }
}

/// Axis-aligned rectangle with exact distances at the corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rectangle {
    /// The rectangle.
    pub bound: BoundingBox,
}

impl Rectangle {
    /// Rectangle with lower-left corner `(x, y)`.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            bound: BoundingBox::from_origin_size(x, y, width, height),
        }
    }
}

impl DistanceFunction for Rectangle {
    fn distance(&self, p: &Point2<f64>) -> f64 {
        let c = self.bound.center();
        let half = Vector2::new(self.bound.width(), self.bound.height()) * 0.5;
        let q = (p - c).abs() - half;
        let outside = Vector2::new(q.x.max(0.0), q.y.max(0.0)).norm();
        let inside = q.x.max(q.y).min(0.0);
        outside + inside
    }
}

/// Signed distance to a simple polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonDistance {
    polygon: Polygon,
}

impl PolygonDistance {
    /// Wrap a polygon.
    pub fn new(polygon: Polygon) -> Self {
        Self { polygon }
    }

    /// The polygon.
    pub fn polygon(&self) -> &Polygon {
        &self.polygon
    }
}

impl DistanceFunction for PolygonDistance {
    fn distance(&self, p: &Point2<f64>) -> f64 {
        self.polygon.signed_distance(p)
    }
}

/// Signed distance to a domain bounded by a set of closed segment loops.
///
/// Inside and outside are decided by even-odd ray crossing, so loops nested
/// inside the outer boundary cut holes out of the domain.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SegmentSetDistance {
    segments: Vec<Segment>,
}

impl SegmentSetDistance {
    /// Create from boundary segments.
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// The boundary segments.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Bounding box of all segment endpoints.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.segments.iter().flat_map(|s| [&s.a, &s.b]))
    }
}

impl DistanceFunction for SegmentSetDistance {
    fn distance(&self, p: &Point2<f64>) -> f64 {
        let d = self
            .segments
            .iter()
            .map(|s| s.distance(p))
            .fold(f64::INFINITY, f64::min);
        let crossings = self.segments.iter().filter(|s| s.crosses_ray(p)).count();
        if crossings % 2 == 1 {
            -d
        } else {
            d
        }
    }
}

/// Union of two domains: `min(a, b)`.
#[derive(Debug, Clone, Copy)]
pub struct Union<A, B>(pub A, pub B);

impl<A: DistanceFunction, B: DistanceFunction> DistanceFunction for Union<A, B> {
    fn distance(&self, p: &Point2<f64>) -> f64 {
        self.0.distance(p).min(self.1.distance(p))
    }
}

/// Intersection of two domains: `max(a, b)`.
#[derive(Debug, Clone, Copy)]
pub struct Intersection<A, B>(pub A, pub B);

impl<A: DistanceFunction, B: DistanceFunction> DistanceFunction for Intersection<A, B> {
    fn distance(&self, p: &Point2<f64>) -> f64 {
        self.0.distance(p).max(self.1.distance(p))
    }
}

/// The first domain with the second cut out: `max(a, -b)`.
#[derive(Debug, Clone, Copy)]
pub struct Difference<A, B>(pub A, pub B);

impl<A: DistanceFunction, B: DistanceFunction> DistanceFunction for Difference<A, B> {
    fn distance(&self, p: &Point2<f64>) -> f64 {
        self.0.distance(p).max(-self.1.distance(p))
    }
}

/// Everything outside a domain: `-a`.
#[derive(Debug, Clone, Copy)]
pub struct Complement<A>(pub A);

impl<A: DistanceFunction> DistanceFunction for Complement<A> {
    fn distance(&self, p: &Point2<f64>) -> f64 {
        -self.0.distance(p)
    }
}

/// Union of two domains.
pub fn union<A: DistanceFunction, B: DistanceFunction>(a: A, b: B) -> Union<A, B> {
    Union(a, b)
}

/// Intersection of two domains.
pub fn intersect<A: DistanceFunction, B: DistanceFunction>(a: A, b: B) -> Intersection<A, B> {
    Intersection(a, b)
}

/// `a` with `b` removed.
pub fn difference<A: DistanceFunction, B: DistanceFunction>(a: A, b: B) -> Difference<A, B> {
    Difference(a, b)
}

/// Ring between two concentric circles.
///
/// Equals `|r - (inner + outer) / 2| - (outer - inner) / 2` for `r = |p - center|`.
pub fn annulus(center: Point2<f64>, inner: f64, outer: f64) -> Difference<Circle, Circle> {
    Difference(Circle::new(center, outer), Circle::new(center, inner))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    #[test]
    fn test_circle() {
        let c = Circle::new(Point2::new(1.0, 1.0), 2.0);
        assert_close(c.distance(&Point2::new(1.0, 1.0)), -2.0);
        assert_close(c.distance(&Point2::new(4.0, 1.0)), 1.0);
        let g = c.gradient(&Point2::new(1.0, 3.0));
        assert!((g - Vector2::new(0.0, 1.0)).norm() < 1e-12);
    }

    #[test]
    fn test_rectangle() {
        let r = Rectangle::new(0.0, 0.0, 4.0, 2.0);
        assert_close(r.distance(&Point2::new(2.0, 1.0)), -1.0);
        assert_close(r.distance(&Point2::new(0.5, 1.0)), -0.5);
        assert_close(r.distance(&Point2::new(6.0, 1.0)), 2.0);
        assert_close(r.distance(&Point2::new(7.0, 6.0)), 5.0);
    }

    #[test]
    fn test_annulus_matches_closed_form() {
        let ring = annulus(Point2::origin(), 2.0, 10.0);
        let closed = |p: &Point2<f64>| (6.0 - p.coords.norm()).abs() - 4.0;
        for p in [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(3.0, -4.0),
            Point2::new(9.0, 0.5),
            Point2::new(-12.0, 3.0),
        ] {
            assert_close(ring.distance(&p), closed.distance(&p));
        }
    }

    #[test]
    fn test_combinators() {
        let a = Circle::new(Point2::new(0.0, 0.0), 1.0);
        let b = Circle::new(Point2::new(1.5, 0.0), 1.0);
        let p = Point2::new(-0.5, 0.0);
        assert_close(union(a, b).distance(&p), -0.5);
        assert_close(intersect(a, b).distance(&p), 1.0);
        assert_close(difference(a, b).distance(&p), -0.5);
        assert_close(Complement(a).distance(&p), 0.5);
    }

    #[test]
    fn test_gradient_of_closure() {
        let f = |p: &Point2<f64>| p.x * 2.0 + p.y;
        let g = f.gradient(&Point2::new(3.0, 4.0));
        assert!((g - Vector2::new(2.0, 1.0)).norm() < 1e-6);
    }

    #[test]
    fn test_segment_set_with_hole() {
        let square = |lo: f64, hi: f64| {
            let c = [
                Point2::new(lo, lo),
                Point2::new(hi, lo),
                Point2::new(hi, hi),
                Point2::new(lo, hi),
            ];
            (0..4).map(move |i| Segment::new(c[i], c[(i + 1) % 4]))
        };
        let d = SegmentSetDistance::new(square(0.0, 10.0).chain(square(4.0, 6.0)).collect());
        assert_close(d.distance(&Point2::new(2.0, 5.0)), -2.0);
        assert_close(d.distance(&Point2::new(5.0, 5.0)), 1.0);
        assert_close(d.distance(&Point2::new(12.0, 5.0)), 2.0);
        let bound = d.bounding_box().unwrap();
        assert_close(bound.width(), 10.0);
    }

    #[test]
    fn test_polygon_distance() {
        let d = PolygonDistance::new(Polygon::new(vec![
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(0.0, 2.0),
        ]));
        assert!(d.distance(&Point2::new(0.5, 0.5)) < 0.0);
        assert!(d.distance(&Point2::new(2.0, 2.0)) > 0.0);
    }
}
