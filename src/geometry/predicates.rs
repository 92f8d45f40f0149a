//! Geometric predicates with a single, configurable tolerance.
//!
//! Every decision the mesher takes on floating point coordinates goes through
//! this module: orientation of three points, the in-circle test and the
//! coincidence/on-edge tests. The thresholds live in one [`Tolerance`] value
//! so a triangulation uses exactly one notion of "zero".
//!
//! The in-circle determinant is evaluated relative to the best conditioned
//! of its four points and compared against an error bound proportional to the
//! permanent of the matrix, in the spirit of adaptive predicates. Values inside
//! the bound are reported as [`CircleSide::Cocircular`], which the
//! triangulator resolves by a deterministic tie break.

use nalgebra::Point2;

/// Orientation of an ordered point triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// The triple turns left.
    CounterClockwise,
    /// The triple turns right.
    Clockwise,
    /// The triple is collinear within tolerance.
    Collinear,
}

/// Position of a point relative to the circumcircle of a triangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircleSide {
    /// Strictly inside.
    Inside,
    /// Strictly outside.
    Outside,
    /// On the circle within tolerance.
    Cocircular,
}

/// Twice the signed area of the triangle `(a, b, c)`.
///
/// Positive when the points are in counter-clockwise order.
#[inline]
pub fn orient2d(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Signed distance of `p` from the line through `a` and `b`.
///
/// Positive when `p` lies to the left of the directed line `a -> b`. Returns
/// zero for a degenerate line.
#[inline]
pub fn signed_distance(a: &Point2<f64>, b: &Point2<f64>, p: &Point2<f64>) -> f64 {
    let len = (b - a).norm();
    if len == 0.0 {
        return 0.0;
    }
    orient2d(a, b, p) / len
}

/// The in-circle determinant.
///
/// Positive when `d` lies inside the circumcircle of the counter-clockwise
/// triangle `(a, b, c)`, negative when outside, zero when co-circular.
///
/// # Example
///
/// ```
/// use eikmesh::geometry::in_circle;
/// use nalgebra::Point2;
///
/// let a = Point2::new(0.0, 0.0);
/// let b = Point2::new(1.0, 0.0);
/// let c = Point2::new(0.0, 1.0);
/// assert!(in_circle(&a, &b, &c, &Point2::new(0.5, 0.5)) > 0.0);
/// assert!(in_circle(&a, &b, &c, &Point2::new(5.0, 5.0)) < 0.0);
/// ```
#[inline]
pub fn in_circle(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>, d: &Point2<f64>) -> f64 {
    in_circle_with_bound(a, b, c, d).0
}

/// The in-circle determinant together with its permanent.
///
/// The lifted 4x4 determinant is invariant under translation, so the rows are
/// translated by the point closest to the others. This keeps a far away point
/// (such as a super-triangle vertex) from swamping the other three.
pub(crate) fn in_circle_with_bound(
    a: &Point2<f64>,
    b: &Point2<f64>,
    c: &Point2<f64>,
    d: &Point2<f64>,
) -> (f64, f64) {
    let pts = [a, b, c, d];
    let spread = |i: usize| -> f64 {
        pts.iter()
            .map(|q| (q.x - pts[i].x).abs() + (q.y - pts[i].y).abs())
            .sum()
    };
    let mut pivot = 3;
    let mut best = spread(3);
    for i in 0..3 {
        let s = spread(i);
        if s < best {
            best = s;
            pivot = i;
        }
    }

    let t = pts[pivot];
    let mut rows = [(0.0, 0.0, 0.0); 3];
    let mut k = 0;
    for (i, p) in pts.iter().enumerate() {
        if i == pivot {
            continue;
        }
        let x = p.x - t.x;
        let y = p.y - t.y;
        rows[k] = (x, y, x * x + y * y);
        k += 1;
    }
    let [(x0, y0, l0), (x1, y1, l1), (x2, y2, l2)] = rows;

    let det = x0 * (y1 * l2 - l1 * y2) - y0 * (x1 * l2 - l1 * x2) + l0 * (x1 * y2 - y1 * x2);
    let permanent = x0.abs() * ((y1 * l2).abs() + (l1 * y2).abs())
        + y0.abs() * ((x1 * l2).abs() + (l1 * x2).abs())
        + l0.abs() * ((x1 * y2).abs() + (y1 * x2).abs());

    // Cofactor sign of the pivot row when expanding along the homogeneous column.
    let sign = if pivot % 2 == 1 { 1.0 } else { -1.0 };
    (sign * det, permanent)
}

/// Tolerances used by all geometric decisions of a triangulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    /// Absolute distance below which two points coincide, or a point is
    /// considered to lie on a line.
    pub distance: f64,

    /// Relative error bound applied to determinant magnitudes.
    pub relative: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            distance: 1e-10,
            relative: 1e-12,
        }
    }
}

impl Tolerance {
    /// Create a tolerance with the given absolute distance threshold.
    pub fn new(distance: f64) -> Self {
        Self {
            distance: distance.abs(),
            ..Self::default()
        }
    }

    /// Create a tolerance scaled to a domain of the given extent.
    pub fn for_extent(extent: f64) -> Self {
        let extent = if extent.is_finite() && extent > 0.0 {
            extent
        } else {
            1.0
        };
        Self::new(extent * 1e-11)
    }

    /// Set the relative determinant bound.
    pub fn with_relative(mut self, relative: f64) -> Self {
        self.relative = relative.abs();
        self
    }

    /// Whether two points coincide.
    #[inline]
    pub fn coincident(&self, a: &Point2<f64>, b: &Point2<f64>) -> bool {
        (b - a).norm() <= self.distance
    }

    /// Side of `p` relative to the directed line `a -> b`.
    ///
    /// Points within [`distance`](Self::distance) of the line are collinear.
    #[inline]
    pub fn side(&self, a: &Point2<f64>, b: &Point2<f64>, p: &Point2<f64>) -> Orientation {
        self.classify(signed_distance(a, b, p))
    }

    /// Classify a signed distance against the distance threshold.
    #[inline]
    pub fn classify(&self, signed: f64) -> Orientation {
        if signed > self.distance {
            Orientation::CounterClockwise
        } else if signed < -self.distance {
            Orientation::Clockwise
        } else {
            Orientation::Collinear
        }
    }

    /// Orientation of a triangle.
    ///
    /// A triangle whose smallest height is within tolerance is collinear,
    /// which rejects needles and caps alike.
    pub fn orientation(&self, a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> Orientation {
        let area2 = orient2d(a, b, c);
        let longest = (b - a).norm().max((c - b).norm()).max((a - c).norm());
        if longest == 0.0 {
            return Orientation::Collinear;
        }
        self.classify(area2 / longest)
    }

    /// Whether `(a, b, c)` is counter-clockwise beyond tolerance.
    #[inline]
    pub fn is_strictly_ccw(&self, a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> bool {
        self.orientation(a, b, c) == Orientation::CounterClockwise
    }

    /// Position of `d` relative to the circumcircle of counter-clockwise `(a, b, c)`.
    pub fn circle_side(
        &self,
        a: &Point2<f64>,
        b: &Point2<f64>,
        c: &Point2<f64>,
        d: &Point2<f64>,
    ) -> CircleSide {
        let (det, permanent) = in_circle_with_bound(a, b, c, d);
        let bound = self.relative * permanent;
        if det > bound {
            CircleSide::Inside
        } else if det < -bound {
            CircleSide::Outside
        } else {
            CircleSide::Cocircular
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point2<f64> {
        Point2::new(x, y)
    }

    #[test]
    fn test_orient2d_sign() {
        assert!(orient2d(&p(0.0, 0.0), &p(1.0, 0.0), &p(0.0, 1.0)) > 0.0);
        assert!(orient2d(&p(0.0, 0.0), &p(0.0, 1.0), &p(1.0, 0.0)) < 0.0);
        assert_eq!(orient2d(&p(0.0, 0.0), &p(1.0, 1.0), &p(2.0, 2.0)), 0.0);
    }

    #[test]
    fn test_in_circle_is_pivot_independent() {
        let a = p(0.0, 0.0);
        let b = p(4.0, 0.0);
        let c = p(0.0, 4.0);
        let inside = p(1.0, 1.0);
        let outside = p(5.0, 5.0);
        let far = p(1.0e6, -3.0e5);

        assert!(in_circle(&a, &b, &c, &inside) > 0.0);
        assert!(in_circle(&a, &b, &c, &outside) < 0.0);
        assert!(in_circle(&a, &b, &c, &far) < 0.0);
        // A far vertex of the triangle itself: the circle becomes huge and
        // the nearby point is inside it.
        assert!(in_circle(&a, &far, &b, &p(2.0, -1.0)) > 0.0);
    }

    #[test]
    fn test_cocircular_square() {
        let tol = Tolerance::default();
        let side = tol.circle_side(&p(0.0, 0.0), &p(1.0, 0.0), &p(1.0, 1.0), &p(0.0, 1.0));
        assert_eq!(side, CircleSide::Cocircular);
    }

    #[test]
    fn test_tolerance_side() {
        let tol = Tolerance::new(1e-6);
        let a = p(0.0, 0.0);
        let b = p(10.0, 0.0);
        assert_eq!(tol.side(&a, &b, &p(5.0, 1e-7)), Orientation::Collinear);
        assert_eq!(tol.side(&a, &b, &p(5.0, 1e-3)), Orientation::CounterClockwise);
        assert_eq!(tol.side(&a, &b, &p(5.0, -1e-3)), Orientation::Clockwise);
    }

    #[test]
    fn test_needle_is_collinear() {
        let tol = Tolerance::new(1e-6);
        assert_eq!(
            tol.orientation(&p(0.0, 0.0), &p(100.0, 0.0), &p(50.0, 1e-8)),
            Orientation::Collinear
        );
        assert!(tol.is_strictly_ccw(&p(0.0, 0.0), &p(1.0, 0.0), &p(0.0, 1.0)));
    }

    #[test]
    fn test_for_extent() {
        let tol = Tolerance::for_extent(1000.0);
        assert!((tol.distance - 1e-8).abs() < 1e-20);
        assert_eq!(Tolerance::for_extent(f64::NAN).distance, 1e-11);
    }
}
