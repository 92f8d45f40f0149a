//! Target edge-length fields.

use nalgebra::Point2;

use super::DistanceFunction;

/// Desired local edge length of the mesh.
///
/// Values must be strictly positive everywhere the improver evaluates them;
/// only ratios between values matter, the overall scale is fixed by the
/// initial edge length.
pub trait EdgeLengthFunction: Send + Sync {
    /// Desired edge length near `p`.
    fn edge_length(&self, p: &Point2<f64>) -> f64;
}

impl<F> EdgeLengthFunction for F
where
    F: Fn(&Point2<f64>) -> f64 + Send + Sync,
{
    #[inline]
    fn edge_length(&self, p: &Point2<f64>) -> f64 {
        self(p)
    }
}

/// The same edge length everywhere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Uniform(pub f64);

impl EdgeLengthFunction for Uniform {
    #[inline]
    fn edge_length(&self, _p: &Point2<f64>) -> f64 {
        self.0
    }
}

/// Edge length growing linearly with the distance to the boundary.
///
/// `min + growth * |distance(p)|`, clamped to `max`.
#[derive(Debug, Clone)]
pub struct DistanceAdaptive<D> {
    /// The domain.
    pub distance: D,
    /// Edge length on the boundary.
    pub min: f64,
    /// Increase per unit of distance.
    pub growth: f64,
    /// Upper limit.
    pub max: f64,
}

impl<D: DistanceFunction> DistanceAdaptive<D> {
    /// Create an adaptive field.
    pub fn new(distance: D, min: f64, growth: f64, max: f64) -> Self {
        Self {
            distance,
            min,
            growth,
            max,
        }
    }
}

impl<D: DistanceFunction> EdgeLengthFunction for DistanceAdaptive<D> {
    fn edge_length(&self, p: &Point2<f64>) -> f64 {
        (self.min + self.growth * self.distance.distance(p).abs()).min(self.max)
    }
}
