//! Triangle quality metrics.
//!
//! The quality of a triangle with side lengths `a`, `b`, `c` is
//!
//! ```text
//! q = (b + c - a)(c + a - b)(a + b - c) / (a b c)
//! ```
//!
//! which is twice the ratio of in-radius to circumradius: 1 for an
//! equilateral triangle and 0 for a degenerate one.

use std::fmt;

use rayon::prelude::*;

use crate::geometry::Triangle;
use crate::mesh::{FaceId, Mesh, VertexData};

/// Quality of a triangle.
#[inline]
pub fn triangle_quality(triangle: &Triangle) -> f64 {
    triangle.quality()
}

/// Quality of a triangular face.
pub fn face_quality<V: VertexData>(mesh: &Mesh<V>, f: FaceId) -> f64 {
    triangle_quality(&mesh.to_triangle(f))
}

/// Summary of the qualities of a mesh's triangles.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct QualityStats {
    /// Number of triangles measured.
    pub count: usize,
    /// Mean quality.
    pub mean: f64,
    /// Worst quality.
    pub min: f64,
    /// Best quality.
    pub max: f64,
    /// Number of triangles below the threshold passed to [`mesh_quality`].
    pub below: usize,
}

impl fmt::Display for QualityStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} triangles, quality mean {:.4} min {:.4} max {:.4}, {} below threshold",
            self.count, self.mean, self.min, self.max, self.below
        )
    }
}

/// Quality statistics over the inner triangles of `mesh`.
///
/// Hole faces and the border are not measured.
pub fn mesh_quality<V: VertexData>(mesh: &Mesh<V>, threshold: f64) -> QualityStats {
    let faces: Vec<FaceId> = mesh.inner_triangle_ids().collect();
    if faces.is_empty() {
        return QualityStats::default();
    }
    let qualities: Vec<f64> = faces.par_iter().map(|&f| face_quality(mesh, f)).collect();
    let count = qualities.len();
    let sum: f64 = qualities.iter().sum();
    QualityStats {
        count,
        mean: sum / count as f64,
        min: qualities.iter().copied().fold(f64::INFINITY, f64::min),
        max: qualities.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        below: qualities.iter().filter(|&&q| q < threshold).count(),
    }
}

/// Smallest interior angle over the inner triangles, in degrees.
pub fn min_angle_degrees<V: VertexData>(mesh: &Mesh<V>) -> f64 {
    mesh.inner_triangle_ids()
        .map(|f| mesh.to_triangle(f).min_angle_degrees())
        .fold(f64::INFINITY, f64::min)
}
