//! # EikMesh
//!
//! Planar triangle mesh generation for geometry and simulation research.
//!
//! The crate is built from three layers:
//!
//! - **Half-edge mesh**: an arena-based planar half-edge structure with
//!   type-safe handles, an explicit border face and hole faces
//! - **Delaunay triangulation**: incremental insertion with edge flips and
//!   three interchangeable point locators (walk, Delaunay hierarchy,
//!   Delaunay tree)
//! - **EikMesh**: generation of high-quality meshes for any domain given by a
//!   signed distance function, by force relaxation of the triangulation
//!
//! ## Quick Start
//!
//! ```
//! use eikmesh::prelude::*;
//! use nalgebra::Point2;
//!
//! // A disc with a hole, meshed with edges of length about 0.3.
//! let ring = annulus(Point2::origin(), 0.4, 1.0);
//! let bound = BoundingBox::from_origin_size(-1.0, -1.0, 2.0, 2.0);
//! let options = EikMeshOptions::default().with_max_iterations(40);
//!
//! let mut eikmesh = EikMesh::new(ring, Uniform(0.3), bound, options);
//! let report = eikmesh.improve().unwrap();
//!
//! assert!(eikmesh.mesh().is_valid());
//! assert!(report.quality.min > 0.0);
//! ```
//!
//! ## Delaunay Triangulation
//!
//! ```
//! use eikmesh::prelude::*;
//! use nalgebra::Point2;
//!
//! let bound = BoundingBox::from_origin_size(0.0, 0.0, 2.0, 2.0);
//! let mut triangulation: Triangulation = Triangulation::new(bound, LocatorKind::Hierarchy);
//! for (x, y) in [(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 2.0), (1.0, 0.8)] {
//!     triangulation.insert(Point2::new(x, y)).unwrap();
//! }
//! triangulation.finish().unwrap();
//!
//! let f = triangulation.locate(&Point2::new(1.0, 0.2)).unwrap();
//! assert!(triangulation.mesh().is_inner_triangle(f));
//! assert!(triangulation.is_delaunay());
//! ```
//!
//! ## Mesh Traversal
//!
//! ```
//! use eikmesh::prelude::*;
//! use nalgebra::Point2;
//!
//! let vertices = vec![
//!     Point2::new(0.0, 0.0),
//!     Point2::new(1.0, 0.0),
//!     Point2::new(1.0, 1.0),
//!     Point2::new(0.0, 1.0),
//! ];
//! let faces = vec![[0, 1, 2], [0, 2, 3]];
//! let mesh: Mesh = build_from_triangles(&vertices, &faces).unwrap();
//!
//! // The diagonal's endpoints see three neighbours each.
//! let v = VertexId::new(0);
//! assert_eq!(mesh.adjacent_vertices(v).count(), 3);
//! assert!(mesh.is_border_vertex(v));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod error;
pub mod field;
pub mod geometry;
pub mod io;
pub mod locate;
pub mod mesh;
pub mod triangulation;

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and functions:
///
/// ```
/// use eikmesh::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algo::{mesh_quality, EikMesh, EikMeshOptions, ImproveReport, Progress, QualityStats};
    pub use crate::error::{MeshError, Result};
    pub use crate::field::{
        annulus, difference, intersect, union, Circle, DistanceAdaptive, DistanceFunction,
        EdgeLengthFunction, Rectangle, Uniform,
    };
    pub use crate::geometry::{BoundingBox, Tolerance, Triangle};
    pub use crate::locate::{Location, LocatorKind};
    pub use crate::mesh::{build_from_triangles, to_face_vertex, FaceId, HalfEdgeId, Mesh, VertexId};
    pub use crate::triangulation::{Triangulation, TriangulationState};
}

// Re-export nalgebra types for convenience
pub use nalgebra;

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use nalgebra::Point2;

    #[test]
    fn test_square_with_center() {
        let bound = BoundingBox::from_origin_size(0.0, 0.0, 1.0, 1.0);
        let mut t: Triangulation = Triangulation::new(bound, LocatorKind::Walk);
        for (x, y) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.5, 0.5)] {
            t.insert(Point2::new(x, y)).unwrap();
        }
        t.finish().unwrap();

        let mesh = t.mesh();
        assert_eq!(mesh.num_vertices(), 5);
        assert_eq!(mesh.num_faces(), 4);
        // 4 triangles * 3 + 4 border half-edges
        assert_eq!(mesh.num_halfedges(), 16);
        assert!(mesh.is_valid());

        let center = t
            .vertices()
            .find(|&v| *mesh.position(v) == Point2::new(0.5, 0.5))
            .unwrap();
        assert!(!mesh.is_boundary_vertex(center));
        assert_eq!(mesh.valence(center), 4);
    }
}
