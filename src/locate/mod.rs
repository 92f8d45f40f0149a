//! Point location.
//!
//! Every strategy answers the same question: which face of the current
//! triangulation contains a query point. They differ in the auxiliary
//! structure they maintain to get there quickly:
//!
//! - [`LocatorKind::Walk`]: no structure, a visibility walk from the last
//!   face touched
//! - [`LocatorKind::Hierarchy`]: a stack of coarser triangulations of random
//!   samples of the inserted points, located top-down
//! - [`LocatorKind::DelaunayTree`]: the history of every triangle ever
//!   created, descended from the first triangle
//!
//! All strategies finish with the same walk, and the reported face is
//! canonical (the smallest handle among the faces containing the point), so
//! they always agree.

mod hierarchy;
mod tree;
mod walk;

use nalgebra::Point2;

use crate::geometry::Tolerance;
use crate::mesh::{FaceId, HalfEdgeId, Mesh, VertexData, VertexId};

pub use hierarchy::{DelaunayHierarchy, HierarchyOptions};
pub use tree::DelaunayTree;
pub use walk::{scan, walk};

pub(crate) use walk::{edge_side, face_contains, vertex_face};

/// Where a query point lies in a triangulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Strictly inside a face.
    InFace(FaceId),
    /// On an edge, between its endpoints. `edge` is the half-edge of `face`.
    OnEdge {
        /// Half-edge the point lies on.
        edge: HalfEdgeId,
        /// Canonical face of the edge.
        face: FaceId,
    },
    /// On an existing vertex.
    OnVertex {
        /// The coincident vertex.
        vertex: VertexId,
        /// Canonical face around the vertex.
        face: FaceId,
    },
    /// Outside the triangulated region.
    Outside,
}

impl Location {
    /// The face containing the point, if any.
    pub fn face(&self) -> Option<FaceId> {
        match *self {
            Location::InFace(face)
            | Location::OnEdge { face, .. }
            | Location::OnVertex { face, .. } => Some(face),
            Location::Outside => None,
        }
    }
}

/// Point-location strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocatorKind {
    /// Visibility walk from the last located face.
    #[default]
    Walk,
    /// Delaunay hierarchy.
    Hierarchy,
    /// Delaunay tree (triangle history DAG).
    DelaunayTree,
}

/// A point locator together with its auxiliary structure.
#[derive(Debug, Clone)]
pub enum PointLocator {
    /// Visibility walk.
    Walk,
    /// Delaunay hierarchy.
    Hierarchy(Box<DelaunayHierarchy>),
    /// Delaunay tree.
    DelaunayTree(DelaunayTree),
}

impl PointLocator {
    /// Create an empty locator of the given kind.
    ///
    /// `bound` is the region the triangulation covers; the hierarchy builds
    /// its coarser levels over the same region.
    pub fn new(kind: LocatorKind, bound: &crate::geometry::BoundingBox, tolerance: Tolerance) -> Self {
        match kind {
            LocatorKind::Walk => PointLocator::Walk,
            LocatorKind::Hierarchy => PointLocator::Hierarchy(Box::new(DelaunayHierarchy::new(
                *bound,
                tolerance,
                HierarchyOptions::default(),
            ))),
            LocatorKind::DelaunayTree => PointLocator::DelaunayTree(DelaunayTree::new()),
        }
    }

    /// The strategy of this locator.
    pub fn kind(&self) -> LocatorKind {
        match self {
            PointLocator::Walk => LocatorKind::Walk,
            PointLocator::Hierarchy(_) => LocatorKind::Hierarchy,
            PointLocator::DelaunayTree(_) => LocatorKind::DelaunayTree,
        }
    }

    /// Locate `p`, starting the final walk at `hint` when the strategy has
    /// nothing better.
    pub fn locate<V: VertexData>(
        &self,
        mesh: &Mesh<V>,
        p: &Point2<f64>,
        hint: Option<FaceId>,
        tol: &Tolerance,
    ) -> Location {
        let start = match self {
            PointLocator::Walk => hint,
            PointLocator::Hierarchy(hierarchy) => hierarchy.hint(mesh, p).or(hint),
            PointLocator::DelaunayTree(tree) => tree.hint(mesh, p, tol).or(hint),
        };
        walk(mesh, p, start, tol)
    }

    /// Called once the initial triangles exist.
    pub fn on_init<V: VertexData>(&mut self, mesh: &Mesh<V>) {
        if let PointLocator::DelaunayTree(tree) = self {
            tree.on_init(mesh);
        }
    }

    /// Called after an operation replaced the triangles `parents` by
    /// `children`. Face handles may appear in both lists.
    pub fn on_replace<V: VertexData>(&mut self, mesh: &Mesh<V>, parents: &[FaceId], children: &[FaceId]) {
        if let PointLocator::DelaunayTree(tree) = self {
            tree.on_replace(mesh, parents, children);
        }
    }

    /// Called after a new vertex has been inserted.
    pub fn on_vertex_inserted<V: VertexData>(&mut self, mesh: &Mesh<V>, v: VertexId) {
        if let PointLocator::Hierarchy(hierarchy) = self {
            hierarchy.on_vertex_inserted(mesh, v);
        }
    }
}
