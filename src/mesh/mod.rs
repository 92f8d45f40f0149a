//! Core mesh data structures.
//!
//! This module provides the planar half-edge mesh and the topological
//! operations the triangulator and the mesh improver are built from.
//!
//! # Overview
//!
//! The primary type is [`Mesh`], an arena-based half-edge (doubly-connected
//! edge list) structure. Every face is a closed counter-clockwise loop of
//! half-edges; the outside of the mesh is one explicit border face, and faces
//! can be flagged as holes. Adjacency queries are O(1).
//!
//! # Index Types
//!
//! Mesh elements are identified by type-safe index wrappers:
//! - [`VertexId`] - Identifies a vertex
//! - [`HalfEdgeId`] - Identifies a half-edge
//! - [`FaceId`] - Identifies a face
//!
//! # Construction
//!
//! Meshes are typically produced by the triangulator, or built from
//! face-vertex lists:
//!
//! ```
//! use eikmesh::mesh::{build_from_triangles, Mesh};
//! use nalgebra::Point2;
//!
//! let vertices = vec![
//!     Point2::new(0.0, 0.0),
//!     Point2::new(1.0, 0.0),
//!     Point2::new(0.5, 1.0),
//! ];
//! let faces = vec![[0, 1, 2]];
//!
//! let mesh: Mesh = build_from_triangles(&vertices, &faces).unwrap();
//! assert!(mesh.is_valid());
//! ```

mod builder;
mod halfedge;
mod index;
mod iter;
mod ops;

pub use builder::{build_from_polygons, build_from_triangles, to_face_vertex};
pub use halfedge::{Face, HalfEdge, Mesh, MeshSnapshot, Vertex, VertexData};
pub use index::{FaceId, HalfEdgeId, VertexId};
pub use iter::{FaceHalfEdgeIter, VertexHalfEdgeIter};

pub(crate) use halfedge::is_ccw;
