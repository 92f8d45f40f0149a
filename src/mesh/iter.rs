//! Navigation iterators over a [`Mesh`].
//!
//! All iterators are built from the four relations `next`, `twin`, `vertex`
//! and `face`. Rotation around a vertex visits every edge ending at it,
//! including the ones on the border, so it works unchanged for interior
//! vertices, boundary vertices and vertices pinched between two border
//! wedges.

use super::halfedge::{Mesh, VertexData};
use super::index::{FaceId, HalfEdgeId, VertexId};

/// Iterator over the half-edges of a face, following `next`.
pub struct FaceHalfEdgeIter<'a, V> {
    mesh: &'a Mesh<V>,
    start: HalfEdgeId,
    current: HalfEdgeId,
    remaining: usize,
    done: bool,
}

impl<'a, V: VertexData> FaceHalfEdgeIter<'a, V> {
    fn new(mesh: &'a Mesh<V>, f: FaceId) -> Self {
        let start = mesh.face_edge(f);
        Self {
            mesh,
            start,
            current: start,
            remaining: mesh.halfedges.len(),
            done: !start.is_valid(),
        }
    }
}

impl<'a, V: VertexData> Iterator for FaceHalfEdgeIter<'a, V> {
    type Item = HalfEdgeId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.remaining == 0 {
            return None;
        }
        let result = self.current;
        self.remaining -= 1;
        self.current = self.mesh.next(self.current);
        if self.current == self.start {
            self.done = true;
        }
        Some(result)
    }
}

/// Iterator over the half-edges ending at a vertex.
///
/// Steps from one edge to the next by `twin(next(e))`, which turns around
/// the vertex crossing one face at a time.
pub struct VertexHalfEdgeIter<'a, V> {
    mesh: &'a Mesh<V>,
    start: HalfEdgeId,
    current: HalfEdgeId,
    remaining: usize,
    done: bool,
}

impl<'a, V: VertexData> VertexHalfEdgeIter<'a, V> {
    fn new(mesh: &'a Mesh<V>, v: VertexId) -> Self {
        let start = mesh.vertex_edge(v);
        Self {
            mesh,
            start,
            current: start,
            remaining: mesh.halfedges.len(),
            done: !start.is_valid(),
        }
    }
}

impl<'a, V: VertexData> Iterator for VertexHalfEdgeIter<'a, V> {
    type Item = HalfEdgeId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.remaining == 0 {
            return None;
        }
        let result = self.current;
        self.remaining -= 1;
        self.current = self.mesh.twin(self.mesh.next(self.current));
        if self.current == self.start {
            self.done = true;
        }
        Some(result)
    }
}

impl<V: VertexData> Mesh<V> {
    /// Iterate over the half-edges of a face.
    pub fn face_halfedges(&self, f: FaceId) -> FaceHalfEdgeIter<'_, V> {
        FaceHalfEdgeIter::new(self, f)
    }

    /// Iterate over the vertices of a face.
    pub fn face_vertices(&self, f: FaceId) -> impl Iterator<Item = VertexId> + '_ {
        self.face_halfedges(f).map(|he| self.target(he))
    }

    /// Iterate over the faces sharing an edge with `f`, skipping the border.
    pub fn face_neighbors(&self, f: FaceId) -> impl Iterator<Item = FaceId> + '_ {
        self.face_halfedges(f)
            .map(|he| self.face_of(self.twin(he)))
            .filter(|&g| !self.is_border(g))
    }

    /// Iterate over the half-edges ending at a vertex.
    pub fn incident_halfedges(&self, v: VertexId) -> VertexHalfEdgeIter<'_, V> {
        VertexHalfEdgeIter::new(self, v)
    }

    /// Iterate over the vertices connected to `v` by an edge.
    pub fn adjacent_vertices(&self, v: VertexId) -> impl Iterator<Item = VertexId> + '_ {
        self.incident_halfedges(v).map(|he| self.source(he))
    }

    /// Iterate over the faces around `v`, skipping the border.
    pub fn adjacent_faces(&self, v: VertexId) -> impl Iterator<Item = FaceId> + '_ {
        self.incident_halfedges(v)
            .map(|he| self.face_of(he))
            .filter(|&f| !self.is_border(f))
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::Point2;

    use crate::mesh::{build_from_triangles, Mesh};

    /// A fan of four triangles around the center vertex 4.
    fn fan() -> Mesh {
        let vertices = vec![
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 2.0),
            Point2::new(0.0, 2.0),
            Point2::new(1.0, 1.0),
        ];
        let faces = vec![[0, 1, 4], [1, 2, 4], [2, 3, 4], [3, 0, 4]];
        build_from_triangles(&vertices, &faces).unwrap()
    }

    #[test]
    fn test_rotation_interior_vertex() {
        let mesh = fan();
        let center = crate::mesh::VertexId::new(4);
        let mut neighbors: Vec<usize> = mesh.adjacent_vertices(center).map(|v| v.index()).collect();
        neighbors.sort();
        assert_eq!(neighbors, vec![0, 1, 2, 3]);
        assert_eq!(mesh.adjacent_faces(center).count(), 4);
        assert!(!mesh.is_boundary_vertex(center));
    }

    #[test]
    fn test_rotation_boundary_vertex() {
        let mesh = fan();
        let corner = crate::mesh::VertexId::new(0);
        let mut neighbors: Vec<usize> = mesh.adjacent_vertices(corner).map(|v| v.index()).collect();
        neighbors.sort();
        assert_eq!(neighbors, vec![1, 3, 4]);
        // Two inner faces and the border are crossed, the border is skipped.
        assert_eq!(mesh.adjacent_faces(corner).count(), 2);
        assert!(mesh.is_boundary_vertex(corner));
    }

    #[test]
    fn test_face_iteration() {
        let mesh = fan();
        for f in mesh.face_ids() {
            assert_eq!(mesh.face_halfedges(f).count(), 3);
            assert_eq!(mesh.face_neighbors(f).count(), 2);
        }
        assert_eq!(mesh.face_halfedges(mesh.border_face()).count(), 4);
    }
}
