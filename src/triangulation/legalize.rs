//! Edge legalization by flipping.

use crate::geometry::CircleSide;
use crate::mesh::{HalfEdgeId, VertexData, VertexId};

use super::Triangulation;

impl<V: VertexData> Triangulation<V> {
    /// Edges opposite `v` in the triangles around it.
    pub(crate) fn link_edges(&self, v: VertexId) -> Vec<HalfEdgeId> {
        let mesh = self.mesh();
        mesh.incident_halfedges(v)
            .filter(|&he| mesh.is_inner_triangle(mesh.face_of(he)))
            .map(|he| mesh.prev(he))
            .collect()
    }

    /// Whether flipping `e` makes the triangulation more Delaunay.
    ///
    /// Only edges between two inner triangles forming a strictly convex
    /// quadrilateral are candidates. Co-circular quadrilaterals keep the
    /// diagonal whose smaller endpoint handle is smaller, so repeated
    /// legalization never flips back and forth.
    pub(crate) fn should_flip(&self, e: HalfEdgeId) -> bool {
        let mesh = self.mesh();
        if !mesh.halfedge_alive(e) {
            return false;
        }
        let t = mesh.twin(e);
        if !mesh.is_inner_triangle(mesh.face_of(e)) || !mesh.is_inner_triangle(mesh.face_of(t)) {
            return false;
        }
        let a = mesh.source(e);
        let b = mesh.target(e);
        let c = mesh.target(mesh.next(e));
        let d = mesh.target(mesh.next(t));
        if c == d {
            return false;
        }
        let (pa, pb, pc, pd) = (mesh.position(a), mesh.position(b), mesh.position(c), mesh.position(d));
        let tol = self.tolerance();
        let flip = match tol.circle_side(pa, pb, pc, pd) {
            CircleSide::Inside => true,
            CircleSide::Outside => false,
            CircleSide::Cocircular => c.min(d) < a.min(b),
        };
        flip && tol.is_strictly_ccw(pc, pa, pd) && tol.is_strictly_ccw(pd, pb, pc)
    }

    /// Flip edges from `stack` until none of them, nor the edges exposed by
    /// the flips, is illegal. Returns the number of flips.
    pub(crate) fn legalize(&mut self, mut stack: Vec<HalfEdgeId>) -> usize {
        let budget = 8 * self.mesh().num_halfedges() + 64;
        let mut flips = 0;
        while let Some(e) = stack.pop() {
            if !self.should_flip(e) {
                continue;
            }
            let mesh = self.mesh();
            let t = mesh.twin(e);
            let faces = [mesh.face_of(e), mesh.face_of(t)];
            let outer = [
                mesh.next(e),
                mesh.prev(e),
                mesh.next(t),
                mesh.prev(t),
            ];
            if let Err(err) = self.mesh_mut().flip(e) {
                log::debug!("skipping flip of {:?}: {}", e, err);
                continue;
            }
            self.notify_replace(&faces, &faces);
            stack.extend_from_slice(&outer);
            flips += 1;
            if flips > budget {
                log::warn!("legalization stopped after {} flips", flips);
                break;
            }
        }
        flips
    }

    /// Legalize every edge of the mesh. Returns the number of flips.
    pub fn legalize_all(&mut self) -> usize {
        let edges: Vec<HalfEdgeId> = self.mesh().edges().collect();
        self.legalize(edges)
    }

    /// Edges whose opposite vertices lie strictly inside each other's
    /// circumcircles.
    pub fn non_delaunay_edges(&self) -> Vec<HalfEdgeId> {
        let mesh = self.mesh();
        let tol = self.tolerance();
        mesh.edges()
            .filter(|&e| {
                let t = mesh.twin(e);
                if !mesh.is_inner_triangle(mesh.face_of(e)) || !mesh.is_inner_triangle(mesh.face_of(t)) {
                    return false;
                }
                let a = mesh.position(mesh.source(e));
                let b = mesh.position(mesh.target(e));
                let c = mesh.position(mesh.target(mesh.next(e)));
                let d = mesh.position(mesh.target(mesh.next(t)));
                tol.circle_side(a, b, c, d) == CircleSide::Inside
            })
            .collect()
    }

    /// Whether every interior edge is locally Delaunay.
    pub fn is_delaunay(&self) -> bool {
        self.non_delaunay_edges().is_empty()
    }
}
