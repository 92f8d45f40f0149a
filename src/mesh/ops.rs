//! Topological operations on a [`Mesh`].
//!
//! Every operation validates its preconditions before touching the mesh and
//! returns [`MeshError::Topology`] when they do not hold, in which case the
//! mesh is unchanged. None of these operations look at geometry beyond what
//! is needed to keep faces from inverting; geometric decisions such as
//! whether a flip improves a triangulation belong to the callers.

use std::collections::HashSet;

use nalgebra::Point2;

use super::halfedge::{is_ccw, Mesh, VertexData};
use super::index::{FaceId, HalfEdgeId, VertexId};
use crate::error::{MeshError, Result};

impl<V: VertexData> Mesh<V> {
    /// Flip the edge shared by two inner triangles.
    ///
    /// For triangles `(a, b, c)` and `(b, a, d)` sharing `a -> b`, the edge is
    /// replaced by `c - d`. Both face handles survive: the face of `e` becomes
    /// `(c, a, d)` and the face of its twin becomes `(d, b, c)`.
    pub fn flip(&mut self, e: HalfEdgeId) -> Result<()> {
        self.check_halfedge(e)?;
        let t = self.twin(e);
        let f1 = self.face_of(e);
        let f2 = self.face_of(t);
        if !self.is_inner_triangle(f1) || !self.is_inner_triangle(f2) {
            return Err(MeshError::topology(format!(
                "{:?} is not shared by two inner triangles",
                e
            )));
        }

        let e1 = self.next(e);
        let e2 = self.next(e1);
        let t1 = self.next(t);
        let t2 = self.next(t1);
        let a = self.target(t);
        let b = self.target(e);
        let c = self.target(e1);
        let d = self.target(t1);
        if c == d || self.find_halfedge(c, d).is_some() {
            return Err(MeshError::topology(format!(
                "flipping {:?} would duplicate the edge {:?}-{:?}",
                e, c, d
            )));
        }

        self.set_target(e, c);
        self.set_target(t, d);

        // (c, a, d)
        self.link_next(e2, t1);
        self.link_next(t1, e);
        self.link_next(e, e2);
        // (d, b, c)
        self.link_next(t2, e1);
        self.link_next(e1, t);
        self.link_next(t, t2);

        self.set_face(t1, f1);
        self.set_face(e1, f2);
        self.set_face_edge(f1, e);
        self.set_face_edge(f2, t);

        if self.vertex_edge(b) == e {
            self.set_vertex_edge(b, t2);
        }
        if self.vertex_edge(a) == t {
            self.set_vertex_edge(a, e2);
        }
        Ok(())
    }

    /// Insert a vertex at `p` inside a triangle and connect it to the three
    /// corners, producing three triangles. The original face handle is kept
    /// for one of them.
    pub fn split_triangle(&mut self, f: FaceId, p: Point2<f64>) -> Result<VertexId> {
        self.check_face(f)?;
        if self.is_border(f) || !self.is_triangle(f) {
            return Err(MeshError::topology(format!("{:?} is not a triangle", f)));
        }
        let hole = self.is_hole(f);

        let e0 = self.face_edge(f);
        let e1 = self.next(e0);
        let e2 = self.next(e1);
        let a = self.target(e2);
        let b = self.target(e0);
        let c = self.target(e1);

        let v = self.alloc_vertex(p);
        let g1 = self.alloc_face(hole);
        let g2 = self.alloc_face(hole);
        let (h_bv, h_vb) = self.alloc_edge_pair(b, v);
        let (h_cv, h_vc) = self.alloc_edge_pair(c, v);
        let (h_av, h_va) = self.alloc_edge_pair(a, v);

        for (x, y, z, face) in [
            (e0, h_bv, h_va, f),
            (e1, h_cv, h_vb, g1),
            (e2, h_av, h_vc, g2),
        ] {
            self.link_next(x, y);
            self.link_next(y, z);
            self.link_next(z, x);
            self.set_face(x, face);
            self.set_face(y, face);
            self.set_face(z, face);
            self.set_face_edge(face, x);
        }
        self.set_vertex_edge(v, h_bv);
        Ok(v)
    }

    /// Insert a vertex at `p` on an edge.
    ///
    /// Each side of the edge that is a triangle is split in two by connecting
    /// the new vertex to the opposite corner. A side that is the border or a
    /// polygonal face simply gains the vertex in its loop.
    pub fn split_edge(&mut self, e: HalfEdgeId, p: Point2<f64>) -> Result<VertexId> {
        self.check_halfedge(e)?;
        let t = self.twin(e);
        let fe = self.face_of(e);
        let ft = self.face_of(t);
        let split_e = !self.is_border(fe) && self.is_triangle(fe);
        let split_t = !self.is_border(ft) && self.is_triangle(ft);
        let a = self.target(t);
        let b = self.target(e);

        let v = self.alloc_vertex(p);
        let e_next = self.next(e);
        let t_next = self.next(t);

        // e: a -> v, e_new: v -> b, t: b -> v, t_new: v -> a
        let e_new = self.alloc_halfedge();
        let t_new = self.alloc_halfedge();
        self.set_target(e, v);
        self.set_target(t, v);
        self.set_target(e_new, b);
        self.set_target(t_new, a);
        self.link_twins(e, t_new);
        self.link_twins(t, e_new);
        self.set_face(e_new, fe);
        self.set_face(t_new, ft);
        self.link_next(e, e_new);
        self.link_next(e_new, e_next);
        self.link_next(t, t_new);
        self.link_next(t_new, t_next);

        if split_e {
            self.split_corner(e, e_new, e_next, fe);
        }
        if split_t {
            self.split_corner(t, t_new, t_next, ft);
        }

        if self.vertex_edge(b) == e {
            self.set_vertex_edge(b, e_new);
        }
        if self.vertex_edge(a) == t {
            self.set_vertex_edge(a, t_new);
        }
        self.set_vertex_edge(v, e);
        self.fix_vertex_edge(v);
        Ok(v)
    }

    /// Cut the quadrilateral loop `first (x -> v), second (v -> y), third (y -> c), ...`
    /// of face `f` into `(x, v, c)` kept on `f` and `(v, y, c)` on a new face.
    fn split_corner(&mut self, first: HalfEdgeId, second: HalfEdgeId, third: HalfEdgeId, f: FaceId) {
        let v = self.target(first);
        let c = self.target(third);
        let closing = self.next(third);
        let g = self.alloc_face(self.is_hole(f));
        let (h_vc, h_cv) = self.alloc_edge_pair(v, c);

        self.link_next(first, h_vc);
        self.link_next(h_vc, closing);
        self.set_face(h_vc, f);
        self.set_face_edge(f, first);

        self.link_next(third, h_cv);
        self.link_next(h_cv, second);
        self.set_face(second, g);
        self.set_face(third, g);
        self.set_face(h_cv, g);
        self.set_face_edge(g, second);
    }

    /// Merge a set of faces into `target`.
    ///
    /// Every edge with both sides in `region` or `target` is removed, the
    /// remaining edges of the region are handed to `target` and the `next`
    /// pointers around affected vertices are re-linked by rotation. Vertices
    /// left without edges are destroyed and returned; their slots keep their
    /// last position and payload until the epoch ends.
    pub fn merge_region(&mut self, region: &[FaceId], target: FaceId) -> Result<Vec<VertexId>> {
        self.validate_region(region, Some(target))?;
        Ok(self.merge_unchecked(region, target))
    }

    /// Merge a set of faces into the border face.
    pub fn remove_faces(&mut self, region: &[FaceId]) -> Result<Vec<VertexId>> {
        let border = self.border_face();
        self.merge_region(region, border)
    }

    /// Merge a connected set of faces into one new polygonal hole face.
    pub fn merge_into_hole(&mut self, region: &[FaceId]) -> Result<(FaceId, Vec<VertexId>)> {
        self.validate_region(region, None)?;
        let hole = self.alloc_face(true);
        let removed = self.merge_unchecked(region, hole);
        Ok((hole, removed))
    }

    fn validate_region(&self, region: &[FaceId], target: Option<FaceId>) -> Result<()> {
        if region.is_empty() {
            return Err(MeshError::topology("empty region"));
        }
        if let Some(target) = target {
            self.check_face(target)?;
        }
        let mut seen = HashSet::with_capacity(region.len());
        for &f in region {
            self.check_face(f)?;
            if self.is_border(f) {
                return Err(MeshError::topology("the border face cannot be merged away"));
            }
            if Some(f) == target {
                return Err(MeshError::topology(format!("{:?} is merged into itself", f)));
            }
            if !seen.insert(f) {
                return Err(MeshError::topology(format!("{:?} appears twice", f)));
            }
        }
        // A new face needs at least one edge that survives the merge.
        if target.is_none()
            && !region
                .iter()
                .flat_map(|&f| self.face_halfedges(f))
                .any(|he| !seen.contains(&self.face_of(self.twin(he))))
        {
            return Err(MeshError::topology("merged region has no boundary"));
        }
        Ok(())
    }

    fn merge_unchecked(&mut self, region: &[FaceId], target: FaceId) -> Vec<VertexId> {
        let members: HashSet<FaceId> = region.iter().copied().chain(std::iter::once(target)).collect();

        let mut region_edges = Vec::new();
        for &f in region {
            region_edges.extend(self.face_halfedges(f));
        }
        let deleted: HashSet<HalfEdgeId> = region_edges
            .iter()
            .copied()
            .filter(|&he| members.contains(&self.face_of(self.twin(he))))
            .flat_map(|he| [he, self.twin(he)])
            .collect();

        // New successors, computed from the untouched pointers first.
        let mut relink = Vec::new();
        for &d in &deleted {
            let b = self.prev(d);
            if deleted.contains(&b) {
                continue;
            }
            let mut c = d;
            while deleted.contains(&c) {
                c = self.next(self.twin(c));
            }
            relink.push((b, c));
        }

        for &he in &region_edges {
            if !deleted.contains(&he) {
                self.set_face(he, target);
            }
        }
        for &(b, c) in &relink {
            self.link_next(b, c);
        }

        let stale = self.face_edge(target);
        if !self.halfedge_alive(stale) || deleted.contains(&stale) || self.face_of(stale) != target {
            let replacement = relink
                .iter()
                .map(|&(b, _)| b)
                .chain(region_edges.iter().copied().filter(|he| !deleted.contains(he)))
                .find(|&he| self.face_of(he) == target)
                .unwrap_or_else(HalfEdgeId::invalid);
            self.set_face_edge(target, replacement);
        }

        let mut touched: Vec<VertexId> = region_edges.iter().map(|&he| self.target(he)).collect();
        touched.sort_unstable();
        touched.dedup();

        let survivors: HashSet<VertexId> = relink.iter().map(|&(b, _)| self.target(b)).collect();
        let stripped: HashSet<VertexId> = deleted.iter().map(|&he| self.target(he)).collect();
        let removed: Vec<VertexId> = touched
            .iter()
            .copied()
            .filter(|v| stripped.contains(v) && !survivors.contains(v))
            .collect();

        for &he in &deleted {
            self.destroy_halfedge(he);
        }
        for &f in region {
            self.destroy_face(f);
        }
        for &v in &removed {
            self.destroy_vertex(v);
        }
        for &(b, _) in &relink {
            let v = self.target(b);
            self.set_vertex_edge(v, b);
        }
        for &v in &touched {
            if self.vertex_alive(v) {
                self.fix_vertex_edge(v);
            }
        }
        removed
    }

    /// Collapse the boundary edge between `v` and its neighbour `into`,
    /// removing `v` and the triangle on the edge.
    ///
    /// The edge must lie on the border or a hole, its inner side must be a
    /// triangle, the two vertices may share no neighbour other than that
    /// triangle's third corner and no triangle around `v` may invert when `v`
    /// is moved onto `into`.
    pub fn collapse_boundary_edge(&mut self, v: VertexId, into: VertexId) -> Result<()> {
        self.check_vertex(v)?;
        self.check_vertex(into)?;
        let boundary = self
            .incident_halfedges(v)
            .map(|he| (he, self.twin(he)))
            .flat_map(|(a, b)| [a, b])
            .find(|&he| {
                self.is_boundary_face(self.face_of(he))
                    && ((self.source(he) == v && self.target(he) == into)
                        || (self.source(he) == into && self.target(he) == v))
            })
            .ok_or_else(|| MeshError::topology(format!("{:?}-{:?} is not a boundary edge", v, into)))?;

        let hb = boundary;
        let h = self.twin(hb);
        let tri = self.face_of(h);
        if self.is_boundary_face(tri) || !self.is_triangle(tri) {
            return Err(MeshError::topology("the collapsed edge has no inner triangle"));
        }
        let h1 = self.next(h);
        let h2 = self.next(h1);
        let x = self.target(h1);
        let tw1 = self.twin(h1);
        let tw2 = self.twin(h2);
        if self.is_boundary_face(self.face_of(tw1)) && self.is_boundary_face(self.face_of(tw2)) {
            return Err(MeshError::topology("cannot collapse an isolated triangle"));
        }

        let boundary_wedges = self
            .incident_halfedges(v)
            .filter(|&he| self.is_boundary_face(self.face_of(he)))
            .count();
        if boundary_wedges != 1 {
            return Err(MeshError::topology(format!("{:?} is pinched", v)));
        }

        let around_v: HashSet<VertexId> = self.adjacent_vertices(v).collect();
        let common = self
            .adjacent_vertices(into)
            .filter(|u| around_v.contains(u))
            .count();
        if common != 1 {
            return Err(MeshError::topology(format!(
                "{:?} and {:?} share more than one neighbour",
                v, into
            )));
        }

        let destination = *self.position(into);
        for f in self.adjacent_faces(v).collect::<Vec<_>>() {
            if f == tri || self.is_boundary_face(f) || !self.is_triangle(f) {
                continue;
            }
            let corners: Vec<Point2<f64>> = self
                .face_vertices(f)
                .map(|u| if u == v { destination } else { *self.position(u) })
                .collect();
            if !is_ccw(&corners[0], &corners[1], &corners[2]) {
                return Err(MeshError::topology(format!(
                    "collapsing {:?} would invert {:?}",
                    v, f
                )));
            }
        }

        let incoming: Vec<HalfEdgeId> = self.incident_halfedges(v).collect();
        let border_face = self.face_of(hb);
        let before = self.prev(hb);
        let after = self.next(hb);

        for he in incoming {
            self.set_target(he, into);
        }
        self.link_next(before, after);
        self.link_twins(tw1, tw2);

        if self.face_edge(border_face) == hb {
            self.set_face_edge(border_face, before);
        }
        if self.vertex_edge(x) == h1 {
            self.set_vertex_edge(x, tw2);
        }
        self.set_vertex_edge(into, before);

        for he in [h, hb, h1, h2] {
            self.destroy_halfedge(he);
        }
        self.destroy_face(tri);
        self.destroy_vertex(v);

        self.fix_vertex_edge(into);
        self.fix_vertex_edge(x);
        Ok(())
    }

    /// Close the corner between the border half-edge `b1` and its successor
    /// with a new triangle.
    ///
    /// For `b1 = a -> b` and `next(b1) = b -> c`, the triangle `(a, b, c)` is
    /// added and the border now runs `a -> c`. The caller is responsible for
    /// the triangle being counter-clockwise and empty.
    pub fn close_border_corner(&mut self, b1: HalfEdgeId) -> Result<FaceId> {
        self.check_halfedge(b1)?;
        let border = self.face_of(b1);
        if !self.is_boundary_face(border) {
            return Err(MeshError::topology(format!("{:?} is not on a boundary", b1)));
        }
        let b2 = self.next(b1);
        let before = self.prev(b1);
        let after = self.next(b2);
        let a = self.source(b1);
        let c = self.target(b2);
        if a == c || after == before || after == b1 {
            return Err(MeshError::topology("the boundary loop is too short"));
        }
        if self.find_halfedge(a, c).is_some() {
            return Err(MeshError::topology(format!("{:?} and {:?} are already connected", a, c)));
        }

        let f = self.alloc_face(false);
        let (ca, ac) = self.alloc_edge_pair(c, a);
        self.link_next(b2, ca);
        self.link_next(ca, b1);
        self.set_face(b1, f);
        self.set_face(b2, f);
        self.set_face(ca, f);
        self.set_face_edge(f, b1);

        self.link_next(before, ac);
        self.link_next(ac, after);
        self.set_face(ac, border);
        if self.face_edge(border) == b1 || self.face_edge(border) == b2 {
            self.set_face_edge(border, ac);
        }

        let b = self.target(b1);
        self.set_vertex_edge(c, ac);
        self.fix_vertex_edge(a);
        self.fix_vertex_edge(b);
        self.fix_vertex_edge(c);
        Ok(f)
    }

    /// Attach a new vertex at `p` outside the mesh to the border half-edge
    /// `b`, forming one new triangle.
    ///
    /// `p` must lie strictly on the border side of `b`.
    pub fn extend_border(&mut self, b: HalfEdgeId, p: Point2<f64>) -> Result<VertexId> {
        self.check_halfedge(b)?;
        let border = self.face_of(b);
        if !self.is_border(border) {
            return Err(MeshError::topology(format!("{:?} is not on the border", b)));
        }
        let u = self.source(b);
        let w = self.target(b);
        if !is_ccw(self.position(u), self.position(w), &p) {
            return Err(MeshError::topology(format!(
                "({}, {}) does not see {:?} from outside",
                p.x, p.y, b
            )));
        }
        let before = self.prev(b);
        let after = self.next(b);

        let v = self.alloc_vertex(p);
        let f = self.alloc_face(false);
        let (wp, pw) = self.alloc_edge_pair(w, v);
        let (pu, up) = self.alloc_edge_pair(v, u);

        self.link_next(b, wp);
        self.link_next(wp, pu);
        self.link_next(pu, b);
        for he in [b, wp, pu] {
            self.set_face(he, f);
        }
        self.set_face_edge(f, b);

        self.link_next(before, up);
        self.link_next(up, pw);
        self.link_next(pw, after);
        self.set_face(up, border);
        self.set_face(pw, border);
        if self.face_edge(border) == b {
            self.set_face_edge(border, up);
        }

        self.set_vertex_edge(v, up);
        self.fix_vertex_edge(u);
        self.fix_vertex_edge(w);
        Ok(v)
    }
}
